mod cucumber;
mod support;

use ::cucumber::{codegen::LocalBoxFuture, event::ScenarioFinished, gherkin, writer, World};
use futures_util::FutureExt;
use log::*;
use settlement_engine::MarketplaceDatabase;
use tokio::runtime::Runtime;

use crate::cucumber::MarketWorld;

fn main() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let sys = Runtime::new().expect("Could not start the test runtime");
    sys.block_on(
        MarketWorld::cucumber()
            .with_writer(writer::Libtest::or_basic())
            .after(|_f, _r, scenario, ev, w| post_test_hook(scenario, ev, w))
            .run("tests/features"),
    );
    info!("🚀️ Tests complete");
}

fn post_test_hook<'a>(
    scenario: &'a gherkin::Scenario,
    ev: &'a ScenarioFinished,
    world: Option<&'a mut MarketWorld>,
) -> LocalBoxFuture<'a, ()> {
    let fut = async move {
        trace!("🚀️ After-scenario hook running for \"{}\"", scenario.name);
        let Some(market) = world.and_then(|w| w.market.take()) else {
            warn!("🚀️ World was not specified. Cannot cleanup database.");
            return;
        };
        match ev {
            ScenarioFinished::StepFailed(_, _, _) | ScenarioFinished::StepSkipped => {
                let mut db = market.db.clone();
                error!("🚀️ Error in scenario, database retained: {}", db.url());
                if let Err(e) = db.close().await {
                    error!("🚀️ Failed to close database: {e}");
                }
            },
            ScenarioFinished::StepPassed => {
                debug!("🚀️ Scenario complete, removing database");
                market.finish().await;
            },
            _ => trace!("🚀️ Unhandled event: {ev:?}"),
        }
        trace!("🚀️ After-scenario hook complete");
    };
    fut.boxed_local()
}
