use cucumber::given;
use settlement_engine::{
    db_types::{PromoType, SubscriptionTier},
    test_utils::seed::{seed_address, seed_product, seed_user_with_promo},
};

use crate::{
    cucumber::{world::money, MarketWorld},
    support::Market,
};

#[given("a fresh marketplace")]
async fn fresh_marketplace(world: &mut MarketWorld) {
    world.market = Some(Market::new().await);
}

#[given(expr = "a {word} seller named {string}")]
async fn seller(world: &mut MarketWorld, tier: String, name: String) {
    let (tier, promo) = match tier.as_str() {
        "free" => (SubscriptionTier::Free, None),
        "premium" => (SubscriptionTier::Premium, None),
        "launch" => (SubscriptionTier::Free, Some(PromoType::ReducedRateLaunch)),
        other => panic!("Unknown seller tier {other}"),
    };
    let user = seed_user_with_promo(&world.market().db, &name, tier, promo).await;
    world.users.insert(name, user);
}

#[given(expr = "a {word} buyer named {string}")]
async fn buyer(world: &mut MarketWorld, tier: String, name: String) {
    let tier = tier.parse::<SubscriptionTier>().expect("Unknown buyer tier");
    let user = seed_user_with_promo(&world.market().db, &name, tier, None).await;
    let address = seed_address(&world.market().db, user.id).await;
    world.addresses.insert(name.clone(), address);
    world.users.insert(name, user);
}

#[given(expr = "{string} lists {string} for {word}")]
async fn listing(world: &mut MarketWorld, seller: String, product: String, price: String) {
    let seller_id = world.user(&seller).id;
    let listed = seed_product(&world.market().db, seller_id, money(&price)).await;
    world.products.insert(product, listed);
}
