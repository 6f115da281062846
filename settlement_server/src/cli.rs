use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 23] = [
        "RUST_LOG",
        "MKT_HOST",
        "MKT_PORT",
        "MKT_DATABASE_URL",
        "MKT_JWT_ISSUER",
        "MKT_USE_X_FORWARDED_FOR",
        "MKT_USE_FORWARDED",
        "MKT_DEFAULT_SHIPPING_PRICE",
        "MKT_COMMISSION_FREE_BPS",
        "MKT_COMMISSION_PREMIUM_BPS",
        "MKT_COMMISSION_PROMO_BPS",
        "MKT_CASHBACK_FREE_BPS",
        "MKT_CASHBACK_PREMIUM_BPS",
        "MKT_MIN_WITHDRAWAL",
        "MKT_EXPIRE_UNPAID_ORDERS",
        "MKT_UNPAID_ORDER_TIMEOUT",
        "MKT_COMPLETION_HOLD_PERIOD",
        "MKT_TRACKING_SYNC_INTERVAL",
        "MKT_WEBHOOK_MAX_ATTEMPTS",
        "MKT_MP_BASE_URL",
        "MKT_MP_NOTIFICATION_URL",
        "MKT_ME_SANDBOX",
        "MKT_ME_ORIGIN_ZIPCODE",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
