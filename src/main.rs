/// Barangay Portal - account service
///
/// Resident and staff login for the barangay document portal, with
/// per-account lockout after repeated failed attempts, an audit trail and
/// admin review of resident verification.

mod account;
mod api;
mod audit;
mod auth;
mod config;
mod context;
mod db;
mod error;
mod mailer;
mod metrics;
mod rate_limit;
mod server;

use config::{LoggingConfig, ServerConfig};
use context::AppContext;
use error::PortalResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> PortalResult<()> {
    // Load configuration (also reads .env, so it precedes logging setup)
    let config = ServerConfig::from_env()?;

    init_tracing(&config.logging);

    print_banner();

    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level)
        .unwrap_or_else(|_| "barangay_portal=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn print_banner() {
    println!(
        r#"
    ____                                            ____             __        __
   / __ )____ __________ _____  ____ _____ ___  __/ __ \____  _____/ /_____ _/ /
  / __  / __ `/ ___/ __ `/ __ \/ __ `/ __ `/ / / / /_/ / __ \/ ___/ __/ __ `/ /
 / /_/ / /_/ / /  / /_/ / / / / /_/ / /_/ / /_/ / ____/ /_/ / /  / /_/ /_/ / /
/_____/\__,_/_/   \__,_/_/ /_/\__, /\__,_/\__, /_/    \____/_/   \__/\__,_/_/
                             /____/      /____/

        Barangay Portal account service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
