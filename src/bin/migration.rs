use sea_orm_migration::MigratorTrait;
use std::process::ExitCode;
use tracing::{error, info};

use storefront_api::{config, db, migrator::Migrator};

/// `migration [up|down|fresh|status]`, defaulting to `up`. Connection settings
/// come from the same configuration layers the server reads.
#[tokio::main]
async fn main() -> ExitCode {
    let cfg = match config::load_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let command = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());

    let pool = match db::establish_connection_from_app_config(&cfg).await {
        Ok(pool) => pool,
        Err(err) => {
            error!("Failed to connect: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = match command.as_str() {
        "up" => Migrator::up(&pool, None).await,
        "down" => Migrator::down(&pool, Some(1)).await,
        "fresh" => Migrator::fresh(&pool).await,
        "status" => Migrator::status(&pool).await,
        other => {
            error!("Unknown command '{}'; expected up, down, fresh or status", other);
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => {
            info!(%command, "Migration command completed");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%command, "Migration command failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
