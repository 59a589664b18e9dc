use std::sync::Arc;

use color_eyre::eyre::Result;
use dotenv::dotenv;
use tutorcall_api::config::ApiConfig;
use tutorcall_db::{create_pool, schema::initialize_database};
use tutorcall_presence::MemoryPresence;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Load environment variables
    dotenv().ok();

    // Load configuration
    let config = ApiConfig::from_env()?;

    // Create database connection pool
    let db_pool = create_pool(&config.database_url).await?;

    // Initialize database schema
    initialize_database(&db_pool).await?;

    // Presence lives in process; a restart loses it and reconciliation rebuilds it
    let presence = Arc::new(MemoryPresence::new());

    // Start API server
    tutorcall_api::start_server(config, db_pool, presence).await?;

    Ok(())
}
