use color_eyre::eyre::Result;
use dotenv::dotenv;
use slotsync_api::config::ApiConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Load environment variables
    dotenv().ok();

    let config = ApiConfig::from_env()?;

    slotsync_api::start_server(config).await?;

    Ok(())
}
