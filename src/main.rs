use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be in scope before APP_ENV decides the log level
    dotenvy::dotenv().ok();

    let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "production".to_string());
    let default_level = if app_env == "prod" || app_env == "production" {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    pomostream::run().await
}
