use aquavoice::{settings, storage, web};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "aquavoice",
    version,
    about = "Feedback collection service for water refilling stations"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(server = ?settings.server, database_url = %settings.database.url, "Loaded configuration");

    // init storage (connect + migrate)
    let db = storage::init(&settings.database).await.into_diagnostic()?;

    // seed reference data: stations and the default admin account
    let inserted = storage::ensure_stations(&db, &settings.seed.stations)
        .await
        .into_diagnostic()?;
    if inserted > 0 {
        tracing::info!(count = inserted, "Seeded stations");
    }
    storage::ensure_default_admin(&db, &settings.seed)
        .await
        .into_diagnostic()?;

    // start web server
    web::serve(settings, db).await?;
    Ok(())
}
