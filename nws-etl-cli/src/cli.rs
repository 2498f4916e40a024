use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode, Text};
use nws_etl_core::{Config, PgStore, Pipeline, rederive};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "nws-etl", version, about = "NWS hourly forecast ETL")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the hourly forecast once, capture it and append curated rows.
    Run,

    /// Interactively edit location and database settings.
    Configure,

    /// Re-derive the curated rows of an earlier run from its stored raw payload
    /// and print them as JSON lines. Nothing is written.
    Replay {
        /// Run timestamp as printed by `run`, e.g. 2026-01-23T16:00:02.123456+00:00
        run_ts: String,
    },

    /// Print the path of the configuration file.
    ConfigPath,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Run => {
                let config = Config::load().context("Failed to load configuration")?;
                let pipeline = Pipeline::from_config(&config).await?;
                let summary = pipeline.run_once().await?;
                println!("{summary}");
            }
            Command::Configure => configure()?,
            Command::Replay { run_ts } => {
                let run_ts = parse_run_ts(&run_ts)?;
                let config = Config::load().context("Failed to load configuration")?;
                let store = PgStore::connect(&config).await?;

                let Some(rows) = rederive(&store, run_ts).await? else {
                    bail!("No raw extract stored for run {}", run_ts.to_rfc3339());
                };
                for row in rows {
                    println!("{}", serde_json::to_string(&row)?);
                }
            }
            Command::ConfigPath => {
                println!("{}", Config::config_file_path()?.display());
            }
        }

        Ok(())
    }
}

fn parse_run_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Run timestamp {s:?} is not an RFC 3339 timestamp"))
}

fn configure() -> anyhow::Result<()> {
    let path = Config::config_file_path()?;
    let mut cfg = Config::load_from(&path)?;

    cfg.location.label = Text::new("Location label:").with_default(&cfg.location.label).prompt()?;
    cfg.location.lat = CustomType::<f64>::new("Latitude:").with_default(cfg.location.lat).prompt()?;
    cfg.location.lon = CustomType::<f64>::new("Longitude:").with_default(cfg.location.lon).prompt()?;
    cfg.api.user_agent = Text::new("User-Agent (application and contact):")
        .with_default(&cfg.api.user_agent)
        .prompt()?;

    cfg.database.host = Text::new("Database host:").with_default(&cfg.database.host).prompt()?;
    cfg.database.port = CustomType::<u16>::new("Database port:").with_default(cfg.database.port).prompt()?;
    cfg.database.dbname = Text::new("Database name:").with_default(&cfg.database.dbname).prompt()?;
    cfg.database.user = Text::new("Database user:").with_default(&cfg.database.user).prompt()?;

    let password = Password::new("Database password (empty keeps the current one, PGPASSWORD overrides):")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;
    if !password.is_empty() {
        cfg.database.password = Some(password);
    }

    cfg.validate()?;
    cfg.save_to(&path)?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}
