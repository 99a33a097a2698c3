mod cli;
mod shutdown;

use crate::cli::{Command, LogFormatArg, CLI};
use anyhow::{bail, Context, Result};
use clap::Parser;
use lapse_core::expiry;
use lapse_generator::RandomGenerator;
use lapse_shortener::{
    Expiration, ShortenParams, Shortener, ShortenerService, ShortenerSettings, Sweeper,
    SweeperSettings, UrlRecord,
};
use lapse_storage::MySqlRepository;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_RUST_LOG: &str = "lapse=info,lapse_shortener=info,lapse_storage=info";

type Service = ShortenerService<MySqlRepository, RandomGenerator>;

#[tokio::main]
async fn main() -> Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    let repository = MySqlRepository::connect(&config.mysql_dsn)
        .await
        .context("failed to connect to mysql")?;

    if let Command::Migrate = config.command {
        repository.migrate().await.context("failed to apply schema")?;
        info!("schema is up to date");
        return Ok(());
    }

    let settings = ShortenerSettings::builder()
        .default_ttl(expiry::days(config.default_ttl_days))
        .max_attempts(config.max_attempts)
        .build();
    let service = ShortenerService::new(repository, RandomGenerator::new()).with_settings(settings);

    run(config.command, service).await
}

async fn run(command: Command, service: Service) -> Result<()> {
    match command {
        Command::Migrate => {}
        Command::Shorten { url, ttl_days } => {
            let mut params = ShortenParams::new(url);
            if let Some(ttl_days) = ttl_days {
                params = params.with_expiration(Expiration::days(ttl_days));
            }
            let record = service.shorten(params).await?;
            println!("{}", record.code);
        }
        Command::Resolve { code } => match service.resolve_str(&code).await? {
            Some(url) => println!("{url}"),
            None => bail!("short code not found: {code}"),
        },
        Command::List { json, expired } => {
            let records = if expired {
                service.list_expired().await?
            } else {
                service.list_active().await?
            };
            for record in &records {
                print_record(record, json)?;
            }
        }
        Command::Cleanup => {
            let removed = service.cleanup(None).await?;
            println!("{removed}");
        }
        Command::Sweep { interval_secs } => {
            let settings = SweeperSettings::builder()
                .interval(Duration::from_secs(interval_secs.max(1)))
                .build();
            let sweeper = Sweeper::new(service, settings);
            tokio::spawn(shutdown::cancel_on_signal(sweeper.cancellation_token()));

            let total = sweeper.run().await;
            info!(total, "sweep loop finished");
        }
    }

    Ok(())
}

fn print_record(record: &UrlRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(record)?);
    } else {
        println!(
            "{}\t{}\t{}\t{}",
            record.code, record.expire_at, record.created_at, record.original_url
        );
    }
    Ok(())
}

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_RUST_LOG));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormatArg::Text => builder.init(),
        LogFormatArg::Json => builder.json().init(),
    }
}
