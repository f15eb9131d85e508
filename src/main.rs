use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use contact_book::config::Config;
use contact_book::database::Database;
use contact_book::web;

#[derive(Parser, Debug)]
#[command(name = "contact-book")]
#[command(version)]
#[command(about = "A personal address book service")]
struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Generate example config and exit
    #[arg(long)]
    generate_config: bool,
}

const EXAMPLE_CONFIG: &str = include_str!("../example-config.yaml");

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.min_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.pretty {
        builder.pretty().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.generate_config {
        println!("{}", EXAMPLE_CONFIG);
        return Ok(());
    }

    let config_path = args.config.to_string_lossy();
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {:#}", config_path, e);
            return Err(e);
        }
    };

    init_logging(&config);
    info!("Starting {} v{}", contact_book::NAME, contact_book::VERSION);
    info!("Loaded config from {}", config_path);

    let db_config = &config.database;
    let db = Database::connect(
        &db_config.r#type,
        &db_config.uri,
        db_config.max_open_conns,
        db_config.max_idle_conns,
        db_config.timeout_duration()?,
    )
    .await?;
    db.run_migrations().await?;

    if db_config.seed_samples {
        if let Err(e) = db.seed_samples().await {
            error!("Failed to seed sample contacts: {}", e);
        }
    }

    let listen_address = config.server.listen_address();
    info!("Web server will listen on {}", listen_address);

    let service = web::create_service(db);
    let web_handle = tokio::spawn(async move {
        use salvo::conn::TcpListener;
        use salvo::prelude::*;

        let listener = TcpListener::new(listen_address).bind().await;
        Server::new(listener).serve(service).await;
    });

    tokio::select! {
        _ = web_handle => {
            info!("Web server task ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Contact book stopped");
    Ok(())
}
