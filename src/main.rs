use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use rental_scout::config::Config;
use rental_scout::console::ConsoleChooser;
use rental_scout::logging::init_logging;
use rental_scout::provider::IdealistaClient;
use rental_scout::scheduler::PollingScheduler;
use rental_scout::server::{build_app, AppState};
use rental_scout::{
    ChangeDetector, CsvSnapshotStore, DisambiguationMode, FilterCriteria, RentalSearch,
    SearchRequest,
};

#[derive(Parser)]
#[command(
    name = "rental-scout",
    about = "Search rental listings by district and watch for new ones"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the search API and check for new listings on a schedule
    Serve {
        /// Host to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
    /// Run one search from the terminal, asking when a district is ambiguous
    Search {
        #[arg(long)]
        city: String,
        /// District to search in; repeat for several
        #[arg(long = "district", required = true)]
        districts: Vec<String>,
        #[arg(long)]
        max_price: Option<String>,
        #[arg(long)]
        min_price: Option<String>,
        #[arg(long)]
        min_rooms: Option<String>,
        /// top, intermediate or ground; repeat for several
        #[arg(long = "floor")]
        floors: Vec<String>,
        #[arg(long)]
        elevator: bool,
        #[arg(long)]
        air_conditioning: bool,
    },
    /// Only run the periodic new-listing check
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    info!("🏠 Rental Scout");

    match cli.command {
        Command::Serve { host } => serve(&config, &host).await,
        Command::Search {
            city,
            districts,
            max_price,
            min_price,
            min_rooms,
            floors,
            elevator,
            air_conditioning,
        } => {
            let criteria = FilterCriteria::from_form(
                max_price.as_deref(),
                min_price.as_deref(),
                min_rooms.as_deref(),
                &floors,
                elevator.then_some("yes"),
                air_conditioning.then_some("yes"),
            )?;
            let request = SearchRequest {
                city,
                districts: districts.join("\n"),
                criteria,
            };
            search(&config, &request).await
        }
        Command::Watch => watch(&config).await,
    }
}

async fn serve(config: &Config, host: &str) -> Result<()> {
    let client = Arc::new(IdealistaClient::from_config(config)?);
    let store = Arc::new(CsvSnapshotStore::new(&config.snapshot_dir));

    // the API has nobody to ask, so ambiguous districts take every match
    let search = RentalSearch::new(
        client.clone(),
        client,
        store.clone(),
        &config.country,
        DisambiguationMode::Automatic,
    );

    let detector = ChangeDetector::new(store.clone());
    let scheduler = PollingScheduler::start(detector, config.check_interval)?;
    let app = build_app(AppState {
        search: Arc::new(search),
        store,
        new_listings: scheduler.subscribe(),
    });

    let addr: SocketAddr = format!("{}:{}", host, config.port)
        .parse()
        .context("Invalid listen address")?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    scheduler.join().await?;
    Ok(())
}

async fn search(config: &Config, request: &SearchRequest) -> Result<()> {
    let client = Arc::new(IdealistaClient::from_config(config)?);
    let store = Arc::new(CsvSnapshotStore::new(&config.snapshot_dir));
    let search = RentalSearch::new(
        client.clone(),
        client,
        store,
        &config.country,
        DisambiguationMode::Interactive(Arc::new(ConsoleChooser::new())),
    );

    info!("Please wait while we fetch the properties...");
    let outcome = search.run(request).await?;

    for (i, record) in outcome.results.iter().enumerate() {
        println!("{}. {} ({} €)", i + 1, record.address, record.price);
        println!("   {} rooms, {} bathrooms, {} m²", record.rooms, record.bathrooms, record.size);
        println!("   District: {}", record.district);
        println!("   URL: {}", record.url);
        println!();
    }

    info!("💾 Results saved to {}", outcome.snapshot.path.display());
    Ok(())
}

async fn watch(config: &Config) -> Result<()> {
    let store = Arc::new(CsvSnapshotStore::new(&config.snapshot_dir));
    info!(
        "Watching {} ({} snapshots so far)",
        store.dir().display(),
        store.list()?.len()
    );

    let scheduler = PollingScheduler::start(ChangeDetector::new(store), config.check_interval)?;
    let mut updates = scheduler.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let new_listings = updates.borrow_and_update().clone();
                for record in new_listings.iter() {
                    info!(
                        "🆕 {} ({} €, {}) {}",
                        record.address, record.price, record.district, record.url
                    );
                }
            }
        }
    }

    scheduler.join().await?;
    Ok(())
}
