//! CLI interface for flight-scout

use clap::{Parser, Subcommand};
use flight_scout::{
    AirportCodeResolver, AppConfig, CabinClass, FlightSearchFacade, SearchHistoryStore, SearchMode,
    SearchQuery, TripType,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flight-scout")]
#[command(about = "A Google Flights search facade with scrape and simulation modes")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for flights
    Search {
        /// Origin airport code
        #[arg(short, long)]
        from: String,
        /// Destination airport code
        #[arg(short, long)]
        to: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
        /// Return date for round trips (YYYY-MM-DD)
        #[arg(short, long)]
        return_date: Option<String>,
        /// Number of passengers (1-9)
        #[arg(short, long, default_value = "1")]
        passengers: u8,
        /// Cabin class (economy, premium_economy, business, first)
        #[arg(long, default_value = "economy")]
        class: String,
        /// Fabricate offers instead of scraping, regardless of configuration
        #[arg(long)]
        simulate: bool,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Print the search URL for a query without searching
    Url {
        /// Origin airport code
        #[arg(short, long)]
        from: String,
        /// Destination airport code
        #[arg(short, long)]
        to: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
        /// Return date for round trips (YYYY-MM-DD)
        #[arg(short, long)]
        return_date: Option<String>,
        /// Number of passengers (1-9)
        #[arg(short, long, default_value = "1")]
        passengers: u8,
        /// Cabin class (economy, premium_economy, business, first)
        #[arg(long, default_value = "economy")]
        class: String,
    },
    /// Show recorded search history
    History {
        /// Only show history for this client identifier
        #[arg(long)]
        client_id: Option<String>,
        /// Page number, 1-based
        #[arg(long, default_value = "1")]
        page: u32,
        /// Records per page (1-100)
        #[arg(long, default_value = "10")]
        page_size: u32,
    },
}

fn build_query(
    from: &str,
    to: &str,
    date: &str,
    return_date: Option<&str>,
    passengers: u8,
    class: &str,
) -> Result<SearchQuery, Box<dyn std::error::Error>> {
    let cabin_class = class.parse::<CabinClass>()?;
    let trip_type = if return_date.is_some() {
        TripType::RoundTrip
    } else {
        TripType::OneWay
    };
    Ok(SearchQuery::new(
        from,
        to,
        date,
        return_date,
        passengers,
        cabin_class,
        trip_type,
    )?)
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Search {
            from,
            to,
            date,
            return_date,
            passengers,
            class,
            simulate,
            output,
        } => {
            let query = build_query(&from, &to, &date, return_date.as_deref(), passengers, &class)?;

            let mode = if simulate {
                SearchMode::Simulate
            } else {
                config.mode
            };
            let resolver = AirportCodeResolver::with_overrides(&config.airports);
            let renderer = flight_scout::browser::renderer_for_mode(mode, &config.browser);
            let facade = FlightSearchFacade::new(resolver, mode, renderer, config.simulation_seed)?;

            println!("Searching for flights...");
            match facade.search(&query).await {
                Ok(result) => {
                    let json = serde_json::to_string_pretty(&result)?;

                    if let Some(output_file) = output {
                        fs::write(&output_file, &json)?;
                        println!("Results saved to {}", output_file);
                    } else {
                        println!("{}", json);
                    }

                    println!("\nSummary:");
                    println!("Source: {:?}", result.source);
                    println!("Found {} flights", result.flights.len());
                    if let Some(cheapest) = result.flights.first() {
                        println!(
                            "Cheapest: {} - {} {}",
                            cheapest.airline, cheapest.price.amount, cheapest.price.currency
                        );
                    }
                }
                Err(e) => {
                    eprintln!("Error searching for flights: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Url {
            from,
            to,
            date,
            return_date,
            passengers,
            class,
        } => {
            let query = build_query(&from, &to, &date, return_date.as_deref(), passengers, &class)?;
            let resolver = AirportCodeResolver::with_overrides(&config.airports);
            let facade = FlightSearchFacade::simulated(resolver, None)?;
            println!("{}", facade.build_url(&query));
        }
        Commands::History {
            client_id,
            page,
            page_size,
        } => {
            let store = SearchHistoryStore::connect(&config.history_db).await?;
            let records = store
                .recent_searches(client_id.as_deref(), page, page_size)
                .await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}
