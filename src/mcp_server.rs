// src/mcp_server.rs

use anyhow::Result;
use flight_scout::{
    AirportCodeResolver, AppConfig, CabinClass, FlightSearchFacade, SearchHistoryStore,
    SearchQuery, TripType,
};
use rmcp::{
    model::{ServerCapabilities, ServerInfo},
    schemars, tool,
    transport::stdio,
    ServerHandler, ServiceExt,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Flight search MCP server
#[derive(Clone)]
pub struct FlightServer {
    facade: Arc<FlightSearchFacade>,
    history: Option<Arc<SearchHistoryStore>>,
}

impl FlightServer {
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let resolver = AirportCodeResolver::with_overrides(&config.airports);
        info!(airports = resolver.len(), "Airport table loaded");
        let renderer = flight_scout::browser::renderer_for_mode(config.mode, &config.browser);
        let facade = FlightSearchFacade::new(
            resolver,
            config.mode,
            renderer,
            config.simulation_seed,
        )?;

        let history = match SearchHistoryStore::connect(&config.history_db).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                // History is auxiliary; the server still searches without it
                warn!("Search history unavailable: {}", e);
                None
            }
        };

        Ok(Self {
            facade: Arc::new(facade),
            history,
        })
    }

    /// Initialize logging to file
    fn init_logging() -> Result<()> {
        let log_dir = PathBuf::from("logs");
        std::fs::create_dir_all(&log_dir)?;

        // Rotating file appender; stdout is reserved for the MCP transport
        let file_appender = tracing_appender::rolling::daily(&log_dir, "flight-scout-mcp.log");

        tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info"))
                    .add_directive("flight_scout=debug".parse()?),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .json(),
            )
            .init();

        info!("Logging initialized - logs will be written to logs/flight-scout-mcp.log.*");
        Ok(())
    }

    fn record_in_background(&self, client_id: String, result: &flight_scout::SearchResult) {
        let Some(history) = self.history.clone() else {
            return;
        };
        let result = result.clone();
        // Fire-and-forget: history must never slow down or fail a search
        tokio::spawn(async move {
            if let Err(e) = history.record_search(&client_id, &result).await {
                error!("Failed to record search history: {}", e);
            }
        });
    }
}

/// Flight search parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct SearchFlightsParams {
    #[schemars(description = "Origin airport IATA code (e.g., JFK, TAS)")]
    pub origin: String,
    #[schemars(description = "Destination airport IATA code (e.g., LAX, LHR)")]
    pub destination: String,
    #[schemars(description = "Departure date in YYYY-MM-DD format")]
    pub departure_date: String,
    #[schemars(description = "Return date in YYYY-MM-DD format, required for round trips")]
    pub return_date: Option<String>,
    #[schemars(description = "Number of passengers, 1-9 (default: 1)")]
    pub passengers: Option<u8>,
    #[schemars(description = "Cabin class: economy, premium_economy, business, first")]
    pub cabin_class: Option<String>,
    #[schemars(description = "Trip type: one_way or round_trip")]
    pub trip_type: Option<String>,
    #[schemars(description = "Client identifier used to group search history")]
    pub client_id: Option<String>,
}

/// Search history query parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct SearchHistoryParams {
    #[schemars(description = "Only return history for this client identifier")]
    pub client_id: Option<String>,
    #[schemars(description = "Page number, 1-based (default: 1)")]
    pub page: Option<u32>,
    #[schemars(description = "Records per page, 1-100 (default: 10)")]
    pub page_size: Option<u32>,
}

fn build_query(params: &SearchFlightsParams) -> Result<SearchQuery, String> {
    let trip_type = match params.trip_type.as_deref() {
        Some(raw) => raw.parse::<TripType>().map_err(|e| e.to_string())?,
        // Infer round trip from the presence of a return date
        None if params.return_date.is_some() => TripType::RoundTrip,
        None => TripType::OneWay,
    };

    let cabin_class = params
        .cabin_class
        .as_deref()
        .unwrap_or("economy")
        .parse::<CabinClass>()
        .map_err(|e| e.to_string())?;

    SearchQuery::new(
        &params.origin,
        &params.destination,
        &params.departure_date,
        params.return_date.as_deref(),
        params.passengers.unwrap_or(1),
        cabin_class,
        trip_type,
    )
    .map_err(|e| e.to_string())
}

fn error_json(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

#[tool(tool_box)]
impl FlightServer {
    /// Search for flights on a route
    #[tool(
        description = "Search for flights between two airports. Returns offers sorted by price, labeled with their source (scraped or simulated)."
    )]
    async fn search_flights(&self, #[tool(aggr)] params: SearchFlightsParams) -> String {
        info!(
            origin = %params.origin,
            destination = %params.destination,
            departure_date = %params.departure_date,
            return_date = params.return_date.as_deref(),
            passengers = params.passengers.unwrap_or(1),
            "Flight search request received"
        );

        let query = match build_query(&params) {
            Ok(query) => query,
            Err(e) => {
                warn!("Invalid search request: {}", e);
                return error_json(&e);
            }
        };

        match self.facade.search(&query).await {
            Ok(result) => {
                info!(
                    flights_found = result.flights.len(),
                    source = ?result.source,
                    "Flight search completed successfully"
                );
                let client_id = params.client_id.unwrap_or_else(|| "anonymous".to_string());
                self.record_in_background(client_id, &result);
                serde_json::to_string_pretty(&result)
                    .unwrap_or_else(|e| error_json(&format!("Failed to serialize results: {}", e)))
            }
            Err(e) => {
                // Full detail goes to the log only; callers get a generic fault
                error!("Flight search failed: {}", e);
                error_json("Flight search is temporarily unavailable")
            }
        }
    }

    /// Build the search URL without searching
    #[tool(
        description = "Build the Google Flights deep-link URL for a query without performing the search."
    )]
    async fn get_flight_url(&self, #[tool(aggr)] params: SearchFlightsParams) -> String {
        let query = match build_query(&params) {
            Ok(query) => query,
            Err(e) => {
                warn!("Invalid URL request: {}", e);
                return error_json(&e);
            }
        };

        let url = self.facade.build_url(&query);
        debug!(url = %url, "Search URL built");
        serde_json::json!({ "url": url }).to_string()
    }

    /// Read back recorded searches
    #[tool(
        description = "Return one page of recorded searches, newest first. Optionally filtered by client_id; page is 1-based."
    )]
    async fn get_search_history(&self, #[tool(aggr)] params: SearchHistoryParams) -> String {
        let Some(history) = self.history.as_ref() else {
            return error_json("Search history is not available");
        };

        match history
            .recent_searches(
                params.client_id.as_deref(),
                params.page.unwrap_or(1),
                params.page_size.unwrap_or(10),
            )
            .await
        {
            Ok(records) => {
                debug!(records = records.len(), "History query completed");
                serde_json::to_string_pretty(&records)
                    .unwrap_or_else(|e| error_json(&format!("Failed to serialize history: {}", e)))
            }
            Err(e) => {
                error!("History query failed: {}", e);
                error_json(&format!("History query failed: {}", e))
            }
        }
    }
}

#[tool(tool_box)]
impl ServerHandler for FlightServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "A flight search server. Searches routes by airport code and date, returns offers sorted by price, and records search history. Results are labeled scraped or simulated depending on server configuration."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Local};
    use flight_scout::{
        FetchOutcome, RenderedHtmlSource, SearchError, SearchMode, SearchResult,
    };

    struct FailingRenderer;

    #[async_trait]
    impl RenderedHtmlSource for FailingRenderer {
        async fn fetch_rendered(&self, _url: &str) -> Result<FetchOutcome, SearchError> {
            Err(SearchError::Browser(
                "chrome process at /usr/bin/chromium exited with signal 9".to_string(),
            ))
        }
    }

    fn search_params() -> SearchFlightsParams {
        let dep = (Local::now().date_naive() + Duration::days(30))
            .format("%Y-%m-%d")
            .to_string();
        SearchFlightsParams {
            origin: "JFK".to_string(),
            destination: "LAX".to_string(),
            departure_date: dep,
            return_date: None,
            passengers: None,
            cabin_class: None,
            trip_type: None,
            client_id: None,
        }
    }

    fn server_with(
        facade: FlightSearchFacade,
        history: Option<Arc<SearchHistoryStore>>,
    ) -> FlightServer {
        FlightServer {
            facade: Arc::new(facade),
            history,
        }
    }

    #[tokio::test]
    async fn test_scrape_fault_hides_internal_detail() {
        let facade = FlightSearchFacade::new(
            AirportCodeResolver::default(),
            SearchMode::Scrape,
            Some(Arc::new(FailingRenderer)),
            None,
        )
        .unwrap();
        let server = server_with(facade, None);

        let answer = server.search_flights(search_params()).await;
        let parsed: serde_json::Value = serde_json::from_str(&answer).unwrap();
        assert_eq!(
            parsed["error"],
            "Flight search is temporarily unavailable"
        );
        // The browser failure stays in the logs, never in the answer
        assert!(!answer.contains("chromium"));
        assert!(!answer.contains("signal 9"));
    }

    #[tokio::test]
    async fn test_validation_fault_keeps_specific_reason() {
        let facade =
            FlightSearchFacade::simulated(AirportCodeResolver::default(), None).unwrap();
        let server = server_with(facade, None);

        let mut params = search_params();
        params.destination = "JFK".to_string();
        let answer = server.search_flights(params).await;
        let parsed: serde_json::Value = serde_json::from_str(&answer).unwrap();
        assert!(parsed["error"]
            .as_str()
            .unwrap()
            .contains("must be different"));
    }

    #[tokio::test]
    async fn test_history_tool_pages_through_records() {
        let facade =
            FlightSearchFacade::simulated(AirportCodeResolver::default(), Some(5)).unwrap();
        let store = Arc::new(
            SearchHistoryStore::connect("sqlite::memory:").await.unwrap(),
        );
        let server = server_with(facade, Some(Arc::clone(&store)));

        for _ in 0..3 {
            let answer = server.search_flights(search_params()).await;
            let parsed: SearchResult = serde_json::from_str(&answer).unwrap();
            // Recording is spawned off the request path; write directly so
            // the read below is not racing the background task
            store.record_search("pager", &parsed).await.unwrap();
        }

        let page2 = server
            .get_search_history(SearchHistoryParams {
                client_id: Some("pager".to_string()),
                page: Some(2),
                page_size: Some(2),
            })
            .await;
        let records: serde_json::Value = serde_json::from_str(&page2).unwrap();
        assert_eq!(records.as_array().unwrap().len(), 1);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = FlightServer::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        // Continue without logging rather than failing
    }

    info!("Starting flight-scout MCP server");

    let config = AppConfig::load()?;
    let server = FlightServer::from_config(&config).await?;
    let transport = stdio();

    info!(mode = ?config.mode, "MCP server initialized, starting service");

    // SDK handles initialization, tool discovery, and message routing
    let service = server.serve(transport).await?;

    info!("MCP service started, waiting for requests");

    service.waiting().await?;

    info!("MCP service shutting down");
    Ok(())
}
