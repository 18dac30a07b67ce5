//! Search orchestration: validate, build the URL, then scrape or simulate.
//!
//! This is pure sequencing. There is exactly one facade; whether offers come
//! from the live page or the simulator is a configuration choice, not a code
//! path fork duplicated elsewhere.

use crate::browser::{FetchStatus, RenderedHtmlSource};
use crate::config::SearchMode;
use crate::extractor::ResultExtractor;
use crate::url_builder::SearchUrlBuilder;
use crate::{
    simulate, AirportCodeResolver, FlightOffer, ResultSource, SearchError, SearchQuery,
    SearchResult,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument};

pub struct FlightSearchFacade {
    resolver: AirportCodeResolver,
    extractor: ResultExtractor,
    mode: SearchMode,
    renderer: Option<Arc<dyn RenderedHtmlSource>>,
    simulation_seed: Option<u64>,
}

impl std::fmt::Debug for FlightSearchFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightSearchFacade")
            .field("mode", &self.mode)
            .field("has_renderer", &self.renderer.is_some())
            .field("simulation_seed", &self.simulation_seed)
            .finish_non_exhaustive()
    }
}

impl FlightSearchFacade {
    /// Builds a facade. `renderer` must be present in scrape mode; simulation
    /// mode ignores it.
    pub fn new(
        resolver: AirportCodeResolver,
        mode: SearchMode,
        renderer: Option<Arc<dyn RenderedHtmlSource>>,
        simulation_seed: Option<u64>,
    ) -> Result<Self, SearchError> {
        if mode == SearchMode::Scrape && renderer.is_none() {
            return Err(SearchError::Config(
                "Scrape mode requires a rendering engine".into(),
            ));
        }
        Ok(Self {
            resolver,
            extractor: ResultExtractor::new()?,
            mode,
            renderer,
            simulation_seed,
        })
    }

    /// Convenience constructor for a simulation-only facade.
    pub fn simulated(
        resolver: AirportCodeResolver,
        seed: Option<u64>,
    ) -> Result<Self, SearchError> {
        Self::new(resolver, SearchMode::Simulate, None, seed)
    }

    /// Builds just the search URL for a validated query, without searching.
    pub fn build_url(&self, query: &SearchQuery) -> String {
        SearchUrlBuilder::new(&self.resolver).build(query)
    }

    /// Runs one search end to end.
    ///
    /// Validation failures surface before any network activity. A scrape
    /// timeout or an empty route is a successful result with no offers.
    #[instrument(level = "info", skip(self, query), fields(origin = %query.origin, destination = %query.destination))]
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        let search_url = self.build_url(query);
        info!(url = %search_url, "Searching flights");

        let (mut flights, source) = match self.mode {
            SearchMode::Simulate => (
                simulate::fabricate_offers(query, self.simulation_seed),
                ResultSource::Simulated,
            ),
            SearchMode::Scrape => (self.scrape(&search_url).await?, ResultSource::Scraped),
        };

        flights.sort_by(|a, b| a.price.amount.total_cmp(&b.price.amount));

        info!(flights = flights.len(), source = ?source, "Search completed");
        Ok(SearchResult {
            origin: query.origin.clone(),
            destination: query.destination.clone(),
            departure_date: query.departure_date.format("%Y-%m-%d").to_string(),
            return_date: query.return_date.map(|d| d.format("%Y-%m-%d").to_string()),
            passengers: query.passengers,
            cabin_class: query.cabin_class,
            trip_type: query.trip_type,
            flights,
            search_url,
            searched_at: Utc::now(),
            source,
        })
    }

    async fn scrape(&self, url: &str) -> Result<Vec<FlightOffer>, SearchError> {
        let renderer = self
            .renderer
            .as_ref()
            .ok_or_else(|| SearchError::Config("Scrape mode requires a rendering engine".into()))?;

        let outcome = renderer.fetch_rendered(url).await.map_err(|e| {
            error!(url = %url, "Rendered fetch failed: {}", e);
            e
        })?;

        match outcome.status {
            FetchStatus::Rendered => {
                let html = outcome.html.unwrap_or_default();
                Ok(self.extractor.extract(&html))
            }
            FetchStatus::NoResults | FetchStatus::TimedOut => Ok(Vec::new()),
        }
    }
}

/// One-shot search with the default airport table, mostly for examples and
/// quick library use.
pub async fn search_flights(
    query: &SearchQuery,
    mode: SearchMode,
    renderer: Option<Arc<dyn RenderedHtmlSource>>,
) -> Result<SearchResult, SearchError> {
    let facade = FlightSearchFacade::new(AirportCodeResolver::default(), mode, renderer, None)?;
    facade.search(query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::FetchOutcome;
    use crate::{CabinClass, TripType};
    use async_trait::async_trait;
    use chrono::{Duration, Local};

    struct FixtureRenderer {
        html: &'static str,
    }

    #[async_trait]
    impl RenderedHtmlSource for FixtureRenderer {
        async fn fetch_rendered(&self, _url: &str) -> Result<FetchOutcome, SearchError> {
            Ok(FetchOutcome {
                status: FetchStatus::Rendered,
                html: Some(self.html.to_string()),
            })
        }
    }

    struct TimeoutRenderer;

    #[async_trait]
    impl RenderedHtmlSource for TimeoutRenderer {
        async fn fetch_rendered(&self, _url: &str) -> Result<FetchOutcome, SearchError> {
            Ok(FetchOutcome {
                status: FetchStatus::TimedOut,
                html: None,
            })
        }
    }

    fn sample_query() -> SearchQuery {
        let dep = (Local::now().date_naive() + Duration::days(30))
            .format("%Y-%m-%d")
            .to_string();
        SearchQuery::new(
            "TAS",
            "JFK",
            &dep,
            None,
            1,
            CabinClass::Economy,
            TripType::OneWay,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_simulated_search() {
        let facade =
            FlightSearchFacade::simulated(AirportCodeResolver::default(), Some(9)).unwrap();
        let result = facade.search(&sample_query()).await.unwrap();
        assert_eq!(result.source, ResultSource::Simulated);
        assert!(!result.flights.is_empty());
        assert!(result.search_url.contains("%2Fm%2F0fsmy"));
        for pair in result.flights.windows(2) {
            assert!(pair[0].price.amount <= pair[1].price.amount);
        }
    }

    #[tokio::test]
    async fn test_scrape_timeout_yields_empty_success() {
        let facade = FlightSearchFacade::new(
            AirportCodeResolver::default(),
            SearchMode::Scrape,
            Some(Arc::new(TimeoutRenderer)),
            None,
        )
        .unwrap();
        let result = facade.search(&sample_query()).await.unwrap();
        assert_eq!(result.source, ResultSource::Scraped);
        assert!(result.flights.is_empty());
    }

    #[tokio::test]
    async fn test_scrape_mode_requires_renderer() {
        let err = FlightSearchFacade::new(
            AirportCodeResolver::default(),
            SearchMode::Scrape,
            None,
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("rendering engine"));
    }

    #[tokio::test]
    async fn test_end_to_end_with_fixture() {
        const FIXTURE: &str = r#"
            <div jsname="IWWDBc">
              <ul class="Rk10dc">
                <li>
                  <div class="sSHqwe tPgKwe ogfYpf"><span>Uzbekistan Airways</span></div>
                  <span class="mv1WYe"><div>08:15</div><div>14:40</div></span>
                  <div class="Ak5kof"><div>12h 25m</div></div>
                  <div class="BbR8Ec"><div class="ogfYpf">Nonstop</div></div>
                  <div class="YMlIz FpEdX"><span>$845</span></div>
                </li>
                <li>
                  <div class="sSHqwe tPgKwe ogfYpf"><span>Turkish Airlines</span></div>
                  <span class="mv1WYe"><div>10:05</div><div>19:30</div></span>
                  <div class="Ak5kof"><div>17h 25m</div></div>
                  <div class="BbR8Ec"><div class="ogfYpf">1 stop</div></div>
                  <div class="YMlIz FpEdX"><span>$612</span></div>
                </li>
              </ul>
            </div>
        "#;

        let facade = FlightSearchFacade::new(
            AirportCodeResolver::default(),
            SearchMode::Scrape,
            Some(Arc::new(FixtureRenderer { html: FIXTURE })),
            None,
        )
        .unwrap();

        let result = facade.search(&sample_query()).await.unwrap();
        assert_eq!(result.flights.len(), 2);
        // Sorted ascending by price: Turkish Airlines first
        assert_eq!(result.flights[0].airline, "Turkish Airlines");
        assert_eq!(result.flights[0].price.amount, 612.0);
        assert_eq!(result.flights[1].airline, "Uzbekistan Airways");
        assert_eq!(result.flights[1].price.amount, 845.0);
    }
}
