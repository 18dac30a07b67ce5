//! # Flight Scout
//!
//! A flight-search facade for Google Flights. A validated route/date/passenger
//! query is turned into a deep-link search URL; results are either scraped
//! from the rendered page via a headless browser or fabricated by an
//! explicitly-labeled simulation mode, and returned sorted by price.

pub mod airports;
pub mod browser;
pub mod config;
pub mod extractor;
pub mod facade;
pub mod history;
pub mod simulate;
pub mod url_builder;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

// Re-export main types for convenience
pub use airports::AirportCodeResolver;
pub use browser::{BrowserSession, BrowserSettings, FetchOutcome, FetchStatus, RenderedHtmlSource};
pub use config::{AppConfig, SearchMode};
pub use extractor::ResultExtractor;
pub use facade::FlightSearchFacade;
pub use history::{SearchHistoryStore, SearchRecord};
pub use url_builder::SearchUrlBuilder;

/// Error types for the flight-search facade
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid search query: {0}")]
    Validation(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("HTML parsing failed: {0}")]
    Parse(String),

    #[error("History store error: {0}")]
    History(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cabin class enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CabinClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    /// Numeric cabin code used by the Google Flights URL (`&c=` parameter).
    /// Economy is 0 and is never emitted.
    pub fn url_code(&self) -> u8 {
        match self {
            CabinClass::Economy => 0,
            CabinClass::PremiumEconomy => 1,
            CabinClass::Business => 2,
            CabinClass::First => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "economy",
            CabinClass::PremiumEconomy => "premium_economy",
            CabinClass::Business => "business",
            CabinClass::First => "first",
        }
    }

    /// Price multiplier applied by the simulator relative to economy fares.
    pub fn price_multiplier(&self) -> f64 {
        match self {
            CabinClass::Economy => 1.0,
            CabinClass::PremiumEconomy => 1.5,
            CabinClass::Business => 3.0,
            CabinClass::First => 5.0,
        }
    }
}

impl FromStr for CabinClass {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "economy" => Ok(CabinClass::Economy),
            "premium_economy" | "premium-economy" => Ok(CabinClass::PremiumEconomy),
            "business" => Ok(CabinClass::Business),
            "first" => Ok(CabinClass::First),
            _ => Err(SearchError::Validation(format!(
                "Cabin class must be one of: economy, premium_economy, business, first (got {})",
                s
            ))),
        }
    }
}

/// Trip type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    OneWay,
    RoundTrip,
}

impl FromStr for TripType {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "one_way" | "one-way" | "oneway" => Ok(TripType::OneWay),
            "round_trip" | "round-trip" | "roundtrip" => Ok(TripType::RoundTrip),
            _ => Err(SearchError::Validation(format!("Invalid trip type: {}", s))),
        }
    }
}

/// A validated flight search query.
///
/// Construct with [`SearchQuery::new`], which enforces every invariant up
/// front; downstream code (URL builder, browser, extractor) can rely on the
/// fields being coherent. Immutable once built.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub passengers: u8,
    pub cabin_class: CabinClass,
    pub trip_type: TripType,
}

impl SearchQuery {
    /// Validates and builds a query. Fails fast with the first violated
    /// invariant, before any network activity.
    pub fn new(
        origin: &str,
        destination: &str,
        departure_date: &str,
        return_date: Option<&str>,
        passengers: u8,
        cabin_class: CabinClass,
        trip_type: TripType,
    ) -> Result<Self, SearchError> {
        let origin = origin.trim().to_uppercase();
        let destination = destination.trim().to_uppercase();

        if origin.is_empty() {
            return Err(SearchError::Validation("Origin airport is required".into()));
        }
        if destination.is_empty() {
            return Err(SearchError::Validation(
                "Destination airport is required".into(),
            ));
        }
        if origin == destination {
            return Err(SearchError::Validation(
                "Origin and destination must be different".into(),
            ));
        }
        if !(1..=9).contains(&passengers) {
            return Err(SearchError::Validation(
                "Passengers must be between 1 and 9".into(),
            ));
        }

        let departure = parse_date(departure_date, "departure date")?;
        let today = Local::now().date_naive();
        if departure < today {
            return Err(SearchError::Validation(
                "Departure date cannot be in the past".into(),
            ));
        }

        let return_date = match (trip_type, return_date) {
            (TripType::RoundTrip, None) => {
                return Err(SearchError::Validation(
                    "Return date is required for round trip".into(),
                ));
            }
            (_, Some(raw)) => {
                let ret = parse_date(raw, "return date")?;
                if ret < departure {
                    return Err(SearchError::Validation(
                        "Return date must be after or equal to departure date".into(),
                    ));
                }
                Some(ret)
            }
            (TripType::OneWay, None) => None,
        };

        Ok(Self {
            origin,
            destination,
            departure_date: departure,
            return_date,
            passengers,
            cabin_class,
            trip_type,
        })
    }
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, SearchError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        SearchError::Validation(format!(
            "Invalid {} format, expected YYYY-MM-DD: {}",
            field, raw
        ))
    })
}

/// Price information with amount and currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferPrice {
    pub amount: f64,
    pub currency: String,
}

impl OfferPrice {
    pub fn usd(amount: f64) -> Self {
        Self {
            amount,
            currency: "USD".to_string(),
        }
    }
}

/// One candidate flight itinerary with price and schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightOffer {
    pub airline: String,
    /// Placeholder "—" when the page does not expose a flight number
    pub flight_number: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub duration: String,
    pub stops: u32,
    pub price: OfferPrice,
}

/// Where the offers in a [`SearchResult`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Extracted from the rendered third-party page
    Scraped,
    /// Fabricated by simulation mode; never real fares
    Simulated,
}

/// The result envelope for a single search. Created fresh per request,
/// never cached or shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    pub return_date: Option<String>,
    pub passengers: u8,
    pub cabin_class: CabinClass,
    pub trip_type: TripType,
    pub flights: Vec<FlightOffer>,
    pub search_url: String,
    pub searched_at: DateTime<Utc>,
    pub source: ResultSource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn future_date(days: i64) -> String {
        (Local::now().date_naive() + Duration::days(days))
            .format("%Y-%m-%d")
            .to_string()
    }

    #[test]
    fn test_cabin_class_parsing() {
        assert!(matches!("economy".parse::<CabinClass>(), Ok(CabinClass::Economy)));
        assert!(matches!(
            "premium_economy".parse::<CabinClass>(),
            Ok(CabinClass::PremiumEconomy)
        ));
        assert!(matches!("business".parse::<CabinClass>(), Ok(CabinClass::Business)));
        assert!(matches!("first".parse::<CabinClass>(), Ok(CabinClass::First)));
        assert!("invalid".parse::<CabinClass>().is_err());
    }

    #[test]
    fn test_trip_type_parsing() {
        assert!(matches!("one_way".parse::<TripType>(), Ok(TripType::OneWay)));
        assert!(matches!("round-trip".parse::<TripType>(), Ok(TripType::RoundTrip)));
        assert!("invalid".parse::<TripType>().is_err());
    }

    #[test]
    fn test_valid_one_way_query() {
        let query = SearchQuery::new(
            "tas",
            "JFK",
            &future_date(30),
            None,
            1,
            CabinClass::Economy,
            TripType::OneWay,
        )
        .unwrap();
        assert_eq!(query.origin, "TAS");
        assert_eq!(query.destination, "JFK");
        assert!(query.return_date.is_none());
    }

    #[test]
    fn test_past_departure_date_rejected() {
        let yesterday = (Local::now().date_naive() - Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        let err = SearchQuery::new(
            "JFK",
            "LAX",
            &yesterday,
            None,
            1,
            CabinClass::Economy,
            TripType::OneWay,
        )
        .unwrap_err();
        assert!(err.to_string().contains("past"));
    }

    #[test]
    fn test_same_origin_destination_rejected() {
        let err = SearchQuery::new(
            "JFK",
            "jfk",
            &future_date(10),
            None,
            1,
            CabinClass::Economy,
            TripType::OneWay,
        )
        .unwrap_err();
        assert!(err.to_string().contains("different"));
    }

    #[test]
    fn test_return_before_departure_rejected() {
        let err = SearchQuery::new(
            "JFK",
            "LAX",
            &future_date(30),
            Some(&future_date(20)),
            1,
            CabinClass::Economy,
            TripType::RoundTrip,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Return date"));
    }

    #[test]
    fn test_round_trip_requires_return_date() {
        let err = SearchQuery::new(
            "JFK",
            "LAX",
            &future_date(30),
            None,
            1,
            CabinClass::Economy,
            TripType::RoundTrip,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Return date is required"));
    }

    #[test]
    fn test_passenger_bounds() {
        for bad in [0u8, 10] {
            let err = SearchQuery::new(
                "JFK",
                "LAX",
                &future_date(30),
                None,
                bad,
                CabinClass::Economy,
                TripType::OneWay,
            )
            .unwrap_err();
            assert!(err.to_string().contains("between 1 and 9"));
        }
    }

    #[test]
    fn test_malformed_date_rejected() {
        let err = SearchQuery::new(
            "JFK",
            "LAX",
            "01/09/2026",
            None,
            1,
            CabinClass::Economy,
            TripType::OneWay,
        )
        .unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }
}
