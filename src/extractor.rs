//! CSS-selector extraction of flight offers from rendered Google Flights HTML.
//!
//! The selectors target Google's obfuscated class names and will need
//! occasional maintenance when the page changes. Extraction is deliberately
//! tolerant: a row that cannot be parsed is logged and dropped, and partial
//! results are always preferred over total failure.

use crate::{FlightOffer, OfferPrice, SearchError};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Shown when a row does not expose a flight number.
const UNKNOWN_FLIGHT_NUMBER: &str = "—";

/// HTML parser for Google Flights result pages
pub struct ResultExtractor {
    // Result-group containers ("best flights" and "other flights" sections)
    groups_selector: Selector,
    // One <li> per offer row within a group
    row_selector: Selector,
    // Airline display name; rows without it are not flight rows
    airline_selector: Selector,
    // Departure and arrival times, positionally (first = departure)
    times_selector: Selector,
    duration_selector: Selector,
    stops_selector: Selector,
    price_selector: Selector,
}

impl ResultExtractor {
    pub fn new() -> Result<Self, SearchError> {
        Ok(Self {
            groups_selector: parse_selector(r#"div[jsname="IWWDBc"], div[jsname="YdtKid"]"#)?,
            row_selector: parse_selector("ul.Rk10dc li")?,
            airline_selector: parse_selector("div.sSHqwe.tPgKwe.ogfYpf span")?,
            times_selector: parse_selector("span.mv1WYe div")?,
            duration_selector: parse_selector("li div.Ak5kof div")?,
            stops_selector: parse_selector(".BbR8Ec .ogfYpf")?,
            price_selector: parse_selector(".YMlIz.FpEdX")?,
        })
    }

    /// Extracts flight offers from a rendered results page.
    ///
    /// Returns an empty list when the page holds no recognizable offers;
    /// that is a legitimate outcome, not an error.
    pub fn extract(&self, html: &str) -> Vec<FlightOffer> {
        let document = Html::parse_document(html);
        let mut offers = Vec::new();

        for group in document.select(&self.groups_selector) {
            for row in group.select(&self.row_selector) {
                match self.extract_row(&row) {
                    Some(offer) => offers.push(offer),
                    None => continue,
                }
            }
        }

        debug!(offers = offers.len(), "Extraction completed");
        offers
    }

    /// Parses a single result row. `None` means the row was skipped, either
    /// because it is not a flight row (no airline name) or because it could
    /// not be parsed; the caller continues with the remaining rows.
    fn extract_row(&self, row: &ElementRef) -> Option<FlightOffer> {
        // No airline name means a non-flight row (ads, "view more" stubs)
        let airline = match row.select(&self.airline_selector).next() {
            Some(el) => collect_text(&el),
            None => return None,
        };
        if airline.is_empty() {
            return None;
        }

        let times: Vec<String> = row
            .select(&self.times_selector)
            .map(|el| collect_text(&el))
            .collect();
        let departure_time = match times.first() {
            Some(t) => t.clone(),
            None => {
                warn!(airline = %airline, "Row dropped: departure time not found");
                return None;
            }
        };
        let arrival_time = match times.get(1) {
            Some(t) => t.clone(),
            None => {
                warn!(airline = %airline, "Row dropped: arrival time not found");
                return None;
            }
        };

        let duration = row
            .select(&self.duration_selector)
            .next()
            .map(|el| collect_text(&el))
            .unwrap_or_else(|| "Unknown".to_string());

        let stops = row
            .select(&self.stops_selector)
            .next()
            .map(|el| parse_stops(&collect_text(&el)))
            .unwrap_or(0);

        let price = row
            .select(&self.price_selector)
            .next()
            .map(|el| parse_price(&collect_text(&el)))
            .unwrap_or_else(|| OfferPrice::usd(0.0));

        Some(FlightOffer {
            airline,
            flight_number: UNKNOWN_FLIGHT_NUMBER.to_string(),
            departure_time,
            arrival_time,
            duration,
            stops,
            price,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector, SearchError> {
    Selector::parse(css).map_err(|e| SearchError::Parse(format!("Invalid selector {}: {}", css, e)))
}

fn collect_text(el: &ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// "Nonstop" (any casing) is zero stops; otherwise the leading numeric token
/// counts, defaulting to zero when the text is unparsable.
pub fn parse_stops(text: &str) -> u32 {
    static LEADING_NUMBER: OnceLock<Regex> = OnceLock::new();

    if text.to_lowercase().contains("nonstop") {
        return 0;
    }
    let re = LEADING_NUMBER.get_or_init(|| Regex::new(r"^\s*(\d+)").unwrap());
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Strips everything but digits and dots, then parses as a decimal amount,
/// defaulting to zero on failure. The currency is inferred from the symbol.
pub fn parse_price(text: &str) -> OfferPrice {
    let currency = detect_currency(text);
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let amount = digits.parse::<f64>().unwrap_or(0.0);
    OfferPrice {
        amount,
        currency: currency.to_string(),
    }
}

fn detect_currency(text: &str) -> &'static str {
    if text.contains('€') {
        "EUR"
    } else if text.contains('£') {
        "GBP"
    } else if text.contains('¥') {
        "JPY"
    } else {
        "USD"
    }
}
