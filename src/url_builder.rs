//! Deterministic Google Flights deep-link construction.
//!
//! One canonical builder: the `tfs` parameter carries the route legs in a
//! readable `flight=from:..,to:..,departure:..` form, URL-encoded as a whole.
//! Defaults are suppressed (no `adults` for a single passenger, no cabin code
//! for economy) so identical queries always produce byte-identical URLs.

use crate::airports::AirportCodeResolver;
use crate::{CabinClass, SearchQuery, TripType};

const BASE_URL: &str = "https://www.google.com/travel/flights/search";

/// Pure URL builder over a shared [`AirportCodeResolver`].
pub struct SearchUrlBuilder<'a> {
    resolver: &'a AirportCodeResolver,
}

impl<'a> SearchUrlBuilder<'a> {
    pub fn new(resolver: &'a AirportCodeResolver) -> Self {
        Self { resolver }
    }

    /// Builds the search URL for a validated query. Deterministic: the same
    /// query yields a byte-identical URL.
    pub fn build(&self, query: &SearchQuery) -> String {
        let origin = self.resolver.resolve(&query.origin);
        let destination = self.resolver.resolve(&query.destination);

        let mut tfs = format!(
            "flight=from:{},to:{},departure:{}",
            origin,
            destination,
            query.departure_date.format("%Y-%m-%d")
        );

        if query.trip_type == TripType::RoundTrip {
            if let Some(return_date) = query.return_date {
                tfs.push_str(&format!(
                    ";flight=from:{},to:{},departure:{}",
                    destination,
                    origin,
                    return_date.format("%Y-%m-%d")
                ));
            }
        }

        let mut url = format!(
            "{}?tfs={}&hl=en&curr=USD",
            BASE_URL,
            urlencoding::encode(&tfs)
        );

        if query.passengers > 1 {
            url.push_str(&format!("&adults={}", query.passengers));
        }

        if query.cabin_class != CabinClass::Economy {
            url.push_str(&format!("&c={}", query.cabin_class.url_code()));
        }

        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CabinClass;
    use chrono::NaiveDate;

    fn query(
        origin: &str,
        destination: &str,
        departure: &str,
        return_date: Option<&str>,
        passengers: u8,
        cabin_class: CabinClass,
    ) -> SearchQuery {
        let trip_type = if return_date.is_some() {
            TripType::RoundTrip
        } else {
            TripType::OneWay
        };
        SearchQuery {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_date: NaiveDate::parse_from_str(departure, "%Y-%m-%d").unwrap(),
            return_date: return_date
                .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
            passengers,
            cabin_class,
            trip_type,
        }
    }

    #[test]
    fn test_round_trip_url_exact() {
        let resolver = AirportCodeResolver::default();
        let builder = SearchUrlBuilder::new(&resolver);
        let q = query(
            "JFK",
            "LAX",
            "2026-01-09",
            Some("2026-02-15"),
            1,
            CabinClass::Economy,
        );
        let url = builder.build(&q);
        assert_eq!(
            url,
            "https://www.google.com/travel/flights/search?tfs=\
             flight%3Dfrom%3A%2Fm%2F02_286%2Cto%3A%2Fm%2F030qb3t%2Cdeparture%3A2026-01-09\
             %3Bflight%3Dfrom%3A%2Fm%2F030qb3t%2Cto%3A%2Fm%2F02_286%2Cdeparture%3A2026-02-15\
             &hl=en&curr=USD"
        );
    }

    #[test]
    fn test_defaults_are_suppressed() {
        let resolver = AirportCodeResolver::default();
        let builder = SearchUrlBuilder::new(&resolver);
        let q = query(
            "JFK",
            "LAX",
            "2026-01-09",
            Some("2026-02-15"),
            1,
            CabinClass::Economy,
        );
        let url = builder.build(&q);
        // Both resolved place ids and both dates appear; no qualifiers for defaults
        assert!(url.contains("%2Fm%2F02_286"));
        assert!(url.contains("%2Fm%2F030qb3t"));
        assert!(url.contains("2026-01-09"));
        assert!(url.contains("2026-02-15"));
        assert!(!url.contains("adults="));
        assert!(!url.contains("&c="));
    }

    #[test]
    fn test_passengers_and_cabin_markers() {
        let resolver = AirportCodeResolver::default();
        let builder = SearchUrlBuilder::new(&resolver);
        let q = query("JFK", "LAX", "2026-01-09", None, 3, CabinClass::Business);
        let url = builder.build(&q);
        assert!(url.contains("&adults=3"));
        assert!(url.contains("&c=2"));
    }

    #[test]
    fn test_one_way_has_single_leg() {
        let resolver = AirportCodeResolver::default();
        let builder = SearchUrlBuilder::new(&resolver);
        let q = query("TAS", "JFK", "2026-01-09", None, 1, CabinClass::Economy);
        let url = builder.build(&q);
        // ';' between legs encodes to %3B and must not appear for one-way
        assert!(!url.contains("%3Bflight"));
        assert!(url.contains("%2Fm%2F0fsmy"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let resolver = AirportCodeResolver::default();
        let builder = SearchUrlBuilder::new(&resolver);
        let q = query(
            "SEA",
            "LHR",
            "2026-03-01",
            Some("2026-03-10"),
            2,
            CabinClass::First,
        );
        assert_eq!(builder.build(&q), builder.build(&q));
    }
}
