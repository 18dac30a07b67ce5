//! IATA airport code to Google place-identifier resolution.
//!
//! Google Flights deep links do not use IATA codes directly; they use opaque
//! knowledge-graph place identifiers (`/m/...`). This module carries a curated
//! table of major airports and falls back to a synthesized identifier for
//! anything unmapped, so URL building never fails outright.

use std::collections::HashMap;
use tracing::warn;

/// Curated IATA code → place identifier pairs for major airports.
const BUILTIN_AIRPORTS: &[(&str, &str)] = &[
    // North America
    ("JFK", "/m/02_286"),
    ("LAX", "/m/030qb3t"),
    ("ORD", "/m/01_d4"),
    ("DFW", "/m/030k2v"),
    ("SFO", "/m/0d6lp"),
    ("SEA", "/m/0d9jr"),
    ("MIA", "/m/0f2v0"),
    ("BOS", "/m/01cx_"),
    ("ATL", "/m/013yq"),
    ("LAS", "/m/0cv3w"),
    ("PHX", "/m/0d35y"),
    ("DEN", "/m/02cft"),
    ("IAH", "/m/03ksg"),
    ("MSP", "/m/0fpzwf"),
    ("DTW", "/m/0fvwg"),
    ("EWR", "/m/0cc56"),
    ("MCO", "/m/0fxmq"),
    // Europe
    ("LHR", "/m/04jpl"),
    ("CDG", "/m/05qtj"),
    ("FRA", "/m/0jxgx"),
    ("AMS", "/m/0k3p"),
    ("MAD", "/m/056_y"),
    ("BCN", "/m/01f62"),
    ("FCO", "/m/06c62"),
    ("MUC", "/m/0727_"),
    ("IST", "/m/09949"),
    ("LGW", "/m/065y4w7"),
    ("ZRH", "/m/08g5vq"),
    ("VIE", "/m/05qx6"),
    // Asia
    ("DXB", "/m/01f08r"),
    ("HKG", "/m/03h64r"),
    ("NRT", "/m/0f4t4"),
    ("SIN", "/m/02p24c"),
    ("ICN", "/m/0cyzn"),
    ("BKK", "/m/0dl9t8"),
    ("DEL", "/m/03l8mx"),
    ("PEK", "/m/0dq_7"),
    ("PVG", "/m/0j5nb"),
    ("HND", "/m/0gx_x"),
    // Middle East & Central Asia
    ("TAS", "/m/0fsmy"),
    ("DOH", "/m/01_8q3"),
    // Australia & Oceania
    ("SYD", "/m/06y57"),
    ("MEL", "/m/0chghy"),
    ("AKL", "/m/0ctyv"),
    // South America
    ("GRU", "/m/0fphj"),
    ("EZE", "/m/0132jd"),
    ("GIG", "/m/02k0l1"),
    // Africa
    ("JNB", "/m/04g8v"),
    ("CAI", "/m/0cwd8"),
];

/// Immutable IATA → place-identifier mapping.
///
/// Built once at startup (optionally extended from configuration) and shared
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct AirportCodeResolver {
    table: HashMap<String, String>,
}

impl Default for AirportCodeResolver {
    fn default() -> Self {
        let table = BUILTIN_AIRPORTS
            .iter()
            .map(|(code, place)| (code.to_string(), place.to_string()))
            .collect();
        Self { table }
    }
}

impl AirportCodeResolver {
    /// Builds a resolver from the built-in table plus configuration-supplied
    /// overrides. Overrides win on conflict, so a stale built-in entry can be
    /// corrected without a rebuild.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut resolver = Self::default();
        for (code, place) in overrides {
            resolver
                .table
                .insert(code.trim().to_uppercase(), place.clone());
        }
        resolver
    }

    /// Resolves an IATA code (case-insensitive) to a place identifier.
    ///
    /// A miss is not an error: it logs a warning and synthesizes a
    /// best-effort identifier. The resulting URL may simply not resolve on
    /// the third-party site.
    pub fn resolve(&self, code: &str) -> String {
        let normalized = code.trim().to_uppercase();
        if let Some(place) = self.table.get(&normalized) {
            return place.clone();
        }

        warn!(code = %normalized, "Airport code not in place-id table, using fallback format");
        format!("/m/{}", normalized.to_lowercase())
    }

    /// Number of known airports, mostly useful for startup logging.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
