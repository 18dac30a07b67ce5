//! Simulation mode: fabricated flight offers for when live scraping is
//! disabled or unavailable.
//!
//! Offers produced here are plausible but never real; results carry
//! [`ResultSource::Simulated`](crate::ResultSource::Simulated) so callers can
//! never mistake them for live fares.

use crate::{FlightOffer, OfferPrice, SearchQuery};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Airline pool with IATA codes used for fabricated flight numbers.
const AIRLINES: &[(&str, &str)] = &[
    ("United Airlines", "UA"),
    ("Delta", "DL"),
    ("American Airlines", "AA"),
    ("Southwest", "WN"),
    ("JetBlue", "B6"),
    ("Air France", "AF"),
    ("British Airways", "BA"),
    ("Lufthansa", "LH"),
    ("Emirates", "EK"),
    ("Qatar Airways", "QR"),
    ("Turkish Airlines", "TK"),
    ("Uzbekistan Airways", "HY"),
];

/// Fabricates 3–8 pseudo-random offers for a query, sorted ascending by
/// price. A seed makes the output reproducible; `None` draws from entropy.
pub fn fabricate_offers(query: &SearchQuery, seed: Option<u64>) -> Vec<FlightOffer> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let count = rng.gen_range(3..=8);
    let mut offers = Vec::with_capacity(count);

    for _ in 0..count {
        let (airline, code) = AIRLINES[rng.gen_range(0..AIRLINES.len())];
        let departure_hour: u32 = rng.gen_range(5..23);
        let departure_minute: u32 = rng.gen_range(0..60);
        let duration_hours: u32 = rng.gen_range(2..15);
        let duration_minutes: u32 = rng.gen_range(0..60);
        let arrival_hour = (departure_hour + duration_hours) % 24;
        let stops: u32 = rng.gen_range(0..3);

        // Base fare scaled by cabin, plus a surcharge per stop as in the
        // original pricing model
        let base = 200.0 + rng.gen_range(100..2000) as f64;
        let amount = base * query.cabin_class.price_multiplier() + (stops as f64) * 50.0;

        offers.push(FlightOffer {
            airline: airline.to_string(),
            flight_number: format!("{}{}", code, rng.gen_range(100..9999)),
            departure_time: format!("{:02}:{:02}", departure_hour, departure_minute),
            arrival_time: format!("{:02}:{:02}", arrival_hour, rng.gen_range(0..60)),
            duration: format!("{}h {}m", duration_hours, duration_minutes),
            stops,
            price: OfferPrice::usd((amount * 100.0).round() / 100.0),
        });
    }

    offers.sort_by(|a, b| a.price.amount.total_cmp(&b.price.amount));
    offers
}
