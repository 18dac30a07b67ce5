//! SQLite-backed search history.
//!
//! Every completed search is recorded together with the client that issued
//! it. Recording is best-effort from the server's point of view: a history
//! failure is logged and never fails the search itself.

use crate::{FlightOffer, SearchError, SearchResult};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

/// A persisted search, as read back from the store.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchRecord {
    pub id: i64,
    pub client_id: String,
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    pub return_date: Option<String>,
    pub passengers: i64,
    pub cabin_class: String,
    pub source: String,
    pub flight_count: i64,
    pub flights: Vec<FlightOffer>,
    pub searched_at: DateTime<Utc>,
}

pub struct SearchHistoryStore {
    pool: SqlitePool,
}

impl SearchHistoryStore {
    /// Opens (or creates) the store at the given SQLite URL and runs the
    /// schema setup.
    ///
    /// A single connection keeps `sqlite::memory:` databases coherent across
    /// acquisitions and is plenty for an append-mostly history log.
    pub async fn connect(database_url: &str) -> Result<Self, SearchError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS searches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id TEXT NOT NULL,
                origin TEXT NOT NULL,
                destination TEXT NOT NULL,
                departure_date TEXT NOT NULL,
                return_date TEXT,
                passengers INTEGER NOT NULL,
                cabin_class TEXT NOT NULL,
                source TEXT NOT NULL,
                flight_count INTEGER NOT NULL,
                flights_json TEXT NOT NULL,
                searched_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clients (
                client_id TEXT PRIMARY KEY,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                search_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&pool)
        .await?;

        info!(url = %database_url, "Search history store ready");
        Ok(Self { pool })
    }

    /// Records one completed search for a client.
    pub async fn record_search(
        &self,
        client_id: &str,
        result: &SearchResult,
    ) -> Result<i64, SearchError> {
        let flights_json = serde_json::to_string(&result.flights)
            .map_err(|e| SearchError::Parse(format!("Failed to serialize offers: {}", e)))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO clients (client_id, first_seen, last_seen, search_count)
            VALUES (?1, ?2, ?2, 1)
            ON CONFLICT(client_id) DO UPDATE SET
                last_seen = ?2,
                search_count = search_count + 1
            "#,
        )
        .bind(client_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO searches (
                client_id, origin, destination, departure_date, return_date,
                passengers, cabin_class, source, flight_count, flights_json,
                searched_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            RETURNING id
            "#,
        )
        .bind(client_id)
        .bind(&result.origin)
        .bind(&result.destination)
        .bind(&result.departure_date)
        .bind(&result.return_date)
        .bind(result.passengers as i64)
        .bind(result.cabin_class.as_str())
        .bind(match result.source {
            crate::ResultSource::Scraped => "scraped",
            crate::ResultSource::Simulated => "simulated",
        })
        .bind(result.flights.len() as i64)
        .bind(&flights_json)
        .bind(result.searched_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.get(0);
        debug!(id, client_id = %client_id, "Search recorded");
        Ok(id)
    }

    /// Returns one page of recorded searches, newest first. Pages are
    /// 1-based; `page_size` is clamped to 1..=100. When `client_id` is
    /// given, only that client's history is paged.
    pub async fn recent_searches(
        &self,
        client_id: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<SearchRecord>, SearchError> {
        let page_size = page_size.clamp(1, 100) as i64;
        let offset = (page.max(1) as i64 - 1) * page_size;

        let rows = match client_id {
            Some(client) => {
                sqlx::query(
                    r#"
                    SELECT id, client_id, origin, destination, departure_date,
                           return_date, passengers, cabin_class, source,
                           flight_count, flights_json, searched_at
                    FROM searches
                    WHERE client_id = ?1
                    ORDER BY id DESC
                    LIMIT ?2 OFFSET ?3
                    "#,
                )
                .bind(client)
                .bind(page_size)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, client_id, origin, destination, departure_date,
                           return_date, passengers, cabin_class, source,
                           flight_count, flights_json, searched_at
                    FROM searches
                    ORDER BY id DESC
                    LIMIT ?1 OFFSET ?2
                    "#,
                )
                .bind(page_size)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(row_to_record).collect()
    }

    /// Total number of recorded searches.
    pub async fn search_count(&self) -> Result<i64, SearchError> {
        let row = sqlx::query("SELECT COUNT(*) FROM searches")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get(0))
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<SearchRecord, SearchError> {
    let flights_json: String = row.get("flights_json");
    let flights: Vec<FlightOffer> = serde_json::from_str(&flights_json)
        .map_err(|e| SearchError::Parse(format!("Corrupt history row: {}", e)))?;
    let searched_at: String = row.get("searched_at");
    let searched_at = DateTime::parse_from_rfc3339(&searched_at)
        .map_err(|e| SearchError::Parse(format!("Corrupt history timestamp: {}", e)))?
        .with_timezone(&Utc);

    Ok(SearchRecord {
        id: row.get("id"),
        client_id: row.get("client_id"),
        origin: row.get("origin"),
        destination: row.get("destination"),
        departure_date: row.get("departure_date"),
        return_date: row.get("return_date"),
        passengers: row.get("passengers"),
        cabin_class: row.get("cabin_class"),
        source: row.get("source"),
        flight_count: row.get("flight_count"),
        flights,
        searched_at,
    })
}
