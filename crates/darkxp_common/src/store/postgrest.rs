//! Hosted store over the Supabase REST (PostgREST) API.
//!
//! Reads are paged with `limit`/`offset` over a stable ordering until a page
//! comes back empty. Writes go out in batches; a failed batch leaves earlier
//! batches applied.

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::{AggregateView, LedgerStore, LegacyFieldStore, SnapshotStore};
use crate::config::StoreConfig;
use crate::error::{ReconcileError, Result};
use crate::model::{AggregateSnapshot, LedgerEvent, LedgerRow, LegacyLevelRow, SnapshotRow};

pub const SKILLS_TABLE: &str = "skills";
pub const SNAPSHOT_TABLE: &str = "skill_progress";
pub const LEDGER_TABLE: &str = "dark_xp_events";
pub const AGGREGATE_TABLE: &str = "user_progress";

/// Row sent when rebuilding a snapshot
#[derive(Debug, Serialize)]
struct SnapshotUpsert<'a> {
    user_id: &'a str,
    skill_id: &'a str,
    level: i64,
    prestige: i64,
    updated_at: DateTime<Utc>,
}

/// Blocking PostgREST client
pub struct PostgrestStore {
    rest_url: String,
    service_key: String,
    timeout_secs: u64,
    page_size: usize,
    batch_size: usize,
    client: Client,
}

impl PostgrestStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReconcileError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            rest_url: config.rest_url(),
            service_key: config.service_key.clone().unwrap_or_default().trim().to_string(),
            timeout_secs: config.timeout_secs,
            page_size: config.page_size,
            batch_size: config.batch_size,
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", self.service_key.as_str())
            .bearer_auth(&self.service_key)
    }

    fn describe_send_error(&self, e: reqwest::Error) -> String {
        if e.is_timeout() {
            format!("request timed out after {} seconds", self.timeout_secs)
        } else {
            format!("request failed: {}", e)
        }
    }

    fn check_status(response: Response) -> std::result::Result<Response, String> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(format!("HTTP {}: {}", status, body.trim()))
    }

    /// Every row of `table` owned by `actor_id`, across as many pages as needed
    fn fetch_all<T: DeserializeOwned>(
        &self,
        table: &'static str,
        select: &str,
        order: &str,
        actor_id: &str,
    ) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        let mut offset = 0usize;
        let owner = format!("eq.{}", actor_id);

        let limit = self.page_size.to_string();

        loop {
            let start = offset.to_string();
            let request = self.client.get(self.table_url(table)).query(&[
                ("select", select),
                ("user_id", owner.as_str()),
                ("order", order),
                ("limit", limit.as_str()),
                ("offset", start.as_str()),
            ]);

            let response = self
                .authed(request)
                .send()
                .map_err(|e| ReconcileError::fetch(table, self.describe_send_error(e)))?;
            let response = Self::check_status(response).map_err(|msg| ReconcileError::fetch(table, msg))?;
            let page: Vec<T> = response
                .json()
                .map_err(|e| ReconcileError::fetch(table, format!("invalid response body: {}", e)))?;

            let fetched = page.len();
            rows.extend(page);
            tracing::trace!(table, offset, fetched, "Fetched page");

            match next_offset(offset, fetched) {
                Some(next) => offset = next,
                None => break,
            }
        }

        Ok(rows)
    }

    fn post<B: Serialize + ?Sized>(
        &self,
        table: &'static str,
        query: &[(&str, &str)],
        prefer: &str,
        body: &B,
    ) -> Result<()> {
        let request = self
            .client
            .post(self.table_url(table))
            .query(query)
            .header("Prefer", prefer)
            .json(body);

        let response = self
            .authed(request)
            .send()
            .map_err(|e| ReconcileError::write(table, self.describe_send_error(e)))?;
        Self::check_status(response).map_err(|msg| ReconcileError::write(table, msg))?;
        Ok(())
    }
}

impl LegacyFieldStore for PostgrestStore {
    fn fetch_legacy_levels(&self, actor_id: &str) -> Result<Vec<LegacyLevelRow>> {
        self.fetch_all(SKILLS_TABLE, "id,level", "id.asc", actor_id)
    }
}

impl SnapshotStore for PostgrestStore {
    fn fetch_snapshots(&self, actor_id: &str) -> Result<Vec<SnapshotRow>> {
        self.fetch_all(SNAPSHOT_TABLE, "skill_id,level,prestige", "skill_id.asc", actor_id)
    }

    fn upsert_snapshots(&self, actor_id: &str, rows: &[SnapshotRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let payload: Vec<SnapshotUpsert<'_>> = rows
            .iter()
            .map(|row| SnapshotUpsert {
                user_id: actor_id,
                skill_id: &row.subject_id,
                level: row.level,
                prestige: row.prestige,
                updated_at: now,
            })
            .collect();

        let mut written = 0usize;
        for chunk in payload.chunks(self.batch_size) {
            self.post(
                SNAPSHOT_TABLE,
                &[("on_conflict", "user_id,skill_id")],
                "resolution=merge-duplicates,return=minimal",
                chunk,
            )
            .map_err(|e| with_progress(e, written, payload.len()))?;
            written += chunk.len();
            tracing::debug!(written, total = payload.len(), "Upserted snapshot batch");
        }
        Ok(())
    }
}

impl LedgerStore for PostgrestStore {
    fn fetch_ledger(&self, actor_id: &str) -> Result<Vec<LedgerRow>> {
        self.fetch_all(LEDGER_TABLE, "skill_id,amount", "id.asc", actor_id)
    }

    fn append_events(&self, events: &[LedgerEvent]) -> Result<()> {
        let mut written = 0usize;
        for chunk in events.chunks(self.batch_size) {
            self.post(LEDGER_TABLE, &[], "return=minimal", chunk)
                .map_err(|e| with_progress(e, written, events.len()))?;
            written += chunk.len();
            tracing::debug!(written, total = events.len(), "Inserted ledger batch");
        }
        Ok(())
    }
}

impl AggregateView for PostgrestStore {
    fn fetch_aggregate(&self, actor_id: &str) -> Result<Option<AggregateSnapshot>> {
        let rows: Vec<AggregateSnapshot> =
            self.fetch_all(AGGREGATE_TABLE, "total_dark_xp,current_level", "user_id.asc", actor_id)?;
        Ok(rows.into_iter().next())
    }
}

/// Offset of the next page, or `None` once a page comes back empty.
///
/// A short page is not the end: the server caps responses at its own
/// `max-rows`, which may be below the configured page size.
fn next_offset(offset: usize, fetched: usize) -> Option<usize> {
    if fetched == 0 {
        None
    } else {
        Some(offset + fetched)
    }
}

/// Note how many rows already landed when a batch write fails
fn with_progress(error: ReconcileError, written: usize, total: usize) -> ReconcileError {
    match error {
        ReconcileError::StoreWrite { target, message } if written > 0 => ReconcileError::StoreWrite {
            target,
            message: format!("{} ({} of {} rows were already written)", message, written, total),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StoreConfig {
        StoreConfig {
            url: Some("https://project.example.co/".to_string()),
            service_key: Some(" secret ".to_string()),
            ..StoreConfig::default()
        }
    }

    #[test]
    fn test_new_requires_valid_config() {
        assert!(PostgrestStore::new(&StoreConfig::default()).is_err());
    }

    #[test]
    fn test_table_urls() {
        let store = PostgrestStore::new(&config()).unwrap();
        assert_eq!(
            store.table_url(LEDGER_TABLE),
            "https://project.example.co/rest/v1/dark_xp_events"
        );
        assert_eq!(store.service_key, "secret");
    }

    #[test]
    fn test_short_page_keeps_paging() {
        // page_size 5000 against a server capped at 1000 rows, 2500 rows stored
        let mut offset = 0;
        let mut seen = 0;
        for fetched in [1000, 1000, 500, 0] {
            seen += fetched;
            match next_offset(offset, fetched) {
                Some(next) => offset = next,
                None => break,
            }
        }
        assert_eq!(seen, 2500);
        assert_eq!(offset, 2500);
        assert_eq!(next_offset(2500, 0), None);
    }

    #[test]
    fn test_with_progress_annotates_partial_writes() {
        let err = with_progress(ReconcileError::write(LEDGER_TABLE, "HTTP 500"), 500, 1200);
        assert_eq!(
            err.to_string(),
            "Failed to write dark_xp_events: HTTP 500 (500 of 1200 rows were already written)"
        );

        let untouched = with_progress(ReconcileError::write(LEDGER_TABLE, "HTTP 500"), 0, 10);
        assert_eq!(untouched.to_string(), "Failed to write dark_xp_events: HTTP 500");
    }

    #[test]
    fn test_upsert_payload_shape() {
        let row = SnapshotUpsert {
            user_id: "u1",
            skill_id: "s1",
            level: 10,
            prestige: 0,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["skill_id"], "s1");
        assert_eq!(json["level"], 10);
    }
}
