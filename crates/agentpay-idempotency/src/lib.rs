//! AgentPay Idempotency - at-most-once semantics for mutating endpoints
//!
//! Every mutating request and webhook is keyed on `(route, key)`. The first
//! caller to claim a key runs the handler and captures the response; every
//! later caller with the same body gets that response replayed byte for
//! byte, and a caller with a different body is refused.
//!
//! The claim is an `INSERT .. ON CONFLICT DO NOTHING` on the primary key, so
//! exactly one of any number of concurrent callers proceeds. An IN_FLIGHT
//! record older than the takeover window is treated as abandoned (its owner
//! died mid-handler) and taken over by compare-and-swap on `created_at`.

use agentpay_db::{Database, DbIdempotencyRecord};
use agentpay_types::{GatewayError, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

pub use agentpay_crypto::fingerprint;

/// How long an IN_FLIGHT record shields its key before it can be taken over
pub const IN_FLIGHT_WINDOW_SECS: i64 = 30;

/// Minimum retention of completed records; replay works at least this long
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// What the caller should do with this request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// This caller owns the key: run the handler, then `complete()`
    Proceed,
    /// The key already captured a response; return it verbatim
    Replay { status_code: u16, body: String },
}

/// Pure classification of an existing record against a new request
#[derive(Debug, Clone, PartialEq, Eq)]
enum Classification {
    Replay { status_code: u16, body: String },
    FingerprintMismatch,
    InFlightFresh,
    Abandoned { observed_created_at: DateTime<Utc> },
}

fn classify(record: &DbIdempotencyRecord, fingerprint: &str, now: DateTime<Utc>) -> Classification {
    if record.status == "COMPLETED" {
        if record.request_fingerprint == fingerprint {
            Classification::Replay {
                status_code: record.status_code.unwrap_or(500) as u16,
                body: record.response_body.clone().unwrap_or_default(),
            }
        } else {
            Classification::FingerprintMismatch
        }
    } else if now - record.created_at < Duration::seconds(IN_FLIGHT_WINDOW_SECS) {
        Classification::InFlightFresh
    } else {
        Classification::Abandoned {
            observed_created_at: record.created_at,
        }
    }
}

/// The idempotency store: all mutating endpoints and webhook routes resolve
/// through here before touching anything else.
#[derive(Clone)]
pub struct IdempotencyStore {
    db: Arc<Database>,
}

impl IdempotencyStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Resolve a request against its `(route, key)`.
    pub async fn begin(&self, route: &str, key: &str, fingerprint: &str) -> Result<Resolution> {
        let repo = self.db.idempotency_repo();
        let now = Utc::now();

        if repo.try_claim(route, key, fingerprint, now).await? {
            return Ok(Resolution::Proceed);
        }

        let Some(record) = repo.find(route, key).await? else {
            // The record vanished between claim and read (a purge raced us);
            // one more claim settles it.
            return if repo.try_claim(route, key, fingerprint, now).await? {
                Ok(Resolution::Proceed)
            } else {
                Err(GatewayError::InFlightConflict)
            };
        };

        match classify(&record, fingerprint, now) {
            Classification::Replay { status_code, body } => {
                debug!(route, key, "replaying captured idempotent response");
                Ok(Resolution::Replay { status_code, body })
            }
            Classification::FingerprintMismatch => Err(GatewayError::IdempotencyConflict),
            Classification::InFlightFresh => Err(GatewayError::InFlightConflict),
            Classification::Abandoned {
                observed_created_at,
            } => {
                if repo
                    .take_over(route, key, observed_created_at, fingerprint, now)
                    .await?
                {
                    warn!(route, key, "took over abandoned in-flight idempotency record");
                    Ok(Resolution::Proceed)
                } else {
                    Err(GatewayError::InFlightConflict)
                }
            }
        }
    }

    /// Capture the terminal response so later retries replay it
    pub async fn complete(
        &self,
        route: &str,
        key: &str,
        status_code: u16,
        body: &str,
    ) -> Result<()> {
        self.db
            .idempotency_repo()
            .complete(route, key, status_code as i32, body)
            .await?;
        Ok(())
    }

    /// Abandon a claim after a handler failure that should not be captured
    /// (the caller's retry re-enters the pipeline)
    pub async fn release(&self, route: &str, key: &str) -> Result<()> {
        self.db.idempotency_repo().release(route, key).await?;
        Ok(())
    }

    /// Purge records older than the retention window
    pub async fn purge_expired(&self, retention_hours: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::hours(retention_hours);
        let purged = self.db.idempotency_repo().purge_older_than(cutoff).await?;
        if purged > 0 {
            debug!(purged, "purged expired idempotency records");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        status: &str,
        fingerprint: &str,
        age_secs: i64,
        response: Option<(i32, &str)>,
    ) -> DbIdempotencyRecord {
        DbIdempotencyRecord {
            route: "POST:/purchase-intents".to_string(),
            key: "k1".to_string(),
            request_fingerprint: fingerprint.to_string(),
            status: status.to_string(),
            status_code: response.map(|(c, _)| c),
            response_body: response.map(|(_, b)| b.to_string()),
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_completed_same_fingerprint_replays() {
        let rec = record("COMPLETED", "fp1", 60, Some((201, r#"{"intent_id":"x"}"#)));
        assert_eq!(
            classify(&rec, "fp1", Utc::now()),
            Classification::Replay {
                status_code: 201,
                body: r#"{"intent_id":"x"}"#.to_string()
            }
        );
    }

    #[test]
    fn test_completed_other_fingerprint_conflicts() {
        let rec = record("COMPLETED", "fp1", 60, Some((201, "{}")));
        assert_eq!(
            classify(&rec, "fp2", Utc::now()),
            Classification::FingerprintMismatch
        );
    }

    #[test]
    fn test_fresh_in_flight_conflicts() {
        let rec = record("IN_FLIGHT", "fp1", 5, None);
        assert_eq!(classify(&rec, "fp1", Utc::now()), Classification::InFlightFresh);
    }

    #[test]
    fn test_stale_in_flight_is_abandoned() {
        let rec = record("IN_FLIGHT", "fp1", IN_FLIGHT_WINDOW_SECS + 1, None);
        assert!(matches!(
            classify(&rec, "fp2", Utc::now()),
            Classification::Abandoned { .. }
        ));
    }

    #[test]
    fn test_in_flight_window_boundary() {
        // Exactly at the window the record is no longer protected.
        let now = Utc::now();
        let rec = DbIdempotencyRecord {
            created_at: now - Duration::seconds(IN_FLIGHT_WINDOW_SECS),
            ..record("IN_FLIGHT", "fp1", 0, None)
        };
        assert!(matches!(
            classify(&rec, "fp1", now),
            Classification::Abandoned { .. }
        ));
    }

    #[test]
    fn test_fingerprint_helper_reexport() {
        let a = fingerprint(&serde_json::json!({"vendor": "v1", "amount": 199}));
        let b = fingerprint(&serde_json::json!({"amount": 199, "vendor": "v1"}));
        assert_eq!(a, b);
    }
}
