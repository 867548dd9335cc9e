//! crates/portal_core/src/domain.rs
//!
//! Defines the pure, core data structures for the portal client.
//! Wire formats live in the adapters; these types only describe what the
//! client knows about a learner, their documents and their voucher.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity shown on the dashboard and used for voucher lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl UserProfile {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// An authenticated login: the bearer token plus the profile it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

/// Email / password pair sent to the login endpoint.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// What the login endpoint handed back, before any fallbacks are applied.
#[derive(Debug, Clone, Default)]
pub struct LoginGrant {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
}

// Represents the two top-level states of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Authenticated,
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(self) -> bool {
        matches!(self, AuthState::Authenticated)
    }
}

/// An instructor-uploaded course document. Read-only on the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub upload_date: Option<DateTime<Utc>>,
}

impl Document {
    /// Date label used in listings.
    pub fn upload_date_label(&self) -> String {
        match self.upload_date {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => "No date".to_string(),
        }
    }
}

/// The raw answer of the voucher status endpoint.
#[derive(Debug, Clone, Default)]
pub struct VoucherStatusReport {
    pub status: Option<String>,
    pub email: Option<String>,
    pub code: Option<String>,
    pub submitted_at: Option<String>,
    pub verified: bool,
}

/// A voucher the backend knows about for the current learner.
///
/// `submitted_at` is kept in its wire form; the displayed status is derived
/// from it on every read, so an unparseable value simply reads as
/// "Not submitted".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoucherRecord {
    pub email: String,
    pub code: Option<String>,
    pub submitted_at: Option<String>,
    pub verified: bool,
}

/// The display status of a voucher. Ordered by lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VoucherStatus {
    NotSubmitted,
    Submitted,
    Pending,
    Verified,
}

impl VoucherStatus {
    pub fn label(self) -> &'static str {
        match self {
            VoucherStatus::NotSubmitted => "Not submitted",
            VoucherStatus::Submitted => "Submitted",
            VoucherStatus::Pending => "Pending",
            VoucherStatus::Verified => "Verified",
        }
    }
}

impl fmt::Display for VoucherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of handing a voucher code to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend accepted the code; the record was re-fetched.
    Accepted,
    /// The backend did not verify the code; nothing is held locally.
    NotVerified,
}

/// Date-time layouts accepted without an offset; all are read as UTC.
const NAIVE_LAYOUTS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a wire timestamp. RFC 3339 first, then a bare date-time or a
/// date alone (midnight), read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}
