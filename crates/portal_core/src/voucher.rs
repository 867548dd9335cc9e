//! crates/portal_core/src/voucher.rs
//!
//! The voucher lifecycle: status derivation, the tracker shown on the
//! dashboard, and the submit / refresh operations against the backend.
//!
//! The displayed status is never stored. It is recomputed from the record's
//! submission time and the current time on every read.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{
    parse_timestamp, SubmitOutcome, VoucherRecord, VoucherStatus, VoucherStatusReport,
};
use crate::ports::{PortError, PortResult, PortalApi};

/// Seconds after submission at which a voucher reads as "Pending".
pub const PENDING_AFTER_SECS: i64 = 60;
/// Seconds after submission at which a voucher reads as "Verified".
pub const VERIFIED_AFTER_SECS: i64 = 120;

/// Shown when the learner submits an empty code.
pub const EMPTY_CODE_MESSAGE: &str = "Please enter voucher code";

/// The backend's marker for "no voucher on file".
const NOT_SUBMITTED: &str = "Not submitted";

//=========================================================================================
// Status Derivation
//=========================================================================================

/// Maps elapsed time since submission to a lifecycle stage.
///
/// Negative elapsed time (a submission stamped in the future) reads as
/// "Submitted".
pub fn status_for_elapsed(elapsed: TimeDelta) -> VoucherStatus {
    if elapsed >= TimeDelta::seconds(VERIFIED_AFTER_SECS) {
        VoucherStatus::Verified
    } else if elapsed >= TimeDelta::seconds(PENDING_AFTER_SECS) {
        VoucherStatus::Pending
    } else {
        VoucherStatus::Submitted
    }
}

/// Derives the display status of an optional record at `now`.
pub fn derive_status(record: Option<&VoucherRecord>, now: DateTime<Utc>) -> VoucherStatus {
    record
        .and_then(|record| record.submitted_at.as_deref())
        .and_then(parse_timestamp)
        .map_or(VoucherStatus::NotSubmitted, |submitted| {
            status_for_elapsed(now - submitted)
        })
}

impl VoucherRecord {
    /// Adopts a status report, or `None` when the backend has nothing on file.
    pub fn from_report(report: VoucherStatusReport, email: &str) -> Option<Self> {
        let status = report.status.as_deref().map(str::trim).unwrap_or_default();
        if status.is_empty() || status == NOT_SUBMITTED {
            return None;
        }
        Some(Self {
            email: report.email.unwrap_or_else(|| email.to_string()),
            code: report.code,
            submitted_at: report.submitted_at,
            verified: report.verified,
        })
    }
}

//=========================================================================================
// Tracker Presentation
//=========================================================================================

/// The three visible stages, in order.
pub const TRACKER_STAGES: [VoucherStatus; 3] = [
    VoucherStatus::Submitted,
    VoucherStatus::Pending,
    VoucherStatus::Verified,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Complete,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerStep {
    pub stage: VoucherStatus,
    pub state: StepState,
}

/// Position of `status` on the tracker. Anything off the tracker sits at the first stage.
pub fn tracker_index(status: VoucherStatus) -> usize {
    TRACKER_STAGES
        .iter()
        .position(|stage| *stage == status)
        .unwrap_or(0)
}

pub fn tracker_steps(status: VoucherStatus) -> Vec<TrackerStep> {
    let current = tracker_index(status);
    TRACKER_STAGES
        .iter()
        .enumerate()
        .map(|(i, stage)| TrackerStep {
            stage: *stage,
            state: match i.cmp(&current) {
                std::cmp::Ordering::Less => StepState::Complete,
                std::cmp::Ordering::Equal => StepState::Active,
                std::cmp::Ordering::Greater => StepState::Inactive,
            },
        })
        .collect()
}

/// Width of the tracker bar, in percent.
pub fn tracker_fill_percent(status: VoucherStatus) -> u8 {
    match tracker_index(status) {
        0 => 10,
        1 => 55,
        _ => 100,
    }
}

/// Overall course progress shown in the dashboard stats.
pub fn progress_label(status: Option<VoucherStatus>) -> &'static str {
    if status == Some(VoucherStatus::Verified) {
        "100%"
    } else {
        "50%"
    }
}

//=========================================================================================
// Voucher Tracker
//=========================================================================================

/// Holds the learner's voucher record and keeps it in sync with the backend.
///
/// Refreshing is always explicit: nothing here polls on its own. The most
/// recent response wins.
pub struct VoucherTracker {
    api: Arc<dyn PortalApi>,
    record: Option<VoucherRecord>,
}

impl VoucherTracker {
    pub fn new(api: Arc<dyn PortalApi>) -> Self {
        Self { api, record: None }
    }

    pub fn record(&self) -> Option<&VoucherRecord> {
        self.record.as_ref()
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> VoucherStatus {
        derive_status(self.record.as_ref(), now)
    }

    pub fn status(&self) -> VoucherStatus {
        self.status_at(Utc::now())
    }

    /// Number of unlocked courses: one per held voucher.
    pub fn active_courses(&self) -> usize {
        usize::from(self.record.is_some())
    }

    pub fn clear(&mut self) {
        self.record = None;
    }

    /// Submits a code for `email`.
    ///
    /// A code the backend does not verify leaves no local record and is not
    /// an error. A verified code triggers a status refresh.
    pub async fn submit(&mut self, email: &str, code: &str) -> PortResult<SubmitOutcome> {
        let code = code.trim();
        if code.is_empty() {
            return Err(PortError::Validation(EMPTY_CODE_MESSAGE.to_string()));
        }

        let verified = self.api.submit_voucher(email, code).await?;
        if !verified {
            debug!("Voucher code was not verified; nothing stored");
            self.record = None;
            return Ok(SubmitOutcome::NotVerified);
        }

        info!(%email, "Voucher accepted");
        self.refresh_status(email).await?;
        Ok(SubmitOutcome::Accepted)
    }

    /// Re-fetches the record for `email`.
    ///
    /// An empty or "Not submitted" answer clears the local record, as does a
    /// failed request; the failure is still returned.
    pub async fn refresh_status(&mut self, email: &str) -> PortResult<Option<&VoucherRecord>> {
        match self.api.voucher_status(email).await {
            Ok(report) => {
                self.record = VoucherRecord::from_report(report, email);
                Ok(self.record.as_ref())
            }
            Err(e) => {
                warn!("Voucher status refresh failed: {}", e);
                self.record = None;
                Err(e)
            }
        }
    }
}
