//! services/portal/src/render.rs
//!
//! Plain-text rendering of the dashboard for the terminal.

use portal_core::domain::{Document, VoucherRecord, VoucherStatus};
use portal_core::voucher::{progress_label, tracker_fill_percent, tracker_steps, StepState};
use std::fmt::Write;

use crate::app::DashboardSnapshot;

const BAR_WIDTH: usize = 20;

pub fn render_dashboard(snapshot: &DashboardSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Welcome back, {}", snapshot.user.name);
    let _ = writeln!(
        out,
        "Documents: {}   Active course: {}   Progress: {}",
        snapshot.documents.len(),
        snapshot.active_courses,
        progress_label(snapshot.voucher.as_ref().map(|_| snapshot.status)),
    );
    out.push('\n');
    out.push_str("Course Documents\n");
    out.push_str(&render_documents(&snapshot.documents));
    out.push('\n');
    out.push_str("Voucher\n");
    out.push_str(&render_voucher(snapshot.voucher.as_ref(), snapshot.status));
    out
}

pub fn render_documents(documents: &[Document]) -> String {
    if documents.is_empty() {
        return "  No Documents Yet\n  Course documents will appear here once uploaded by your instructor.\n"
            .to_string();
    }
    let mut out = String::new();
    for doc in documents {
        let _ = writeln!(
            out,
            "  {}  ({})  {}",
            doc.title,
            doc.upload_date_label(),
            doc.filename
        );
    }
    out
}

pub fn render_voucher(record: Option<&VoucherRecord>, status: VoucherStatus) -> String {
    let Some(record) = record else {
        return "  No voucher submitted.\n".to_string();
    };
    let mut out = String::new();
    let _ = writeln!(out, "  Status: {}", status);
    if let Some(code) = &record.code {
        let _ = writeln!(out, "  Code: {}", code);
    }
    if let Some(at) = &record.submitted_at {
        let _ = writeln!(out, "  Submitted: {}", at);
    }
    out.push_str(&render_tracker(status));
    out
}

/// One line of steps and one progress bar.
pub fn render_tracker(status: VoucherStatus) -> String {
    let steps: Vec<String> = tracker_steps(status)
        .iter()
        .enumerate()
        .map(|(i, step)| match step.state {
            StepState::Complete => format!("[✓] {}", step.stage),
            StepState::Active => format!("[{}] {} <", i + 1, step.stage),
            StepState::Inactive => format!("[{}] {}", i + 1, step.stage),
        })
        .collect();
    let filled = BAR_WIDTH * usize::from(tracker_fill_percent(status)) / 100;
    format!(
        "  {}\n  [{}{}]\n",
        steps.join(" -- "),
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::UserProfile;

    #[test]
    fn tracker_shows_completed_and_active_steps() {
        let out = render_tracker(VoucherStatus::Pending);
        assert!(out.contains("[✓] Submitted"));
        assert!(out.contains("[2] Pending <"));
        assert!(out.contains("[3] Verified"));
        assert!(out.contains(&format!("[{}{}]", "#".repeat(11), "-".repeat(9))));
    }

    #[test]
    fn empty_dashboard_reads_like_a_fresh_account() {
        let snapshot = DashboardSnapshot {
            user: UserProfile::new("Ada", "ada@example.com"),
            documents: Vec::new(),
            voucher: None,
            status: VoucherStatus::NotSubmitted,
            active_courses: 0,
        };
        let out = render_dashboard(&snapshot);
        assert!(out.contains("Welcome back, Ada"));
        assert!(out.contains("Documents: 0   Active course: 0   Progress: 50%"));
        assert!(out.contains("No Documents Yet"));
        assert!(out.contains("No voucher submitted."));
    }
}
