//! Administrator actions that change server state and mirror the change
//! locally once the backend confirms it.

use log::{info, warn};

use crate::api::DataSource;
use crate::error::AdminError;
use crate::models::{AckEnvelope, ReportStatus};
use crate::state::{self, SharedState};

pub const DELETE_USER_ERROR: &str = "Failed to delete user";
pub const UPDATE_STATUS_ERROR: &str = "Failed to update status";
pub const DELETE_REPORT_ERROR: &str = "Failed to delete report";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Backend confirmed; local state changed.
    Applied,
    /// Backend confirmed, but the record was not in the local view.
    NotLoaded,
    /// Nothing to do; no request was sent.
    Skipped,
}

fn confirm(
    state: &SharedState,
    endpoint: &str,
    banner: &str,
    response: Result<AckEnvelope, AdminError>,
) -> Result<(), AdminError> {
    let failure = match response {
        Ok(ack) if ack.success => return Ok(()),
        Ok(ack) => {
            if let Some(msg) = ack.msg {
                warn!("{endpoint} said: {msg}");
            }
            AdminError::Rejected(endpoint.to_string())
        }
        Err(err) => err,
    };
    warn!("{endpoint} failed: {failure}");
    state::lock(state).set_error(banner);
    Err(failure)
}

pub async fn delete_user(
    source: &dyn DataSource,
    state: &SharedState,
    user_id: &str,
) -> Result<ActionOutcome, AdminError> {
    let response = source.delete_user(user_id).await;
    confirm(state, "/deleteuser", DELETE_USER_ERROR, response)?;

    info!("deleted user {user_id}");
    Ok(if state::lock(state).remove_user(user_id) {
        ActionOutcome::Applied
    } else {
        ActionOutcome::NotLoaded
    })
}

/// Marks a report resolved. Already resolved reports are left alone.
pub async fn resolve_report(
    source: &dyn DataSource,
    state: &SharedState,
    report_id: &str,
) -> Result<ActionOutcome, AdminError> {
    let already_resolved = state::lock(state)
        .report(report_id)
        .is_some_and(|report| report.status.is_resolved());
    if already_resolved {
        return Ok(ActionOutcome::Skipped);
    }

    let status = ReportStatus::Resolved;
    let response = source.change_status(report_id, &status).await;
    confirm(state, "/changestatus", UPDATE_STATUS_ERROR, response)?;

    info!("report {report_id} marked resolved");
    Ok(if state::lock(state).set_report_status(report_id, status) {
        ActionOutcome::Applied
    } else {
        ActionOutcome::NotLoaded
    })
}

pub async fn delete_report(
    source: &dyn DataSource,
    state: &SharedState,
    report_id: &str,
) -> Result<ActionOutcome, AdminError> {
    let response = source.delete_report(report_id).await;
    confirm(state, "/deletereport", DELETE_REPORT_ERROR, response)?;

    info!("deleted report {report_id}");
    Ok(if state::lock(state).remove_report(report_id) {
        ActionOutcome::Applied
    } else {
        ActionOutcome::NotLoaded
    })
}
