use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::{AlertRecord, ReportRecord, ReportStatus, UserRecord};

pub type SharedState = Arc<Mutex<DashboardState>>;

/// Everything the dashboard shows, owned in one place.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub users: Vec<UserRecord>,
    pub reports: Vec<ReportRecord>,
    pub sirens: Vec<AlertRecord>,
    pub loading: bool,
    pub last_error: Option<String>,
    generation: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            reports: Vec::new(),
            sirens: Vec::new(),
            loading: true,
            last_error: None,
            generation: 0,
        }
    }
}

impl DashboardState {
    pub fn shared() -> SharedState {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Token identifying the current polling session. Results tagged with
    /// an older generation must be dropped.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn advance_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Swaps both collections in a single step.
    pub fn replace_collections(&mut self, users: Vec<UserRecord>, reports: Vec<ReportRecord>) {
        self.users = users;
        self.reports = reports;
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn report(&self, report_id: &str) -> Option<&ReportRecord> {
        self.reports.iter().find(|report| report.id == report_id)
    }

    pub fn remove_user(&mut self, user_id: &str) -> bool {
        let before = self.users.len();
        self.users.retain(|user| user.id != user_id);
        self.users.len() != before
    }

    pub fn remove_report(&mut self, report_id: &str) -> bool {
        let before = self.reports.len();
        self.reports.retain(|report| report.id != report_id);
        self.reports.len() != before
    }

    pub fn set_report_status(&mut self, report_id: &str, status: ReportStatus) -> bool {
        match self.reports.iter_mut().find(|report| report.id == report_id) {
            Some(report) => {
                report.status = status;
                true
            }
            None => false,
        }
    }
}

/// Locks shared state, recovering the data if a holder panicked.
pub fn lock(state: &SharedState) -> MutexGuard<'_, DashboardState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
