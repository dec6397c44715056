//! Background refresh of dashboard state.
//!
//! Two independent loops run for the lifetime of a signed-in session: one
//! refreshes users and reports together, the other refreshes siren alerts
//! and feeds them to the notifier. Each loop awaits its own fetch before the
//! next tick, so fetches of the same loop never overlap.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::DataSource;
use crate::error::AdminError;
use crate::notifier::{AlertNotifier, Observation};
use crate::state::{self, SharedState};

pub const FETCH_DATA_ERROR: &str = "Failed to fetch data";

#[derive(Debug, Clone)]
pub enum SessionEvent {
    DataRefreshed { users: usize, reports: usize },
    SirensObserved(Observation),
    Error(String),
}

pub type EventCallback = Arc<dyn Fn(SessionEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct PollIntervals {
    pub data: Duration,
    pub sirens: Duration,
}

/// Fetches users and reports concurrently and swaps them in together.
///
/// Returns `None` when `generation` is no longer current; the result is
/// dropped.
pub async fn refresh_data(
    source: &dyn DataSource,
    state: &SharedState,
    generation: u64,
) -> Result<Option<(usize, usize)>, AdminError> {
    let outcome = tokio::try_join!(source.fetch_users(), source.fetch_reports());

    let mut guard = state::lock(state);
    if !guard.is_current(generation) {
        debug!("dropping stale users/reports result");
        return Ok(None);
    }
    guard.loading = false;

    let (users, reports) = match outcome {
        Ok(pair) => pair,
        Err(err) => {
            guard.set_error(FETCH_DATA_ERROR);
            return Err(err);
        }
    };
    if !users.success || !reports.success {
        guard.set_error(FETCH_DATA_ERROR);
        let endpoint = if users.success { "/reports" } else { "/getusers" };
        return Err(AdminError::Rejected(endpoint.to_string()));
    }

    let counts = (users.users.len(), reports.reports.len());
    guard.replace_collections(users.users, reports.reports);
    Ok(Some(counts))
}

/// Fetches siren alerts, stores them and runs the notifier comparison.
///
/// Returns `None` when the result arrived after the session ended.
pub async fn refresh_sirens(
    source: &dyn DataSource,
    state: &SharedState,
    notifier: &AlertNotifier,
    generation: u64,
) -> Result<Option<Observation>, AdminError> {
    let envelope = source.fetch_sirens().await?;
    if !envelope.success {
        return Err(AdminError::Rejected("/getsirens".to_string()));
    }

    // Held through `observe` so `stop()` cannot land between the check and
    // the comparison.
    let mut guard = state::lock(state);
    if !guard.is_current(generation) {
        debug!("dropping stale siren result");
        return Ok(None);
    }
    let observation = notifier.observe(&envelope.sirens)?;
    guard.sirens = envelope.sirens;
    Ok(Some(observation))
}

pub struct PollingSession {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    state: SharedState,
}

impl PollingSession {
    pub fn start(
        source: Arc<dyn DataSource>,
        state: SharedState,
        notifier: Arc<AlertNotifier>,
        intervals: PollIntervals,
        on_event: Option<EventCallback>,
    ) -> Self {
        let generation = state::lock(&state).advance_generation();
        let cancel = CancellationToken::new();
        info!("polling session {generation} started");

        let data_task = tokio::spawn(data_loop(
            Arc::clone(&source),
            Arc::clone(&state),
            generation,
            intervals.data,
            cancel.clone(),
            on_event.clone(),
        ));
        let siren_task = tokio::spawn(siren_loop(
            source,
            Arc::clone(&state),
            notifier,
            generation,
            intervals.sirens,
            cancel.clone(),
            on_event,
        ));

        Self {
            cancel,
            handles: vec![data_task, siren_task],
            state,
        }
    }

    /// Cancels both loops and invalidates any fetch still in flight.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        state::lock(&self.state).advance_generation();
        for handle in self.handles.drain(..) {
            if let Err(err) = handle.await {
                warn!("polling task ended abnormally: {err}");
            }
        }
        info!("polling session stopped");
    }
}

fn emit(on_event: &Option<EventCallback>, event: SessionEvent) {
    if let Some(callback) = on_event {
        callback(event);
    }
}

async fn data_loop(
    source: Arc<dyn DataSource>,
    state: SharedState,
    generation: u64,
    period: Duration,
    cancel: CancellationToken,
    on_event: Option<EventCallback>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }

        let result = tokio::select! {
            result = refresh_data(source.as_ref(), &state, generation) => result,
            _ = cancel.cancelled() => break,
        };
        match result {
            Ok(Some((users, reports))) => {
                debug!("refreshed {users} users and {reports} reports");
                emit(&on_event, SessionEvent::DataRefreshed { users, reports });
            }
            Ok(None) => {}
            Err(err) => {
                if err.is_transient() {
                    warn!("users/reports refresh failed: {err}");
                } else {
                    error!("users/reports refresh failed: {err}");
                }
                emit(&on_event, SessionEvent::Error(FETCH_DATA_ERROR.to_string()));
            }
        }
    }
    debug!("data loop for session {generation} exited");
}

async fn siren_loop(
    source: Arc<dyn DataSource>,
    state: SharedState,
    notifier: Arc<AlertNotifier>,
    generation: u64,
    period: Duration,
    cancel: CancellationToken,
    on_event: Option<EventCallback>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }

        let result = tokio::select! {
            result = refresh_sirens(source.as_ref(), &state, &notifier, generation) => result,
            _ = cancel.cancelled() => break,
        };
        match result {
            Ok(Some(observation)) => emit(&on_event, SessionEvent::SirensObserved(observation)),
            Ok(None) => {}
            Err(err) if err.is_transient() => warn!("failed to fetch sirens: {err}"),
            Err(err) => error!("siren check failed: {err}"),
        }
    }
    debug!("siren loop for session {generation} exited");
}
