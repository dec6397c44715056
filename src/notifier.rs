use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{error, info, warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::AdminError;
use crate::models::AlertRecord;
use crate::siren::SirenDevice;
use crate::storage::{LocalStore, SIREN_ALERTS};

/// Outcome of comparing one fetched alert batch against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub previous: usize,
    pub current: usize,
    pub triggered: bool,
}

pub struct AlertNotifier {
    store: Arc<LocalStore>,
    siren: Arc<dyn SirenDevice>,
    timeout: Duration,
    quiet_cold_start: bool,
    auto_stop: Mutex<Option<CancellationToken>>,
}

impl AlertNotifier {
    pub fn new(store: Arc<LocalStore>, siren: Arc<dyn SirenDevice>, timeout: Duration) -> Self {
        Self {
            store,
            siren,
            timeout,
            quiet_cold_start: false,
            auto_stop: Mutex::new(None),
        }
    }

    /// With no stored baseline, treat the first batch as already seen.
    pub fn with_quiet_cold_start(mut self, quiet: bool) -> Self {
        self.quiet_cold_start = quiet;
        self
    }

    /// Compares `alerts` with the stored batch, stores `alerts` as the new
    /// baseline and sounds the siren when the batch grew.
    ///
    /// Must be called from within a tokio runtime: the auto-stop timer is a
    /// spawned task.
    pub fn observe(&self, alerts: &[AlertRecord]) -> Result<Observation, AdminError> {
        let stored = match self.store.get::<Vec<Value>>(SIREN_ALERTS) {
            Ok(stored) => stored,
            Err(err) => {
                warn!("stored siren alerts unreadable, using empty baseline: {err}");
                Some(Vec::new())
            }
        };

        let current = alerts.len();
        let previous = match stored {
            Some(batch) => batch.len(),
            None if self.quiet_cold_start => current,
            None => 0,
        };
        let triggered = current > previous;

        let persisted = self.store.set(SIREN_ALERTS, alerts);

        if triggered {
            info!("siren alerts increased from {previous} to {current}");
            self.trigger();
        }

        persisted?;
        Ok(Observation {
            previous,
            current,
            triggered,
        })
    }

    /// Manual silence: stops playback now and cancels the pending auto-stop.
    pub fn silence(&self) {
        if let Some(token) = self.slot().take() {
            token.cancel();
        }
        if self.siren.is_sounding() {
            self.siren.stop();
            info!("siren silenced by operator");
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.siren.is_sounding()
    }

    fn trigger(&self) {
        if let Err(err) = self.siren.start_loop() {
            error!("siren playback failed: {err}");
            return;
        }
        self.arm_auto_stop();
    }

    fn arm_auto_stop(&self) {
        let token = CancellationToken::new();
        if let Some(previous) = self.slot().replace(token.clone()) {
            previous.cancel();
        }

        let siren = Arc::clone(&self.siren);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    if siren.is_sounding() {
                        siren.stop();
                        info!("siren stopped after {}s", timeout.as_secs());
                    }
                }
                _ = token.cancelled() => {}
            }
        });
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.auto_stop
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{alert, alerts, RecordingSiren};

    fn notifier(siren: &Arc<RecordingSiren>) -> (AlertNotifier, Arc<LocalStore>) {
        let store = Arc::new(LocalStore::in_memory());
        let device: Arc<dyn SirenDevice> = siren.clone();
        let notifier = AlertNotifier::new(Arc::clone(&store), device, Duration::from_secs(10));
        (notifier, store)
    }

    #[tokio::test(start_paused = true)]
    async fn growth_from_zero_to_three_triggers_once() {
        let siren = Arc::new(RecordingSiren::default());
        let (notifier, _) = notifier(&siren);

        notifier.observe(&[]).unwrap();
        let observation = notifier.observe(&alerts(3)).unwrap();

        assert_eq!(
            observation,
            Observation {
                previous: 0,
                current: 3,
                triggered: true
            }
        );
        assert_eq!(siren.starts(), 1);

        let repeat = notifier.observe(&alerts(3)).unwrap();
        assert!(!repeat.triggered);
        assert_eq!(siren.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shrinking_batch_does_not_trigger() {
        let siren = Arc::new(RecordingSiren::default());
        let (notifier, store) = notifier(&siren);
        store.set(SIREN_ALERTS, &alerts(3)).unwrap();

        let observation = notifier.observe(&alerts(2)).unwrap();
        assert!(!observation.triggered);
        assert_eq!(observation.previous, 3);
        assert_eq!(siren.starts(), 0);

        let stored: Vec<AlertRecord> = store.get(SIREN_ALERTS).unwrap().unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cold_start_sounds_by_default() {
        let siren = Arc::new(RecordingSiren::default());
        let (notifier, _) = notifier(&siren);

        assert!(notifier.observe(&alerts(2)).unwrap().triggered);
        assert_eq!(siren.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_cold_start_uses_current_as_baseline() {
        let siren = Arc::new(RecordingSiren::default());
        let (notifier, _) = notifier(&siren);
        let notifier = notifier.with_quiet_cold_start(true);

        assert!(!notifier.observe(&alerts(2)).unwrap().triggered);
        assert!(notifier.observe(&alerts(3)).unwrap().triggered);
        assert_eq!(siren.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn siren_stops_by_itself_after_timeout() {
        let siren = Arc::new(RecordingSiren::default());
        let (notifier, _) = notifier(&siren);

        notifier.observe(&[alert("s1", 1)]).unwrap();
        assert!(notifier.is_sounding());

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(notifier.is_sounding());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!notifier.is_sounding());
        assert_eq!(siren.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_silence_wins_over_auto_stop() {
        let siren = Arc::new(RecordingSiren::default());
        let (notifier, _) = notifier(&siren);

        notifier.observe(&[alert("s1", 1)]).unwrap();
        notifier.silence();
        assert!(!notifier.is_sounding());
        assert_eq!(siren.stops(), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(siren.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retrigger_while_sounding_extends_playback() {
        let siren = Arc::new(RecordingSiren::default());
        let (notifier, _) = notifier(&siren);

        notifier.observe(&alerts(1)).unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        notifier.observe(&alerts(2)).unwrap();
        assert_eq!(siren.starts(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(notifier.is_sounding());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!notifier.is_sounding());
    }
}
