// Tracing log adapter - Session observer that reports through tracing only

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{debug, info};

use crate::domain::model::{LogMessage, SessionState};
use crate::ports::SessionObserver;

/// Observer for non-interactive output (JSON logs, CI).
///
/// Log lines are already mirrored into tracing by the session, so this
/// only adds state changes and progress in steps of `step` percent.
pub struct TracingObserver {
    step: u8,
    last_reported: AtomicU8,
}

impl TracingObserver {
    pub fn new(step: u8) -> Self {
        Self {
            step: step.max(1),
            last_reported: AtomicU8::new(0),
        }
    }

    /// Whether `percent` crosses the next reporting step
    fn should_report(&self, percent: u8) -> bool {
        if percent == 0 {
            self.last_reported.store(0, Ordering::Relaxed);
            return false;
        }
        let last = self.last_reported.load(Ordering::Relaxed);
        if percent == 100 || percent >= last.saturating_add(self.step) {
            self.last_reported.store(percent, Ordering::Relaxed);
            return percent != last;
        }
        false
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(10)
    }
}

impl SessionObserver for TracingObserver {
    fn on_state(&self, state: SessionState) {
        info!(%state, "Session state changed");
    }

    fn on_progress(&self, percent: u8) {
        if self.should_report(percent) {
            info!(percent, "Progress");
        }
    }

    fn on_log(&self, message: &LogMessage) {
        debug!(id = message.id, kind = ?message.kind, "Session log entry");
    }
}
