//! Cancellation and deadlines for a run.

use crate::error::GenerationError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag a caller flips to stop a run
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Checked before every schema read and every file write
#[derive(Debug, Clone)]
pub struct RunControl {
    token: CancellationToken,
    deadline: Option<Instant>,
    tripped: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new(token: CancellationToken, timeout: Option<Duration>) -> Self {
        RunControl {
            token,
            deadline: timeout.map(|t| Instant::now() + t),
            tripped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Control that never stops
    pub fn unbounded() -> Self {
        Self::new(CancellationToken::new(), None)
    }

    /// `Err(Cancelled)` once the token is cancelled or the deadline passed
    pub fn check(&self) -> Result<(), GenerationError> {
        let reason = if self.token.is_cancelled() {
            "run cancelled by caller"
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            "run deadline exceeded"
        } else {
            return Ok(());
        };
        self.tripped.store(true, Ordering::SeqCst);
        Err(GenerationError::Cancelled {
            reason: reason.to_string(),
        })
    }

    /// Whether any check has failed so far
    pub fn was_stopped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Time left before the deadline, if there is one
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_trips_control() {
        let token = CancellationToken::new();
        let control = RunControl::new(token.clone(), None);
        assert!(control.check().is_ok());
        assert!(!control.was_stopped());

        token.cancel();
        let err = control.check().unwrap_err();
        assert_eq!(err.label(), "cancelled");
        assert!(control.was_stopped());
    }

    #[test]
    fn test_deadline() {
        let control = RunControl::new(CancellationToken::new(), Some(Duration::ZERO));
        assert!(control.check().is_err());
        assert_eq!(control.remaining(), Some(Duration::ZERO));
        assert!(RunControl::unbounded().remaining().is_none());
    }
}
