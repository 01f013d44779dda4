//! Usage: Externally observable "authorized" indicator (the toolbar icon state).

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorState {
    Unknown,
    Valid,
    Invalid,
}

#[derive(Debug)]
pub struct AuthIndicator {
    tx: watch::Sender<IndicatorState>,
}

impl Default for AuthIndicator {
    fn default() -> Self {
        let (tx, _) = watch::channel(IndicatorState::Unknown);
        Self { tx }
    }
}

impl AuthIndicator {
    pub fn set(&self, next: IndicatorState) {
        let changed = self.tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            tracing::info!(state = ?next, "authorization indicator changed");
        }
    }

    pub fn current(&self) -> IndicatorState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<IndicatorState> {
        self.tx.subscribe()
    }
}
