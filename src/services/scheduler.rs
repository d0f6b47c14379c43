use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use super::replenisher::Replenisher;
use crate::error::AppError;

/// Why a replenish pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    FeedRead,
    Consumed,
    Archived,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Startup => "startup",
            Trigger::FeedRead => "feed_read",
            Trigger::Consumed => "consumed",
            Trigger::Archived => "archived",
        };
        f.write_str(name)
    }
}

/// Fire-and-forget handle onto a single background replenish worker.
///
/// At most one pass runs and at most one more waits; triggers arriving while a
/// pass is already queued fold into it.
#[derive(Clone)]
pub struct ReplenishScheduler {
    tx: mpsc::Sender<Trigger>,
}

impl ReplenishScheduler {
    pub fn spawn(replenisher: Arc<Replenisher>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Trigger>(1);

        let worker = tokio::spawn(async move {
            while let Some(trigger) = rx.recv().await {
                match replenisher.run().await {
                    Ok(report) if report.attempted > 0 => {
                        tracing::info!(
                            %trigger,
                            inserted = report.inserted,
                            failed = report.failed,
                            "replenish pass complete"
                        );
                    }
                    Ok(_) => tracing::debug!(%trigger, "replenish pass had nothing to do"),
                    // Reported once at startup.
                    Err(AppError::NotConfigured(what)) => {
                        tracing::debug!(%trigger, missing = what, "replenish pass skipped")
                    }
                    Err(e) => tracing::error!(%trigger, error = %e, "replenish pass failed"),
                }
            }
            tracing::debug!("replenish worker stopped");
        });

        (Self { tx }, worker)
    }

    /// Requests a pass without waiting. Returns `false` when the request was folded
    /// into one already queued, or the worker is gone.
    pub fn trigger(&self, trigger: Trigger) -> bool {
        match self.tx.try_send(trigger) {
            Ok(()) => {
                tracing::debug!(%trigger, "replenish pass queued");
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!(%trigger, "replenish pass already pending");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(%trigger, "replenish worker has stopped; trigger dropped");
                false
            }
        }
    }
}
