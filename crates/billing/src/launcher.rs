//! Hand-off to the platform purchase UI.
//!
//! After the backend issues a purchase intent the session passes its launch
//! handle to a [`PurchaseLauncher`]. The host shows the purchase UI and later
//! reports the result through [`crate::BillingSession::on_purchase_result`],
//! quoting the same [`CorrelationId`].

use std::fmt;
use std::sync::Arc;

use billing_core::CorrelationId;
use billing_service::LaunchHandle;

/// Presents the purchase UI for an issued purchase intent.
pub trait PurchaseLauncher: Send {
    /// Start the purchase UI. An error aborts the purchase attempt.
    fn launch(&self, handle: &LaunchHandle, correlation_id: CorrelationId) -> anyhow::Result<()>;
}

impl<L: PurchaseLauncher + Sync + ?Sized> PurchaseLauncher for Arc<L> {
    fn launch(&self, handle: &LaunchHandle, correlation_id: CorrelationId) -> anyhow::Result<()> {
        (**self).launch(handle, correlation_id)
    }
}

/// How the purchase UI ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// The UI completed and returned result data.
    Ok,
    /// The user backed out.
    Canceled,
    /// Any other platform result code.
    Other(i32),
}

impl PurchaseOutcome {
    /// Map a platform activity result code (`-1` ok, `0` canceled).
    pub fn from_result_code(code: i32) -> Self {
        match code {
            -1 => PurchaseOutcome::Ok,
            0 => PurchaseOutcome::Canceled,
            other => PurchaseOutcome::Other(other),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, PurchaseOutcome::Ok)
    }
}

impl fmt::Display for PurchaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurchaseOutcome::Ok => write!(f, "ok"),
            PurchaseOutcome::Canceled => write!(f, "canceled"),
            PurchaseOutcome::Other(code) => write!(f, "result code {}", code),
        }
    }
}

/// A launcher that records launches instead of showing UI.
pub mod memory {
    use super::*;
    use std::sync::Mutex;

    use anyhow::bail;

    /// Records every launch; can be told to refuse.
    #[derive(Default)]
    pub struct RecordingLauncher {
        launches: Mutex<Vec<(LaunchHandle, CorrelationId)>>,
        refusal: Mutex<Option<String>>,
    }

    impl RecordingLauncher {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Fail every subsequent launch with `reason`.
        pub fn refuse(&self, reason: &str) {
            *self.refusal.lock().unwrap_or_else(|p| p.into_inner()) = Some(reason.to_string());
        }

        pub fn launches(&self) -> Vec<(LaunchHandle, CorrelationId)> {
            self.launches.lock().unwrap_or_else(|p| p.into_inner()).clone()
        }

        /// Correlation id of the most recent launch.
        pub fn last_correlation(&self) -> Option<CorrelationId> {
            self.launches().last().map(|(_, id)| *id)
        }
    }

    impl PurchaseLauncher for RecordingLauncher {
        fn launch(&self, handle: &LaunchHandle, correlation_id: CorrelationId) -> anyhow::Result<()> {
            if let Some(reason) = self.refusal.lock().unwrap_or_else(|p| p.into_inner()).clone() {
                bail!("launch refused: {}", reason);
            }
            self.launches
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push((handle.clone(), correlation_id));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::RecordingLauncher;
    use super::*;

    #[test]
    fn test_outcome_from_result_code() {
        assert_eq!(PurchaseOutcome::from_result_code(-1), PurchaseOutcome::Ok);
        assert_eq!(PurchaseOutcome::from_result_code(0), PurchaseOutcome::Canceled);
        assert_eq!(PurchaseOutcome::from_result_code(7), PurchaseOutcome::Other(7));
        assert!(!PurchaseOutcome::Canceled.is_ok());
    }

    #[test]
    fn test_recording_launcher() {
        let launcher = RecordingLauncher::new();
        let handle = LaunchHandle("buy:sku1:1".into());
        launcher.launch(&handle, CorrelationId(1)).unwrap();
        assert_eq!(launcher.last_correlation(), Some(CorrelationId(1)));

        launcher.refuse("activity finishing");
        let err = launcher.launch(&handle, CorrelationId(2)).unwrap_err();
        assert!(err.to_string().contains("activity finishing"));
        assert_eq!(launcher.launches().len(), 1);
    }
}
