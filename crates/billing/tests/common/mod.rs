//! Shared harness for session integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use billing::launcher::memory::RecordingLauncher;
use billing::service::{MemoryBinder, ServiceCall};
use billing::{BillingConfig, BillingSession, Result, SessionState};
use billing_testkit::BackendFixture;

/// Collects every result delivered to a listener.
pub struct Capture<T> {
    results: Arc<Mutex<Vec<Result<T>>>>,
}

impl<T: Send + 'static> Capture<T> {
    pub fn new() -> Self {
        Self {
            results: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn listener(&self) -> impl FnOnce(Result<T>) + Send + 'static {
        let sink = Arc::clone(&self.results);
        move |result| sink.lock().unwrap().push(result)
    }

    pub fn count(&self) -> usize {
        self.results.lock().unwrap().len()
    }

    /// The single delivered result.
    pub fn single(&self) -> Result<T> {
        let mut results = self.results.lock().unwrap();
        assert_eq!(results.len(), 1, "expected exactly one result");
        results.pop().unwrap()
    }
}

pub struct Harness {
    pub fixture: BackendFixture,
    pub launcher: Arc<RecordingLauncher>,
    pub session: BillingSession<MemoryBinder>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    pub fn with_config(adjust: impl FnOnce(BillingConfig) -> BillingConfig) -> Self {
        init_tracing();
        let fixture = BackendFixture::new();
        let launcher = RecordingLauncher::new();
        let config = adjust(BillingConfig::new(
            "com.example.app",
            fixture.public_key_base64(),
        ));
        let session =
            BillingSession::new(config, Arc::clone(&fixture.binder), Arc::clone(&launcher))
                .unwrap();
        Self {
            fixture,
            launcher,
            session,
        }
    }

    /// Open the session and wait until it is ready.
    pub async fn ready() -> Self {
        let mut harness = Self::new();
        harness.open().await;
        harness
    }

    pub async fn open(&mut self) {
        let opened = Capture::new();
        self.session.open(opened.listener());
        assert!(self.session.process_next().await);
        opened.single().unwrap();
        assert_eq!(self.session.state(), SessionState::Ready);
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.fixture.service.calls()
    }

    /// Developer payload sent with the most recent buy intent request.
    pub fn last_payload(&self) -> String {
        self.calls()
            .into_iter()
            .rev()
            .find_map(|call| match call {
                ServiceCall::GetBuyIntent {
                    developer_payload, ..
                } => Some(developer_payload),
                _ => None,
            })
            .expect("no buy intent requested")
    }
}

/// Route session logs to the test output. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn skus(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
