//! Recording service mock.

use async_trait::async_trait;
use common::types::SessionId;
use session_service::recording::{RecordingError, RecordingService};
use std::sync::Mutex;

/// A notification the recorder received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingCall {
    Start { session_id: SessionId, channel: String },
    Stop { session_id: SessionId, channel: String },
}

/// Records every notification; optionally fails them.
#[derive(Debug, Default)]
pub struct MockRecorder {
    calls: Mutex<Vec<RecordingCall>>,
    failure: Mutex<Option<RecordingError>>,
}

impl MockRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every notification from now on. Calls are still logged.
    pub fn fail_with(&self, error: RecordingError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// All notifications so far, in order.
    pub fn calls(&self) -> Vec<RecordingCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: RecordingCall) -> Result<(), RecordingError> {
        self.calls.lock().unwrap().push(call);
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordingService for MockRecorder {
    async fn start(&self, session_id: &SessionId, channel: &str) -> Result<(), RecordingError> {
        self.record(RecordingCall::Start {
            session_id: session_id.clone(),
            channel: channel.to_string(),
        })
    }

    async fn stop(&self, session_id: &SessionId, channel: &str) -> Result<(), RecordingError> {
        self.record(RecordingCall::Stop {
            session_id: session_id.clone(),
            channel: channel.to_string(),
        })
    }
}
