use std::sync::Mutex;

use anoncreds_issuance::{
    errors::error::IssuanceResult,
    events::{BaseEventNotifier, IssuanceEvent},
};
use async_trait::async_trait;

/// Notifier double collecting every emitted event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<IssuanceEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<IssuanceEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseEventNotifier for RecordingNotifier {
    async fn notify(&self, event: IssuanceEvent) -> IssuanceResult<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
