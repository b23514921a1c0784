use std::sync::Arc;
use std::time::Duration;

use crate::{backend::BackendApi, channel::PushChannel, in_flight::InFlightRegistry};

/// Tunables shared by every session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Silence after which a peer is no longer shown as typing.
    pub typing_timeout: Duration,
    /// Messages requested per history page.
    pub history_page_size: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            typing_timeout: Duration::from_millis(1800),
            history_page_size: 50,
        }
    }
}

/// Collaborators handed to every synchronizer and session.
#[derive(Clone)]
pub struct SyncContext {
    pub backend: Arc<dyn BackendApi>,
    pub channel: Arc<dyn PushChannel>,
    pub in_flight: Arc<InFlightRegistry>,
    pub settings: SessionSettings,
}

impl SyncContext {
    pub fn new(backend: Arc<dyn BackendApi>, channel: Arc<dyn PushChannel>) -> Self {
        Self {
            backend,
            channel,
            in_flight: Arc::new(InFlightRegistry::new()),
            settings: SessionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }
}
