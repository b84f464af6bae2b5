use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::services::{
    cache::{FsImageCache, ImageCache},
    loader::ResultLoader,
    poller::{PollPolicy, StatusPoller},
    submitter::JobSubmitter,
    transport::{Backend, HttpBackend, TransportError},
};

/// Explicitly constructed services shared by every job.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub submitter: JobSubmitter,
    pub poller: StatusPoller,
    pub loader: ResultLoader,
    pub cache: Option<Arc<dyn ImageCache>>,
    pub waiting_message_period: Duration,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, policy: PollPolicy) -> Self {
        Self {
            submitter: JobSubmitter::new(backend.clone()),
            poller: StatusPoller::new(backend.clone(), policy),
            loader: ResultLoader::new(backend.clone()),
            backend,
            cache: None,
            waiting_message_period: Duration::from_secs(3),
        }
    }

    /// Build the production stack: an HTTP backend plus the optional on-disk cache.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let backend = HttpBackend::new(&config.backend_url, config.request_timeout())?;
        let mut state = Self::new(Arc::new(backend), PollPolicy::from_config(config))
            .with_waiting_message_period(config.waiting_message_period());

        if let Some(dir) = &config.cache_dir {
            state = state.with_cache(Arc::new(FsImageCache::new(dir)));
        }

        Ok(state)
    }

    pub fn with_cache(mut self, cache: Arc<dyn ImageCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// `Duration::ZERO` turns the waiting-message rotation off.
    pub fn with_waiting_message_period(mut self, period: Duration) -> Self {
        self.waiting_message_period = period;
        self
    }
}
