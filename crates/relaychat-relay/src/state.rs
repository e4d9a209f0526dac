use std::sync::Arc;

use crate::data::DomainDataSource;
use crate::upstream::UpstreamClient;

/// Shared, immutable handler state. Nothing here is mutated per request.
#[derive(Clone)]
pub struct RelayState {
    pub upstream: Arc<UpstreamClient>,
    pub data: Arc<dyn DomainDataSource>,
}

impl RelayState {
    pub fn new(upstream: UpstreamClient, data: Arc<dyn DomainDataSource>) -> Self {
        Self {
            upstream: Arc::new(upstream),
            data,
        }
    }
}
