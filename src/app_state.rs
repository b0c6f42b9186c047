// Application state shared with the HTTP handlers

use std::sync::Arc;

use alloy_primitives::Address;

use crate::ingress::IngressService;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub ingress: IngressService,
    /// Account paying for invocations, reported by /health
    pub relayer_address: Address,
}

impl AppState {
    pub fn new(ingress: IngressService, relayer_address: Address) -> Self {
        Self {
            ingress,
            relayer_address,
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }
}
