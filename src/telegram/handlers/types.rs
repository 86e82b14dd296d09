//! Handler types and dependencies

use std::sync::Arc;

use crate::storage::SubscriptionLedger;
use crate::telegram::premium::GodModeRegistry;
use crate::telegram::session::SessionRegistry;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub ledger: SubscriptionLedger,
    pub god_mode: Arc<GodModeRegistry>,
    pub sessions: Arc<SessionRegistry>,
}

impl HandlerDeps {
    pub fn new(ledger: SubscriptionLedger) -> Self {
        Self {
            ledger,
            god_mode: Arc::new(GodModeRegistry::new()),
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}
