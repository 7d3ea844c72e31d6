use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::store::Store;
use crate::utils::email_index::EmailIndex;
use crate::utils::user_locks::UserLocks;

/// Everything a handler needs, built once at startup and shared as
/// `web::Data<AppState>`.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub emails: EmailIndex,
    pub leave_locks: UserLocks,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
            emails: EmailIndex::new(),
            leave_locks: UserLocks::new(),
        }
    }
}
