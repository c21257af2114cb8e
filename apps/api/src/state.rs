use crate::auth::Authenticator;
use crate::config::Config;
use crate::events::EventBus;
use crate::nlp_client::NlpClient;
use crate::queue::QueueGateway;
use crate::realtime::RealtimeHub;
use crate::repos::Repositories;
use crate::storage::ObjectStore;

/// Shared application state injected into route handlers and workers.
/// All members are cheap to clone and share underlying connections.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub queue: QueueGateway,
    pub storage: ObjectStore,
    pub nlp: NlpClient,
    pub events: EventBus,
    pub realtime: RealtimeHub,
    pub auth: Authenticator,
    pub config: Config,
}
