//! Repositories: every read filters by the caller's user id, every status
//! write emits its domain event after the row is committed.

pub mod jobs;
pub mod matches;
pub mod resumes;
pub mod users;

use sqlx::PgPool;

use crate::events::EventBus;

pub use jobs::JobRepo;
pub use matches::MatchRepo;
pub use resumes::ResumeRepo;
pub use users::UserRepo;

/// The full repository set, wired once at boot and shared via `AppState`.
#[derive(Clone)]
pub struct Repositories {
    pool: PgPool,
    pub users: UserRepo,
    pub resumes: ResumeRepo,
    pub jobs: JobRepo,
    pub matches: MatchRepo,
}

impl Repositories {
    pub fn new(pool: PgPool, events: EventBus) -> Self {
        Self {
            users: UserRepo::new(pool.clone()),
            resumes: ResumeRepo::new(pool.clone(), events.clone()),
            jobs: JobRepo::new(pool.clone(), events.clone()),
            matches: MatchRepo::new(pool.clone(), events),
            pool,
        }
    }

    /// Raw pool access for read paths that join across tables (e.g. the
    /// realtime bridge joining rows with their owner's external subject).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
