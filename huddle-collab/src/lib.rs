mod attachments;
mod db;
mod messages;
mod rooms;

use std::{path::PathBuf, sync::Arc};

use dashmap::DashMap;
use huddle_core::{Broadcaster, Config};

pub use attachments::*;
pub use db::*;
pub use messages::*;
pub use rooms::*;

/// The huddle collab system, facilitating rooms, their members, live sessions and messages.
pub struct Collab {
    context: CollabContext,

    pub rooms: RoomRegistry,
    pub membership: MembershipCoordinator,
    pub messages: MessagePipeline,
    pub attachments: Attachments,
}

/// A type passed to the components of the collab system, to access the store and the live sessions.
#[derive(Clone)]
pub struct CollabContext {
    pub config: Config,
    pub database: ArcedDatabase,
    pub broadcaster: Arc<Broadcaster>,

    /// The sessions that are currently attached to a room
    pub sessions: Arc<DashMap<SessionId, LiveSession>>,
}

impl Collab {
    pub fn new(
        config: Config,
        database: impl Database + 'static,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        let context = CollabContext {
            broadcaster: Arc::new(Broadcaster::new(&config)),
            database: Arc::new(database),
            sessions: Default::default(),
            config,
        };

        let rooms = RoomRegistry::new(&context);
        let membership = MembershipCoordinator::new(&context, &rooms);

        Self {
            messages: MessagePipeline::new(&context),
            attachments: Attachments::new(&context, upload_dir),
            rooms,
            membership,
            context,
        }
    }

    /// Opens a session for a live connection of a user. It is unattached until routed to a room.
    pub fn open_session(&self, user_id: PrimaryKey) -> ConnectionSession {
        ConnectionSession::new(&self.membership, user_id)
    }

    pub fn broadcaster(&self) -> Arc<Broadcaster> {
        self.context.broadcaster.clone()
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }
}

#[cfg(test)]
pub(crate) async fn test_collab() -> Collab {
    use rand::random;

    let upload_dir = std::env::temp_dir().join(format!("huddle-test-{:x}", random::<u64>()));

    Collab::new(Config::default(), memory_database().await, upload_dir)
}
