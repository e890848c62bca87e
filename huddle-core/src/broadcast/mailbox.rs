use crate::{EventReceiver, Id, RoomEvent};

pub type MailboxId = Id<Mailbox>;

/// The receiving end of a live session's bounded delivery queue.
/// Created by [super::Broadcaster::register], it yields every event published to the room
/// the session is subscribed to.
#[derive(Debug)]
pub struct Mailbox {
    pub id: MailboxId,
    receiver: EventReceiver,
}

impl Mailbox {
    pub(super) fn new(id: MailboxId, receiver: EventReceiver) -> Self {
        Self { id, receiver }
    }

    /// Waits for the next event. Returns [None] once the mailbox is unregistered.
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        self.receiver.recv().await
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<RoomEvent> {
        self.receiver.try_recv().ok()
    }

    /// Takes every queued event.
    pub fn drain(&mut self) -> Vec<RoomEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
