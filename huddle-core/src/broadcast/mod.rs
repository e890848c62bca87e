mod mailbox;
pub use mailbox::*;

use std::{collections::HashSet, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};
use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{Config, EventSender, PrimaryKey, RoomEvent};

type Subscribers = Arc<Mutex<HashSet<MailboxId>>>;

/// Maps rooms to the live sessions subscribed to them, and delivers events to those sessions.
///
/// Every room has its own lock around its subscriber set, so traffic in one room never waits on
/// another. Delivery is a non-blocking push into each session's bounded [Mailbox].
pub struct Broadcaster {
    config: Config,
    /// Delivery queues of every registered session
    mailboxes: DashMap<MailboxId, EventSender>,
    /// Subscriber sets, per room
    rooms: DashMap<PrimaryKey, Subscribers>,
    /// The room each subscribed session currently belongs to
    attachments: DashMap<MailboxId, PrimaryKey>,
}

impl Broadcaster {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            mailboxes: Default::default(),
            rooms: Default::default(),
            attachments: Default::default(),
        }
    }

    /// Creates a delivery queue for a new session.
    pub fn register(&self) -> Mailbox {
        let (sender, receiver) = mpsc::channel(self.config.mailbox_capacity);
        let id = MailboxId::new();

        self.mailboxes.insert(id, sender);
        debug!("Registered mailbox {}", id);

        Mailbox::new(id, receiver)
    }

    /// Removes a session entirely. Its [Mailbox] yields [None] afterwards.
    pub fn unregister(&self, id: MailboxId) {
        if let Some((_, room_id)) = self.attachments.remove(&id) {
            self.subscribers_of(room_id).lock().remove(&id);
        }

        if self.mailboxes.remove(&id).is_some() {
            debug!("Unregistered mailbox {}", id);
        }
    }

    /// Subscribes a session to a room, moving it out of any room it was subscribed to before.
    /// Returns false if it already was subscribed to this room.
    pub fn subscribe(&self, room_id: PrimaryKey, id: MailboxId) -> bool {
        // The attachment entry stays locked until the subscriber sets agree with it
        match self.attachments.entry(id) {
            Entry::Occupied(mut entry) => {
                let previous = entry.insert(room_id);

                if previous != room_id {
                    self.subscribers_of(previous).lock().remove(&id);
                }

                self.subscribers_of(room_id).lock().insert(id)
            }
            Entry::Vacant(entry) => {
                let _attached = entry.insert(room_id);
                self.subscribers_of(room_id).lock().insert(id)
            }
        }
    }

    /// Unsubscribes a session from a room. Returns false if it wasn't subscribed to it.
    pub fn unsubscribe(&self, room_id: PrimaryKey, id: MailboxId) -> bool {
        // Held while the subscriber set changes, so a concurrent subscribe can't interleave
        let Entry::Occupied(entry) = self.attachments.entry(id) else {
            return false;
        };

        if *entry.get() != room_id {
            return false;
        }

        let removed = self.subscribers_of(room_id).lock().remove(&id);
        entry.remove();

        removed
    }

    /// Delivers an event to every session subscribed to the room, returning how many accepted it.
    /// A full or closed mailbox is skipped.
    pub fn publish(&self, room_id: PrimaryKey, event: RoomEvent) -> usize {
        let Some(subscribers) = self.rooms.get(&room_id).map(|s| s.value().clone()) else {
            debug!("No subscribers for {} in room {}", event.kind(), room_id);
            return 0;
        };

        let subscribers = subscribers.lock();
        let mut delivered = 0;

        for id in subscribers.iter() {
            let Some(sender) = self.mailboxes.get(id) else {
                debug!("Mailbox {} is gone, skipping {}", id, event.kind());
                continue;
            };

            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => warn!(
                    "Mailbox {} is full, dropping {} in room {}",
                    id,
                    event.kind(),
                    room_id
                ),
                Err(TrySendError::Closed(_)) => {
                    debug!("Mailbox {} is closed, skipping {}", id, event.kind())
                }
            }
        }

        debug!(
            "Published {} to {}/{} sessions in room {}",
            event.kind(),
            delivered,
            subscribers.len(),
            room_id
        );

        delivered
    }

    /// Returns the room a session is subscribed to, if any.
    pub fn room_of(&self, id: MailboxId) -> Option<PrimaryKey> {
        self.attachments.get(&id).map(|r| *r.value())
    }

    /// Returns the sessions currently subscribed to a room.
    pub fn subscribers(&self, room_id: PrimaryKey) -> Vec<MailboxId> {
        self.rooms
            .get(&room_id)
            .map(|s| s.value().clone())
            .map(|s| s.lock().iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns true if the session has a live mailbox.
    pub fn is_registered(&self, id: MailboxId) -> bool {
        self.mailboxes.contains_key(&id)
    }

    fn subscribers_of(&self, room_id: PrimaryKey) -> Subscribers {
        self.rooms.entry(room_id).or_default().value().clone()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::*;

    const MESSAGE: RoomEvent = RoomEvent::ChatMessage { message_id: 7 };

    #[test]
    fn test_publish_to_subscriber() {
        let broadcaster = Broadcaster::default();
        let mut mailbox = broadcaster.register();

        assert!(broadcaster.subscribe(1, mailbox.id), "first subscribe adds");
        assert!(!broadcaster.subscribe(1, mailbox.id), "second subscribe is a no-op");

        let delivered = broadcaster.publish(1, MESSAGE);

        assert_eq!(delivered, 1, "one session accepted the event");
        assert_eq!(mailbox.drain(), vec![MESSAGE], "event is received exactly once");
    }

    #[test]
    fn test_no_delivery_after_unsubscribe() {
        let broadcaster = Broadcaster::default();
        let mut mailbox = broadcaster.register();

        broadcaster.subscribe(1, mailbox.id);
        assert!(broadcaster.unsubscribe(1, mailbox.id), "unsubscribe removes");
        assert!(!broadcaster.unsubscribe(1, mailbox.id), "second unsubscribe is a no-op");

        broadcaster.publish(1, MESSAGE);
        broadcaster.publish(1, MESSAGE);

        assert!(mailbox.drain().is_empty(), "nothing is received");
        assert_eq!(broadcaster.room_of(mailbox.id), None, "session has no room");
    }

    #[test]
    fn test_only_room_subscribers_receive() {
        let broadcaster = Broadcaster::default();
        let mut first = broadcaster.register();
        let mut second = broadcaster.register();

        broadcaster.subscribe(1, first.id);
        broadcaster.subscribe(2, second.id);
        broadcaster.publish(1, MESSAGE);

        assert_eq!(first.drain().len(), 1, "subscriber of room 1 receives");
        assert!(second.drain().is_empty(), "subscriber of room 2 does not");
    }

    #[test]
    fn test_single_room_per_session() {
        let broadcaster = Broadcaster::default();
        let mut mailbox = broadcaster.register();

        broadcaster.subscribe(1, mailbox.id);
        broadcaster.subscribe(2, mailbox.id);

        assert!(broadcaster.subscribers(1).is_empty(), "session moved out of room 1");
        assert_eq!(broadcaster.subscribers(2), vec![mailbox.id], "session is in room 2");
        assert_eq!(broadcaster.room_of(mailbox.id), Some(2));

        broadcaster.publish(1, MESSAGE);
        assert!(mailbox.drain().is_empty(), "old room no longer delivers");
    }

    #[test]
    fn test_unsubscribe_from_other_room_keeps_subscription() {
        let broadcaster = Broadcaster::default();
        let mut mailbox = broadcaster.register();

        broadcaster.subscribe(2, mailbox.id);

        assert!(!broadcaster.unsubscribe(1, mailbox.id), "not subscribed to room 1");
        assert_eq!(broadcaster.room_of(mailbox.id), Some(2), "room is unchanged");
        assert_eq!(broadcaster.subscribers(2), vec![mailbox.id]);

        broadcaster.publish(2, MESSAGE);
        assert_eq!(mailbox.drain(), vec![MESSAGE], "room 2 still delivers");
    }

    #[test]
    fn test_racing_subscribe_and_unsubscribe() {
        let broadcaster = Arc::new(Broadcaster::default());
        let mailbox = broadcaster.register();
        let id = mailbox.id;

        let mover = {
            let broadcaster = broadcaster.clone();
            thread::spawn(move || {
                for round in 0..500 {
                    broadcaster.subscribe((round % 2) as PrimaryKey, id);
                }
            })
        };

        let remover = {
            let broadcaster = broadcaster.clone();
            thread::spawn(move || {
                for round in 0..500 {
                    broadcaster.unsubscribe((round % 2) as PrimaryKey, id);
                }
            })
        };

        mover.join().unwrap();
        remover.join().unwrap();

        let rooms: Vec<_> = (0..2)
            .filter(|r| broadcaster.subscribers(*r).contains(&id))
            .collect();

        assert_eq!(
            rooms.first().copied(),
            broadcaster.room_of(id),
            "subscriber sets and reverse index agree"
        );
        assert!(rooms.len() <= 1, "session is in at most one room");
    }

    #[test]
    fn test_full_mailbox_does_not_stall_room() {
        let broadcaster = Broadcaster::new(&Config {
            mailbox_capacity: 1,
            ..Default::default()
        });

        let mut slow = broadcaster.register();
        let mut fast = broadcaster.register();

        broadcaster.subscribe(1, slow.id);
        broadcaster.subscribe(1, fast.id);

        assert_eq!(broadcaster.publish(1, MESSAGE), 2, "both accept the first event");
        assert!(fast.try_recv().is_some(), "fast session keeps up");

        assert_eq!(broadcaster.publish(1, MESSAGE), 1, "slow session is skipped");
        assert_eq!(fast.drain().len(), 1, "fast session still receives");
        assert_eq!(slow.drain().len(), 1, "slow session only holds what fit");
    }

    #[test]
    fn test_closed_mailbox_is_skipped() {
        let broadcaster = Broadcaster::default();
        let gone = broadcaster.register();
        let mut alive = broadcaster.register();

        broadcaster.subscribe(1, gone.id);
        broadcaster.subscribe(1, alive.id);
        drop(gone);

        assert_eq!(broadcaster.publish(1, MESSAGE), 1, "closed mailbox is skipped");
        assert_eq!(alive.drain().len(), 1, "live session receives");
    }

    #[test]
    fn test_unregister_ends_mailbox() {
        let broadcaster = Broadcaster::default();
        let mut mailbox = broadcaster.register();

        broadcaster.subscribe(1, mailbox.id);
        broadcaster.unregister(mailbox.id);

        assert!(!broadcaster.is_registered(mailbox.id));
        assert!(broadcaster.subscribers(1).is_empty(), "unregister unsubscribes");
        assert!(mailbox.try_recv().is_none());
    }

    #[test]
    fn test_concurrent_subscriptions() {
        let broadcaster = Arc::new(Broadcaster::default());

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let broadcaster = broadcaster.clone();

                thread::spawn(move || {
                    let mailbox = broadcaster.register();

                    for round in 0..200 {
                        let room_id = (round % 4) as PrimaryKey;

                        broadcaster.subscribe(room_id, mailbox.id);
                        broadcaster.publish(room_id, RoomEvent::UserJoined { user_id: n });

                        if round % 3 == 0 {
                            broadcaster.unsubscribe(room_id, mailbox.id);
                        }
                    }

                    mailbox
                })
            })
            .collect();

        let mailboxes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for mailbox in mailboxes {
            let rooms: Vec<_> = (0..4)
                .filter(|r| broadcaster.subscribers(*r).contains(&mailbox.id))
                .collect();

            assert!(rooms.len() <= 1, "session is in at most one room");
            assert_eq!(
                rooms.first().copied(),
                broadcaster.room_of(mailbox.id),
                "reverse index agrees with subscriber sets"
            );
        }
    }
}
