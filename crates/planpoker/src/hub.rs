//! Live connections: their session bindings and their outboxes.
//!
//! Keeping both in one structure means a room audience is resolved and
//! delivered under a single lock, so a connection is either in the room
//! for the whole fan-out or not at all.

use std::collections::HashMap;

use planpoker_protocol::{Audience, ServerEvent};
use planpoker_session::{Binding, SessionError, SessionRegistry};
use planpoker_transport::ConnectionId;
use tokio::sync::mpsc;

/// Sending half of a connection's outbox.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// Receiving half, drained by the connection's socket task.
pub type Inbox = mpsc::UnboundedReceiver<ServerEvent>;

#[derive(Default)]
pub(crate) struct Hub {
    pub(crate) sessions: SessionRegistry,
    outboxes: HashMap<ConnectionId, Outbox>,
}

impl Hub {
    /// Registers a connection and returns its inbox.
    pub(crate) fn register(&mut self, conn: ConnectionId) -> Result<Inbox, SessionError> {
        self.sessions.connect(conn)?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.outboxes.insert(conn, tx);
        Ok(rx)
    }

    /// Forgets a connection. Returns its last binding, if any.
    pub(crate) fn remove(&mut self, conn: ConnectionId) -> Option<Binding> {
        self.outboxes.remove(&conn);
        self.sessions.disconnect(conn)
    }

    /// Delivers `event` to everyone in `audience`. Returns the number of
    /// outboxes it was queued on.
    pub(crate) fn deliver(&self, audience: &Audience, event: ServerEvent) -> usize {
        match audience {
            Audience::Connection(conn) => usize::from(self.send_to(*conn, event)),
            Audience::Room(room_code) => self
                .sessions
                .members(room_code)
                .into_iter()
                .filter(|conn| self.send_to(*conn, event.clone()))
                .count(),
            Audience::RoomExcept(room_code, excluded) => self
                .sessions
                .members(room_code)
                .into_iter()
                .filter(|conn| conn != excluded)
                .filter(|conn| self.send_to(*conn, event.clone()))
                .count(),
        }
    }

    /// Queues one event. A closed outbox means the socket task is already
    /// gone; the event is dropped.
    fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        self.outboxes
            .get(&conn)
            .is_some_and(|tx| tx.send(event).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planpoker_protocol::{RoomCode, UserId};

    fn conn(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    fn code() -> RoomCode {
        RoomCode::new_unchecked("AAAAAA")
    }

    fn hub_with_room() -> (Hub, Vec<Inbox>) {
        let mut hub = Hub::default();
        let mut inboxes = Vec::new();
        for n in 1..=3 {
            inboxes.push(hub.register(conn(n)).unwrap());
        }
        hub.sessions.bind(conn(1), code(), UserId::from("a")).unwrap();
        hub.sessions.bind(conn(2), code(), UserId::from("b")).unwrap();
        // conn(3) stays unbound.
        (hub, inboxes)
    }

    fn drain(inbox: &mut Inbox) -> usize {
        let mut n = 0;
        while inbox.try_recv().is_ok() {
            n += 1;
        }
        n
    }

    #[test]
    fn test_deliver_room_reaches_bound_members_only() {
        let (hub, mut inboxes) = hub_with_room();
        let sent = hub.deliver(&Audience::Room(code()), ServerEvent::ConnectSuccess);
        assert_eq!(sent, 2);
        assert_eq!(drain(&mut inboxes[0]), 1);
        assert_eq!(drain(&mut inboxes[1]), 1);
        assert_eq!(drain(&mut inboxes[2]), 0);
    }

    #[test]
    fn test_deliver_room_except_skips_excluded() {
        let (hub, mut inboxes) = hub_with_room();
        let sent = hub.deliver(
            &Audience::RoomExcept(code(), conn(1)),
            ServerEvent::ConnectSuccess,
        );
        assert_eq!(sent, 1);
        assert_eq!(drain(&mut inboxes[0]), 0);
        assert_eq!(drain(&mut inboxes[1]), 1);
    }

    #[test]
    fn test_deliver_connection_works_when_unbound() {
        let (hub, mut inboxes) = hub_with_room();
        let sent = hub.deliver(&Audience::Connection(conn(3)), ServerEvent::ConnectSuccess);
        assert_eq!(sent, 1);
        assert_eq!(drain(&mut inboxes[2]), 1);
    }

    #[test]
    fn test_deliver_skips_closed_inbox() {
        let (hub, mut inboxes) = hub_with_room();
        let closed = inboxes.remove(0);
        drop(closed);
        let sent = hub.deliver(&Audience::Room(code()), ServerEvent::ConnectSuccess);
        assert_eq!(sent, 1);
    }

    #[test]
    fn test_remove_returns_binding_and_stops_delivery() {
        let (mut hub, _inboxes) = hub_with_room();
        let binding = hub.remove(conn(1)).unwrap();
        assert_eq!(binding.user_id, UserId::from("a"));
        assert_eq!(
            hub.deliver(&Audience::Connection(conn(1)), ServerEvent::ConnectSuccess),
            0
        );
    }
}
