//! Local publish/subscribe registry for channel events.
//!
//! Several consumers can listen to the same server event without each owning
//! the connection. Handlers run in registration order. The registry lock is
//! never held while a handler runs, so handlers may subscribe or unsubscribe
//! (themselves or others) from inside a dispatch.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use quiz_core::protocol::{self, ServerEvent};

use crate::error::ChannelError;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Why a connection went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Closed locally through `disconnect()`; never triggers reconnection.
    ClientDisconnect,
    /// The server closed the connection.
    ServerClosed,
    /// The transport failed.
    TransportError(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ClientDisconnect => f.write_str("io client disconnect"),
            DisconnectReason::ServerClosed => f.write_str("io server disconnect"),
            DisconnectReason::TransportError(e) => write!(f, "transport error: {e}"),
        }
    }
}

/// Everything a subscriber can observe on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connect,
    Disconnect { reason: DisconnectReason },
    Error { error: ChannelError },
    Server(ServerEvent),
}

impl ChannelEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChannelEvent::Connect => EventKind::Connect,
            ChannelEvent::Disconnect { .. } => EventKind::Disconnect,
            ChannelEvent::Error { .. } => EventKind::Error,
            ChannelEvent::Server(ServerEvent::NewQuestion(_)) => EventKind::NewQuestion,
            ChannelEvent::Server(ServerEvent::AnswerResult(_)) => EventKind::AnswerResult,
            ChannelEvent::Server(ServerEvent::GameEnded(_)) => EventKind::GameEnded,
            ChannelEvent::Server(ServerEvent::GameStopped) => EventKind::GameStopped,
        }
    }
}

/// Subscription key: one per event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    Error,
    NewQuestion,
    AnswerResult,
    GameEnded,
    GameStopped,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Connect,
        EventKind::Disconnect,
        EventKind::Error,
        EventKind::NewQuestion,
        EventKind::AnswerResult,
        EventKind::GameEnded,
        EventKind::GameStopped,
    ];

    /// Event name as used on the wire and by subscribers.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::Error => "error",
            EventKind::NewQuestion => protocol::NEW_QUESTION,
            EventKind::AnswerResult => protocol::ANSWER_RESULT,
            EventKind::GameEnded => protocol::GAME_ENDED,
            EventKind::GameStopped => protocol::GAME_STOPPED,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Token returned by [`EventRegistry::on`]; pass it to [`EventRegistry::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

pub type Handler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<(HandlerId, Handler)>>,
}

#[derive(Default)]
pub struct EventRegistry {
    handlers: Mutex<Handlers>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Handlers> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for `kind`. Handlers for the same kind run in the
    /// order they were registered.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.lock();
        let id = HandlerId(handlers.next_id);
        handlers.next_id += 1;
        handlers
            .by_kind
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns `false` if it was not registered for `kind`.
    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        let mut handlers = self.lock();
        let Some(list) = handlers.by_kind.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.by_kind.remove(&kind);
        }
        removed
    }

    pub fn clear(&self) {
        self.lock().by_kind.clear();
    }

    /// Number of handlers registered for `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.lock().by_kind.get(&kind).map_or(0, Vec::len)
    }

    fn is_registered(&self, kind: EventKind, id: HandlerId) -> bool {
        self.lock()
            .by_kind
            .get(&kind)
            .is_some_and(|list| list.iter().any(|(existing, _)| *existing == id))
    }

    /// Deliver `event` to every handler registered for its kind.
    ///
    /// A handler removed while the dispatch is in progress is skipped if it
    /// has not run yet. A panicking handler is logged and does not stop the
    /// remaining ones.
    pub fn dispatch(&self, event: &ChannelEvent) {
        let kind = event.kind();
        let snapshot: Vec<(HandlerId, Handler)> = match self.lock().by_kind.get(&kind) {
            Some(list) => list.clone(),
            None => return,
        };

        for (id, handler) in snapshot {
            if !self.is_registered(kind, id) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                tracing::error!(event = %kind, "event handler panicked");
            }
        }
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.lock();
        let counts: HashMap<&'static str, usize> = handlers
            .by_kind
            .iter()
            .map(|(kind, list)| (kind.name(), list.len()))
            .collect();
        f.debug_struct("EventRegistry").field("handlers", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Handler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |tag: &'static str| -> Handler {
                let log = Arc::clone(&log);
                Arc::new(move |_: &ChannelEvent| log.lock().unwrap().push(tag))
            }
        };
        (log, make)
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let registry = EventRegistry::new();
        let (log, make) = recorder();
        for tag in ["first", "second", "third"] {
            let handler = make(tag);
            registry.on(EventKind::Connect, move |e| handler(e));
        }

        registry.dispatch(&ChannelEvent::Connect);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn dispatch_only_reaches_matching_kind() {
        let registry = EventRegistry::new();
        let (log, make) = recorder();
        let on_stop = make("stopped");
        registry.on(EventKind::GameStopped, move |e| on_stop(e));
        let on_connect = make("connect");
        registry.on(EventKind::Connect, move |e| on_connect(e));

        registry.dispatch(&ChannelEvent::Server(ServerEvent::GameStopped));
        assert_eq!(*log.lock().unwrap(), vec!["stopped"]);
    }

    #[test]
    fn off_removes_only_the_given_handler() {
        let registry = EventRegistry::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        let id_a = registry.on(EventKind::Connect, move |e| a(e));
        registry.on(EventKind::Connect, move |e| b(e));

        assert!(registry.off(EventKind::Connect, id_a));
        assert!(!registry.off(EventKind::Connect, id_a));
        assert!(!registry.off(EventKind::Error, id_a));

        registry.dispatch(&ChannelEvent::Connect);
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
        assert_eq!(registry.count(EventKind::Connect), 1);
    }

    #[test]
    fn handler_removed_mid_dispatch_is_skipped() {
        let registry = Arc::new(EventRegistry::new());
        let (log, make) = recorder();

        let victim_slot: Arc<Mutex<Option<HandlerId>>> = Arc::new(Mutex::new(None));
        let remover = {
            let registry = Arc::clone(&registry);
            let slot = Arc::clone(&victim_slot);
            let record = make("remover");
            move |e: &ChannelEvent| {
                record(e);
                if let Some(id) = *slot.lock().unwrap() {
                    registry.off(EventKind::Connect, id);
                }
            }
        };
        registry.on(EventKind::Connect, remover);
        let victim = make("victim");
        let victim_id = registry.on(EventKind::Connect, move |e| victim(e));
        let tail = make("tail");
        registry.on(EventKind::Connect, move |e| tail(e));
        *victim_slot.lock().unwrap() = Some(victim_id);

        registry.dispatch(&ChannelEvent::Connect);
        assert_eq!(*log.lock().unwrap(), vec!["remover", "tail"]);
    }

    #[test]
    fn panicking_handler_does_not_stop_dispatch() {
        let registry = EventRegistry::new();
        let (log, make) = recorder();
        registry.on(EventKind::Error, |_| panic!("boom"));
        let after = make("after");
        registry.on(EventKind::Error, move |e| after(e));

        registry.dispatch(&ChannelEvent::Error {
            error: ChannelError::MalformedFrame("x".into()),
        });
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn event_names_match_the_wire() {
        let names: Vec<_> = EventKind::ALL.iter().map(|kind| kind.name()).collect();
        assert_eq!(
            names,
            vec![
                "connect",
                "disconnect",
                "error",
                "newQuestion",
                "answerResult",
                "gameEnded",
                "gameStopped",
            ]
        );
        assert_eq!(EventKind::NewQuestion.to_string(), "newQuestion");
    }
}
