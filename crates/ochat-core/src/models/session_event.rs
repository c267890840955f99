use tokio::sync::broadcast;

use super::message::Message;
use super::notice::Notice;
use super::session_context::GenerationFailure;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Events emitted by a `ChatSession` for decoupled UI updates.
/// Each variant is tagged with `conversation_id` so subscribers can filter.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The full rendered message list; a streaming reply is the last element.
    MessagesChanged {
        conversation_id: String,
        messages: Vec<Message>,
    },
    GenerationStarted {
        conversation_id: String,
    },
    GenerationCommitted {
        conversation_id: String,
        message: Message,
        persisted: bool,
    },
    GenerationFailed {
        conversation_id: String,
        failure: GenerationFailure,
    },
    /// The message list went empty and a new conversation id was issued.
    ConversationReset {
        conversation_id: String,
    },
    Notice(Notice),
}

/// Broadcast-based emitter for `SessionEvent`.
///
/// `emit` never awaits. A slow receiver lags instead of blocking the
/// generation; since `MessagesChanged` carries the whole list, the latest
/// event is enough to redraw.
pub struct SessionEventEmitter {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEventEmitter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns the number of receivers that got the event.
    pub fn emit(&self, event: SessionEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for SessionEventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let emitter = SessionEventEmitter::new();
        let delivered = emitter.emit(SessionEvent::Notice(Notice::Cancelled));
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_order() {
        let emitter = SessionEventEmitter::new();
        let mut rx = emitter.subscribe();

        emitter.emit(SessionEvent::GenerationStarted {
            conversation_id: "abc".into(),
        });
        emitter.emit(SessionEvent::Notice(Notice::Cancelled));

        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionEvent::GenerationStarted { .. }
        ));
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Notice(Notice::Cancelled)
        );
    }
}
