use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::session_error::SessionError;
use crate::factories::ClientFactory;
use crate::models::{
    CancelHandle, GenerationFailure, Message, Notice, SessionContext, SessionEvent,
    SessionEventEmitter, StorageChanged, StreamReconciler,
};
use crate::repositories::ConversationStore;
use crate::services::{GenerationClient, GenerationRequest, spawn_fragment_producer};
use crate::settings::ChatSettings;

/// How a submission ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The reply joined the conversation. `persisted` is false when the
    /// storage write failed (the reply stays in memory).
    Committed { message: Message, persisted: bool },
    /// The reply was interrupted; its partial text stays visible, unsaved.
    Failed(GenerationFailure),
}

/// One tab's chat session: the active conversation, its live generation and
/// the sync with durable storage.
///
/// Persistence happens at two points only: right after the user's turn is
/// appended and once a reply commits. Fragments never hit storage.
pub struct ChatSession {
    context: SessionContext,
    store: Arc<ConversationStore>,
    settings: ChatSettings,
    client: Option<Arc<dyn GenerationClient>>,
    selected_model: String,
    emitter: SessionEventEmitter,
    cancel: CancelHandle,
}

impl ChatSession {
    /// Start on a fresh conversation with the client the backend mode
    /// provides up front (none in direct mode).
    pub fn new(store: Arc<ConversationStore>, settings: ChatSettings) -> Self {
        let client = ClientFactory::default_client(&settings);
        let selected_model = settings.default_model.clone();
        Self {
            context: SessionContext::new(),
            store,
            settings,
            client,
            selected_model,
            emitter: SessionEventEmitter::new(),
            cancel: CancelHandle::new(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        self.context.conversation_id()
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Committed turns of the active conversation.
    pub fn messages(&self) -> &[Message] {
        self.context.messages()
    }

    pub fn rendered_messages(&self) -> Vec<Message> {
        self.context.rendered_messages()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Explicit connect for direct mode.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        match ClientFactory::connect_direct(&self.settings) {
            Ok(client) => {
                self.attach_client(client);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Connect refused");
                self.emitter
                    .emit(SessionEvent::Notice(Notice::ConnectionFailed(e.to_string())));
                Err(e)
            }
        }
    }

    pub fn attach_client(&mut self, client: Arc<dyn GenerationClient>) {
        let backend = client.name().to_string();
        info!(backend = %backend, "Generation client attached");
        self.client = Some(client);
        self.emitter
            .emit(SessionEvent::Notice(Notice::Connected { backend }));
    }

    pub fn select_model(&mut self, model: impl Into<String>) {
        self.selected_model = model.into();
        debug!(model = %self.selected_model, "Model selected");
    }

    /// Images for the next submission, as data URLs.
    pub fn set_pending_images(&mut self, images: Vec<String>) {
        self.context.set_pending_images(images);
    }

    /// Drop the active conversation and start over under a fresh id.
    /// Nothing is written; the old conversation stays in storage.
    pub fn new_chat(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.context.reset();
        info!(conversation_id = %self.conversation_id(), "Started new chat");

        self.emitter.emit(SessionEvent::ConversationReset {
            conversation_id: self.conversation_id().to_string(),
        });
        self.emit_messages();
        Ok(())
    }

    /// Make a stored conversation the active one. An unknown or corrupt id
    /// behaves like a new chat.
    pub async fn open(&mut self, conversation_id: &str) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let messages = self.store.load(conversation_id).await;
        let resumed = !messages.is_empty();

        self.context = SessionContext::resume(conversation_id, messages);
        info!(conversation_id = %self.conversation_id(), resumed, "Opened conversation");

        if !resumed {
            self.emitter.emit(SessionEvent::ConversationReset {
                conversation_id: self.conversation_id().to_string(),
            });
        }
        self.emit_messages();
        Ok(())
    }

    /// Re-read the active conversation after a storage change signal.
    ///
    /// Skipped while streaming. Returns whether the committed list changed.
    /// An absent stored copy leaves local state alone, since the local list
    /// may simply not have been written yet.
    pub async fn refresh_from_store(&mut self) -> bool {
        if self.context.is_generating() {
            debug!("Storage changed during generation, refresh deferred");
            return false;
        }

        let stored = self.store.load(self.conversation_id()).await;
        if stored.is_empty() || stored == self.context.messages() {
            return false;
        }

        debug!(
            conversation_id = %self.conversation_id(),
            count = stored.len(),
            "Conversation changed elsewhere, reloading"
        );
        self.context.replace_messages(stored);
        self.emit_messages();
        true
    }

    /// Submit the user's text and stream the reply to completion.
    ///
    /// The user turn is persisted immediately. Each fragment replaces the
    /// in-progress assistant turn and republishes the whole list. The reply
    /// is persisted once, on commit. A transport failure or cancel leaves
    /// the partial reply displayed and unsaved.
    pub async fn submit(&mut self, input: &str) -> Result<GenerationOutcome, SessionError> {
        self.ensure_idle()?;

        if input.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }

        let Some(client) = self.client.clone() else {
            warn!("Submit without a connected backend");
            self.emitter
                .emit(SessionEvent::Notice(Notice::ConnectionRequired));
            return Err(SessionError::NotConnected);
        };

        let user_message = self.context.append_user_message(input)?;
        let conversation_id = self.conversation_id().to_string();
        debug!(
            conversation_id = %conversation_id,
            attachments = user_message.attachments().len(),
            "User message appended"
        );
        self.emit_messages();
        self.persist().await;

        self.context.start_streaming()?;
        let token = self.cancel.begin();
        self.emitter.emit(SessionEvent::GenerationStarted {
            conversation_id: conversation_id.clone(),
        });

        let result = self.stream_reply(client, &token, &conversation_id).await;
        self.cancel.finish();

        match result {
            Ok(message) => {
                self.context.commit(message.clone())?;
                let persisted = self.persist().await;
                info!(
                    conversation_id = %conversation_id,
                    chars = message.content.chars().count(),
                    persisted,
                    "Generation committed"
                );

                self.emit_messages();
                self.emitter.emit(SessionEvent::GenerationCommitted {
                    conversation_id,
                    message: message.clone(),
                    persisted,
                });
                Ok(GenerationOutcome::Committed { message, persisted })
            }
            Err(failure) => Ok(self.finish_failed(failure)),
        }
    }

    /// Drive one generation until it ends, fails or `token` is cancelled.
    /// Connection setup is cancellable too, not just the fragment loop.
    async fn stream_reply(
        &mut self,
        client: Arc<dyn GenerationClient>,
        token: &CancellationToken,
        conversation_id: &str,
    ) -> Result<Message, GenerationFailure> {
        let request = GenerationRequest::from_messages(&self.selected_model, self.context.messages());
        let stream = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(conversation_id = %conversation_id, "Cancelled while connecting");
                return Err(GenerationFailure::Cancelled);
            }
            stream = client.stream(request) => match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!(conversation_id = %conversation_id, backend = client.name(), error = %e, "Generation request failed");
                    return Err(GenerationFailure::Transport(e.to_string()));
                }
            },
        };

        let (mut rx, producer) = spawn_fragment_producer(stream);
        let mut reconciler = StreamReconciler::new(conversation_id);

        let result = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break Err(GenerationFailure::Cancelled),
                item = rx.recv() => match item {
                    Some(Ok(fragment)) => {
                        let partial = reconciler.apply(&fragment);
                        self.context.update_in_progress(partial);
                        self.emit_messages();
                    }
                    Some(Err(e)) => {
                        error!(
                            conversation_id = %conversation_id,
                            fragments = reconciler.fragments_applied(),
                            error = %e,
                            "Generation stream failed"
                        );
                        break Err(GenerationFailure::Transport(e.to_string()));
                    }
                    None => break Ok(()),
                },
            }
        };

        drop(rx);
        producer.abort();
        result.map(|()| reconciler.finish())
    }

    /// Stops the generation in flight. Clones stay valid across
    /// submissions; a cancel while idle does nothing.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.emitter.subscribe()
    }

    /// Signals fired by any writer sharing this session's storage.
    pub fn storage_changes(&self) -> broadcast::Receiver<StorageChanged> {
        self.store.subscribe()
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.context.is_generating() {
            return Err(SessionError::GenerationInFlight {
                conversation_id: self.conversation_id().to_string(),
            });
        }
        Ok(())
    }

    fn finish_failed(&mut self, failure: GenerationFailure) -> GenerationOutcome {
        self.context.fail(failure.clone());

        let notice = match &failure {
            GenerationFailure::Transport(reason) => Notice::TransportFailed(reason.clone()),
            GenerationFailure::Cancelled => Notice::Cancelled,
        };
        self.emitter.emit(SessionEvent::GenerationFailed {
            conversation_id: self.conversation_id().to_string(),
            failure: failure.clone(),
        });
        self.emitter.emit(SessionEvent::Notice(notice));

        GenerationOutcome::Failed(failure)
    }

    /// Write the committed list if the session is in a persistable state.
    /// A failed write is surfaced as a notice and does not stop the session.
    async fn persist(&self) -> bool {
        if !self.context.can_persist() {
            return false;
        }

        match self
            .store
            .save(self.conversation_id(), self.context.messages())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(conversation_id = %self.conversation_id(), error = %e, "Failed to persist conversation");
                self.emitter
                    .emit(SessionEvent::Notice(Notice::StorageWriteFailed(e.to_string())));
                false
            }
        }
    }

    fn emit_messages(&self) {
        self.emitter.emit(SessionEvent::MessagesChanged {
            conversation_id: self.conversation_id().to_string(),
            messages: self.context.rendered_messages(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{GenerationState, LocalChangeNotifier, Role};
    use crate::repositories::InMemoryStorage;
    use crate::test_helpers::{RecordingStorage, Script, ScriptedClient};

    fn session_with(
        storage: impl crate::repositories::StorageBackend,
        client: Option<Arc<ScriptedClient>>,
    ) -> ChatSession {
        let store = Arc::new(ConversationStore::new(
            Arc::new(storage),
            Arc::new(LocalChangeNotifier::new()),
        ));
        let mut session = ChatSession::new(store, ChatSettings::default());
        session.client = client.map(|c| c as Arc<dyn GenerationClient>);
        session
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_hello_scenario_streams_then_commits() {
        let storage = RecordingStorage::new();
        let client = Arc::new(ScriptedClient::replying(&["Hi", " there", "!"]));
        let mut session = session_with(storage.clone(), Some(client.clone()));
        let id = session.conversation_id().to_string();
        let mut events = session.subscribe();

        let outcome = session.submit("Hello").await.unwrap();

        let expected_reply = Message::assistant("Hi there!", id.clone());
        assert_eq!(
            outcome,
            GenerationOutcome::Committed {
                message: expected_reply.clone(),
                persisted: true
            }
        );
        assert_eq!(
            session.messages(),
            &[Message::user("Hello", id.clone()), expected_reply]
        );
        assert_eq!(session.context().generation_state(), &GenerationState::Committed);

        // Each fragment republishes the whole list with the reply replaced
        let renders: Vec<Vec<Message>> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::MessagesChanged { messages, .. } => Some(messages),
                _ => None,
            })
            .collect();
        let partials: Vec<String> = renders
            .iter()
            .filter(|m| m.len() == 2)
            .map(|m| m[1].content.clone())
            .collect();
        assert_eq!(partials, vec!["Hi", "Hi there", "Hi there!", "Hi there!"]);

        let request = client.last_request().unwrap();
        assert_eq!(request.turns.len(), 1);
        assert_eq!(request.model, "llama3");
    }

    #[tokio::test]
    async fn test_only_two_writes_per_submission() {
        let storage = RecordingStorage::new();
        let client = Arc::new(ScriptedClient::replying(&["a", "b", "c", "d", "e"]));
        let mut session = session_with(storage.clone(), Some(client));

        session.submit("count to five").await.unwrap();

        let writes = storage.writes();
        assert_eq!(writes.len(), 2);
        let key = format!("chat_{}", session.conversation_id());
        assert!(writes.iter().all(|(k, _)| *k == key));
        let final_list: Vec<Message> = serde_json::from_str(&writes[1].1).unwrap();
        assert_eq!(final_list.len(), 2);
        assert_eq!(final_list[1].content, "abcde");
    }

    #[tokio::test]
    async fn test_split_multibyte_character_across_fragments() {
        let client = Arc::new(ScriptedClient::new(vec![Script::Reply(vec![
            vec![b'c', b'a', b'f', 0xC3],
            vec![0xA9],
        ])]));
        let mut session = session_with(InMemoryStorage::new(), Some(client));

        let outcome = session.submit("coffee?").await.unwrap();

        match outcome {
            GenerationOutcome::Committed { message, .. } => assert_eq!(message.content, "café"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_partial_unpersisted() {
        let storage = InMemoryStorage::new();
        let client = Arc::new(ScriptedClient::new(vec![Script::FailAfter(
            vec![b"Once upon".to_vec()],
            "connection reset".into(),
        )]));
        let mut session = session_with(storage.clone(), Some(client));
        let mut events = session.subscribe();

        let outcome = session.submit("Tell me a story").await.unwrap();

        assert!(matches!(
            outcome,
            GenerationOutcome::Failed(GenerationFailure::Transport(_))
        ));
        // Displayed, not committed
        let rendered = session.rendered_messages();
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[1].content, "Once upon");
        assert_eq!(session.messages().len(), 1);
        assert!(!session.context().can_persist());

        // A reload only finds the user's turn
        let reloaded = session.store.load(session.conversation_id()).await;
        assert_eq!(reloaded, vec![Message::user("Tell me a story", session.conversation_id())]);

        let notices: Vec<Notice> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Notice(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].to_string(), "An error occurred. Please try again.");
    }

    #[tokio::test]
    async fn test_next_submit_after_failure_drops_partial() {
        let client = Arc::new(ScriptedClient::new(vec![
            Script::FailAfter(vec![b"half".to_vec()], "reset".into()),
            Script::reply(&["whole"]),
        ]));
        let mut session = session_with(InMemoryStorage::new(), Some(client.clone()));

        session.submit("first").await.unwrap();
        session.submit("second").await.unwrap();

        let contents: Vec<&str> = session.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "whole"]);
        // The interrupted reply is not part of the history sent to the model
        assert_eq!(client.last_request().unwrap().turns.len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_request_fails_without_partial() {
        let client = Arc::new(ScriptedClient::new(vec![Script::Reject("refused".into())]));
        let mut session = session_with(InMemoryStorage::new(), Some(client));

        let outcome = session.submit("hi").await.unwrap();

        assert!(matches!(outcome, GenerationOutcome::Failed(GenerationFailure::Transport(_))));
        assert_eq!(session.rendered_messages().len(), 1);
        assert!(!session.context().is_generating());
    }

    #[tokio::test]
    async fn test_not_connected_changes_nothing() {
        let storage = RecordingStorage::new();
        let mut session = session_with(storage.clone(), None);
        session.set_pending_images(vec!["data:image/png;base64,AAAA".into()]);
        let mut events = session.subscribe();

        let result = session.submit("Hello").await;

        assert!(matches!(result, Err(SessionError::NotConnected)));
        assert!(session.messages().is_empty());
        assert_eq!(session.context().pending_images().len(), 1);
        assert_eq!(storage.write_count(), 0);
        assert_eq!(
            drain(&mut events),
            vec![SessionEvent::Notice(Notice::ConnectionRequired)]
        );
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let client = Arc::new(ScriptedClient::replying(&["x"]));
        let mut session = session_with(InMemoryStorage::new(), Some(client.clone()));

        assert!(matches!(session.submit("   ").await, Err(SessionError::EmptyInput)));
        assert!(client.last_request().is_none());
    }

    #[tokio::test]
    async fn test_quota_failure_surfaces_notice_and_still_commits_in_memory() {
        let client = Arc::new(ScriptedClient::replying(&["fine"]));
        let mut session = session_with(InMemoryStorage::with_quota(16), Some(client));
        let mut events = session.subscribe();

        let outcome = session.submit("a message far too large for the quota").await.unwrap();

        assert!(matches!(
            outcome,
            GenerationOutcome::Committed { persisted: false, .. }
        ));
        assert_eq!(session.messages().len(), 2);
        let storage_notices = drain(&mut events)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::Notice(Notice::StorageWriteFailed(_))))
            .count();
        assert_eq!(storage_notices, 2);
    }

    #[tokio::test]
    async fn test_images_are_attached_and_cleared() {
        let client = Arc::new(ScriptedClient::replying(&["a cat"]));
        let mut session = session_with(InMemoryStorage::new(), Some(client.clone()));
        session.set_pending_images(vec!["data:image/png;base64,QUJD".into()]);

        session.submit("what is this?").await.unwrap();

        let user = &session.messages()[0];
        assert_eq!(user.role, Role::User);
        assert_eq!(user.attachments().len(), 1);
        assert_eq!(user.attachments()[0].content_type, "image/base64");
        assert!(session.context().pending_images().is_empty());
        assert_eq!(
            client.last_request().unwrap().images,
            vec!["data:image/png;base64,QUJD".to_string()]
        );
    }

    #[tokio::test]
    async fn test_cancel_stops_generation_without_commit() {
        let storage = RecordingStorage::new();
        let client = Arc::new(ScriptedClient::new(vec![Script::Hang(vec![b"thinking".to_vec()])]));
        let mut session = session_with(storage.clone(), Some(client));
        let cancel = session.cancel_handle();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
        let outcome = tokio::time::timeout(Duration::from_secs(5), session.submit("go"))
            .await
            .expect("cancel should end the generation")
            .unwrap();
        canceller.await.unwrap();

        assert_eq!(outcome, GenerationOutcome::Failed(GenerationFailure::Cancelled));
        assert_eq!(session.rendered_messages()[1].content, "thinking");
        assert_eq!(session.messages().len(), 1);
        // Only the user's turn was written
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_submit_does_not_leak_into_it() {
        let client = Arc::new(ScriptedClient::replying(&["ok"]));
        let mut session = session_with(InMemoryStorage::new(), Some(client));
        assert!(!session.cancel_handle().cancel());

        let outcome = session.submit("hi").await.unwrap();

        assert!(matches!(outcome, GenerationOutcome::Committed { .. }));
        assert!(!session.cancel_handle().is_active());
    }

    #[tokio::test]
    async fn test_cancel_while_backend_is_still_connecting() {
        let storage = RecordingStorage::new();
        let client = Arc::new(ScriptedClient::new(vec![Script::Stall]));
        let mut session = session_with(storage.clone(), Some(client));
        let cancel = session.cancel_handle();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel()
        });
        let outcome = tokio::time::timeout(Duration::from_secs(2), session.submit("load the model"))
            .await
            .expect("cancel should not wait for the backend to answer")
            .unwrap();

        assert!(canceller.await.unwrap());
        assert_eq!(outcome, GenerationOutcome::Failed(GenerationFailure::Cancelled));
        assert_eq!(session.rendered_messages().len(), 1);
        assert!(!session.context().is_generating());
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn test_new_chat_issues_fresh_id_without_writing() {
        let storage = RecordingStorage::new();
        let client = Arc::new(ScriptedClient::replying(&["hello"]));
        let mut session = session_with(storage.clone(), Some(client));
        session.submit("hi").await.unwrap();
        let old_id = session.conversation_id().to_string();
        let writes_before = storage.write_count();

        session.new_chat().unwrap();

        assert_ne!(session.conversation_id(), old_id);
        assert!(session.messages().is_empty());
        assert_eq!(storage.write_count(), writes_before);
        assert_eq!(session.store.load(&old_id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_open_resumes_or_starts_fresh() {
        let storage = InMemoryStorage::new();
        let client = Arc::new(ScriptedClient::replying(&["reply"]));
        let mut first = session_with(storage.clone(), Some(client));
        first.submit("remember me").await.unwrap();
        let id = first.conversation_id().to_string();

        let mut second = session_with(storage, None);
        second.open(&id).await.unwrap();
        assert_eq!(second.conversation_id(), id);
        assert_eq!(second.messages().len(), 2);

        second.open("does-not-exist").await.unwrap();
        assert_ne!(second.conversation_id(), "does-not-exist");
        assert!(second.messages().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_picks_up_other_tab_write() {
        let storage = InMemoryStorage::new();
        let notifier = Arc::new(LocalChangeNotifier::new());
        let store = Arc::new(ConversationStore::new(Arc::new(storage), notifier));

        let mut tab_a = ChatSession::new(store.clone(), ChatSettings::default());
        tab_a.client = Some(Arc::new(ScriptedClient::replying(&["one"])));
        tab_a.submit("first").await.unwrap();
        let id = tab_a.conversation_id().to_string();

        let mut tab_b = ChatSession::new(store.clone(), ChatSettings::default());
        tab_b.client = Some(Arc::new(ScriptedClient::replying(&["two"])));
        tab_b.open(&id).await.unwrap();
        let mut changes = tab_a.storage_changes();
        tab_b.submit("second").await.unwrap();

        assert!(changes.recv().await.is_ok());
        assert!(tab_a.refresh_from_store().await);
        assert_eq!(tab_a.messages().len(), 4);
        // Nothing new the second time
        assert!(!tab_a.refresh_from_store().await);
    }

    #[tokio::test]
    async fn test_refresh_keeps_failed_partial_when_store_unchanged() {
        let client = Arc::new(ScriptedClient::new(vec![Script::FailAfter(
            vec![b"par".to_vec()],
            "reset".into(),
        )]));
        let mut session = session_with(InMemoryStorage::new(), Some(client));
        session.submit("hi").await.unwrap();

        assert!(!session.refresh_from_store().await);
        assert_eq!(session.rendered_messages().len(), 2);
    }

    #[tokio::test]
    async fn test_connect_in_route_handler_mode_fails_with_notice() {
        let mut session = session_with(InMemoryStorage::new(), None);
        let mut events = session.subscribe();

        assert!(matches!(session.connect(), Err(SessionError::Connection(_))));
        assert!(matches!(
            drain(&mut events).as_slice(),
            [SessionEvent::Notice(Notice::ConnectionFailed(_))]
        ));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_in_direct_mode_attaches_ollama() {
        let store = Arc::new(ConversationStore::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(LocalChangeNotifier::new()),
        ));
        let settings = ChatSettings {
            backend_mode: crate::settings::BackendMode::Direct,
            ..ChatSettings::default()
        };
        let mut session = ChatSession::new(store, settings);
        assert!(!session.is_connected());
        let mut events = session.subscribe();

        session.connect().unwrap();

        assert!(session.is_connected());
        assert_eq!(
            drain(&mut events),
            vec![SessionEvent::Notice(Notice::Connected {
                backend: "Ollama".into()
            })]
        );
    }
}
