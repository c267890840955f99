pub mod cancel_handle;
pub mod change_notifier;
pub mod fragment_decoder;
pub mod message;
pub mod notice;
pub mod session_context;
pub mod session_event;
pub mod session_identity;
pub mod stream_reconciler;

pub use cancel_handle::CancelHandle;
pub use change_notifier::{ChangeNotifier, LocalChangeNotifier, StorageChanged};
pub use fragment_decoder::Utf8FragmentDecoder;
pub use message::{Attachment, IMAGE_ATTACHMENT_CONTENT_TYPE, Message, Role};
pub use notice::{Notice, NoticeLevel};
pub use session_context::{ContextError, GenerationFailure, GenerationState, SessionContext};
pub use session_event::{SessionEvent, SessionEventEmitter};
pub use session_identity::SessionIdentity;
pub use stream_reconciler::StreamReconciler;
