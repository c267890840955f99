use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A user-visible notice (what the browser client shows as a toast).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Connected { backend: String },
    ConnectionRequired,
    ConnectionFailed(String),
    TransportFailed(String),
    StorageWriteFailed(String),
    Cancelled,
}

impl Notice {
    pub fn level(&self) -> NoticeLevel {
        match self {
            Notice::Connected { .. } => NoticeLevel::Success,
            Notice::Cancelled => NoticeLevel::Warning,
            Notice::ConnectionRequired
            | Notice::ConnectionFailed(_)
            | Notice::TransportFailed(_)
            | Notice::StorageWriteFailed(_) => NoticeLevel::Error,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Connected { backend } => write!(f, "Connected to {} successfully!", backend),
            Notice::ConnectionRequired => {
                write!(f, "Not connected. Connect to the model server first.")
            }
            Notice::ConnectionFailed(reason) => write!(f, "Failed to connect: {}", reason),
            // The detail goes to the log, the user gets the short version
            Notice::TransportFailed(_) => write!(f, "An error occurred. Please try again."),
            Notice::StorageWriteFailed(reason) => {
                write!(f, "Could not save the conversation: {}", reason)
            }
            Notice::Cancelled => write!(f, "Generation stopped."),
        }
    }
}
