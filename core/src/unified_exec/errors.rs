use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnifiedExecError {
    #[error("failed to create exec session: {message}")]
    CreateSession { message: String },
    #[error("unknown session id {session_id}")]
    UnknownSessionId { session_id: String },
    #[error("failed to write to stdin")]
    WriteToStdin,
    #[error("too many active exec sessions")]
    TooManySessions,
    #[error("missing command line for exec request")]
    MissingCommandLine,
}

impl UnifiedExecError {
    pub(crate) fn create_session(message: impl std::fmt::Display) -> Self {
        Self::CreateSession {
            message: message.to_string(),
        }
    }
}
