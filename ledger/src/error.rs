use thiserror::Error;

use crate::{Identity, PollId};

pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a ledger operation can be rejected.
///
/// Every rejection happens before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Poll {0} not found")]
    NotFound(PollId),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("'{voter}' has already voted in poll {poll_id}")]
    AlreadyVoted { poll_id: PollId, voter: Identity },
    #[error("Poll {0} is closed")]
    PollClosed(PollId),
    #[error("'{caller}' is not the owner of poll {poll_id}")]
    Unauthorized { poll_id: PollId, caller: Identity },
}

impl Error {
    /// Shorthand for an [`Error::InvalidArgument`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
