use std::sync::mpsc::Sender;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{Identity, PollId};

/// Notification that a vote was accepted and applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteCast {
    pub poll_id: PollId,
    pub option_index: usize,
    pub voter: Identity,
}

/// A subscriber to accepted votes.
///
/// Listeners are called synchronously, once per accepted vote, while the
/// poll's write lock is still held. For a given poll they therefore see votes
/// in exactly the order they were applied. A listener must not call back into
/// the ledger.
pub trait VoteListener: Send + Sync {
    fn vote_cast(&self, event: &VoteCast);
}

impl<F> VoteListener for F
where
    F: Fn(&VoteCast) + Send + Sync,
{
    fn vote_cast(&self, event: &VoteCast) {
        self(event)
    }
}

impl VoteListener for Sender<VoteCast> {
    fn vote_cast(&self, event: &VoteCast) {
        if self.send(event.clone()).is_err() {
            debug!(
                "Dropped VoteCast for poll {}: receiver hung up",
                event.poll_id
            );
        }
    }
}
