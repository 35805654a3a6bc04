use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::info;
use poll_ledger::{PollId, VoteCast, VoteListener};

type VoteMap = HashMap<PollId, Vec<VoteCast>>;

/// Audit trail of every accepted vote, per poll, in the order the ledger
/// applied them.
#[derive(Clone, Default)]
pub struct VoteLog {
    votes: Arc<Mutex<VoteMap>>,
}

impl VoteLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded votes for the given poll.
    pub fn votes_for(&self, poll_id: PollId) -> Vec<VoteCast> {
        self.lock().get(&poll_id).cloned().unwrap_or_default()
    }

    /// Total number of recorded votes across all polls.
    pub fn total(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    fn lock(&self) -> MutexGuard<'_, VoteMap> {
        // Pushing a clone cannot leave the map half-updated.
        self.votes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VoteListener for VoteLog {
    fn vote_cast(&self, event: &VoteCast) {
        info!(
            "VoteCast poll={} option={} voter='{}'",
            event.poll_id, event.option_index, event.voter
        );
        self.lock()
            .entry(event.poll_id)
            .or_default()
            .push(event.clone());
    }
}
