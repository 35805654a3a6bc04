use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info};

use crate::{Error, Identity, Poll, PollId, PollSnapshot, Result, VoteListener};

/// The owned store of all polls.
///
/// Polls live in a vector indexed by their ID, so its length doubles as the
/// next-ID counter. Each poll sits behind its own lock: the outer lock is only
/// held long enough to push a new poll or clone a poll's handle.
pub struct PollLedger {
    polls: RwLock<Vec<Arc<RwLock<Poll>>>>,
    listeners: Vec<Box<dyn VoteListener>>,
}

impl PollLedger {
    /// Create an empty ledger with no listeners.
    pub fn new() -> Self {
        Self {
            polls: RwLock::new(Vec::new()),
            listeners: Vec::new(),
        }
    }

    /// Register a listener for accepted votes. Listeners are called in the
    /// order they were added.
    pub fn with_listener(mut self, listener: impl VoteListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Create a new open poll owned by `owner` and return its ID.
    pub fn create_poll(
        &self,
        question: impl Into<String>,
        options: Vec<String>,
        owner: &Identity,
    ) -> Result<PollId> {
        let mut polls = write(&self.polls);
        // Lossless on every platform we build for.
        let id = polls.len() as PollId;
        let poll = Poll::new(id, question, options, owner.clone())?;
        info!(
            "Created poll {id} with {} options, owned by '{owner}'",
            poll.options().len()
        );
        polls.push(Arc::new(RwLock::new(poll)));
        Ok(id)
    }

    /// The options of the given poll, in order.
    pub fn options(&self, poll_id: PollId) -> Result<Vec<String>> {
        self.inspect(poll_id, |poll| poll.options().to_vec())
    }

    /// The tallies of the given poll, in option order.
    pub fn tallies(&self, poll_id: PollId) -> Result<Vec<u64>> {
        self.inspect(poll_id, |poll| poll.tallies().to_vec())
    }

    /// Cast `voter`'s vote for option `option_index` of the given poll, then
    /// notify every listener.
    pub fn vote(&self, poll_id: PollId, option_index: usize, voter: &Identity) -> Result<()> {
        let poll = self.poll(poll_id)?;
        let mut poll = write(&poll);
        let event = poll.cast(option_index, voter).map_err(|e| {
            debug!("Rejected vote by '{voter}' in poll {poll_id}: {e}");
            e
        })?;
        for listener in &self.listeners {
            listener.vote_cast(&event);
        }
        Ok(())
    }

    /// Close the given poll. Only its owner may do so; closing twice is a no-op.
    pub fn close_poll(&self, poll_id: PollId, caller: &Identity) -> Result<()> {
        let poll = self.poll(poll_id)?;
        let mut poll = write(&poll);
        if poll.close(caller)? {
            info!(
                "Closed poll {poll_id} with {} votes",
                poll.voter_count()
            );
        } else {
            debug!("Poll {poll_id} was already closed");
        }
        Ok(())
    }

    /// A consistent copy of the given poll's public state.
    pub fn snapshot(&self, poll_id: PollId) -> Result<PollSnapshot> {
        self.inspect(poll_id, Poll::snapshot)
    }

    /// Snapshots of up to `limit` polls in ID order, starting after the first `skip`.
    pub fn snapshots(&self, skip: usize, limit: usize) -> Vec<PollSnapshot> {
        let handles: Vec<_> = read(&self.polls)
            .iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect();
        handles.iter().map(|poll| read(poll).snapshot()).collect()
    }

    /// Has `identity` voted in the given poll?
    pub fn has_voted(&self, poll_id: PollId, identity: &Identity) -> Result<bool> {
        self.inspect(poll_id, |poll| poll.has_voted(identity))
    }

    /// Run `f` against the given poll while holding its read lock.
    ///
    /// No vote on this poll can be applied, nor reach a listener, while `f` runs.
    pub fn inspect<R>(&self, poll_id: PollId, f: impl FnOnce(&Poll) -> R) -> Result<R> {
        let poll = self.poll(poll_id)?;
        let poll = read(&poll);
        Ok(f(&*poll))
    }

    /// Number of polls ever created.
    pub fn len(&self) -> usize {
        read(&self.polls).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a handle on a poll, releasing the outer lock before returning.
    fn poll(&self, poll_id: PollId) -> Result<Arc<RwLock<Poll>>> {
        usize::try_from(poll_id)
            .ok()
            .and_then(|index| read(&self.polls).get(index).cloned())
            .ok_or(Error::NotFound(poll_id))
    }
}

impl Default for PollLedger {
    fn default() -> Self {
        Self::new()
    }
}

// Every mutation validates before it writes, so a poisoned lock still guards a
// committed state and is safe to keep using.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{PollState, VoteCast};

    fn opts(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn create_and_read_back() {
        let ledger = PollLedger::new();
        let owner = Identity::from("owner");
        assert!(ledger.is_empty());

        let first = ledger
            .create_poll("Test Poll", opts(&["Option 1", "Option 2"]), &owner)
            .unwrap();
        let second = ledger.create_poll("Another", opts(&["x"]), &owner).unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(ledger.len(), 2);

        assert_eq!(
            ledger.options(first).unwrap(),
            vec!["Option 1", "Option 2"]
        );
        assert_eq!(ledger.tallies(first).unwrap(), vec![0, 0]);
        assert_eq!(ledger.options(second).unwrap(), vec!["x"]);
    }

    #[test]
    fn rejected_creation_does_not_use_an_id() {
        let ledger = PollLedger::new();
        let owner = Identity::from("owner");
        assert!(matches!(
            ledger.create_poll("Q", vec![], &owner),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.create_poll("Q", opts(&["A"]), &Identity::from("")),
            Err(Error::InvalidArgument(_))
        ));
        assert!(ledger.is_empty());
        assert_eq!(ledger.create_poll("Q", opts(&["A"]), &owner), Ok(0));
    }

    #[test]
    fn empty_identity_cannot_vote_or_close() {
        let seen = Arc::new(Mutex::new(0));
        let counter = seen.clone();
        let ledger = PollLedger::new().with_listener(move |_: &VoteCast| {
            *counter.lock().unwrap() += 1;
        });
        let id = ledger
            .create_poll("Q", opts(&["A"]), &Identity::from("owner"))
            .unwrap();
        let nobody = Identity::from("");

        assert!(matches!(
            ledger.vote(id, 0, &nobody),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.close_poll(id, &nobody),
            Err(Error::Unauthorized { .. })
        ));
        assert_eq!(ledger.tallies(id).unwrap(), vec![0]);
        assert_eq!(ledger.snapshot(id).unwrap().state, PollState::Open);
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn unknown_poll() {
        let ledger = PollLedger::new();
        let alice = Identity::from("alice");
        assert_eq!(ledger.options(0), Err(Error::NotFound(0)));
        assert_eq!(ledger.tallies(7), Err(Error::NotFound(7)));
        assert_eq!(ledger.vote(0, 0, &alice), Err(Error::NotFound(0)));
        assert_eq!(ledger.close_poll(0, &alice), Err(Error::NotFound(0)));
        assert_eq!(ledger.has_voted(0, &alice), Err(Error::NotFound(0)));
        assert_eq!(ledger.snapshot(u64::MAX), Err(Error::NotFound(u64::MAX)));
    }

    #[test]
    fn vote_and_close() {
        let ledger = PollLedger::new();
        let owner = Identity::from("owner");
        let alice = Identity::from("alice");
        let id = ledger.create_poll("Q", opts(&["A", "B"]), &owner).unwrap();

        ledger.vote(id, 0, &alice).unwrap();
        assert_eq!(ledger.tallies(id).unwrap(), vec![1, 0]);
        assert!(ledger.has_voted(id, &alice).unwrap());
        assert!(matches!(
            ledger.vote(id, 1, &alice),
            Err(Error::AlreadyVoted { .. })
        ));

        assert!(matches!(
            ledger.close_poll(id, &alice),
            Err(Error::Unauthorized { .. })
        ));
        assert_eq!(ledger.snapshot(id).unwrap().state, PollState::Open);

        ledger.close_poll(id, &owner).unwrap();
        ledger.close_poll(id, &owner).unwrap();
        assert_eq!(ledger.vote(id, 1, &"bob".into()), Err(Error::PollClosed(id)));
        assert_eq!(ledger.tallies(id).unwrap(), vec![1, 0]);
        assert_eq!(ledger.snapshot(id).unwrap().state, PollState::Closed);
    }

    #[test]
    fn listeners_see_accepted_votes_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let order = Arc::new(Mutex::new(Vec::new()));
        let (seen_clone, order_1, order_2) = (seen.clone(), order.clone(), order.clone());
        let ledger = PollLedger::new()
            .with_listener(move |event: &VoteCast| seen_clone.lock().unwrap().push(event.clone()))
            .with_listener(move |_: &VoteCast| order_1.lock().unwrap().push(1))
            .with_listener(move |_: &VoteCast| order_2.lock().unwrap().push(2));

        let owner = Identity::from("owner");
        let alice = Identity::from("alice");
        let id = ledger.create_poll("Q", opts(&["A", "B"]), &owner).unwrap();

        ledger.vote(id, 1, &alice).unwrap();
        ledger.vote(id, 0, &alice).unwrap_err();
        ledger.vote(id, 5, &owner).unwrap_err();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![VoteCast {
                poll_id: id,
                option_index: 1,
                voter: alice
            }]
        );
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn paging_snapshots() {
        let ledger = PollLedger::new();
        let owner = Identity::from("owner");
        for i in 0..5 {
            ledger
                .create_poll(format!("Poll {i}"), opts(&["A"]), &owner)
                .unwrap();
        }

        let page = ledger.snapshots(1, 2);
        assert_eq!(page.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(page[0].question, "Poll 1");

        assert_eq!(ledger.snapshots(4, 10).len(), 1);
        assert!(ledger.snapshots(5, 10).is_empty());
        assert!(ledger.snapshots(0, 0).is_empty());
    }

    #[test]
    fn inspect_sees_whole_poll() {
        let ledger = PollLedger::new();
        let owner = Identity::from("owner");
        let id = ledger.create_poll("Q", opts(&["A", "B"]), &owner).unwrap();
        ledger.vote(id, 1, &"alice".into()).unwrap();

        let (owner_seen, voters) = ledger
            .inspect(id, |poll| (poll.owner().clone(), poll.voter_count()))
            .unwrap();
        assert_eq!(owner_seen, owner);
        assert_eq!(voters, 1);
    }
}
