use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Identity, Result, VoteCast};

/// Sequential poll identifier, starting from zero.
pub type PollId = u64;

/// States in the Poll lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    /// Accepting votes.
    Open,
    /// Terminal: tallies are final.
    Closed,
}

/// A single poll and all of its votes.
///
/// The question, options and owner are fixed at creation. Tallies and voters
/// only ever grow, and only while the poll is open.
#[derive(Debug, Clone)]
pub struct Poll {
    id: PollId,
    question: String,
    options: Vec<String>,
    tallies: Vec<u64>,
    voters: HashSet<Identity>,
    state: PollState,
    owner: Identity,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl Poll {
    /// Create a new open poll with zeroed tallies.
    ///
    /// Fails if the question is blank, there are no options, any option is
    /// blank, or the owner identity is empty.
    pub fn new(
        id: PollId,
        question: impl Into<String>,
        options: Vec<String>,
        owner: Identity,
    ) -> Result<Self> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(Error::invalid("question must not be empty"));
        }
        if options.is_empty() {
            return Err(Error::invalid("a poll needs at least one option"));
        }
        if let Some(i) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(Error::invalid(format!("option {i} must not be empty")));
        }
        if owner.as_str().is_empty() {
            return Err(Error::invalid("owner identity must not be empty"));
        }

        Ok(Self {
            id,
            question,
            tallies: vec![0; options.len()],
            options,
            voters: HashSet::new(),
            state: PollState::Open,
            owner,
            created_at: Utc::now(),
            closed_at: None,
        })
    }

    pub fn id(&self) -> PollId {
        self.id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn tallies(&self) -> &[u64] {
        &self.tallies
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == PollState::Open
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Number of identities that have voted.
    pub fn voter_count(&self) -> usize {
        self.voters.len()
    }

    pub fn has_voted(&self, identity: &Identity) -> bool {
        self.voters.contains(identity)
    }

    /// Record a vote.
    ///
    /// Checks, in order: the poll is open, the option exists, the voter identity
    /// is non-empty, the voter has not voted yet. Nothing is modified unless
    /// all of them pass.
    pub fn cast(&mut self, option_index: usize, voter: &Identity) -> Result<VoteCast> {
        if !self.is_open() {
            return Err(Error::PollClosed(self.id));
        }
        if option_index >= self.options.len() {
            return Err(Error::invalid(format!(
                "option {option_index} out of range for poll {} with {} options",
                self.id,
                self.options.len()
            )));
        }
        if voter.as_str().is_empty() {
            return Err(Error::invalid("voter identity must not be empty"));
        }
        if self.voters.contains(voter) {
            return Err(Error::AlreadyVoted {
                poll_id: self.id,
                voter: voter.clone(),
            });
        }

        self.voters.insert(voter.clone());
        self.tallies[option_index] += 1;

        Ok(VoteCast {
            poll_id: self.id,
            option_index,
            voter: voter.clone(),
        })
    }

    /// Close the poll on behalf of `caller`.
    ///
    /// Only the owner may close. Closing an already closed poll succeeds without
    /// changing anything. Returns `true` iff this call performed the transition.
    pub fn close(&mut self, caller: &Identity) -> Result<bool> {
        if caller != &self.owner {
            return Err(Error::Unauthorized {
                poll_id: self.id,
                caller: caller.clone(),
            });
        }
        if !self.is_open() {
            return Ok(false);
        }
        self.state = PollState::Closed;
        self.closed_at = Some(Utc::now());
        Ok(true)
    }

    /// Copy out everything but the voter set.
    pub fn snapshot(&self) -> PollSnapshot {
        PollSnapshot {
            id: self.id,
            question: self.question.clone(),
            options: self.options.clone(),
            tallies: self.tallies.clone(),
            voter_count: self.voter_count(),
            state: self.state,
            owner: self.owner.clone(),
            created_at: self.created_at,
            closed_at: self.closed_at,
        }
    }
}

/// A consistent, detached copy of a poll's public state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub id: PollId,
    pub question: String,
    pub options: Vec<String>,
    pub tallies: Vec<u64>,
    pub voter_count: usize,
    pub state: PollState,
    pub owner: Identity,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}
