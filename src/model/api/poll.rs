use chrono::{DateTime, Utc};
use poll_ledger::{Identity, PollId, PollSnapshot, PollState};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};

/// A request to create a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSpec {
    /// Question text.
    pub question: String,
    /// Option labels, in the order votes will address them.
    pub options: Vec<String>,
}

impl PollSpec {
    /// Check the request against the server's size limits.
    ///
    /// Blank questions and options are left for the ledger to reject.
    pub fn check_limits(&self, config: &Config) -> Result<()> {
        if self.options.len() > config.max_options() {
            return Err(Error::bad_request(format!(
                "Too many options: {} (max {})",
                self.options.len(),
                config.max_options()
            )));
        }
        let too_long = |text: &str| text.chars().count() > config.max_text_length();
        if too_long(&self.question) {
            return Err(Error::bad_request("Question too long"));
        }
        if let Some(i) = self.options.iter().position(|o| too_long(o)) {
            return Err(Error::bad_request(format!("Option {i} too long")));
        }
        Ok(())
    }
}

/// A vote for one option of a poll, by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub option: usize,
}

/// Full public view of a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDescription {
    pub id: PollId,
    pub question: String,
    pub owner: Identity,
    pub state: PollState,
    pub options: Vec<String>,
    pub tallies: Vec<u64>,
    pub voter_count: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<PollSnapshot> for PollDescription {
    fn from(poll: PollSnapshot) -> Self {
        Self {
            id: poll.id,
            question: poll.question,
            owner: poll.owner,
            state: poll.state,
            options: poll.options,
            tallies: poll.tallies,
            voter_count: poll.voter_count,
            created_at: poll.created_at,
            closed_at: poll.closed_at,
        }
    }
}

/// Poll metadata for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSummary {
    pub id: PollId,
    pub question: String,
    pub state: PollState,
    pub option_count: usize,
    pub voter_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<PollSnapshot> for PollSummary {
    fn from(poll: PollSnapshot) -> Self {
        Self {
            id: poll.id,
            question: poll.question,
            state: poll.state,
            option_count: poll.options.len(),
            voter_count: poll.voter_count,
            created_at: poll.created_at,
        }
    }
}
