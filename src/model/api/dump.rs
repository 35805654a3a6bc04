use std::collections::HashSet;

use poll_ledger::{Identity, PollId, VoteCast};
use serde::{Deserialize, Serialize};

use super::poll::PollDescription;

/// Everything needed to independently check a poll's tallies: the poll as
/// published, plus every vote the server accepted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDump {
    pub poll: PollDescription,
    pub votes: Vec<VoteCast>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// A vote recorded against this poll names a different poll.
    ForeignVote { voter: Identity, poll_id: PollId },
    /// A vote names an option the poll does not have.
    InvalidOption { voter: Identity, option_index: usize },
    /// The same identity voted more than once.
    DuplicateVoter { voter: Identity },
    /// The tallies and options have different lengths.
    WrongOptions,
    /// The published voter count does not match the number of votes.
    VoterCount { claimed: usize, actual: usize },
    /// An option's published tally does not match its recount.
    Tally {
        option_index: usize,
        claimed: u64,
        actual: u64,
    },
}

impl PollDump {
    /// Recount the votes and check them against the published poll.
    pub fn verify(&self) -> Result<(), VerificationError> {
        let options = self.poll.options.len();
        let mut recount = vec![0u64; options];
        let mut voters = HashSet::with_capacity(self.votes.len());

        for vote in &self.votes {
            if vote.poll_id != self.poll.id {
                return Err(VerificationError::ForeignVote {
                    voter: vote.voter.clone(),
                    poll_id: vote.poll_id,
                });
            }
            if vote.option_index >= options {
                return Err(VerificationError::InvalidOption {
                    voter: vote.voter.clone(),
                    option_index: vote.option_index,
                });
            }
            if !voters.insert(&vote.voter) {
                return Err(VerificationError::DuplicateVoter {
                    voter: vote.voter.clone(),
                });
            }
            recount[vote.option_index] += 1;
        }

        if self.poll.tallies.len() != options {
            return Err(VerificationError::WrongOptions);
        }
        if self.poll.voter_count != self.votes.len() {
            return Err(VerificationError::VoterCount {
                claimed: self.poll.voter_count,
                actual: self.votes.len(),
            });
        }
        for (option_index, (&claimed, &actual)) in
            self.poll.tallies.iter().zip(&recount).enumerate()
        {
            if claimed != actual {
                return Err(VerificationError::Tally {
                    option_index,
                    claimed,
                    actual,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use poll_ledger::PollState;

    use super::*;

    fn vote(poll_id: PollId, option_index: usize, voter: &str) -> VoteCast {
        VoteCast {
            poll_id,
            option_index,
            voter: voter.into(),
        }
    }

    fn valid() -> PollDump {
        PollDump {
            poll: PollDescription {
                id: 4,
                question: "Lunch?".to_string(),
                owner: "owner".into(),
                state: PollState::Closed,
                options: vec!["Pizza".to_string(), "Sushi".to_string()],
                tallies: vec![2, 1],
                voter_count: 3,
                created_at: Utc::now(),
                closed_at: Some(Utc::now()),
            },
            votes: vec![vote(4, 0, "alice"), vote(4, 1, "bob"), vote(4, 0, "carol")],
        }
    }

    #[test]
    fn valid_dump() {
        assert_eq!(valid().verify(), Ok(()));

        let mut empty = valid();
        empty.votes.clear();
        empty.poll.tallies = vec![0, 0];
        empty.poll.voter_count = 0;
        assert_eq!(empty.verify(), Ok(()));
    }

    #[test]
    fn tampered_dumps() {
        let mut dump = valid();
        dump.votes[1].poll_id = 5;
        assert_eq!(
            dump.verify(),
            Err(VerificationError::ForeignVote {
                voter: "bob".into(),
                poll_id: 5
            })
        );

        let mut dump = valid();
        dump.votes[2].option_index = 2;
        assert_eq!(
            dump.verify(),
            Err(VerificationError::InvalidOption {
                voter: "carol".into(),
                option_index: 2
            })
        );

        let mut dump = valid();
        dump.votes[2].voter = "alice".into();
        assert_eq!(
            dump.verify(),
            Err(VerificationError::DuplicateVoter {
                voter: "alice".into()
            })
        );

        let mut dump = valid();
        dump.poll.tallies.push(0);
        assert_eq!(dump.verify(), Err(VerificationError::WrongOptions));

        let mut dump = valid();
        dump.poll.voter_count = 4;
        assert_eq!(
            dump.verify(),
            Err(VerificationError::VoterCount {
                claimed: 4,
                actual: 3
            })
        );

        let mut dump = valid();
        dump.poll.tallies = vec![1, 2];
        assert_eq!(
            dump.verify(),
            Err(VerificationError::Tally {
                option_index: 0,
                claimed: 1,
                actual: 2
            })
        );
    }
}
