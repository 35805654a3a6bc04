//! A poll ledger: an append-only collection of polls, each with a fixed set of
//! options, accepting at most one vote per identity and closable only by the
//! identity that created it.
//!
//! The ledger is safe to share between threads. Mutations of a single poll are
//! serialized by that poll's own lock, so unrelated polls never contend.

mod error;
mod event;
mod identity;
mod ledger;
mod poll;

pub use error::{Error, Result};
pub use event::{VoteCast, VoteListener};
pub use identity::Identity;
pub use ledger::PollLedger;
pub use poll::{Poll, PollId, PollSnapshot, PollState};
