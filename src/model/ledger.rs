use std::ops::Deref;
use std::sync::Arc;

use log::error;
use poll_ledger::PollLedger;
use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};

use super::vote_log::VoteLog;

/// A shared handle on the server's poll ledger.
#[derive(Clone)]
pub struct Ledger(Arc<PollLedger>);

impl Ledger {
    /// Create an empty ledger that reports every accepted vote to `vote_log`.
    pub fn with_vote_log(vote_log: &VoteLog) -> Self {
        Self(Arc::new(PollLedger::new().with_listener(vote_log.clone())))
    }
}

impl Deref for Ledger {
    type Target = PollLedger;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Ledger {
    type Error = ();

    /// Get the ledger from the managed state.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.rocket().state::<Ledger>() {
            Some(ledger) => request::Outcome::Success(ledger.clone()),
            None => {
                error!("Poll ledger is not in managed state");
                request::Outcome::Failure((Status::InternalServerError, ()))
            }
        }
    }
}
