use log::{debug, warn};
use poll_ledger::Error as LedgerError;
use rocket::{
    http::{Status, StatusClass},
    response::Responder,
};
use thiserror::Error;

use crate::logging::RequestId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Shorthand for a `400 Bad Request` with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, msg.into())
    }

    /// The HTTP status this error is reported as.
    pub fn status(&self) -> Status {
        match self {
            Self::Ledger(err) => match err {
                LedgerError::NotFound(_) => Status::NotFound,
                LedgerError::InvalidArgument(_) => Status::BadRequest,
                LedgerError::AlreadyVoted { .. } => Status::Conflict,
                LedgerError::PollClosed(_) => Status::UnprocessableEntity,
                LedgerError::Unauthorized { .. } => Status::Forbidden,
            },
            Self::Status(status, _) => *status,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let id = req.local_cache(RequestId::next);
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            warn!("req{id} failed: {self}");
        } else {
            debug!("req{id} rejected: {self}");
        }
        Err(status)
    }
}
