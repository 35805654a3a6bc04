use poll_ledger::Identity;
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::config::Config;

/// The identity of whoever made the request, as asserted by the
/// authenticating layer in front of this server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(Identity);

impl Caller {
    pub fn identity(&self) -> &Identity {
        &self.0
    }
}

#[derive(Debug)]
pub enum CallerError {
    /// The identity header was absent or blank.
    MissingIdentity,
    /// The application config is not in managed state.
    NoConfig,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = CallerError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.rocket().state::<Config>() {
            Some(config) => config,
            None => return Outcome::Failure((Status::InternalServerError, CallerError::NoConfig)),
        };
        match req.headers().get_one(config.identity_header()) {
            Some(token) if !token.trim().is_empty() => {
                Outcome::Success(Caller(Identity::new(token.trim())))
            }
            _ => Outcome::Failure((Status::Unauthorized, CallerError::MissingIdentity)),
        }
    }
}
