use log::{error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{ledger::Ledger, vote_log::VoteLog};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    identity_header: String,
    max_options: u32,
    max_text_length: u32,
}

impl Config {
    /// Name of the request header carrying the caller's identity token.
    /// Authentication happens upstream; whatever arrives here is trusted.
    pub fn identity_header(&self) -> &str {
        &self.identity_header
    }

    /// Most options a single poll may offer.
    pub fn max_options(&self) -> usize {
        self.max_options as usize
    }

    /// Longest question or option label, in characters.
    pub fn max_text_length(&self) -> usize {
        self.max_text_length as usize
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.identity_header.trim().is_empty() || config.max_options == 0 {
            error!("Invalid application config: {config:?}");
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// A fairing that creates the poll ledger, wired to an audit log of every
/// accepted vote, and places both into managed state.
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Poll Ledger",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let vote_log = VoteLog::new();
        let ledger = Ledger::with_vote_log(&vote_log);
        info!("Poll ledger online");

        // Manage the state.
        rocket = rocket.manage(ledger).manage(vote_log);
        Ok(rocket)
    }
}
