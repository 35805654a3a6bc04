//! A simple CLI tool for verifying poll dumps.
//! This uses the server's own verification code, and so accepts exactly what
//! `GET /polls/<poll_id>/dump` returns.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use poll_ledger::PollState;
use rocket::serde::json::serde_json;

use poll_ledger_backend::model::api::dump::{PollDump, VerificationError};

const PROGRAM_NAME: &str = "verify-poll";

const ABOUT_TEXT: &str = "Verify the tallies of a poll against its recorded votes.

EXIT CODES:
     0: Verification succeeded.
   255: Ran successfully, but verification failed.
 Other: Error.";

const DUMP_PATH: &str = "DUMP_PATH";

const DUMP_PATH_HELP: &str = "The path to a JSON dump of a poll,\n\
as returned by `GET /polls/<poll_id>/dump`";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME).about(ABOUT_TEXT).arg(
        Arg::new(DUMP_PATH)
            .help(DUMP_PATH_HELP)
            .action(ArgAction::Set)
            .required(true),
    )
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON dump.
    Format(String),
    /// Verification failed due to the contained reason.
    Verification(VerificationError),
}

/// The verified result for one option.
#[derive(Debug, Eq, PartialEq)]
struct FriendlyResults {
    pub label: String,
    pub tally: u64,
}

impl Display for FriendlyResults {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} vote{}",
            self.label,
            self.tally,
            if self.tally != 1 { "s" } else { "" }
        )
    }
}

/// Load and verify a dump.
fn load_and_verify(path: &str) -> Result<PollDump, Error> {
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let dump: PollDump = serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;
    dump.verify().map_err(Error::Verification)?;
    Ok(dump)
}

/// Per-option results, ordered by tally, then label.
fn friendly_results(dump: PollDump) -> Vec<FriendlyResults> {
    let mut results: Vec<_> = dump
        .poll
        .options
        .into_iter()
        .zip(dump.poll.tallies)
        .map(|(label, tally)| FriendlyResults { label, tally })
        .collect();
    results.sort_by(|a, b| b.tally.cmp(&a.tally).then_with(|| a.label.cmp(&b.label)));
    results
}

/// Run verification.
fn verify(path: &str) -> Result<Vec<FriendlyResults>, Error> {
    load_and_verify(path).map(friendly_results)
}

/// Describe a verification failure for humans.
fn describe(err: &VerificationError) -> String {
    match err {
        VerificationError::ForeignVote { voter, poll_id } => {
            format!("The vote by '{voter}' was cast in poll {poll_id}, not this one.")
        }
        VerificationError::InvalidOption {
            voter,
            option_index,
        } => format!("The vote by '{voter}' is for non-existent option {option_index}."),
        VerificationError::DuplicateVoter { voter } => {
            format!("'{voter}' voted more than once.")
        }
        VerificationError::WrongOptions => {
            "The number of tallies does not match the number of options.".to_string()
        }
        VerificationError::VoterCount { claimed, actual } => format!(
            "The poll claims {claimed} voters, but {actual} votes were recorded."
        ),
        VerificationError::Tally {
            option_index,
            claimed,
            actual,
        } => format!(
            "Option {option_index} claims a tally of {claimed}, but has {actual} recorded votes."
        ),
    }
}

/// Run verification, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(DUMP_PATH).unwrap(); // Required argument is guaranteed to be present.
    match load_and_verify(path) {
        Ok(dump) => {
            println!("Verification succeeded.");
            if dump.poll.state == PollState::Open {
                println!("Poll {} is still open; results are provisional.", dump.poll.id);
            }
            for result in friendly_results(dump) {
                println!("{result}");
            }
            0
        }
        Err(Error::IO(msg)) => {
            println!("Failed to read dump: {msg}");
            1
        }
        Err(Error::Format(msg)) => {
            println!("Failed to parse dump: {msg}");
            1
        }
        Err(Error::Verification(err)) => {
            println!("Verification failed: {}", describe(&err));
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
