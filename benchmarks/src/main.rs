use anyhow::anyhow;
use clap::{builder::RangedU64ValueParser, Parser, ValueEnum};
use const_format::concatcp;
use rand::Rng;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::fs::File;
use std::io::Write;
use std::ops::{AddAssign, Div};
use std::process::{self, Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

const LOCAL_PORT: u32 = 8374;
const LOCAL_URL: &str = concatcp!("http://127.0.0.1:", LOCAL_PORT);

const DEFAULT_IDENTITY_HEADER: &str = "X-Poll-Identity";

const OWNER: &str = "benchmark-owner";

#[rustfmt::skip]
const ROCKET_ENV: &[(&str, &str)] = &[
    ("ROCKET_PORT", concatcp!(LOCAL_PORT)),
    ("ROCKET_IDENTITY_HEADER", DEFAULT_IDENTITY_HEADER),
];

#[rustfmt::skip]
const OPTIONS: &[&str] = &[
    "Alice",
    "Bob",
    "Carol",
    "Dave",
    "Eve",
    "Fred",
    "Grace",
    "Henry",
    "Irene",
    "Joe",
];

#[derive(Parser)]
struct Args {
    /// Silence local server logging.
    #[arg(short, long)]
    quiet: bool,

    /// Send local server logging to this file; takes precedence over --quiet.
    #[arg(long)]
    logfile: Option<String>,

    /// Connect to a remote server at this URL instead of running a local one.
    #[arg(long)]
    remote: Option<String>,

    /// Header carrying the caller's identity on the remote server.
    #[arg(long, default_value = DEFAULT_IDENTITY_HEADER)]
    identity_header: String,

    /// How many threads to use. Defaults to the number of logical CPUs.
    #[arg(long, default_value_t = num_cpus::get(), value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    threads: usize,

    /// How voters pick an option.
    #[arg(long, value_enum, default_value_t)]
    choice: Choice,

    /// Close the poll and verify its dump after completion.
    #[arg(long)]
    verify: bool,
}

/// How voters pick an option.
#[derive(Debug, Copy, Clone, Default, ValueEnum)]
enum Choice {
    /// Everyone votes for the first option.
    First,
    /// Pick uniformly at random.
    #[default]
    Random,
    /// Favour low-numbered options: half the voters pick the first, and so on.
    Skewed,
}

impl Choice {
    /// Pick an option index out of `count`.
    fn pick(&self, count: usize) -> usize {
        let mut rng = rand::thread_rng();
        match self {
            Self::First => 0,
            Self::Random => rng.gen_range(0..count),
            Self::Skewed => {
                let mut i = 0;
                while i + 1 < count && rng.gen::<bool>() {
                    i += 1;
                }
                i
            }
        }
    }
}

/// Construct a URL from segments.
macro_rules! url {
    ($($segment:expr),+) => {{
        std::path::PathBuf::from_iter([$($segment),+]).to_str().unwrap()
    }}
}

/// Builds requests that carry an identity.
#[derive(Clone)]
struct Session<'a> {
    client: Client,
    url: &'a str,
    identity_header: &'a str,
}

impl<'a> Session<'a> {
    fn new(url: &'a str, identity_header: &'a str) -> Self {
        Self {
            client: Client::new(),
            url,
            identity_header,
        }
    }

    fn get(&self, path: &str, identity: Option<&str>) -> RequestBuilder {
        self.with_identity(self.client.get(url!(self.url, path)), identity)
    }

    fn post(&self, path: &str, identity: &str) -> RequestBuilder {
        self.with_identity(self.client.post(url!(self.url, path)), Some(identity))
    }

    fn with_identity(&self, request: RequestBuilder, identity: Option<&str>) -> RequestBuilder {
        match identity {
            Some(identity) => request.header(self.identity_header, identity),
            None => request,
        }
    }
}

/// Ensure the optimised server build is up-to-date and configure its environment.
fn setup_deps() -> anyhow::Result<()> {
    Command::new("cargo")
        .args(["build", "--release"])
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("server build exited nonzero"))?;

    for (var, val) in ROCKET_ENV {
        env::set_var(var, val);
    }

    Ok(())
}

/// Terminate the given child process. This is a SIGTERM on unix and a hard-kill on other
/// platforms.
fn terminate_child(child: &mut Child) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let pid = nix::unistd::Pid::from_raw(child.id() as i32);
        nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM)?;
    }
    #[cfg(not(unix))]
    {
        child.kill()?;
    }
    Ok(())
}

/// Start the local server and wait until it answers.
fn launch_server(logfile: Stdio) -> anyhow::Result<Child> {
    let mut proc = Command::new("./target/release/poll-ledger-backend")
        .stdout(logfile)
        .spawn()?;

    // A fresh server has no polls, so the first page is empty.
    let client = Client::new();
    loop {
        let resp = client
            .get(url!(LOCAL_URL, "polls"))
            .send()
            .and_then(Response::error_for_status);

        if let Ok(resp) = resp {
            #[derive(Deserialize)]
            struct Page {
                items: Vec<serde_json::Value>,
            }
            match resp.json::<Page>() {
                Ok(page) if page.items.is_empty() => break,
                other => {
                    terminate_child(&mut proc)?;
                    proc.wait()?;
                    return Err(anyhow!(
                        "Bad response: {:?}",
                        other.map(|page| page.items)
                    ));
                }
            }
        }

        // Check the server didn't exit.
        if let Some(retcode) = proc.try_wait()? {
            return Err(anyhow!("Server exited prematurely with code {}", retcode));
        }
        thread::sleep(Duration::from_millis(50));
    }

    Ok(proc)
}

/// Create a poll to benchmark against and return its ID.
fn setup_poll(session: &Session) -> anyhow::Result<String> {
    let poll = json!({
        "question": "Benchmark Poll",
        "options": OPTIONS,
    });
    let resp = session
        .post("polls", OWNER)
        .json(&poll)
        .send()
        .and_then(Response::error_for_status)?;

    #[derive(Deserialize)]
    struct Pid {
        id: u64,
    }
    let Pid { id } = resp.json()?;
    Ok(id.to_string())
}

/// Durations of each part of the voting process.
#[derive(Debug, Default)]
struct VoteTimings {
    vote: Duration,
    check: Duration,
}

impl AddAssign for VoteTimings {
    fn add_assign(&mut self, rhs: Self) {
        self.vote += rhs.vote;
        self.check += rhs.check;
    }
}

impl Div<u32> for VoteTimings {
    type Output = Self;

    fn div(self, rhs: u32) -> Self {
        Self {
            vote: self.vote / rhs,
            check: self.check / rhs,
        }
    }
}

/// Cast one vote as `voter`, then confirm that it was recorded.
fn cast_vote(
    session: &Session,
    pid: &str,
    voter: &str,
    choice: Choice,
) -> anyhow::Result<VoteTimings> {
    let pre_vote = Instant::now();
    session
        .post(url!("polls", pid, "vote"), voter)
        .json(&json!({ "option": choice.pick(OPTIONS.len()) }))
        .send()
        .and_then(Response::error_for_status)?;
    let post_vote = Instant::now();

    let pre_check = Instant::now();
    let voted: bool = session
        .get(url!("polls", pid, "voted"), Some(voter))
        .send()
        .and_then(Response::error_for_status)?
        .json()?;
    let post_check = Instant::now();
    if !voted {
        return Err(anyhow!("vote by {voter} was accepted but not recorded"));
    }

    Ok(VoteTimings {
        vote: post_vote.duration_since(pre_vote),
        check: post_check.duration_since(pre_check),
    })
}

/// Run the benchmark, returning the number of votes cast.
fn benchmark(session: &Session, pid: &str, num_threads: usize, choice: Choice) -> anyhow::Result<usize> {
    const ITERATIONS_PER_THREAD: usize = 100;
    let end_val: usize = num_threads * ITERATIONS_PER_THREAD;

    let start = Instant::now();
    thread::scope(|s| {
        let mut threads = Vec::with_capacity(num_threads);

        for start in (0..end_val).step_by(ITERATIONS_PER_THREAD) {
            let session = session.clone();
            let t = s.spawn(move || {
                let mut duration = VoteTimings::default();
                for voter_id in start..(start + ITERATIONS_PER_THREAD) {
                    let voter = format!("voter-{voter_id:06}");
                    duration += cast_vote(&session, pid, &voter, choice)?;
                }
                Ok::<_, anyhow::Error>(duration / ITERATIONS_PER_THREAD as u32)
            });
            threads.push(t);
        }

        let mut duration = VoteTimings::default();
        for t in threads {
            duration += t.join().map_err(|_| anyhow!("voter thread panicked"))??;
        }
        let total_duration = start.elapsed();

        let avg_duration = duration / num_threads as u32;
        let avg_total_duration = avg_duration.vote + avg_duration.check;

        // Theoretical votes per sec is 1/avg_duration * num_threads.
        let votes_per_sec = num_threads as f64 / avg_total_duration.as_secs_f64();
        // Actual votes per sec is total_votes / total_time.
        let actual_votes_per_sec = end_val as f64 / total_duration.as_secs_f64();

        println!("vote:  {:?}", avg_duration.vote);
        println!("check: {:?}", avg_duration.check);

        println!("\ntotal: {:?} ({:.2}/s)", avg_total_duration, votes_per_sec);
        println!(
            "actual duration: {} votes in {:?} ({:.2}/s)",
            end_val, total_duration, actual_votes_per_sec
        );

        Ok(end_val)
    })
}

/// Ensure that all dependencies for the verifier are ready.
fn setup_verifier() -> anyhow::Result<()> {
    Command::new("cargo")
        .args([
            "build",
            "--release",
            "--bin",
            "verification-cli",
            "--features",
            "verification",
        ])
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("verification-cli build exited nonzero"))?;

    Ok(())
}

/// Return `Ok(())` if the poll's tallies match the votes cast and its dump verifies.
fn verify(session: &Session, pid: &str, votes_cast: usize) -> anyhow::Result<()> {
    // Close the poll so the dump is final.
    session
        .post(url!("polls", pid, "close"), OWNER)
        .send()
        .and_then(Response::error_for_status)?;

    let dump = session
        .get(url!("polls", pid, "dump"), None)
        .send()
        .and_then(Response::error_for_status)?
        .bytes()?;

    // Sanity-check that every vote landed.
    #[derive(Deserialize)]
    struct Poll {
        tallies: Vec<u64>,
    }
    #[derive(Deserialize)]
    struct Dump {
        poll: Poll,
    }
    let parsed: Dump = serde_json::from_slice(&dump)?;
    let counted: u64 = parsed.poll.tallies.iter().sum();
    if counted != votes_cast as u64 {
        return Err(anyhow!("cast {votes_cast} votes but {counted} were counted"));
    }

    // Dump the dump to a file and run the verifier on it.
    let mut f = NamedTempFile::new()?;
    f.write_all(&dump)?;
    f.flush()?;

    Command::new("./target/release/verification-cli")
        .arg(f.path())
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("verification failed"))?;

    Ok(())
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let url = args.remote.as_deref().unwrap_or(LOCAL_URL);
    let identity_header = if args.remote.is_some() {
        args.identity_header.as_str()
    } else {
        DEFAULT_IDENTITY_HEADER
    };

    // Pre-build the verification CLI if requested.
    if args.verify {
        setup_verifier()?;
    }

    // If we're not connecting remotely, bring up a local server.
    let mut proc: Option<Child> = None;
    if args.remote.is_none() {
        setup_deps()?;
        let logfile = match args.logfile {
            Some(path) => Stdio::from(File::create(path)?),
            None => {
                if args.quiet {
                    Stdio::null()
                } else {
                    Stdio::inherit()
                }
            }
        };
        proc = Some(launch_server(logfile)?);
    }

    // Use a closure to ensure the cleanup below runs.
    let result = (|| {
        let session = Session::new(url, identity_header);
        let pid = setup_poll(&session)?;
        let votes_cast = benchmark(&session, &pid, args.threads, args.choice)?;

        if args.verify {
            verify(&session, &pid, votes_cast)?;
            println!("\npoll {pid} verified");
        }

        Ok(())
    })();

    // Kill the server.
    if let Some(p) = proc.as_mut() {
        terminate_child(p)?;
        p.wait()?;
    }

    result
}

fn main() {
    if let Err(e) = run() {
        eprintln!("FATAL: {}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_count() {
        let args = Args::try_parse_from(["benchmarks", "--threads", "3"]).unwrap();
        assert_eq!(args.threads, 3);
        assert!(Args::parse_from(["benchmarks"]).threads >= 1);

        assert!(Args::try_parse_from(["benchmarks", "--threads", "0"]).is_err());
        assert!(Args::try_parse_from(["benchmarks", "--threads", "-2"]).is_err());
    }

    #[test]
    fn choices_in_range() {
        for choice in [Choice::First, Choice::Random, Choice::Skewed] {
            for _ in 0..100 {
                assert!(choice.pick(OPTIONS.len()) < OPTIONS.len());
            }
        }
        assert_eq!(Choice::First.pick(OPTIONS.len()), 0);
        assert_eq!(Choice::Skewed.pick(1), 0);
    }
}
