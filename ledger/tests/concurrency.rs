use std::collections::HashSet;
use std::sync::mpsc::channel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;
use std::thread;

use poll_ledger::{Error, Identity, PollLedger, VoteCast};

const THREADS: usize = 16;
const VOTES_PER_THREAD: usize = 250;

fn two_option_poll(ledger: &PollLedger) -> u64 {
    ledger
        .create_poll(
            "Concurrent Poll",
            vec!["A".to_string(), "B".to_string()],
            &Identity::from("owner"),
        )
        .unwrap()
}

#[test]
fn distinct_voters_are_all_counted() {
    let (tx, rx) = channel();
    let ledger = PollLedger::new().with_listener(tx);
    let id = two_option_poll(&ledger);
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for t in 0..THREADS {
            let (ledger, barrier) = (&ledger, &barrier);
            s.spawn(move || {
                barrier.wait();
                for v in 0..VOTES_PER_THREAD {
                    let voter = Identity::new(format!("voter-{t}-{v}"));
                    ledger.vote(id, v % 2, &voter).unwrap();
                }
            });
        }
    });

    let total = THREADS * VOTES_PER_THREAD;
    let tallies = ledger.tallies(id).unwrap();
    assert_eq!(tallies.iter().sum::<u64>(), total as u64);
    assert_eq!(tallies, vec![(total / 2) as u64; 2]);
    assert_eq!(ledger.snapshot(id).unwrap().voter_count, total);

    // Exactly one notification per vote.
    drop(ledger);
    let events: Vec<VoteCast> = rx.iter().collect();
    assert_eq!(events.len(), total);
    let voters: HashSet<_> = events.into_iter().map(|e| e.voter).collect();
    assert_eq!(voters.len(), total);
}

#[test]
fn same_voter_wins_exactly_once() {
    let ledger = PollLedger::new();
    let id = two_option_poll(&ledger);
    let barrier = Barrier::new(THREADS);
    let voter = Identity::from("eager");

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let (ledger, barrier, voter) = (&ledger, &barrier, &voter);
                s.spawn(move || {
                    barrier.wait();
                    ledger.vote(id, t % 2, voter)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let rejections = results
        .iter()
        .filter(|r| matches!(r, Err(Error::AlreadyVoted { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(rejections, THREADS - 1);
    assert_eq!(ledger.tallies(id).unwrap().iter().sum::<u64>(), 1);
}

#[test]
fn concurrent_creators_get_unique_ids() {
    let ledger = PollLedger::new();
    let barrier = Barrier::new(THREADS);

    let ids: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let (ledger, barrier) = (&ledger, &barrier);
                s.spawn(move || {
                    barrier.wait();
                    (0..VOTES_PER_THREAD / 10)
                        .map(|i| {
                            ledger
                                .create_poll(
                                    format!("Poll {t}/{i}"),
                                    vec!["yes".to_string()],
                                    &Identity::new(format!("owner-{t}")),
                                )
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let total = THREADS * (VOTES_PER_THREAD / 10);
    let unique: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(unique.len(), total);
    assert_eq!(ledger.len(), total);
    assert_eq!(unique, (0..total as u64).collect::<HashSet<_>>());
}

#[test]
fn close_races_with_votes() {
    let ledger = PollLedger::new();
    let id = two_option_poll(&ledger);
    let barrier = Barrier::new(THREADS + 1);

    thread::scope(|s| {
        for t in 0..THREADS {
            let (ledger, barrier) = (&ledger, &barrier);
            s.spawn(move || {
                barrier.wait();
                for v in 0..VOTES_PER_THREAD {
                    let voter = Identity::new(format!("voter-{t}-{v}"));
                    match ledger.vote(id, 0, &voter) {
                        Ok(()) | Err(Error::PollClosed(_)) => {}
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            });
        }
        let (ledger, barrier) = (&ledger, &barrier);
        s.spawn(move || {
            barrier.wait();
            ledger.close_poll(id, &Identity::from("owner")).unwrap();
        });
    });

    // Whatever got in before the close is all there is.
    let frozen = ledger.snapshot(id).unwrap();
    assert_eq!(frozen.tallies[0], frozen.voter_count as u64);
    assert_eq!(
        ledger.vote(id, 1, &Identity::from("late")),
        Err(Error::PollClosed(id))
    );
    assert_eq!(ledger.snapshot(id).unwrap(), frozen);
}

#[test]
fn unrelated_polls_progress_independently() {
    let ledger = PollLedger::new();
    let ids: Vec<_> = (0..THREADS).map(|_| two_option_poll(&ledger)).collect();

    thread::scope(|s| {
        for &id in &ids {
            let ledger = &ledger;
            s.spawn(move || {
                for v in 0..VOTES_PER_THREAD {
                    ledger
                        .vote(id, 1, &Identity::new(format!("voter-{v}")))
                        .unwrap();
                }
            });
        }
    });

    for id in ids {
        assert_eq!(
            ledger.tallies(id).unwrap(),
            vec![0, VOTES_PER_THREAD as u64]
        );
    }
}

#[test]
fn readers_see_consistent_snapshots() {
    let ledger = PollLedger::new();
    let id = two_option_poll(&ledger);
    let barrier = Barrier::new(THREADS + 1);
    let voting = AtomicBool::new(true);
    let total = (THREADS * VOTES_PER_THREAD) as u64;

    let reads = thread::scope(|s| {
        let voters: Vec<_> = (0..THREADS)
            .map(|t| {
                let (ledger, barrier) = (&ledger, &barrier);
                s.spawn(move || {
                    barrier.wait();
                    for v in 0..VOTES_PER_THREAD {
                        let voter = Identity::new(format!("voter-{t}-{v}"));
                        ledger.vote(id, (t + v) % 2, &voter).unwrap();
                    }
                })
            })
            .collect();

        let (ledger, barrier, voting) = (&ledger, &barrier, &voting);
        let reader = s.spawn(move || {
            barrier.wait();
            let mut reads = 0usize;
            let mut last_count = 0;
            loop {
                let done = !voting.load(Ordering::Acquire);
                let snapshot = ledger.snapshot(id).unwrap();
                let counted: u64 = snapshot.tallies.iter().sum();
                assert_eq!(counted, snapshot.voter_count as u64);
                // Votes only ever accumulate.
                assert!(snapshot.voter_count >= last_count);
                last_count = snapshot.voter_count;
                reads += 1;
                if done {
                    break;
                }
            }
            reads
        });

        for voter in voters {
            voter.join().unwrap();
        }
        voting.store(false, Ordering::Release);
        reader.join().unwrap()
    });

    assert!(reads > 0);
    let tallies = ledger.tallies(id).unwrap();
    assert_eq!(tallies.iter().sum::<u64>(), total);
}
