use poll_ledger::PollId;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            dump::PollDump,
            poll::{PollDescription, PollSummary},
        },
        ledger::Ledger,
        pagination::{Paginated, Pagination},
        vote_log::VoteLog,
    },
};

pub fn routes() -> Vec<Route> {
    routes![polls, poll, poll_options, poll_tallies, poll_dump]
}

#[get("/polls")]
async fn polls(pagination: Pagination, ledger: Ledger) -> Json<Paginated<PollSummary>> {
    let page = ledger
        .snapshots(pagination.skip(), pagination.page_size())
        .into_iter()
        .map(PollSummary::from)
        .collect();
    Json(pagination.paginate(ledger.len(), page))
}

#[get("/polls/<poll_id>")]
async fn poll(poll_id: PollId, ledger: Ledger) -> Result<Json<PollDescription>> {
    let poll = ledger.snapshot(poll_id)?;
    Ok(Json(poll.into()))
}

#[get("/polls/<poll_id>/options")]
async fn poll_options(poll_id: PollId, ledger: Ledger) -> Result<Json<Vec<String>>> {
    Ok(Json(ledger.options(poll_id)?))
}

#[get("/polls/<poll_id>/tallies")]
async fn poll_tallies(poll_id: PollId, ledger: Ledger) -> Result<Json<Vec<u64>>> {
    Ok(Json(ledger.tallies(poll_id)?))
}

#[get("/polls/<poll_id>/dump")]
async fn poll_dump(
    poll_id: PollId,
    ledger: Ledger,
    vote_log: &State<VoteLog>,
) -> Result<Json<PollDump>> {
    // Votes reach the log under the poll's write lock, so reading both under
    // its read lock gives a matching pair.
    let dump = ledger.inspect(poll_id, |poll| PollDump {
        poll: poll.snapshot().into(),
        votes: vote_log.votes_for(poll_id),
    })?;
    Ok(Json(dump))
}
