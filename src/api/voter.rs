use poll_ledger::PollId;
use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{api::poll::VoteRequest, caller::Caller, ledger::Ledger},
};

pub fn routes() -> Vec<Route> {
    routes![vote, has_voted]
}

#[post("/polls/<poll_id>/vote", data = "<vote>", format = "json")]
async fn vote(caller: Caller, poll_id: PollId, vote: Json<VoteRequest>, ledger: Ledger) -> Result<()> {
    ledger.vote(poll_id, vote.option, caller.identity())?;
    Ok(())
}

#[get("/polls/<poll_id>/voted")]
async fn has_voted(caller: Caller, poll_id: PollId, ledger: Ledger) -> Result<Json<bool>> {
    let voted = ledger.has_voted(poll_id, caller.identity())?;
    Ok(Json(voted))
}
