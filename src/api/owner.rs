use poll_ledger::PollId;
use rocket::{serde::json::Json, Route, State};

use crate::{
    config::Config,
    error::Result,
    model::{
        api::poll::{PollDescription, PollSpec},
        caller::Caller,
        ledger::Ledger,
    },
};

pub fn routes() -> Vec<Route> {
    routes![create_poll, close_poll]
}

#[post("/polls", data = "<spec>", format = "json")]
async fn create_poll(
    caller: Caller,
    spec: Json<PollSpec>,
    ledger: Ledger,
    config: &State<Config>,
) -> Result<Json<PollDescription>> {
    spec.check_limits(config)?;
    let PollSpec { question, options } = spec.into_inner();
    let poll_id = ledger.create_poll(question, options, caller.identity())?;

    let poll = ledger.snapshot(poll_id)?;
    Ok(Json(poll.into()))
}

#[post("/polls/<poll_id>/close")]
async fn close_poll(caller: Caller, poll_id: PollId, ledger: Ledger) -> Result<()> {
    ledger.close_poll(poll_id, caller.identity())?;
    Ok(())
}
