pub mod api;
pub mod caller;
pub mod ledger;
pub mod pagination;
pub mod vote_log;
