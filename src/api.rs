use rocket::Route;

mod owner;
mod public;
mod voter;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(owner::routes());
    routes.extend(public::routes());
    routes.extend(voter::routes());
    routes
}
