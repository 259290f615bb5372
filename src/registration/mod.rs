pub mod builder;
pub mod controller;
pub mod dto;
pub mod handlers;
pub mod model;
pub mod session;
pub mod validators;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::checkin_routes()
}
