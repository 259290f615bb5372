use crate::state::AppState;
use axum::Router;

mod dto;
pub mod export;
pub(crate) mod extractors;
pub mod handlers;
mod password;
pub mod purge;
pub mod token;

pub fn router() -> Router<AppState> {
    handlers::admin_routes()
}
