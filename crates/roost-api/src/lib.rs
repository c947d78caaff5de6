pub mod auth;
pub mod middleware;
pub mod users;

pub use auth::{AppState, AppStateInner};
