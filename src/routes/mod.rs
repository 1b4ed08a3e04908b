pub mod callback;
pub mod health;

use axum::{
    Router,
    routing::{any, get},
};

use crate::server::Server;

pub use callback::callback_handler;
pub use health::health_check;

/// OAuth redirect target. Any method is accepted.
pub fn create_callback_routes() -> Router<Server> {
    Router::new().route("/callback", any(callback_handler))
}

pub fn create_health_routes() -> Router<Server> {
    Router::new().route("/health", get(health_check))
}
