pub mod cache;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod health;
pub mod jobs;
pub mod links;
pub mod presentation;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod spotify;
pub mod telegram;
#[cfg(test)]
pub mod test_utils;
pub mod tracks;

pub use config::Config;
pub use server::Server;
