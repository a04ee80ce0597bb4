pub mod broadcaster;
pub mod checker;
pub mod config;
pub mod error;
pub mod grouper;
pub mod orchestrator;
pub mod queue;
pub mod routes;
pub mod sandbox;
pub mod types;
pub mod web_server;
