//! Healthcare agent fabric: specialist agents and an orchestrator that speak
//! JSON-RPC task messages to each other over HTTP.

pub mod agents;
pub mod ai;
pub mod config;
pub mod connector;
pub mod discovery;
pub mod error;
pub mod http;
pub mod routing;
pub mod server;
pub mod tasks;

pub use error::{CareError, CareResult};
