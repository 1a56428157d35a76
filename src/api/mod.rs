//! Client for the remote functions that execute and close trades.

mod execution_client;
mod types;

pub use execution_client::{ExecutionClient, ExecutionConfig};
pub use types::*;
