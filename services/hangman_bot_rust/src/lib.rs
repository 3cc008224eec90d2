//! Hangman bot service: configuration, command routing and the dispatch
//! pipeline that connects them to a chat transport.

pub mod config;
pub mod dispatch;
pub mod router;

pub use config::Config;
pub use dispatch::{OutboundQueue, Pipeline, PipelineConfig, RetryBackoff};
pub use router::{parse_command, Command, CommandRouter};
