#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod cli;
pub mod config;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod storage;

pub use config::Config;
pub use error::{Result, VerseError};
pub use orchestrator::Orchestrator;
