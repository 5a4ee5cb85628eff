//! Pull request analysis: task storage and queueing, GitHub and LLM clients,
//! and the worker that ties them together.

mod error;

pub mod analysis;
pub mod config;
pub mod entities;
pub mod github;
pub mod llm;
pub mod logging;
pub mod queue;
pub mod shutdown;
pub mod worker;

pub use error::AnalysisError;
pub use queue::{AnalysisRequest, TaskQueue};
pub use worker::Worker;
