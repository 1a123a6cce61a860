//! sg-assistant: Natural-language questions answered with generated SQL.
//!
//! The pipeline in [`pipeline`] grounds a prompt in the live schema
//! ([`cataloger`], [`prompt`]), asks a [`gateway::LanguageModel`] through the
//! retrying [`gateway::ModelGateway`], pulls a statement out of the reply
//! ([`extract`]) and runs it on the warehouse.

pub mod cataloger;
pub mod extract;
pub mod gateway;
pub mod gemini;
pub mod mention;
pub mod pipeline;
pub mod prompt;
pub mod retry;

pub use gateway::{GatewayError, LanguageModel, ModelError, ModelGateway};
pub use pipeline::{Answer, Assistant};
pub use prompt::{PromptBuilder, SqlDialect};
