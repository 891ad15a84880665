//! Ollama integration: model pulls and inference through a local daemon.

mod client;
mod provider;

pub use client::{OllamaClient, OllamaModel, PullStatus, TagDetails};
pub use provider::{
    estimate_from_details, model_name, parse_parameter_size, OllamaProvider, SOURCE,
};
