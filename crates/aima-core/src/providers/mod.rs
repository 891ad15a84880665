//! External effect providers.
//!
//! - [`huggingface`] - HuggingFace Hub pulls, search and local import
//! - [`ollama`] - Ollama daemon pulls and inference
//! - [`router`] - Per-source dispatch between the two model providers
//! - [`service`] - In-memory service runtime

pub mod huggingface;
pub mod ollama;
pub mod router;
pub mod service;

pub use huggingface::{HuggingFaceClient, HuggingFaceProvider};
pub use ollama::{OllamaClient, OllamaProvider};
pub use router::SourceRouter;
pub use service::LocalServiceProvider;
