//! Bootstrap: builds stores and providers, registers every unit and wires
//! the gateway.
//!
//! The [`AimaApi`](crate::AimaApi) struct lives in `lib.rs`; this module holds
//! its builder and the unit registration table.

mod builder;
mod units;

pub use builder::{AimaApiBuilder, StoreBackend};
