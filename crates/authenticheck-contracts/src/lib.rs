//! Domain contracts for product verification: the verdict data model and
//! its schema, response normalization, verification history, chat messages,
//! model registry, published model metrics and the JSONL event log.

pub mod chat;
pub mod error;
pub mod events;
pub mod history;
pub mod metrics;
pub mod models;
pub mod verification;

pub use error::{ChatError, PersistenceError, StreamError, VerificationError};
