#![deny(missing_docs)]

//! Core library for the qbank question-generation pipeline.

/// Overlapping boundary-aware text chunking.
pub mod chunking;
/// Environment-driven configuration management.
pub mod config;
/// Text-extraction collaborator boundary.
pub mod extraction;
/// Completion client abstraction and provider adapters.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Model response normalization and validation.
pub mod normalize;
/// Job orchestration pipeline.
pub mod pipeline;
/// Generation prompt construction.
pub mod prompt;
/// Question data model and schema validation.
pub mod question;
/// Job, document, and question-set persistence.
pub mod store;
