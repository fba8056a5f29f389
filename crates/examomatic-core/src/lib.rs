//! examomatic-core — Exam session engine, answer evaluation, and history.
//!
//! This crate defines the data model, the session state machine, and the
//! collaborator traits that the rest of examomatic builds on.

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod history;
pub mod model;
pub mod parser;
pub mod placeholder;
pub mod session;
pub mod traits;
