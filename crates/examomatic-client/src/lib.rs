//! examomatic-client — Question-bank service clients.
//!
//! Implements the core collaborator traits against the REST question-bank
//! service and in memory, plus configuration loading.

pub mod config;
pub mod error;
pub mod http;
pub mod memory;

pub use config::{create_service, load_config, load_config_from, ExamomaticConfig};
pub use error::ServiceError;
pub use http::HttpQuestionService;
pub use memory::InMemoryQuestionBank;
