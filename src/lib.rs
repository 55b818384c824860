//! STATUS registry client - search and registration workflows
//!
//! Two independent state machines share one API client: a name search that
//! discards responses from superseded queries, and a registration flow that
//! validates a two-person submission, requests a checkout session and hands
//! the payment page to the host browser.

pub mod config;
pub mod core;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::core::{RegistrationState, RegistrationWorkflow, SearchState, SearchWorkflow};
pub use models::{FieldPath, Person, RelationshipSubmission, SearchResult};
pub use services::{ApiClient, ApiError, ApiErrorKind, Backend, ExternalBrowser, SystemBrowser};
