// Workflow exports
pub mod registration;
pub mod search;
pub mod validation;

pub use registration::{RegistrationError, RegistrationEvent, RegistrationSnapshot, RegistrationState, RegistrationWorkflow, PAYMENT_NOTICE};
pub use search::{SearchEvent, SearchState, SearchWorkflow, EMPTY_QUERY_MESSAGE};
pub use validation::{is_valid_email, validate_submission, ValidationError, ValidationErrorKind};
