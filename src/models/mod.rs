// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{CheckoutSession, FieldPath, PartySummary, Person, RelationshipSubmission, SearchResult};
pub use requests::{SearchRequest, CHECKOUT_SESSION_PATH};
pub use responses::{CheckoutResponse, ErrorResponse, SearchResponse};
