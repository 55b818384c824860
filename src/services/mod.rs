// Service exports
pub mod api;
pub mod browser;

pub use api::{ApiClient, ApiError, ApiErrorKind, Backend, ClientError};
pub use browser::{BrowserError, ExternalBrowser, SystemBrowser};
