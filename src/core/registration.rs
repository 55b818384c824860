use crate::core::validation::{validate_submission, ValidationError};
use crate::models::{CheckoutResponse, CheckoutSession, FieldPath, RelationshipSubmission, CHECKOUT_SESSION_PATH};
use crate::services::{ApiError, ApiErrorKind, Backend, ExternalBrowser};
use reqwest::Method;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Notice shown once the payment page has been handed to the browser
pub const PAYMENT_NOTICE: &str =
    "Complete your payment in the browser to finish registration. The registration costs $0.99.";

/// Reasons a registration attempt did not reach the payment page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Registration failed. Please check your internet connection and try again. ({0})")]
    Network(String),

    /// Backend rejection, shown verbatim
    #[error("{0}")]
    Server(String),

    #[error("{0}")]
    Parse(String),

    #[error("Cannot open payment page. Please try again.")]
    CannotOpenPaymentPage,
}

impl From<ApiError> for RegistrationError {
    fn from(err: ApiError) -> Self {
        match err.kind {
            ApiErrorKind::Network => RegistrationError::Network(err.message),
            ApiErrorKind::Server => RegistrationError::Server(err.message),
            ApiErrorKind::Parse => RegistrationError::Parse(err.message),
        }
    }
}

/// Observable state of a registration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RegistrationState {
    #[default]
    Editing,
    Validating,
    ValidationFailed(ValidationError),
    Submitting,
    SubmitFailed(RegistrationError),
    /// Terminal: the payment page was opened; completion happens out-of-band
    AwaitingExternalPayment { checkout_url: String },
}

impl RegistrationState {
    /// Pure transition function; events that do not fit the current state
    /// leave it unchanged
    pub fn apply(self, event: RegistrationEvent) -> RegistrationState {
        use RegistrationEvent as E;
        use RegistrationState as S;

        match (self, event) {
            (S::Submitting, E::Reset) => S::Submitting,
            (_, E::Reset) => S::Editing,
            (state, E::FieldEdited) if state.is_editable() => S::Editing,
            (state, E::SubmitRequested) if state.is_editable() => S::Validating,
            (S::Validating, E::ValidationRejected(err)) => S::ValidationFailed(err),
            (S::Validating, E::ValidationPassed) => S::Submitting,
            (S::Submitting, E::CheckoutOpened(session)) => S::AwaitingExternalPayment {
                checkout_url: session.url,
            },
            (S::Submitting, E::SubmitRejected(err)) => S::SubmitFailed(err),
            (state, _) => state,
        }
    }

    /// States from which the draft may be edited and submitted
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            RegistrationState::Editing
                | RegistrationState::ValidationFailed(_)
                | RegistrationState::SubmitFailed(_)
        )
    }

    /// Message for the user, if the state carries one
    pub fn notice(&self) -> Option<String> {
        match self {
            RegistrationState::ValidationFailed(err) => Some(err.to_string()),
            RegistrationState::SubmitFailed(err) => Some(err.to_string()),
            RegistrationState::AwaitingExternalPayment { .. } => Some(PAYMENT_NOTICE.to_string()),
            _ => None,
        }
    }
}

/// Inputs to [`RegistrationState::apply`]
#[derive(Debug, Clone)]
pub enum RegistrationEvent {
    FieldEdited,
    SubmitRequested,
    ValidationRejected(ValidationError),
    ValidationPassed,
    CheckoutOpened(CheckoutSession),
    SubmitRejected(RegistrationError),
    Reset,
}

/// State and draft as seen by the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationSnapshot {
    pub state: RegistrationState,
    pub draft: RelationshipSubmission,
}

/// Registration and checkout workflow
///
/// Validates the draft, requests a checkout session and hands the returned
/// URL to the host browser. At most one checkout request is in flight; a
/// `submit()` while `Submitting` is a no-op.
pub struct RegistrationWorkflow<B, H> {
    backend: Arc<B>,
    browser: Arc<H>,
    snapshot: watch::Sender<RegistrationSnapshot>,
}

impl<B, H> RegistrationWorkflow<B, H>
where
    B: Backend,
    H: ExternalBrowser,
{
    pub fn new(backend: Arc<B>, browser: Arc<H>) -> Self {
        let (snapshot, _) = watch::channel(RegistrationSnapshot::default());
        Self {
            backend,
            browser,
            snapshot,
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.snapshot.borrow().state.clone()
    }

    pub fn draft(&self) -> RelationshipSubmission {
        self.snapshot.borrow().draft.clone()
    }

    /// Receiver notified on every state or draft change
    pub fn subscribe(&self) -> watch::Receiver<RegistrationSnapshot> {
        self.snapshot.subscribe()
    }

    /// Update one draft field
    ///
    /// Clears a pending validation or submit failure. Ignored once the
    /// payment page has been opened.
    pub fn update_field(&self, path: FieldPath, value: impl Into<String>) {
        let value = value.into();
        let updated = self.snapshot.send_if_modified(|snap| {
            if matches!(snap.state, RegistrationState::AwaitingExternalPayment { .. }) {
                return false;
            }
            snap.draft.set_field(path, value);
            snap.state = std::mem::take(&mut snap.state).apply(RegistrationEvent::FieldEdited);
            true
        });

        if !updated {
            tracing::debug!("Ignoring edit of {} after checkout was opened", path);
        }
    }

    /// Start over with an empty draft; ignored while a submission is in flight
    pub fn reset(&self) {
        self.snapshot.send_if_modified(|snap| {
            if snap.state == RegistrationState::Submitting {
                return false;
            }
            snap.draft = RelationshipSubmission::default();
            snap.state = std::mem::take(&mut snap.state).apply(RegistrationEvent::Reset);
            true
        });
    }

    /// Validate the draft and, if valid, request a checkout session
    ///
    /// Returns the state after the attempt. A second call while a request
    /// is already in flight returns immediately without issuing anything.
    pub async fn submit(&self) -> RegistrationState {
        let mut payload = None;
        let accepted = self.snapshot.send_if_modified(|snap| {
            if !snap.state.is_editable() {
                return false;
            }
            let state = std::mem::take(&mut snap.state).apply(RegistrationEvent::SubmitRequested);
            let event = match validate_submission(&snap.draft) {
                Ok(()) => {
                    payload = Some(snap.draft.normalized());
                    RegistrationEvent::ValidationPassed
                }
                Err(err) => RegistrationEvent::ValidationRejected(err),
            };
            snap.state = state.apply(event);
            true
        });

        if !accepted {
            let state = self.state();
            tracing::debug!("Ignoring submit while in state {:?}", state);
            return state;
        }

        let Some(payload) = payload else {
            let state = self.state();
            tracing::info!("Registration draft rejected: {}", state.notice().unwrap_or_default());
            return state;
        };

        tracing::info!("Requesting checkout session");

        let event = match self.checkout(&payload).await {
            Ok(session) => {
                tracing::info!("Payment page opened");
                RegistrationEvent::CheckoutOpened(session)
            }
            Err(err) => {
                tracing::warn!("Registration failed: {}", err);
                RegistrationEvent::SubmitRejected(err)
            }
        };

        self.snapshot.send_modify(|snap| {
            snap.state = std::mem::take(&mut snap.state).apply(event);
        });

        self.state()
    }

    async fn checkout(&self, payload: &RelationshipSubmission) -> Result<CheckoutSession, RegistrationError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| RegistrationError::Parse(format!("Failed to encode submission: {}", e)))?;

        let json = self
            .backend
            .request(Method::POST, CHECKOUT_SESSION_PATH, Some(&body))
            .await?;

        let response: CheckoutResponse = serde_json::from_value(json)
            .map_err(|e| RegistrationError::Parse(format!("Unexpected checkout response: {}", e)))?;

        match (response.url, response.error) {
            (Some(url), _) if !url.trim().is_empty() => self.launch(url).await,
            (_, Some(error)) => Err(RegistrationError::Server(error)),
            _ => Err(RegistrationError::Parse("Failed to create checkout session".to_string())),
        }
    }

    async fn launch(&self, url: String) -> Result<CheckoutSession, RegistrationError> {
        if !self.browser.can_open(&url).await {
            tracing::warn!("Host cannot open payment page {}", url);
            return Err(RegistrationError::CannotOpenPaymentPage);
        }

        self.browser.open(&url).await.map_err(|e| {
            tracing::warn!("Failed to open payment page {}: {}", url, e);
            RegistrationError::CannotOpenPaymentPage
        })?;

        Ok(CheckoutSession { url })
    }
}
