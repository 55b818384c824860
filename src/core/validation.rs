use crate::models::{FieldPath, RelationshipSubmission};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    Missing,
    InvalidEmail,
}

/// First offending field of a registration draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: FieldPath,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    /// User-facing notice naming the field
    pub fn message(&self) -> String {
        match self.kind {
            ValidationErrorKind::Missing => format!("Please fill in {}", self.field.label()),
            ValidationErrorKind::InvalidEmail => {
                let person = match self.field {
                    FieldPath::Person2Email => "Person 2",
                    _ => "Person 1",
                };
                format!("Please enter a valid email for {}", person)
            }
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ValidationError {}

/// `local@domain.tld` check on the value as typed
///
/// Surrounding whitespace fails the check; trimming only happens when the
/// draft is normalized for sending.
#[inline]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Validate a draft, stopping at the first problem
///
/// Required fields are checked in [`FieldPath::REQUIRED`] order, then the
/// two emails. Only the first failure is reported.
pub fn validate_submission(draft: &RelationshipSubmission) -> Result<(), ValidationError> {
    if let Some(field) = FieldPath::REQUIRED
        .into_iter()
        .find(|&field| draft.field(field).trim().is_empty())
    {
        return Err(ValidationError {
            field,
            kind: ValidationErrorKind::Missing,
        });
    }

    for field in [FieldPath::Person1Email, FieldPath::Person2Email] {
        if !is_valid_email(draft.field(field)) {
            return Err(ValidationError {
                field,
                kind: ValidationErrorKind::InvalidEmail,
            });
        }
    }

    Ok(())
}
