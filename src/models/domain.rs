use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// One party of a relationship registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
    pub city: String,
    /// Short region code, usually two letters
    pub state: String,
}

impl Person {
    fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
        }
    }
}

/// Registration draft, also the body of `POST /create-checkout-session`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipSubmission {
    pub person1: Person,
    pub person2: Person,
    /// Intended as `YYYY-MM-DD`; only checked for presence
    pub relationship_start_date: String,
}

impl RelationshipSubmission {
    /// Copy with every free-text field trimmed and both emails lower-cased
    pub fn normalized(&self) -> Self {
        Self {
            person1: self.person1.normalized(),
            person2: self.person2.normalized(),
            relationship_start_date: self.relationship_start_date.trim().to_string(),
        }
    }

    /// Current raw value of a draft field
    pub fn field(&self, path: FieldPath) -> &str {
        match path {
            FieldPath::Person1Name => &self.person1.name,
            FieldPath::Person1Email => &self.person1.email,
            FieldPath::Person1City => &self.person1.city,
            FieldPath::Person1State => &self.person1.state,
            FieldPath::Person2Name => &self.person2.name,
            FieldPath::Person2Email => &self.person2.email,
            FieldPath::Person2City => &self.person2.city,
            FieldPath::Person2State => &self.person2.state,
            FieldPath::RelationshipStartDate => &self.relationship_start_date,
        }
    }

    pub fn set_field(&mut self, path: FieldPath, value: impl Into<String>) {
        let slot = match path {
            FieldPath::Person1Name => &mut self.person1.name,
            FieldPath::Person1Email => &mut self.person1.email,
            FieldPath::Person1City => &mut self.person1.city,
            FieldPath::Person1State => &mut self.person1.state,
            FieldPath::Person2Name => &mut self.person2.name,
            FieldPath::Person2Email => &mut self.person2.email,
            FieldPath::Person2City => &mut self.person2.city,
            FieldPath::Person2State => &mut self.person2.state,
            FieldPath::RelationshipStartDate => &mut self.relationship_start_date,
        };
        *slot = value.into();
    }
}

/// Addressable text fields of a [`RelationshipSubmission`] draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPath {
    Person1Name,
    Person1Email,
    Person1City,
    Person1State,
    Person2Name,
    Person2Email,
    Person2City,
    Person2State,
    RelationshipStartDate,
}

impl FieldPath {
    /// Required fields in the order validation visits them
    pub const REQUIRED: [FieldPath; 9] = [
        FieldPath::Person1Name,
        FieldPath::Person1Email,
        FieldPath::Person1City,
        FieldPath::Person1State,
        FieldPath::Person2Name,
        FieldPath::Person2Email,
        FieldPath::Person2City,
        FieldPath::Person2State,
        FieldPath::RelationshipStartDate,
    ];

    /// Dotted wire-style path, e.g. `person1.email`
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldPath::Person1Name => "person1.name",
            FieldPath::Person1Email => "person1.email",
            FieldPath::Person1City => "person1.city",
            FieldPath::Person1State => "person1.state",
            FieldPath::Person2Name => "person2.name",
            FieldPath::Person2Email => "person2.email",
            FieldPath::Person2City => "person2.city",
            FieldPath::Person2State => "person2.state",
            FieldPath::RelationshipStartDate => "relationship_start_date",
        }
    }

    /// Human label used in validation notices
    pub fn label(&self) -> &'static str {
        match self {
            FieldPath::Person1Name => "Person 1 name",
            FieldPath::Person1Email => "Person 1 email",
            FieldPath::Person1City => "Person 1 city",
            FieldPath::Person1State => "Person 1 state",
            FieldPath::Person2Name => "Person 2 name",
            FieldPath::Person2Email => "Person 2 email",
            FieldPath::Person2City => "Person 2 city",
            FieldPath::Person2State => "Person 2 state",
            FieldPath::RelationshipStartDate => "relationship start date",
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldPath {
    type Err = String;

    /// Accepts `person1.name` and `person1_name` spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('.', "_");
        FieldPath::REQUIRED
            .into_iter()
            .find(|path| path.as_str().replace('.', "_") == key)
            .ok_or_else(|| format!("unknown field: {}", s))
    }
}

/// Public part of a registered party, as returned by search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
}

/// A registered relationship matching a search query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub person1: PartySummary,
    #[serde(default, deserialize_with = "null_as_default")]
    pub person2: PartySummary,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relationship_start_date: String,
}

/// Treats an explicit JSON `null` like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl SearchResult {
    /// "Alice & Bob", with `Unknown` standing in for blank names
    pub fn couple_label(&self) -> String {
        format!(
            "{} & {}",
            or_placeholder(&self.person1.name, "Unknown"),
            or_placeholder(&self.person2.name, "Unknown")
        )
    }

    /// City and state of the first party
    pub fn location_label(&self) -> String {
        format!(
            "{}, {}",
            or_placeholder(&self.person1.city, "N/A"),
            or_placeholder(&self.person1.state, "N/A")
        )
    }

    /// Start date rendered as e.g. `Jun 15, 2023`
    ///
    /// Blank dates render as `N/A`; unparseable ones are returned as-is.
    pub fn formatted_start_date(&self) -> String {
        let raw = self.relationship_start_date.trim();
        if raw.is_empty() {
            return "N/A".to_string();
        }

        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()));

        match date {
            Some(date) => date.format("%b %-d, %Y").to_string(),
            None => raw.to_string(),
        }
    }
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        placeholder
    } else {
        trimmed
    }
}

/// Payment redirect issued by the backend for one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub url: String,
}
