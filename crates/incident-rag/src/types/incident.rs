//! Incident record: the atomic unit of the corpus

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Incident category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Upi,
    Card,
    Wallet,
    Webhook,
    Gateway,
    Refund,
    Settlement,
    Other,
}

/// Incident priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// A resolved production incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Stable identifier, `PREFIX-digits` (e.g. `JSP-1234`). Immutable once admitted.
    pub id: String,
    /// Short human summary
    pub title: String,
    /// Free-text problem statement
    pub description: String,
    /// Free-text fix
    pub resolution: String,
    /// Short labels
    pub tags: Vec<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Contact of the resolver (email-shaped)
    pub resolved_by: String,
    /// Optional category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Optional priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl Incident {
    /// The text that dense and sparse indices are built from
    pub fn training_text(&self) -> String {
        format!(
            "{}. {}. Resolution: {}",
            self.title, self.description, self.resolution
        )
    }

    /// Text used for entity and domain extraction
    pub fn entity_text(&self) -> String {
        format!(
            "{} {} {}",
            self.title,
            self.description,
            self.tags.join(" ")
        )
    }

    /// Validate the incident against the corpus schema.
    ///
    /// Rejected records never reach the dense or sparse indices.
    pub fn validate(&self) -> Result<()> {
        if !id_pattern().is_match(&self.id) {
            return Err(self.schema_error("id must match PREFIX-digits (e.g. JSP-1234)"));
        }
        if self.title.trim().len() < 10 {
            return Err(self.schema_error("title must be at least 10 characters"));
        }
        if self.description.trim().len() < 50 {
            return Err(self.schema_error("description must be at least 50 characters"));
        }
        if self.resolution.trim().len() < 20 {
            return Err(self.schema_error("resolution must be at least 20 characters"));
        }
        if self.tags.iter().filter(|t| !t.trim().is_empty()).count() == 0 {
            return Err(self.schema_error("at least one non-empty tag is required"));
        }
        if !email_pattern().is_match(&self.resolved_by) {
            return Err(self.schema_error("resolved_by must be email-shaped"));
        }
        Ok(())
    }

    /// Normalise in place: trimmed fields, upper-cased id, deduplicated lowercase tags
    pub fn normalise(&mut self) {
        self.id = self.id.trim().to_uppercase();
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        self.resolution = self.resolution.trim().to_string();
        self.resolved_by = self.resolved_by.trim().to_lowercase();

        let mut seen = std::collections::HashSet::new();
        self.tags = self
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();
    }

    /// True when the searchable text of two records is identical, meaning the
    /// embedding does not need to be recomputed
    pub fn same_text(&self, other: &Incident) -> bool {
        self.title == other.title
            && self.description == other.description
            && self.resolution == other.resolution
    }

    fn schema_error(&self, message: &str) -> Error {
        Error::Schema {
            id: self.id.clone(),
            message: message.to_string(),
        }
    }
}

/// Anchored pattern for a complete incident id
pub fn id_pattern() -> Regex {
    Regex::new(r"^[A-Za-z]{2,10}-\d{1,10}$").expect("invalid id pattern")
}

/// Pattern extracting the first incident id embedded in free text
pub fn id_extraction_pattern() -> Regex {
    Regex::new(r"(?i)\b([A-Za-z]{2,10}-\d{1,10})\b").expect("invalid id extraction pattern")
}

fn email_pattern() -> Regex {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid email pattern")
}
