//! Source normalisation: ticket exports, CSV, and chat threads into the
//! incident schema

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Category, Incident, Priority};

/// Caller-supplied CSV column mapping onto incident field names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub id: String,
    pub title: String,
    pub description: String,
    pub resolution: String,
    pub tags: String,
    pub resolved_by: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            title: "title".to_string(),
            description: "description".to_string(),
            resolution: "resolution".to_string(),
            tags: "tags".to_string(),
            resolved_by: "resolved_by".to_string(),
            created_at: Some("created_at".to_string()),
            category: Some("category".to_string()),
            priority: Some("priority".to_string()),
        }
    }
}

/// Parse a JSON ticket export: an array of incident objects
pub fn parse_json(data: &[u8]) -> Result<Vec<Incident>> {
    let records: Vec<Incident> = serde_json::from_slice(data)?;
    Ok(records)
}

/// Parse a CSV export using the supplied column mapping
pub fn parse_csv(data: &[u8], mapping: &ColumnMapping) -> Result<Vec<Incident>> {
    let mut reader = csv::Reader::from_reader(data);
    let headers = reader.headers()?.clone();

    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::InvalidInput(format!("CSV is missing column '{name}'")))
    };

    let id_col = column(&mapping.id)?;
    let title_col = column(&mapping.title)?;
    let description_col = column(&mapping.description)?;
    let resolution_col = column(&mapping.resolution)?;
    let tags_col = column(&mapping.tags)?;
    let resolved_by_col = column(&mapping.resolved_by)?;
    let created_at_col = mapping
        .created_at
        .as_deref()
        .and_then(|name| headers.iter().position(|h| h.eq_ignore_ascii_case(name)));
    let category_col = mapping
        .category
        .as_deref()
        .and_then(|name| headers.iter().position(|h| h.eq_ignore_ascii_case(name)));
    let priority_col = mapping
        .priority
        .as_deref()
        .and_then(|name| headers.iter().position(|h| h.eq_ignore_ascii_case(name)));

    let mut incidents = Vec::new();
    for row in reader.records() {
        let row = row?;
        let field = |col: usize| row.get(col).unwrap_or("").trim().to_string();

        let created_at = created_at_col
            .map(|col| field(col))
            .and_then(|raw| parse_timestamp(&raw))
            .unwrap_or_else(Utc::now);

        incidents.push(Incident {
            id: field(id_col),
            title: field(title_col),
            description: field(description_col),
            resolution: field(resolution_col),
            tags: split_tags(&field(tags_col)),
            created_at,
            resolved_by: field(resolved_by_col),
            category: category_col.and_then(|col| parse_category(&field(col))),
            priority: priority_col.and_then(|col| parse_priority(&field(col))),
        });
    }
    Ok(incidents)
}

/// A chat thread exported from a messaging platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatThread {
    pub channel: String,
    /// Platform thread identifier; digits are used to form the incident id
    pub thread_id: String,
    pub messages: Vec<ChatMessage>,
}

/// One message in a chat thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author: String,
    pub text: String,
    pub posted_at: DateTime<Utc>,
    /// Marked by the exporter when the reply documents the fix
    #[serde(default)]
    pub is_resolution: bool,
}

/// Parse a chat export: an array of threads
pub fn parse_chat(data: &[u8]) -> Result<Vec<ChatThread>> {
    let threads: Vec<ChatThread> = serde_json::from_slice(data)?;
    Ok(threads)
}

/// Normalise a chat thread into the incident schema.
///
/// The opening message becomes the problem statement, replies marked as
/// resolutions become the fix, and the last resolver is credited.
pub fn normalise_chat_thread(thread: &ChatThread) -> Result<Incident> {
    let first = thread
        .messages
        .first()
        .ok_or_else(|| Error::InvalidInput("chat thread has no messages".to_string()))?;

    let resolutions: Vec<&ChatMessage> = thread
        .messages
        .iter()
        .filter(|m| m.is_resolution)
        .collect();
    let resolution_text = resolutions
        .iter()
        .map(|m| m.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let resolved_by = resolutions
        .last()
        .map(|m| m.author.clone())
        .unwrap_or_else(|| first.author.clone());

    let description = thread
        .messages
        .iter()
        .filter(|m| !m.is_resolution)
        .map(|m| m.text.trim())
        .collect::<Vec<_>>()
        .join(" ");

    let digits: String = thread
        .thread_id
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(10)
        .collect();
    if digits.is_empty() {
        return Err(Error::InvalidInput(format!(
            "chat thread id '{}' carries no digits",
            thread.thread_id
        )));
    }

    Ok(Incident {
        id: format!("CHAT-{digits}"),
        title: first_sentence(&first.text),
        description,
        resolution: resolution_text,
        tags: vec![thread.channel.trim_start_matches('#').to_string(), "chat".to_string()],
        created_at: first.posted_at,
        resolved_by,
        category: None,
        priority: None,
    })
}

fn first_sentence(text: &str) -> String {
    let trimmed = text.trim();
    let end = trimmed
        .find(['.', '!', '?', '\n'])
        .map(|i| i + 1)
        .unwrap_or(trimmed.len())
        .min(120);
    let mut end = end;
    while end > 0 && !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].trim_end_matches(['.', '!', '?']).to_string()
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split([';', ','])
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_category(raw: &str) -> Option<Category> {
    match raw.to_lowercase().as_str() {
        "upi" => Some(Category::Upi),
        "card" => Some(Category::Card),
        "wallet" => Some(Category::Wallet),
        "webhook" => Some(Category::Webhook),
        "gateway" => Some(Category::Gateway),
        "refund" => Some(Category::Refund),
        "settlement" => Some(Category::Settlement),
        "" => None,
        _ => Some(Category::Other),
    }
}

fn parse_priority(raw: &str) -> Option<Priority> {
    match raw.to_lowercase().as_str() {
        "low" => Some(Priority::Low),
        "medium" => Some(Priority::Medium),
        "high" => Some(Priority::High),
        "critical" => Some(Priority::Critical),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_honours_column_mapping() {
        let csv = "ticket,summary,details,fix,labels,owner\n\
                   JSP-10,Webhook SSL failure seen,The webhook endpoint rejected our certificate \
                   after the yearly rotation completed.,Re-issued the client certificate and \
                   redeployed the relay.,webhook;ssl,alice@example.com\n";
        let mapping = ColumnMapping {
            id: "ticket".to_string(),
            title: "summary".to_string(),
            description: "details".to_string(),
            resolution: "fix".to_string(),
            tags: "labels".to_string(),
            resolved_by: "owner".to_string(),
            created_at: None,
            category: None,
            priority: None,
        };
        let incidents = parse_csv(csv.as_bytes(), &mapping).unwrap();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].id, "JSP-10");
        assert_eq!(incidents[0].tags, vec!["webhook", "ssl"]);
        assert!(incidents[0].validate().is_ok());
    }

    #[test]
    fn csv_missing_column_is_rejected() {
        let csv = "id,title\nJSP-1,whatever\n";
        let err = parse_csv(csv.as_bytes(), &ColumnMapping::default()).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn chat_thread_normalises_into_incident() {
        let thread = ChatThread {
            channel: "#payments-oncall".to_string(),
            thread_id: "1716212345.0042".to_string(),
            messages: vec![
                ChatMessage {
                    author: "bob@example.com".to_string(),
                    text: "Pinelabs settlement file missing for yesterday. Anyone seen this before?"
                        .to_string(),
                    posted_at: Utc::now(),
                    is_resolution: false,
                },
                ChatMessage {
                    author: "alice@example.com".to_string(),
                    text: "Re-ran the settlement fetch job with the corrected SFTP path and the \
                           file landed."
                        .to_string(),
                    posted_at: Utc::now(),
                    is_resolution: true,
                },
            ],
        };
        let incident = normalise_chat_thread(&thread).unwrap();
        assert_eq!(incident.id, "CHAT-1716212345");
        assert_eq!(incident.title, "Pinelabs settlement file missing for yesterday");
        assert_eq!(incident.resolved_by, "alice@example.com");
        assert!(incident.tags.contains(&"payments-oncall".to_string()));
        assert!(incident.validate().is_ok());
    }

    #[test]
    fn chat_thread_without_digits_is_rejected() {
        let thread = ChatThread {
            channel: "#x".to_string(),
            thread_id: "abc".to_string(),
            messages: vec![ChatMessage {
                author: "a@b.co".to_string(),
                text: "hello".to_string(),
                posted_at: Utc::now(),
                is_resolution: false,
            }],
        };
        assert!(normalise_chat_thread(&thread).is_err());
    }
}
