//! Typed prompt templates and query sanitisation
//!
//! Templates are data with named slots so injection stripping lives in one
//! place, never ad-hoc string interpolation at call sites.

use regex::Regex;

use crate::types::Incident;

/// Maximum query length after sanitisation
pub const MAX_QUERY_LEN: usize = 500;

/// Truncation applied to long fields inside the context block
const CONTEXT_FIELD_CAP: usize = 500;

/// Injection-shaped substrings removed from user queries
const INJECTION_PATTERNS: &[&str] = &[
    r"ignore (?:all )?previous instructions",
    r"disregard (?:all )?previous instructions",
    r"forget (?:all )?previous instructions",
    r"you are now [^.!?]*",
    r"act as [^.!?]*",
    r"system\s*:",
    r"assistant\s*:",
    r"<\s*/?\s*(?:system|instructions)\s*>",
];

/// Strip injection shapes, collapse whitespace, and cap length
pub fn sanitize_query(raw: &str) -> String {
    let pattern = format!("(?i){}", INJECTION_PATTERNS.join("|"));
    let re = Regex::new(&pattern).expect("invalid injection pattern");

    let stripped = re.replace_all(raw, " ");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut end = collapsed.len().min(MAX_QUERY_LEN);
    while end > 0 && !collapsed.is_char_boundary(end) {
        end -= 1;
    }
    collapsed[..end].to_string()
}

/// Named slots filled into a template
pub struct PromptSlots<'a> {
    pub query: &'a str,
    pub context: &'a str,
}

/// A generation prompt as typed data
pub struct PromptTemplate {
    role: &'static str,
    task: &'static str,
    format_rule: &'static str,
    lead: &'static str,
}

impl PromptTemplate {
    /// Template for single-incident fix suggestions
    pub fn simple() -> Self {
        Self {
            role: "You are a senior payments engineer answering from a knowledge base \
                   of resolved production incidents.",
            task: "Use the provided context to generate a concise, actionable fix suggestion.",
            format_rule: "Generate a short fix starting with \"Fix Suggestion: \".",
            lead: "Fix Suggestion:",
        }
    }

    /// Template for multi-incident pattern analysis
    pub fn complex() -> Self {
        Self {
            role: "You are a senior payments engineer analysing patterns across resolved \
                   production incidents.",
            task: "Analyse the provided incidents and give structured troubleshooting guidance: \
                   root cause patterns, resolution steps, and prevention measures.",
            format_rule: "Format as: \"Analysis: [root cause] | Resolution: [steps] | \
                          Prevention: [measures]\".",
            lead: "Analysis:",
        }
    }

    /// Render the template with its slots filled
    pub fn render(&self, slots: &PromptSlots<'_>) -> String {
        format!(
            "{role}\n{task}\n\nUSER QUERY:\n{query}\n\nCONTEXT (Past Incidents):\n{context}\n\n\
             INSTRUCTIONS:\n\
             - Base your answer ONLY on the provided incidents\n\
             - Cite every factual claim with the incident id in brackets, e.g. [JSP-1234]\n\
             - If the incidents do not support an answer, say \"No relevant past incidents \
               found for this specific issue.\" and stop\n\
             - NEVER invent information that is not in the context\n\
             - {format_rule}\n\n{lead}",
            role = self.role,
            task = self.task,
            query = slots.query,
            context = slots.context,
            format_rule = self.format_rule,
            lead = self.lead,
        )
    }
}

/// Format admitted incidents into the context block fed to the generator
pub fn build_context(incidents: &[(&Incident, f32)]) -> String {
    if incidents.is_empty() {
        return "No relevant incidents found.".to_string();
    }

    let blocks: Vec<String> = incidents
        .iter()
        .enumerate()
        .map(|(i, (incident, score))| {
            format!(
                "INCIDENT {n}:\nID: {id}\nTitle: {title}\nDescription: {description}\n\
                 Resolution: {resolution}\nTags: {tags}\nScore: {score:.3}",
                n = i + 1,
                id = incident.id,
                title = incident.title,
                description = cap_field(&incident.description),
                resolution = cap_field(&incident.resolution),
                tags = incident.tags.join(", "),
            )
        })
        .collect();

    blocks.join(&format!("\n{}\n", "-".repeat(50)))
}

fn cap_field(text: &str) -> String {
    if text.len() <= CONTEXT_FIELD_CAP {
        return text.to_string();
    }
    let mut end = CONTEXT_FIELD_CAP;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
