//! Grounded answer generation from admitted candidates only

use std::sync::Arc;

use regex::Regex;

use crate::config::GenerationConfig;
use crate::providers::Generator;
use crate::types::incident::id_extraction_pattern;
use crate::types::{Incident, QueryComplexity, RetrievalCandidate};

use super::prompt::{build_context, PromptSlots, PromptTemplate};

/// Builds context, prompts the generative provider, and extracts citations
pub struct GroundedGenerator {
    generator: Arc<dyn Generator>,
    config: GenerationConfig,
    id_re: Regex,
}

impl GroundedGenerator {
    /// Create a generator over the given provider
    pub fn new(generator: Arc<dyn Generator>, config: GenerationConfig) -> Self {
        Self {
            generator,
            config,
            id_re: id_extraction_pattern(),
        }
    }

    /// Generate a grounded answer for the admitted candidate set.
    ///
    /// Returns the answer text and the cited incident ids (a subset of the
    /// admitted set). If the provider fails after retries, falls back to a
    /// rule-based suggestion from the top incident.
    pub async fn answer(
        &self,
        query: &str,
        complexity: QueryComplexity,
        admitted: &[(Incident, RetrievalCandidate)],
    ) -> (String, Vec<String>) {
        let context_entries: Vec<(&Incident, f32)> = admitted
            .iter()
            .map(|(incident, candidate)| (incident, candidate.fused_score))
            .collect();
        let context = build_context(&context_entries);

        let (template, max_tokens) = match complexity {
            QueryComplexity::Complex => {
                (PromptTemplate::complex(), self.config.max_tokens_complex)
            }
            _ => (PromptTemplate::simple(), self.config.max_tokens_simple),
        };

        let prompt = template.render(&PromptSlots {
            query,
            context: &context,
        });

        let answer = match self.generator.generate(&prompt, max_tokens).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "generation failed, using rule-based fallback");
                self.fallback_answer(admitted)
            }
        };

        let sources = self.extract_sources(&answer, admitted);
        (answer, sources)
    }

    /// Format an exact-id lookup without consulting the generative provider
    pub fn format_exact(&self, incident: &Incident) -> String {
        format!(
            "{id}: {title}\n\nDescription:\n{description}\n\nResolution:\n{resolution}\n\n\
             Resolved by: {resolved_by}\nTags: {tags}",
            id = incident.id,
            title = incident.title,
            description = incident.description,
            resolution = incident.resolution,
            resolved_by = incident.resolved_by,
            tags = incident.tags.join(", "),
        )
    }

    /// Incident ids cited in the answer text, restricted to the admitted set.
    /// When the answer carries no explicit citations, all admitted ids count
    /// as implicit sources.
    fn extract_sources(
        &self,
        answer: &str,
        admitted: &[(Incident, RetrievalCandidate)],
    ) -> Vec<String> {
        let mut cited: Vec<String> = Vec::new();
        for caps in self.id_re.captures_iter(answer) {
            let id = caps[1].to_uppercase();
            if admitted.iter().any(|(incident, _)| incident.id == id)
                && !cited.contains(&id)
            {
                cited.push(id);
            }
        }

        if cited.is_empty() {
            admitted
                .iter()
                .map(|(incident, _)| incident.id.clone())
                .collect()
        } else {
            cited
        }
    }

    fn fallback_answer(&self, admitted: &[(Incident, RetrievalCandidate)]) -> String {
        match admitted.first() {
            Some((incident, _)) => format!(
                "Fix Suggestion: based on [{id}] ({title}), try: {resolution}",
                id = incident.id,
                title = incident.title,
                resolution = incident.resolution,
            ),
            None => {
                "No relevant past incidents found for this specific issue.".to_string()
            }
        }
    }
}
