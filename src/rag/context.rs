//! Context assembly: ranked chunks in, bounded generation request out.

use crate::config::{Prompts, Settings};
use crate::generation::{GenerationParams, GenerationRequest};
use crate::index::ScoredChunk;
use crate::transcription::format_timestamp;
use std::collections::HashMap;

/// Separator placed between excerpts in the context block.
const EXCERPT_SEPARATOR: &str = "\n\n";

/// Builds generation requests from retrieved chunks.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    prompts: Prompts,
    max_context_chars: usize,
    params: GenerationParams,
}

impl ContextAssembler {
    pub fn new(prompts: Prompts, max_context_chars: usize, params: GenerationParams) -> Self {
        Self {
            prompts,
            max_context_chars,
            params,
        }
    }

    pub fn from_settings(settings: &Settings, prompts: Prompts) -> Self {
        Self::new(
            prompts,
            settings.retrieval.max_context_chars,
            GenerationParams::from(&settings.generation),
        )
    }

    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars
    }

    /// Chunks that fit in the context budget, best first.
    ///
    /// Chunks are ordered by descending score, ties broken by sequence index.
    /// Lower-ranked chunks are dropped first once the budget is exhausted; the
    /// top chunk is always kept (truncated if it alone exceeds the budget).
    pub fn select<'a>(&self, retrieved: &'a [ScoredChunk]) -> Vec<&'a ScoredChunk> {
        let mut ranked: Vec<&ScoredChunk> = retrieved.iter().collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.chunk.sequence.cmp(&b.chunk.sequence))
        });

        let mut used = 0;
        let mut selected = Vec::new();
        for scored in ranked {
            let cost = excerpt(scored).chars().count()
                + if selected.is_empty() { 0 } else { EXCERPT_SEPARATOR.len() };
            if !selected.is_empty() && used + cost > self.max_context_chars {
                break;
            }
            used += cost;
            selected.push(scored);
        }
        selected
    }

    /// Assemble a generation request for `question` from retrieved chunks.
    pub fn assemble(&self, question: &str, retrieved: &[ScoredChunk]) -> GenerationRequest {
        let selected = self.select(retrieved);
        let has_evidence = !selected.is_empty();

        let context = if has_evidence {
            let joined = selected
                .iter()
                .map(|s| excerpt(s))
                .collect::<Vec<_>>()
                .join(EXCERPT_SEPARATOR);
            truncate_chars(&joined, self.max_context_chars)
        } else {
            self.prompts.answer.no_evidence.clone()
        };

        let mut vars = HashMap::new();
        vars.insert("preamble".to_string(), self.prompts.answer.preamble.clone());
        vars.insert("context".to_string(), context.clone());
        vars.insert("question".to_string(), question.to_string());
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.answer.template, &vars);

        GenerationRequest {
            preamble: self.prompts.answer.preamble.clone(),
            context,
            question: question.to_string(),
            params: self.params,
            has_evidence,
            prompt,
        }
    }
}

/// Chunk text as it appears in the context block.
fn excerpt(scored: &ScoredChunk) -> String {
    match scored.chunk.start_seconds {
        Some(seconds) => format!("[{}] {}", format_timestamp(seconds), scored.chunk.text),
        None => scored.chunk.text.clone(),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => text[..byte_offset].to_string(),
        None => text.to_string(),
    }
}
