//! Batch orchestration: normalize input, chunk it to the per-request
//! limit, and drive one remote call plus merge per chunk.

use regex::Regex;
use tracing::{debug, warn};

use crate::accumulator::Accumulator;
use crate::client::MatchService;
use crate::handler::HandlerRegistry;
use crate::merge::merge_batch;

/// Raw input accepted by the orchestrator.
///
/// A single string may be segmented by delimiters before matching; a
/// pre-split list is taken as-is and never re-split, even when delimiters
/// are supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchInput {
    /// One free-text string, possibly holding several sentences.
    Text(String),
    /// Already-segmented input items.
    Items(Vec<String>),
}

impl From<&str> for BatchInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for BatchInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<String>> for BatchInput {
    fn from(items: Vec<String>) -> Self {
        Self::Items(items)
    }
}

/// Split `content` on any character in `delimiters`, dropping empty
/// fragments and preserving order.
///
/// The delimiters compile into a regex character class with every
/// character escaped, so regex metacharacters are safe to use as
/// delimiters.
pub fn split_content(content: &str, delimiters: &[char]) -> Vec<String> {
    let class: String = delimiters
        .iter()
        .map(|c| regex::escape(&c.to_string()))
        .collect();
    let pattern = match Regex::new(&format!("[{class}]")) {
        Ok(pattern) => pattern,
        Err(e) => {
            warn!(error = %e, "delimiter class failed to compile, input left unsplit");
            return vec![content.to_owned()];
        }
    };
    pattern
        .split(content)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_owned)
        .collect()
}

fn normalize(input: BatchInput, delimiters: &[char]) -> Vec<String> {
    match input {
        BatchInput::Text(text) => {
            if delimiters.is_empty() {
                vec![text]
            } else {
                split_content(&text, delimiters)
            }
        }
        // Pre-split input bypasses delimiter splitting.
        BatchInput::Items(items) => items,
    }
}

/// Drives the split → chunk → call → merge pipeline.
pub struct BatchRunner {
    service: Box<dyn MatchService>,
    registry: HandlerRegistry,
    input_limit: usize,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("registry", &self.registry)
            .field("input_limit", &self.input_limit)
            .finish()
    }
}

impl BatchRunner {
    /// Create a runner over a match service and a handler registry.
    ///
    /// `input_limit` is the remote per-request item limit; a zero limit is
    /// treated as one.
    pub fn new(
        service: Box<dyn MatchService>,
        registry: HandlerRegistry,
        input_limit: usize,
    ) -> Self {
        Self {
            service,
            registry,
            input_limit: input_limit.max(1),
        }
    }

    /// Run the full pipeline and return the merged accumulator.
    ///
    /// Chunks are processed strictly in order, each merge seeding the
    /// next. As soon as a merge carries the failure `message` field,
    /// remaining chunks are skipped and the partial result is returned.
    /// Empty normalized input returns a copy of the template without any
    /// remote call.
    pub async fn run(
        &self,
        content: impl Into<BatchInput>,
        filter: &[String],
        delimiters: &[char],
        template: &Accumulator,
    ) -> Accumulator {
        let items = normalize(content.into(), delimiters);
        let mut merged = Accumulator::from_template(template);
        if items.is_empty() {
            return merged;
        }

        for chunk in items.chunks(self.input_limit) {
            let response = self.service.match_batch(chunk, filter).await;
            merged = merge_batch(&self.registry, chunk, &response, template, merged);
            if merged.has_message() {
                warn!(
                    failure = merged.message().unwrap_or_default(),
                    "chunk failed, halting with partial results"
                );
                break;
            }
            debug!(items = chunk.len(), "chunk merged");
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn split_on_delimiter_set() {
        let out = split_content("今天天氣如何？後天氣象如何？", &['？', '，']);
        assert_eq!(out, owned(&["今天天氣如何", "後天氣象如何"]));
    }

    #[test]
    fn split_drops_empty_fragments() {
        let out = split_content("？？一句？？兩句？", &['？']);
        assert_eq!(out, owned(&["一句", "兩句"]));
    }

    #[test]
    fn split_escapes_metacharacters() {
        let out = split_content("a.b]c[d", &['.', ']', '[']);
        assert_eq!(out, owned(&["a", "b", "c", "d"]));
    }

    #[test]
    fn split_of_delimiters_only_is_empty() {
        assert!(split_content("？！？", &['？', '！']).is_empty());
    }

    #[test]
    fn normalize_text_without_delimiters_is_atomic() {
        let out = normalize("今天天氣如何？後天氣象如何？".into(), &[]);
        assert_eq!(out, owned(&["今天天氣如何？後天氣象如何？"]));
    }

    #[test]
    fn normalize_list_ignores_delimiters() {
        let items = owned(&["今天天氣如何？", "後天氣象如何？"]);
        let out = normalize(items.clone().into(), &['？']);
        assert_eq!(out, items);
    }

    #[test]
    fn normalize_text_with_delimiters_splits() {
        let out = normalize("今天天氣如何？後天氣象如何？".into(), &['？']);
        assert_eq!(out, owned(&["今天天氣如何", "後天氣象如何"]));
    }
}
