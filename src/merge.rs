//! Result merger: folds one call's matches into the running accumulator.

use serde_json::Value;
use tracing::debug;

use crate::accumulator::{Accumulator, FieldMap};
use crate::client::MatchResponse;
use crate::handler::{HandlerRegistry, MatchContext};

/// Merge one bulk call's results into `seed`.
///
/// A rejected response turns `seed` into the failure signal: the service
/// message lands in the `message` field and nothing else changes. An
/// accepted response is processed item by item, in input order:
///
/// 1. A per-item field map starts from the template's keys, every one reset
///    to an empty list. The template's default values apply only to the
///    top-level seed, not here.
/// 2. Each match runs through its registered handler, threading the field
///    map from one handler to the next. Intents without a handler are
///    skipped.
/// 3. The per-item map is folded into `seed` with list coercion, so values
///    concatenate in chunk, item, match order.
pub fn merge_batch(
    registry: &HandlerRegistry,
    items: &[String],
    response: &MatchResponse,
    template: &Accumulator,
    seed: Accumulator,
) -> Accumulator {
    let mut merged = seed;

    if !response.accepted {
        merged.set_message(response.message.as_str());
        return merged;
    }

    for (index, input) in items.iter().enumerate() {
        let mut fields: FieldMap = template
            .fields()
            .map(|field| (field.to_owned(), Value::Array(Vec::new())))
            .collect();

        for match_index in 0..response.match_count(index) {
            let Some(m) = response.get_match(index, match_index) else {
                continue;
            };
            let Some(handler) = registry.get(&m.intent) else {
                debug!(intent = %m.intent, "no handler registered, match skipped");
                continue;
            };
            let cx = MatchContext {
                input,
                utterance: &m.utterance,
                arguments: &m.arguments,
                pattern: &m.pattern,
                template,
            };
            fields = handler.extract(&cx, fields);
        }

        merged.fold(fields);
    }

    merged
}
