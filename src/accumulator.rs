//! The accumulator: the merged result structure returned to callers.
//!
//! An [`Accumulator`] maps field names to values. The merge operations
//! guarantee that any field written through [`Accumulator::fold`] holds an
//! ordered list, concatenated in call order; the only non-list field the
//! pipeline itself writes is the `message` failure sentinel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field name used to signal a failed remote call.
///
/// The batch orchestrator stops processing further chunks as soon as a merge
/// result carries this field. Callers must check for it instead of catching
/// errors: the pipeline reports every failure as data.
pub const MESSAGE_FIELD: &str = "message";

/// A per-item field map as produced by intent handlers.
///
/// Values may be scalars or lists; [`Accumulator::fold`] coerces either shape
/// into the accumulator's list-valued fields.
pub type FieldMap = BTreeMap<String, Value>;

/// Mapping from field name to extracted values.
///
/// Serializes transparently as a JSON object. Cloning performs a deep copy,
/// which is how reference templates are isolated from the accumulators built
/// from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Accumulator(BTreeMap<String, Value>);

impl Accumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an accumulator seeded with an independent copy of a template.
    pub fn from_template(template: &Accumulator) -> Self {
        template.clone()
    }

    /// Insert or replace a field. Used when building templates.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Look up a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Iterate over field names.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Whether no fields are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Record a remote failure message, overwriting any previous one.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.0
            .insert(MESSAGE_FIELD.to_owned(), Value::String(message.into()));
    }

    /// The failure message, if one was recorded.
    pub fn message(&self) -> Option<&str> {
        self.0.get(MESSAGE_FIELD).and_then(Value::as_str)
    }

    /// Whether a failure message is present. The orchestrator halts on this.
    pub fn has_message(&self) -> bool {
        self.0.contains_key(MESSAGE_FIELD)
    }

    /// Fold one per-item field map into the accumulator.
    ///
    /// For every field in `fields`: the accumulator entry is first coerced to
    /// a list (a missing entry becomes an empty list, an existing scalar
    /// becomes a singleton list, an existing empty scalar becomes an empty
    /// list), then list values are concatenated onto it and scalar values are
    /// appended as-is.
    pub fn fold(&mut self, fields: FieldMap) {
        for (field, incoming) in fields {
            let entry = self
                .0
                .entry(field)
                .or_insert_with(|| Value::Array(Vec::new()));

            if !entry.is_array() {
                let previous = entry.take();
                let seed = if is_empty_value(&previous) {
                    Vec::new()
                } else {
                    vec![previous]
                };
                *entry = Value::Array(seed);
            }

            if let Some(list) = entry.as_array_mut() {
                match incoming {
                    Value::Array(values) => list.extend(values),
                    scalar => list.push(scalar),
                }
            }
        }
    }

    /// Consume the accumulator, yielding the underlying map.
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl FromIterator<(String, Value)> for Accumulator {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Whether a value is "empty": null, `false`, zero, or an empty string,
/// list, or object. Empty scalars collapse to an empty list during coercion
/// instead of surviving as a singleton.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn fold_creates_list_for_new_field() {
        let mut acc = Accumulator::new();
        acc.fold(fields(&[("city", json!("台北"))]));
        assert_eq!(acc.get("city"), Some(&json!(["台北"])));
    }

    #[test]
    fn fold_extends_with_list_values() {
        let mut acc = Accumulator::new();
        acc.fold(fields(&[("city", json!(["台北", "高雄"]))]));
        acc.fold(fields(&[("city", json!(["台中"]))]));
        assert_eq!(acc.get("city"), Some(&json!(["台北", "高雄", "台中"])));
    }

    #[test]
    fn fold_scalar_then_list_preserves_order() {
        let mut acc = Accumulator::new();
        acc.fold(fields(&[("city", json!("台北"))]));
        acc.fold(fields(&[("city", json!(["高雄", "台中"]))]));
        assert_eq!(acc.get("city"), Some(&json!(["台北", "高雄", "台中"])));
    }

    #[test]
    fn fold_coerces_template_scalar_to_singleton() {
        let mut acc = Accumulator::new();
        acc.insert("city", json!("預設"));
        acc.fold(fields(&[("city", json!("台北"))]));
        assert_eq!(acc.get("city"), Some(&json!(["預設", "台北"])));
    }

    #[test]
    fn fold_drops_empty_template_scalar() {
        let mut acc = Accumulator::new();
        acc.insert("city", json!(""));
        acc.insert("count", json!(0));
        acc.insert("flag", json!(null));
        acc.fold(fields(&[
            ("city", json!("台北")),
            ("count", json!(2)),
            ("flag", json!(true)),
        ]));
        assert_eq!(acc.get("city"), Some(&json!(["台北"])));
        assert_eq!(acc.get("count"), Some(&json!([2])));
        assert_eq!(acc.get("flag"), Some(&json!([true])));
    }

    #[test]
    fn fold_appends_empty_scalar_values() {
        // Only the pre-existing entry gets the emptiness check; incoming
        // scalars are appended unconditionally.
        let mut acc = Accumulator::new();
        acc.fold(fields(&[("city", json!(""))]));
        assert_eq!(acc.get("city"), Some(&json!([""])));
    }

    #[test]
    fn fold_untouched_fields_survive() {
        let mut acc = Accumulator::new();
        acc.insert("untouched", json!(["原值"]));
        acc.fold(fields(&[("city", json!("台北"))]));
        assert_eq!(acc.get("untouched"), Some(&json!(["原值"])));
    }

    #[test]
    fn message_sentinel_roundtrip() {
        let mut acc = Accumulator::new();
        assert!(!acc.has_message());
        acc.set_message("401 Connection failed.");
        assert!(acc.has_message());
        assert_eq!(acc.message(), Some("401 Connection failed."));
    }

    #[test]
    fn template_copies_are_independent() {
        let mut template = Accumulator::new();
        template.insert("city", json!([]));
        let mut acc = Accumulator::from_template(&template);
        acc.fold(fields(&[("city", json!("台北"))]));
        assert_eq!(template.get("city"), Some(&json!([])));
        assert_eq!(acc.get("city"), Some(&json!(["台北"])));
    }

    #[test]
    fn serializes_as_plain_object() {
        let mut acc = Accumulator::new();
        acc.fold(fields(&[("city", json!("台北"))]));
        let encoded = serde_json::to_value(&acc).expect("should serialize");
        assert_eq!(encoded, json!({"city": ["台北"]}));
    }

    #[test]
    fn empty_value_classification() {
        for empty in [json!(null), json!(false), json!(0), json!(""), json!([]), json!({})] {
            assert!(is_empty_value(&empty), "{empty} should be empty");
        }
        for non_empty in [json!(true), json!(1), json!("x"), json!([0]), json!({"k": 0})] {
            assert!(!is_empty_value(&non_empty), "{non_empty} should not be empty");
        }
    }
}
