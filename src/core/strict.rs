// Strict-mode helpers: duplicate-key aware value parsing and unknown-field detection.
use std::cell::RefCell;
use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};

/// Parses any self-describing input into a `Value`, recording duplicate mapping keys
/// instead of silently keeping the last one.
pub(crate) struct ValueSeed<'a> {
    duplicates: &'a RefCell<Vec<String>>,
    path: String,
}

impl<'a> ValueSeed<'a> {
    pub(crate) fn new(duplicates: &'a RefCell<Vec<String>>) -> Self {
        Self {
            duplicates,
            path: String::new(),
        }
    }

    fn child(&self, segment: &str) -> ValueSeed<'a> {
        ValueSeed {
            duplicates: self.duplicates,
            path: join_path(&self.path, segment),
        }
    }
}

fn join_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else if segment.starts_with('[') {
        format!("{parent}{segment}")
    } else {
        format!("{parent}.{segment}")
    }
}

impl<'de> DeserializeSeed<'de> for ValueSeed<'_> {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ValueSeed<'_> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any structured value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Number::from_f64(v).map(Value::Number).ok_or_else(|| {
            let at = if self.path.is_empty() { "document root" } else { self.path.as_str() };
            E::custom(format_args!("non-finite number {v} at {at} cannot be represented"))
        })
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element_seed(self.child(&format!("[{}]", items.len())))? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut object = Map::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(self.child(&key))?;
            if object.contains_key(&key) {
                self.duplicates.borrow_mut().push(join_path(&self.path, &key));
            }
            object.insert(key, value);
        }
        Ok(Value::Object(object))
    }
}

/// Stand-in value used to ask the target type whether it reads a field.
const FIELD_MARKER: &str = "\u{0}scheme-codec-field-marker";

#[derive(Clone, Debug, Eq, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Paths present in `input` that the target type does not read.
///
/// `retained` is the typed round trip of `input`. `reload` decodes a candidate document into
/// a fresh object of the same type and returns its round trip, or `None` when the type
/// rejects the candidate. A path missing from `retained` is still known when putting a marker
/// in its place makes the type fail or keep the marker, so fields skipped on serialization
/// (zero values, `None`) are not reported.
pub(crate) fn unknown_fields(
    input: &Value,
    retained: &Value,
    mut reload: impl FnMut(Value) -> Option<Value>,
) -> Vec<String> {
    let mut dropped = Vec::new();
    collect_dropped(input, retained, &mut Vec::new(), &mut dropped);
    dropped
        .into_iter()
        .filter(|path| {
            let mut candidate = input.clone();
            if let Some(slot) = lookup_mut(&mut candidate, path) {
                *slot = Value::String(FIELD_MARKER.to_string());
            }
            match reload(candidate) {
                Some(round_trip) => lookup(&round_trip, path).is_none(),
                None => false,
            }
        })
        .map(|path| render_path(&path))
        .collect()
}

fn collect_dropped(
    input: &Value,
    retained: &Value,
    path: &mut Vec<Segment>,
    out: &mut Vec<Vec<Segment>>,
) {
    match (input, retained) {
        (Value::Object(input), Value::Object(retained)) => {
            for (key, value) in input {
                path.push(Segment::Key(key.clone()));
                match retained.get(key) {
                    Some(kept) => collect_dropped(value, kept, path, out),
                    None => out.push(path.clone()),
                }
                path.pop();
            }
        }
        (Value::Array(input), Value::Array(retained)) => {
            for (index, (value, kept)) in input.iter().zip(retained).enumerate() {
                path.push(Segment::Index(index));
                collect_dropped(value, kept, path, out);
                path.pop();
            }
        }
        _ => {}
    }
}

fn lookup<'v>(value: &'v Value, path: &[Segment]) -> Option<&'v Value> {
    path.iter().try_fold(value, |current, segment| match segment {
        Segment::Key(key) => current.get(key.as_str()),
        Segment::Index(index) => current.get(*index),
    })
}

fn lookup_mut<'v>(value: &'v mut Value, path: &[Segment]) -> Option<&'v mut Value> {
    path.iter().try_fold(value, |current, segment| match segment {
        Segment::Key(key) => current.get_mut(key.as_str()),
        Segment::Index(index) => current.get_mut(*index),
    })
}

fn render_path(path: &[Segment]) -> String {
    path.iter().fold(String::new(), |out, segment| match segment {
        Segment::Key(key) => join_path(&out, key),
        Segment::Index(index) => join_path(&out, &format!("[{index}]")),
    })
}

#[cfg(test)]
mod tests {
    use super::{ValueSeed, unknown_fields};
    use serde::de::DeserializeSeed;
    use serde_json::{Value, json};
    use std::cell::RefCell;

    fn parse_json(input: &str) -> (Value, Vec<String>) {
        let duplicates = RefCell::new(Vec::new());
        let mut de = serde_json::Deserializer::from_str(input);
        let value = ValueSeed::new(&duplicates).deserialize(&mut de).unwrap();
        (value, duplicates.into_inner())
    }

    fn parse_yaml(input: &str) -> (Value, Vec<String>) {
        let duplicates = RefCell::new(Vec::new());
        let value = ValueSeed::new(&duplicates)
            .deserialize(serde_yaml::Deserializer::from_str(input))
            .unwrap();
        (value, duplicates.into_inner())
    }

    #[test]
    fn json_duplicates_are_recorded_with_paths() {
        let (value, duplicates) = parse_json(r#"{"a":1,"b":{"c":1,"c":2},"a":3}"#);
        assert_eq!(value, json!({"a": 3, "b": {"c": 2}}));
        assert_eq!(duplicates, vec!["b.c", "a"]);
    }

    #[test]
    fn yaml_duplicates_are_recorded() {
        let (value, duplicates) = parse_yaml("testString: foo\ntestString: bar\nitems:\n- x: 1\n");
        assert_eq!(value["testString"], json!("bar"));
        assert_eq!(value["items"], json!([{"x": 1}]));
        assert_eq!(duplicates, vec!["testString"]);
    }

    /// Round trip of a type that reads `kind`, `count` (an integer, skipped when zero) and
    /// `items[].a`.
    fn reload(candidate: Value) -> Option<Value> {
        let mut out = serde_json::Map::new();
        out.insert("kind".into(), candidate.get("kind")?.clone());
        if let Some(count) = candidate.get("count") {
            let count = count.as_i64()?;
            if count != 0 {
                out.insert("count".into(), json!(count));
            }
        }
        if let Some(items) = candidate.get("items") {
            let items: Vec<Value> = items
                .as_array()?
                .iter()
                .map(|item| json!({"a": item.get("a").cloned().unwrap_or(Value::Null)}))
                .collect();
            out.insert("items".into(), Value::Array(items));
        }
        Some(Value::Object(out))
    }

    #[test]
    fn unknown_fields_report_zero_values_too() {
        let input = json!({"kind": "Simple", "extra": "bar", "empty": "", "zero": 0, "off": false, "none": null, "map": {}});
        let retained = reload(input.clone()).unwrap();
        assert_eq!(
            unknown_fields(&input, &retained, reload),
            vec!["extra", "empty", "zero", "off", "none", "map"]
        );
    }

    #[test]
    fn skipped_known_fields_are_not_reported() {
        let input = json!({"kind": "Simple", "count": 0});
        let retained = reload(input.clone()).unwrap();
        assert_eq!(retained, json!({"kind": "Simple"}));
        assert!(unknown_fields(&input, &retained, reload).is_empty());
    }

    #[test]
    fn unknown_fields_walk_arrays() {
        let input = json!({"kind": "Simple", "items": [{"a": 1}, {"a": 1, "b": true}]});
        let retained = reload(input.clone()).unwrap();
        assert_eq!(unknown_fields(&input, &retained, reload), vec!["items[1].b"]);
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let duplicates = RefCell::new(Vec::new());
        let err = ValueSeed::new(&duplicates)
            .deserialize(serde_yaml::Deserializer::from_str("ratio: .nan\n"))
            .unwrap_err();
        assert!(err.to_string().contains("non-finite number"), "{err}");
    }
}
