//! # JSON Path Mutation
//!
//! Writes a value into a JSON document at a dotted path such as
//! `data.items[2].id`, creating containers along the way.
//!
//! Coercion is destructive: an intermediate key holding a scalar is replaced
//! with an empty object, an indexed key holding anything but an array is
//! replaced with an empty array, and a non-object array element on the way
//! down is replaced with an empty object. Arrays grow to reach the index,
//! padding with `null`, by at most [`MAX_INDEX_GROWTH`] elements per write.

use serde_json::{Map, Value};

/// How far past its current length a single write may grow an array.
pub const MAX_INDEX_GROWTH: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(&'a str, usize),
}

/// `name[digits]` is an indexed segment; everything else is a plain key.
fn parse_segment(part: &str) -> Segment<'_> {
    let indexed = part
        .strip_suffix(']')
        .and_then(|rest| rest.split_once('['))
        .filter(|(name, digits)| {
            !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !digits.is_empty()
                && digits.chars().all(|c| c.is_ascii_digit())
        })
        .and_then(|(name, digits)| digits.parse::<usize>().ok().map(|index| (name, index)));

    match indexed {
        Some((name, index)) => Segment::Index(name, index),
        None => Segment::Key(part),
    }
}

fn segments(path: &str) -> Vec<Segment<'_>> {
    path.split('.')
        .filter(|part| !part.is_empty())
        .map(parse_segment)
        .collect()
}

/// Slot for `key` inside `container`. Objects get the key inserted as `null`;
/// arrays accept numeric keys and grow to reach them. Scalars have no slots.
fn child_slot<'v>(container: &'v mut Value, key: &str) -> Option<&'v mut Value> {
    match container {
        Value::Object(map) => Some(map.entry(key.to_string()).or_insert(Value::Null)),
        Value::Array(items) => {
            let index = key.parse::<usize>().ok()?;
            if exceeds_growth(items.len(), index) {
                return None;
            }
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            items.get_mut(index)
        }
        _ => None,
    }
}

fn is_composite(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn exceeds_growth(len: usize, index: usize) -> bool {
    index > len.saturating_add(MAX_INDEX_GROWTH)
}

/// Walks the existing document along `segments` without writing and checks
/// that no array would have to grow past [`MAX_INDEX_GROWTH`]. Containers the
/// write would create or coerce count as empty.
fn growth_fits(root: &Value, segments: &[Segment<'_>]) -> bool {
    let mut current = Some(root);
    for segment in segments {
        match *segment {
            Segment::Key(key) => {
                current = match current {
                    Some(Value::Object(map)) => map.get(key).filter(|slot| is_composite(slot)),
                    Some(Value::Array(items)) => {
                        let Ok(index) = key.parse::<usize>() else {
                            return true;
                        };
                        if exceeds_growth(items.len(), index) {
                            return false;
                        }
                        items.get(index).filter(|slot| is_composite(slot))
                    }
                    _ => None,
                };
            }
            Segment::Index(key, index) => {
                let items = match current {
                    Some(Value::Object(map)) => map.get(key).and_then(Value::as_array),
                    Some(Value::Array(items)) => key
                        .parse::<usize>()
                        .ok()
                        .and_then(|slot| items.get(slot))
                        .and_then(Value::as_array),
                    _ => None,
                };
                if exceeds_growth(items.map_or(0, Vec::len), index) {
                    return false;
                }
                current = items.and_then(|items| items.get(index)).filter(|element| element.is_object());
            }
        }
    }
    true
}

/// Set `value` at `path` inside `root`.
///
/// Returns `false` when the path is empty, when an index lies more than
/// [`MAX_INDEX_GROWTH`] past the end of its array, or when the write cannot be
/// expressed in JSON (the root is a scalar, or a named key is addressed on an
/// array). `root` is left untouched in the first two cases.
pub fn set_json_path(root: &mut Value, path: &str, value: Value) -> bool {
    let segments = segments(path);
    let Some(last) = segments.len().checked_sub(1) else {
        return false;
    };
    if !growth_fits(root, &segments) {
        tracing::debug!(path, "array index too far past the end");
        return false;
    }

    let mut current = root;
    for (position, segment) in segments.into_iter().enumerate() {
        let terminal = position == last;
        match segment {
            Segment::Key(key) => {
                let Some(slot) = child_slot(current, key) else {
                    return false;
                };
                if terminal {
                    *slot = value;
                    return true;
                }
                if !is_composite(slot) {
                    *slot = Value::Object(Map::new());
                }
                current = slot;
            }
            Segment::Index(key, index) => {
                let Some(slot) = child_slot(current, key) else {
                    return false;
                };
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                let Some(items) = slot.as_array_mut() else {
                    return false;
                };
                if exceeds_growth(items.len(), index) {
                    return false;
                }
                if items.len() <= index {
                    items.resize(index + 1, Value::Null);
                }
                let element = &mut items[index];
                if terminal {
                    *element = value;
                    return true;
                }
                if !element.is_object() {
                    *element = Value::Object(Map::new());
                }
                current = element;
            }
        }
    }

    false
}

/// Read the value at `path`, following the same segment syntax as
/// [`set_json_path`]. Never creates anything.
pub fn get_json_path<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = root;
    for segment in segments(path) {
        current = match segment {
            Segment::Key(key) => match current {
                Value::Object(map) => map.get(key)?,
                Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            },
            Segment::Index(key, index) => current.get(key)?.get(index)?,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn sets_plain_key_and_reads_it_back() {
        let mut doc = json!({"a": {"b": 1}});
        assert!(set_json_path(&mut doc, "a.c", json!("9")));
        assert_eq!(doc, json!({"a": {"b": 1, "c": "9"}}));
        assert_eq!(get_json_path(&doc, "a.c"), Some(&json!("9")));
    }

    #[test]
    fn creates_missing_intermediate_objects() {
        let mut doc = json!({});
        assert!(set_json_path(&mut doc, "x.y.z", json!("v")));
        assert_eq!(doc, json!({"x": {"y": {"z": "v"}}}));
    }

    #[test]
    fn overwrites_scalar_on_the_way_down() {
        // Destructive by design: the number under "a" is discarded.
        let mut doc = json!({"a": 5});
        assert!(set_json_path(&mut doc, "a.b", json!("x")));
        assert_eq!(doc, json!({"a": {"b": "x"}}));
    }

    #[test]
    fn indexed_terminal_grows_array_with_nulls() {
        let mut doc = json!({"a": [1]});
        assert!(set_json_path(&mut doc, "a[2]", json!("v")));
        assert_eq!(doc, json!({"a": [1, null, "v"]}));
        assert_eq!(get_json_path(&doc, "a[2]"), Some(&json!("v")));
    }

    #[test]
    fn indexed_segment_replaces_non_array() {
        let mut doc = json!({"items": {"not": "an array"}});
        assert!(set_json_path(&mut doc, "items[0]", json!(true)));
        assert_eq!(doc, json!({"items": [true]}));
    }

    #[test]
    fn indexed_intermediate_creates_object_element() {
        let mut doc = json!({"data": {}});
        assert!(set_json_path(&mut doc, "data.items[1].id", json!("42")));
        assert_eq!(doc, json!({"data": {"items": [null, {"id": "42"}]}}));
    }

    #[test]
    fn indexed_intermediate_keeps_existing_object_element() {
        let mut doc = json!({"items": [{"id": 1, "name": "a"}]});
        assert!(set_json_path(&mut doc, "items[0].id", json!("2")));
        assert_eq!(doc, json!({"items": [{"id": "2", "name": "a"}]}));
    }

    #[test]
    fn numeric_plain_key_indexes_existing_array() {
        let mut doc = json!({"items": [{"id": 1}]});
        assert!(set_json_path(&mut doc, "items.0.id", json!("7")));
        assert_eq!(doc, json!({"items": [{"id": "7"}]}));
    }

    #[test]
    fn empty_path_fails() {
        let mut doc = json!({"a": 1});
        assert!(!set_json_path(&mut doc, "", json!("x")));
        assert!(!set_json_path(&mut doc, "...", json!("x")));
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn scalar_root_is_left_alone() {
        let mut doc = json!(5);
        assert!(!set_json_path(&mut doc, "a", json!("x")));
        assert_eq!(doc, json!(5));
    }

    #[test]
    fn bracket_without_name_is_a_plain_key() {
        let mut doc = json!({});
        assert!(set_json_path(&mut doc, "[0]", json!("x")));
        assert_eq!(doc, json!({"[0]": "x"}));
    }

    #[test]
    fn huge_index_is_refused_without_touching_the_document() {
        let mut doc = json!({"keep": true});
        assert!(!set_json_path(&mut doc, "items[2305843009213693951]", json!("x")));
        assert!(!set_json_path(&mut doc, "a.b.items[18446744073709551615].id", json!("x")));
        assert_eq!(doc, json!({"keep": true}));
    }

    #[test]
    fn plain_numeric_key_growth_is_bounded() {
        let mut doc = json!({"items": [1]});
        assert!(!set_json_path(&mut doc, "items.99999999999", json!("x")));
        assert_eq!(doc, json!({"items": [1]}));

        let reach = 1 + MAX_INDEX_GROWTH;
        assert!(set_json_path(&mut doc, &format!("items.{reach}"), json!("x")));
        assert_eq!(doc["items"].as_array().map(Vec::len), Some(reach + 1));
        assert_eq!(doc["items"][reach], json!("x"));
    }

    #[test]
    fn growth_limit_counts_from_the_current_length() {
        let mut doc = json!({"list": []});
        let path = format!("list[{}]", MAX_INDEX_GROWTH + 1);
        assert!(!set_json_path(&mut doc, &path, json!(1)));
        assert_eq!(doc, json!({"list": []}));

        assert!(set_json_path(&mut doc, &format!("list[{MAX_INDEX_GROWTH}]"), json!(1)));
        assert!(set_json_path(&mut doc, &path, json!(2)));
        assert_eq!(doc["list"][MAX_INDEX_GROWTH + 1], json!(2));
    }
}
