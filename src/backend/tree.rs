//! JSON tree operations with the hosted database's semantics: `null` and
//! empty objects do not exist, and ordered queries compare children by
//! type first, then by value, then by key.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::{BackendResult, Query, segments};

pub fn read(root: &Value, path: &[String]) -> Option<Value> {
    let mut node = root;
    for segment in path {
        node = node.as_object()?.get(segment)?;
    }
    if is_empty(node) {
        None
    } else {
        Some(node.clone())
    }
}

pub fn write(root: &mut Value, path: &[String], value: Value) {
    let value = prune(value);
    write_pruned(root, path, value);
}

fn write_pruned(node: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() {
        if value.is_null() {
            map.remove(head);
        } else {
            map.insert(head.clone(), value);
        }
        return;
    }

    let child = map.entry(head.clone()).or_insert(Value::Null);
    write_pruned(child, rest, value);
    if is_empty(child) {
        map.remove(head);
    }
}

/// Applies every field of `fields` relative to `path`.
pub fn merge(root: &mut Value, path: &[String], fields: Map<String, Value>) -> BackendResult<()> {
    for (key, value) in fields {
        let mut target = path.to_vec();
        target.extend(segments(&key)?);
        write(root, &target, value);
    }
    Ok(())
}

/// Removes `null` members and empty objects, recursively.
pub fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, prune(value)))
                .filter(|(_, value)| !value.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) | Value::Object(_) => 5,
    }
}

pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    type_rank(a)
        .cmp(&type_rank(b))
        .then_with(|| match (a, b) {
            (Value::Number(a), Value::Number(b)) => {
                let a = a.as_f64().unwrap_or_default();
                let b = b.as_f64().unwrap_or_default();
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => Ordering::Equal,
        })
}

/// Integer-like keys sort numerically before every other key.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn child_value<'a>(value: &'a Value, child: &str) -> &'a Value {
    let mut node = value;
    for segment in child.split('/').filter(|s| !s.is_empty()) {
        match node.as_object().and_then(|map| map.get(segment)) {
            Some(next) => node = next,
            None => return &Value::Null,
        }
    }
    node
}

pub fn order_children(children: &mut [(String, Value)], order_by_child: Option<&str>) {
    children.sort_by(|(key_a, a), (key_b, b)| {
        let by_child = match order_by_child {
            Some(child) => compare_values(child_value(a, child), child_value(b, child)),
            None => Ordering::Equal,
        };
        by_child.then_with(|| compare_keys(key_a, key_b))
    });
}

/// Evaluates `query` against the children of `node`.
pub fn apply_query(node: Option<Value>, query: &Query) -> Vec<(String, Value)> {
    let Some(Value::Object(map)) = node else {
        return Vec::new();
    };

    let child = query.order_by_child.as_deref();
    let mut children: Vec<(String, Value)> = map
        .into_iter()
        .filter(|(_, value)| match (&query.equal_to, child) {
            (Some(expected), Some(child)) => {
                let actual = child_value(value, child);
                type_rank(actual) == type_rank(expected)
                    && compare_values(actual, expected) == Ordering::Equal
            }
            _ => true,
        })
        .collect();

    order_children(&mut children, child);

    if let Some(limit) = query.limit_to_last {
        let skip = children.len().saturating_sub(limit);
        children.drain(..skip);
    }

    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> Vec<String> {
        segments(p).unwrap()
    }

    #[test]
    fn write_then_read_nested() {
        let mut root = Value::Null;
        write(&mut root, &path("users/u1"), json!({ "firstName": "Maria" }));
        write(&mut root, &path("users/u2/username"), json!("ivan"));

        assert_eq!(
            read(&root, &path("users/u1/firstName")),
            Some(json!("Maria"))
        );
        assert_eq!(read(&root, &path("users/u2")), Some(json!({ "username": "ivan" })));
        assert_eq!(read(&root, &path("users/u3")), None);
    }

    #[test]
    fn writing_null_removes_and_prunes_parents() {
        let mut root = json!({ "posts": { "p1": { "title": "x" } } });
        write(&mut root, &path("posts/p1/title"), Value::Null);

        assert_eq!(read(&root, &path("posts")), None);
        assert_eq!(root, json!({}));
    }

    #[test]
    fn written_values_drop_null_members() {
        let mut root = Value::Null;
        write(
            &mut root,
            &path("users/u1"),
            json!({ "isAdmin": null, "email": "a@b.co", "meta": {} }),
        );
        assert_eq!(read(&root, &path("users/u1")), Some(json!({ "email": "a@b.co" })));
    }

    #[test]
    fn merge_deletes_null_fields_and_keeps_others() {
        let mut root = json!({ "users": { "u1": { "isBlocked": true, "email": "a@b.co" } } });
        let mut fields = Map::new();
        fields.insert("isBlocked".into(), Value::Null);
        fields.insert("isAdmin".into(), json!(true));
        merge(&mut root, &path("users/u1"), fields).unwrap();

        assert_eq!(
            read(&root, &path("users/u1")),
            Some(json!({ "email": "a@b.co", "isAdmin": true }))
        );
    }

    #[test]
    fn merge_accepts_relative_paths() {
        let mut root = Value::Null;
        let mut fields = Map::new();
        fields.insert("usersVoted/u1".into(), json!("likes"));
        merge(&mut root, &path("posts/p1"), fields).unwrap();

        assert_eq!(
            read(&root, &path("posts/p1/usersVoted/u1")),
            Some(json!("likes"))
        );
    }

    #[test]
    fn query_orders_by_child_and_keeps_last() {
        let node = json!({
            "a": { "commentCount": 3 },
            "b": { "commentCount": 1 },
            "c": { "commentCount": 7 },
            "d": {},
            "e": { "commentCount": 3 }
        });
        let query = Query::order_by_child("commentCount").limit_to_last(3);
        let keys: Vec<String> = apply_query(Some(node), &query)
            .into_iter()
            .map(|(key, _)| key)
            .collect();

        assert_eq!(keys, vec!["a", "e", "c"]);
    }

    #[test]
    fn query_filters_by_equality() {
        let node = json!({
            "p1": { "authorId": "u1" },
            "p2": { "authorId": "u2" },
            "p3": { "authorId": "u1" },
            "p4": { "authorId": 1 }
        });
        let query = Query::order_by_child("authorId").equal_to("u1");
        let keys: Vec<String> = apply_query(Some(node), &query)
            .into_iter()
            .map(|(key, _)| key)
            .collect();

        assert_eq!(keys, vec!["p1", "p3"]);
    }

    #[test]
    fn query_on_missing_node_is_empty() {
        assert!(apply_query(None, &Query::default()).is_empty());
        assert!(apply_query(Some(json!("leaf")), &Query::default()).is_empty());
    }

    #[test]
    fn values_compare_by_type_first() {
        assert_eq!(compare_values(&Value::Null, &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(true), &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!(10), &json!("1")), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
    }

    #[test]
    fn integer_keys_sort_first() {
        let mut keys = vec!["b", "10", "a", "2"];
        keys.sort_by(|a, b| compare_keys(a, b));
        assert_eq!(keys, vec!["2", "10", "a", "b"]);
    }
}
