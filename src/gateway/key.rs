//! Canonical cache keys for read requests.
//!
//! A key is `<route-path>:<json object of the route's key fields>`, with the
//! fields written in the route's declared order. Parameters outside the field
//! list are ignored and absent fields are omitted, so two requests that differ
//! only in parameter order share one key.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::Result;

/// Request parameters as received by a read route.
pub type QueryParams = HashMap<String, Value>;

pub fn build_key(path: &str, fields: &[String], params: &QueryParams) -> Result<String> {
    let mut key = String::with_capacity(path.len() + 2 + fields.len() * 16);
    key.push_str(path);
    key.push_str(":{");

    let mut first = true;
    for field in fields {
        let Some(value) = params.get(field) else {
            continue;
        };
        if !first {
            key.push(',');
        }
        first = false;
        key.push_str(&serde_json::to_string(field)?);
        key.push(':');
        key.push_str(&serde_json::to_string(value)?);
    }

    key.push('}');
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn params(pairs: &[(&str, Value)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_parameter_order_does_not_matter() {
        let fields = fields(&["q", "limit", "setName"]);
        let a = params(&[("q", json!("Char")), ("setName", json!("Base"))]);
        let b = params(&[("setName", json!("Base")), ("q", json!("Char"))]);

        let key_a = build_key("/api/search/cards", &fields, &a).unwrap();
        let key_b = build_key("/api/search/cards", &fields, &b).unwrap();

        assert_eq!(key_a, key_b);
        assert_eq!(key_a, r#"/api/search/cards:{"q":"Char","setName":"Base"}"#);
    }

    #[test]
    fn test_fields_follow_declared_order() {
        let fields = fields(&["year", "q"]);
        let p = params(&[("q", json!("pika")), ("year", json!(1999))]);
        assert_eq!(
            build_key("/api/cards", &fields, &p).unwrap(),
            r#"/api/cards:{"year":1999,"q":"pika"}"#
        );
    }

    #[test]
    fn test_unlisted_params_ignored() {
        let fields = fields(&["q"]);
        let p = params(&[("q", json!("x")), ("callback", json!("jsonp"))]);
        assert_eq!(build_key("/api/cards", &fields, &p).unwrap(), r#"/api/cards:{"q":"x"}"#);
    }

    #[test]
    fn test_paths_never_collide() {
        let fields = fields(&["q"]);
        let p = params(&[("q", json!("x"))]);
        assert_ne!(
            build_key("/api/cards", &fields, &p).unwrap(),
            build_key("/api/sets", &fields, &p).unwrap()
        );
    }

    #[test]
    fn test_values_are_escaped() {
        let fields = fields(&["q"]);
        let p = params(&[("q", json!("a\",\"b"))]);
        assert_eq!(
            build_key("/api/cards", &fields, &p).unwrap(),
            r#"/api/cards:{"q":"a\",\"b"}"#
        );
    }
}
