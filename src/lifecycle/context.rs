use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::error::EngineError;

/// Arguments a command is invoked with, split into positionals, command
/// metadata and parsed options.
///
/// On the wire this is a flat JSON array `[args..., metadata, options]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationContext {
    pub args: Vec<String>,
    pub metadata: Map<String, Value>,
    pub options: Map<String, Value>,
}

/// Drop host-internal keys: anything starting with `_`, and `parent`.
pub fn strip_internal(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter(|(key, _)| !key.starts_with('_') && key != "parent")
        .collect()
}

impl InvocationContext {
    pub fn new(args: Vec<String>, metadata: Map<String, Value>, options: Map<String, Value>) -> Self {
        Self {
            args,
            metadata: strip_internal(metadata),
            options: strip_internal(options),
        }
    }

    /// Flatten into the raw argument vector.
    pub fn into_raw(self) -> Vec<Value> {
        let mut raw: Vec<Value> = self.args.into_iter().map(Value::String).collect();
        raw.push(Value::Object(strip_internal(self.metadata)));
        raw.push(Value::Object(strip_internal(self.options)));
        raw
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.clone().into_raw()).context("Failed to serialize invocation")
    }

    /// Split a raw argument vector: the last element is the options object,
    /// the one before it the metadata object, the rest positional arguments.
    pub fn from_raw(mut raw: Vec<Value>) -> Result<Self> {
        if raw.len() < 2 {
            return Err(EngineError::InvalidInvocation(format!(
                "expected at least 2 elements, got {}",
                raw.len()
            ))
            .into());
        }

        let options = match raw.pop() {
            Some(Value::Object(map)) => map,
            other => return Err(not_an_object("options", other).into()),
        };
        let metadata = match raw.pop() {
            Some(Value::Object(map)) => map,
            other => return Err(not_an_object("metadata", other).into()),
        };

        let args = raw
            .into_iter()
            .enumerate()
            .map(|(i, value)| match value {
                Value::String(s) => Ok(s),
                other => Err(EngineError::InvalidInvocation(format!(
                    "argument {} is not a string: {}",
                    i, other
                ))),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self::new(args, metadata, options))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidInvocation(format!("malformed JSON: {}", e)))?;
        match value {
            Value::Array(raw) => Self::from_raw(raw),
            other => Err(EngineError::InvalidInvocation(format!(
                "expected a JSON array, got {}",
                other
            ))
            .into()),
        }
    }
}

fn not_an_object(what: &str, value: Option<Value>) -> EngineError {
    let found = value.map_or_else(|| "nothing".to_string(), |v| v.to_string());
    EngineError::InvalidInvocation(format!("{} must be an object, got {}", what, found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::engine_error;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_from_raw_splits_trailing_objects() {
        let ctx = InvocationContext::from_raw(vec![
            json!("my-app"),
            json!({"name": "init"}),
            json!({"force": true}),
        ])
        .unwrap();

        assert_eq!(ctx.args, vec!["my-app"]);
        assert_eq!(ctx.metadata, object(json!({"name": "init"})));
        assert_eq!(ctx.options, object(json!({"force": true})));
    }

    #[test]
    fn test_from_raw_without_positionals() {
        let ctx = InvocationContext::from_raw(vec![json!({}), json!({})]).unwrap();
        assert!(ctx.args.is_empty());
    }

    #[test]
    fn test_from_raw_too_short_is_invalid() {
        let err = InvocationContext::from_raw(vec![json!({})]).unwrap_err();
        assert!(matches!(
            engine_error(&err),
            Some(EngineError::InvalidInvocation(_))
        ));
    }

    #[test]
    fn test_from_raw_non_object_trailer_is_invalid() {
        let err =
            InvocationContext::from_raw(vec![json!({}), json!("force")]).unwrap_err();
        assert!(matches!(
            engine_error(&err),
            Some(EngineError::InvalidInvocation(msg)) if msg.contains("options")
        ));

        let err = InvocationContext::from_raw(vec![json!(1), json!({})]).unwrap_err();
        assert!(matches!(
            engine_error(&err),
            Some(EngineError::InvalidInvocation(msg)) if msg.contains("metadata")
        ));
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        assert!(InvocationContext::from_json(r#"{"args": []}"#).is_err());
        assert!(InvocationContext::from_json("[1,").is_err());
    }

    #[test]
    fn test_internal_keys_never_cross() {
        let ctx = InvocationContext::new(
            vec!["my-app".into()],
            object(json!({"name": "init", "_events": {}, "parent": {"name": "pluck"}})),
            object(json!({"force": true, "_optionValues": {}, "_name": "x"})),
        );

        let json = ctx.to_json().unwrap();
        assert_eq!(json, r#"["my-app",{"name":"init"},{"force":true}]"#);
    }

    #[test]
    fn test_json_survives_the_boundary() {
        let ctx = InvocationContext::new(
            vec!["a b".into(), "--not-a-flag".into()],
            object(json!({"name": "init"})),
            object(json!({"force": true, "template": "vue", "depth": 2})),
        );

        let parsed = InvocationContext::from_json(&ctx.to_json().unwrap()).unwrap();
        assert_eq!(parsed, ctx);
    }
}
