//! Binds an upstream JSON document into an `evalexpr` context.
//!
//! Nested fields are reachable through dotted names (`result.succ`,
//! `response.result.msg`, `items.0`). Objects are additionally bound as the
//! tuple of their keys, which is what `has(map, key)` inspects.

use evalexpr::{
    Context, ContextWithMutableFunctions, ContextWithMutableVariables, EvalexprError, EvalexprResult, Function,
    HashMapContext, Value,
};
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::error::EvaluationError;

/// Name the whole parsed response is bound to.
pub const RESPONSE_VARIABLE: &str = "response";

/// Helpers registered in every context; top-level fields with these names are not bound.
pub const HELPER_NAMES: [&str; 2] = ["contains", "has"];

/// Top-level fields become variables unless they collide with a helper or
/// with `response`, which always holds the full document.
pub fn build_context(document: Map<String, Json>) -> Result<HashMapContext, EvaluationError> {
    let mut context = HashMapContext::new();
    context
        .set_function("contains".to_owned(), Function::new(contains))
        .map_err(runtime)?;
    context
        .set_function("has".to_owned(), Function::new(has))
        .map_err(runtime)?;

    for (key, value) in document.iter() {
        if HELPER_NAMES.contains(&key.as_str()) || key == RESPONSE_VARIABLE {
            continue;
        }
        bind(&mut context, key, value)?;
    }
    bind(&mut context, RESPONSE_VARIABLE, &Json::Object(document))?;
    Ok(context)
}

fn bind(context: &mut HashMapContext, name: &str, value: &Json) -> Result<(), EvaluationError> {
    if context.get_value(name).is_some() {
        // a literal dotted key met the same nested path; first binding wins
        debug!("condition variable '{}' is already bound", name);
        return Ok(());
    }
    context.set_value(name.to_owned(), to_value(value)).map_err(runtime)?;

    match value {
        Json::Object(fields) => {
            for (key, child) in fields {
                bind(context, &format!("{}.{}", name, key), child)?;
            }
        }
        Json::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                bind(context, &format!("{}.{}", name, i), child)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// JSON to `evalexpr` value. Integers stay integers; an object becomes the tuple of its keys.
pub fn to_value(value: &Json) -> Value {
    match value {
        Json::Null => Value::Empty,
        Json::Bool(b) => Value::Boolean(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::Tuple(items.iter().map(to_value).collect()),
        Json::Object(fields) => Value::Tuple(fields.keys().cloned().map(Value::String).collect()),
    }
}

pub fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::Float(_) => "float",
        Value::Int(_) => "int",
        Value::Boolean(_) => "bool",
        Value::Tuple(_) => "tuple",
        Value::Empty => "empty",
    }
}

/// `contains(a, b)`: substring test on strings, membership test on tuples.
fn contains(argument: &Value) -> EvalexprResult<Value> {
    let args = argument.as_fixed_len_tuple(2)?;
    match (&args[0], &args[1]) {
        (Value::String(haystack), Value::String(needle)) => Ok(Value::Boolean(haystack.contains(needle.as_str()))),
        (Value::Tuple(items), needle) => Ok(Value::Boolean(items.contains(needle))),
        (other, _) => Err(EvalexprError::CustomMessage(format!(
            "contains() cannot search in a {}",
            value_kind(other)
        ))),
    }
}

/// `has(map, key)`: key existence on an object.
fn has(argument: &Value) -> EvalexprResult<Value> {
    let args = argument.as_fixed_len_tuple(2)?;
    let keys = args[0].as_tuple()?;
    let key = args[1].as_string()?;
    Ok(Value::Boolean(
        keys.iter().any(|k| matches!(k, Value::String(k) if *k == key)),
    ))
}

fn runtime(e: EvalexprError) -> EvaluationError {
    EvaluationError::Runtime(e.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn context(document: Json) -> HashMapContext {
        match document {
            Json::Object(fields) => build_context(fields).unwrap(),
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn nested_fields_get_dotted_names() {
        let ctx = context(json!({"result": {"succ": false, "items": [1, "two"]}, "code": 7}));

        assert_eq!(ctx.get_value("code"), Some(&Value::Int(7)));
        assert_eq!(ctx.get_value("result.succ"), Some(&Value::Boolean(false)));
        assert_eq!(ctx.get_value("result.items.1"), Some(&Value::String("two".to_owned())));
        assert_eq!(ctx.get_value("response.result.succ"), Some(&Value::Boolean(false)));
        assert_eq!(
            ctx.get_value("result"),
            Some(&Value::Tuple(vec![
                Value::String("items".to_owned()),
                Value::String("succ".to_owned())
            ]))
        );
    }

    #[test]
    fn helper_and_response_names_are_not_shadowed() {
        let ctx = context(json!({"contains": "x", "has": 1, "response": {"fake": true}, "msg": "m"}));

        assert!(ctx.get_value("contains").is_none());
        assert!(ctx.get_value("has").is_none());
        assert!(ctx.get_value("response.fake").is_none());
        assert_eq!(ctx.get_value("response.has"), Some(&Value::Int(1)));
        assert_eq!(ctx.get_value("msg"), Some(&Value::String("m".to_owned())));
    }

    #[test]
    fn null_and_fractional_numbers_convert() {
        assert_eq!(to_value(&json!(null)), Value::Empty);
        assert_eq!(to_value(&json!(1.5)), Value::Float(1.5));
        assert_eq!(to_value(&json!([true])), Value::Tuple(vec![Value::Boolean(true)]));
    }
}
