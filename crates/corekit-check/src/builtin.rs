//! Built-in check set.
//!
//! Every built-in is a row in one of two tables: simple predicates (some of
//! them descriptive) and extended predicates with an arity. `isAny` is the
//! catch-all descriptive check and guarantees that descriptive matching
//! succeeds for every value.

use crate::check::{ArgumentError, Arity, Check};
use crate::registry::CheckRegistry;
use crate::value::Value;
use regex::Regex;
use serde_json::Value as Json;

pub const DEFAULT_PREVIEW_CHARS: usize = 32;

/// Name of the catch-all descriptive check.
pub const CATCH_ALL: &str = "isAny";

type Predicate = fn(&Value) -> bool;
type Describer = fn(&Value, usize) -> String;
type ExtendedPredicate = fn(&Value, &[Json]) -> Result<bool, ArgumentError>;

/// (name, predicate, descriptor priority and renderer)
const SIMPLE_CHECKS: &[(&str, Predicate, Option<(i32, Describer)>)] = &[
    ("isNull", is_null, Some((10, describe_null))),
    ("isBoolean", is_boolean, Some((20, describe_boolean))),
    ("isTrue", is_true, None),
    ("isFalse", is_false, None),
    ("isInteger", is_integer, Some((30, describe_integer))),
    ("isNumber", is_number, Some((40, describe_number))),
    ("isPositive", is_positive, None),
    ("isNegative", is_negative, None),
    ("isString", is_string, Some((50, describe_string))),
    ("isNonEmptyString", is_non_empty_string, None),
    ("isEmpty", is_empty, None),
    ("isArray", is_array, Some((60, describe_array))),
    ("isInstance", is_instance, Some((70, describe_instance))),
    ("isPlainObject", is_plain_object, Some((80, describe_object))),
    ("isObject", is_object, None),
    ("isScalar", is_scalar, None),
    (CATCH_ALL, is_any, Some((1000, describe_any))),
];

const EXTENDED_CHECKS: &[(&str, Arity, ExtendedPredicate)] = &[
    ("isInstanceOf", Arity::exactly(1), is_instance_of),
    ("isOneOf", Arity::at_least(1), is_one_of),
    ("matchesRegex", Arity::exactly(1), matches_regex),
    ("hasLength", Arity::exactly(1), has_length),
    ("hasMinLength", Arity::exactly(1), has_min_length),
    ("hasMaxLength", Arity::exactly(1), has_max_length),
    ("isGreaterThan", Arity::exactly(1), is_greater_than),
    ("isLessThan", Arity::exactly(1), is_less_than),
    ("isBetween", Arity::exactly(2), is_between),
    ("hasKey", Arity::exactly(1), has_key),
    ("isArrayOf", Arity::exactly(1), is_array_of),
];

/// Build the built-in checks. String previews are cut at `preview_chars`.
pub fn checks(preview_chars: usize) -> Vec<Check> {
    let simple = SIMPLE_CHECKS.iter().map(|&(name, eval, descriptor)| {
        let check = Check::simple(name, eval);
        match descriptor {
            Some((priority, describe)) => {
                check.describing(priority, move |value| describe(value, preview_chars))
            }
            None => check,
        }
    });
    let extended = EXTENDED_CHECKS
        .iter()
        .map(|&(name, arity, eval)| Check::extended(name, arity, eval));
    simple.chain(extended).collect()
}

pub(crate) fn register_all(registry: &CheckRegistry, preview_chars: usize) {
    for check in checks(preview_chars) {
        registry
            .register(check)
            .expect("built-in check names are unique");
    }
}

// ─── Simple predicates ─────────────────────────────────────────────────────

fn data(value: &Value) -> Option<&Json> {
    value.as_json()
}

fn is_null(value: &Value) -> bool {
    value.is_null()
}

fn is_boolean(value: &Value) -> bool {
    matches!(data(value), Some(Json::Bool(_)))
}

fn is_true(value: &Value) -> bool {
    value.as_bool() == Some(true)
}

fn is_false(value: &Value) -> bool {
    value.as_bool() == Some(false)
}

fn is_number(value: &Value) -> bool {
    matches!(data(value), Some(Json::Number(_)))
}

fn is_integer(value: &Value) -> bool {
    match data(value) {
        Some(Json::Number(n)) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
        }
        _ => false,
    }
}

fn is_positive(value: &Value) -> bool {
    value.as_f64().is_some_and(|n| n > 0.0)
}

fn is_negative(value: &Value) -> bool {
    value.as_f64().is_some_and(|n| n < 0.0)
}

fn is_string(value: &Value) -> bool {
    matches!(data(value), Some(Json::String(_)))
}

fn is_non_empty_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.is_empty())
}

/// Null, `""`, `[]` and `{}`.
fn is_empty(value: &Value) -> bool {
    match data(value) {
        Some(Json::Null) => true,
        Some(Json::String(s)) => s.is_empty(),
        Some(Json::Array(items)) => items.is_empty(),
        Some(Json::Object(map)) => map.is_empty(),
        _ => false,
    }
}

fn is_array(value: &Value) -> bool {
    matches!(data(value), Some(Json::Array(_)))
}

fn is_instance(value: &Value) -> bool {
    value.as_object().is_some()
}

fn is_plain_object(value: &Value) -> bool {
    matches!(data(value), Some(Json::Object(_)))
}

fn is_object(value: &Value) -> bool {
    is_plain_object(value) || is_instance(value)
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        data(value),
        Some(Json::Null | Json::Bool(_) | Json::Number(_) | Json::String(_))
    )
}

fn is_any(_: &Value) -> bool {
    true
}

// ─── Descriptors ───────────────────────────────────────────────────────────

fn describe_null(_: &Value, _: usize) -> String {
    "Null".to_string()
}

fn describe_boolean(value: &Value, _: usize) -> String {
    format!("Boolean ({})", value.as_bool().unwrap_or_default())
}

fn describe_integer(value: &Value, _: usize) -> String {
    match data(value) {
        Some(n) => format!("Integer ({n})"),
        None => "Integer".to_string(),
    }
}

fn describe_number(value: &Value, _: usize) -> String {
    match data(value) {
        Some(n) => format!("Number ({n})"),
        None => "Number".to_string(),
    }
}

fn describe_string(value: &Value, preview_chars: usize) -> String {
    let s = value.as_str().unwrap_or_default();
    let length = s.chars().count();
    if length == 0 {
        return "Empty string".to_string();
    }
    if length <= preview_chars {
        return format!("String ({s:?})");
    }
    let preview: String = s.chars().take(preview_chars).collect();
    format!("String ({preview:?}…, length={length})")
}

fn describe_array(value: &Value, _: usize) -> String {
    match data(value) {
        Some(Json::Array(items)) => format!("Array (length={})", items.len()),
        _ => "Array".to_string(),
    }
}

fn describe_instance(value: &Value, _: usize) -> String {
    match value.as_object() {
        Some(object) => format!("Instance of {}", object.class_name()),
        None => "Instance".to_string(),
    }
}

fn describe_object(value: &Value, _: usize) -> String {
    match data(value) {
        Some(Json::Object(map)) => format!("Object (keys={})", map.len()),
        _ => "Object".to_string(),
    }
}

fn describe_any(value: &Value, _: usize) -> String {
    format!("Value of type {}", value.type_name())
}

// ─── Extended predicates ───────────────────────────────────────────────────

fn string_arg<'a>(args: &'a [Json], index: usize, what: &str) -> Result<&'a str, ArgumentError> {
    args.get(index)
        .and_then(Json::as_str)
        .ok_or_else(|| ArgumentError::new(format!("{what} must be a string")))
}

fn number_arg(args: &[Json], index: usize, what: &str) -> Result<f64, ArgumentError> {
    args.get(index)
        .and_then(Json::as_f64)
        .ok_or_else(|| ArgumentError::new(format!("{what} must be a number")))
}

fn length_arg(args: &[Json], index: usize) -> Result<usize, ArgumentError> {
    args.get(index)
        .and_then(Json::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| ArgumentError::new("length must be a non-negative integer"))
}

/// Length of a string (in characters), array or object.
fn length_of(value: &Value) -> Option<usize> {
    match data(value)? {
        Json::String(s) => Some(s.chars().count()),
        Json::Array(items) => Some(items.len()),
        Json::Object(map) => Some(map.len()),
        _ => None,
    }
}

fn is_instance_of(value: &Value, args: &[Json]) -> Result<bool, ArgumentError> {
    let class_name = string_arg(args, 0, "class name")?;
    Ok(value
        .as_object()
        .is_some_and(|object| object.is_instance_of(class_name)))
}

fn is_one_of(value: &Value, args: &[Json]) -> Result<bool, ArgumentError> {
    Ok(data(value).is_some_and(|v| args.contains(v)))
}

fn matches_regex(value: &Value, args: &[Json]) -> Result<bool, ArgumentError> {
    let pattern = string_arg(args, 0, "pattern")?;
    let regex = Regex::new(pattern)
        .map_err(|e| ArgumentError::new(format!("invalid pattern {pattern:?}: {e}")))?;
    Ok(value.as_str().is_some_and(|s| regex.is_match(s)))
}

fn has_length(value: &Value, args: &[Json]) -> Result<bool, ArgumentError> {
    let expected = length_arg(args, 0)?;
    Ok(length_of(value) == Some(expected))
}

fn has_min_length(value: &Value, args: &[Json]) -> Result<bool, ArgumentError> {
    let min = length_arg(args, 0)?;
    Ok(length_of(value).is_some_and(|n| n >= min))
}

fn has_max_length(value: &Value, args: &[Json]) -> Result<bool, ArgumentError> {
    let max = length_arg(args, 0)?;
    Ok(length_of(value).is_some_and(|n| n <= max))
}

fn is_greater_than(value: &Value, args: &[Json]) -> Result<bool, ArgumentError> {
    let bound = number_arg(args, 0, "bound")?;
    Ok(value.as_f64().is_some_and(|n| n > bound))
}

fn is_less_than(value: &Value, args: &[Json]) -> Result<bool, ArgumentError> {
    let bound = number_arg(args, 0, "bound")?;
    Ok(value.as_f64().is_some_and(|n| n < bound))
}

/// Inclusive on both ends.
fn is_between(value: &Value, args: &[Json]) -> Result<bool, ArgumentError> {
    let min = number_arg(args, 0, "minimum")?;
    let max = number_arg(args, 1, "maximum")?;
    if min > max {
        return Err(ArgumentError::new(format!(
            "minimum {min} is greater than maximum {max}"
        )));
    }
    Ok(value.as_f64().is_some_and(|n| (min..=max).contains(&n)))
}

fn has_key(value: &Value, args: &[Json]) -> Result<bool, ArgumentError> {
    let key = string_arg(args, 0, "key")?;
    Ok(matches!(data(value), Some(Json::Object(map)) if map.contains_key(key)))
}

fn is_array_of(value: &Value, args: &[Json]) -> Result<bool, ArgumentError> {
    let type_name = string_arg(args, 0, "type name")?;
    let is_kind: fn(&Json) -> bool = match type_name {
        "null" => Json::is_null,
        "boolean" => Json::is_boolean,
        "number" => Json::is_number,
        "string" => Json::is_string,
        "array" => Json::is_array,
        "object" => Json::is_object,
        other => {
            return Err(ArgumentError::new(format!("unknown JSON type {other:?}")));
        }
    };
    Ok(matches!(data(value), Some(Json::Array(items)) if items.iter().all(is_kind)))
}
