//! printf-style message formatting for thrown errors.
//!
//! Supported directives: `%s` (string), `%d`/`%i` (integer), `%f` (float),
//! `%j`/`%o` (JSON) and `%%`. A directive without a matching argument is
//! left as written; surplus arguments are appended, separated by spaces.

use corekit_check::Value;
use serde_json::Value as Json;

pub fn format_message(template: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(&directive) = chars.peek() else {
            out.push('%');
            break;
        };
        if directive == '%' {
            chars.next();
            out.push('%');
            continue;
        }
        if !matches!(directive, 's' | 'd' | 'i' | 'f' | 'j' | 'o') {
            out.push('%');
            continue;
        }
        chars.next();
        match args.next() {
            Some(arg) => out.push_str(&render(directive, arg)),
            None => {
                out.push('%');
                out.push(directive);
            }
        }
    }

    for arg in args {
        out.push(' ');
        out.push_str(&render('s', arg));
    }
    out
}

fn render(directive: char, value: &Value) -> String {
    match directive {
        's' => match value {
            Value::Json(Json::String(s)) => s.clone(),
            Value::Object(object) => format!("[{}]", object.class_name()),
            Value::Json(json) => json.to_string(),
        },
        'd' | 'i' => match value.as_f64() {
            Some(n) if n.is_finite() => format!("{}", n.trunc() as i64),
            _ => "NaN".to_string(),
        },
        'f' => match value.as_f64() {
            Some(n) => n.to_string(),
            None => "NaN".to_string(),
        },
        _ => value.to_json().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_directives_in_order() {
        let message = format_message(
            "%s not found in %s (%d entries, %f%% full)",
            &[
                Value::from("config.toml"),
                Value::from("/etc"),
                Value::from(12.7),
                Value::from(0.5),
            ],
        );
        assert_eq!(message, "config.toml not found in /etc (12 entries, 0.5% full)");
    }

    #[test]
    fn json_directives_serialise() {
        let message = format_message("got %j", &[Value::Json(json!({"a": [1, 2]}))]);
        assert_eq!(message, r#"got {"a":[1,2]}"#);
    }

    #[test]
    fn missing_and_surplus_arguments() {
        assert_eq!(format_message("%s and %s", &[Value::from("one")]), "one and %s");
        assert_eq!(
            format_message("done", &[Value::from(1), Value::from("extra")]),
            "done 1 extra"
        );
        assert_eq!(format_message("%d", &[Value::from("abc")]), "NaN");
        assert_eq!(format_message("100%", &[]), "100%");
        assert_eq!(format_message("%x", &[]), "%x");
    }
}
