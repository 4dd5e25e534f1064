//! # Token Rules
//!
//! The only parts of the search grammar the builder owns: index names, field
//! names and value literals. Everything that is interpolated into a query goes
//! through here first.

use crate::spec::FieldValue;
use regex::Regex;
use std::sync::OnceLock;

fn index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_\-*]*$").expect("valid regex"))
}

fn field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.:\-]*$").expect("valid regex"))
}

fn bare_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.:/@*+\-]+$").expect("valid regex"))
}

/// Index names: letters, digits, `_`, `-`, and `*` wildcards. Internal
/// indexes (`_internal`, `_audit`) start with an underscore and are allowed.
pub fn is_valid_index(index: &str) -> bool {
    index_re().is_match(index)
}

pub fn is_valid_field(field: &str) -> bool {
    field_re().is_match(field)
}

/// Render a value literal, quoting it when it carries anything beyond the
/// bare-word character set.
pub fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Str(s) => quote_if_needed(s),
        other => other.to_string(),
    }
}

pub fn quote_if_needed(raw: &str) -> String {
    if bare_value_re().is_match(raw) {
        raw.to_string()
    } else {
        quote(raw)
    }
}

/// Double-quote `raw`, escaping backslashes and quotes.
pub fn quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_names() {
        for ok in ["events", "_internal", "avr_59k", "web-*", "main"] {
            assert!(is_valid_index(ok), "{ok}");
        }
        for bad in ["", "-web", "a b", "x\"", "x|delete", "idx=1"] {
            assert!(!is_valid_index(bad), "{bad}");
        }
    }

    #[test]
    fn test_field_names() {
        assert!(is_valid_field("src_ip"));
        assert!(is_valid_field("_time"));
        assert!(is_valid_field("data.user:name"));
        assert!(!is_valid_field("1abc"));
        assert!(!is_valid_field("a b"));
        assert!(!is_valid_field("a|b"));
    }

    #[test]
    fn test_values_are_quoted_only_when_needed() {
        assert_eq!(render_value(&FieldValue::from("active")), "active");
        assert_eq!(render_value(&FieldValue::from("10.0.0.1")), "10.0.0.1");
        assert_eq!(render_value(&FieldValue::from(100)), "100");
        assert_eq!(render_value(&FieldValue::from(2.5)), "2.5");
        assert_eq!(render_value(&FieldValue::from("two words")), "\"two words\"");
        assert_eq!(
            render_value(&FieldValue::from("x | delete")),
            "\"x | delete\""
        );
        assert_eq!(render_value(&FieldValue::from("say \"hi\"")), r#""say \"hi\"""#);
        assert_eq!(render_value(&FieldValue::from(r"C:\tmp")), r#""C:\\tmp""#);
    }
}
