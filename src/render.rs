//! Type-directed rendering of evaluated values. Used identically on the local
//! and the remote side, so output is the same regardless of where evaluation
//! happened.

/// Closed set of value shapes the presenter knows how to render. Anything the
/// engine produces outside these shapes arrives as `Other` carrying its
/// default textual representation, which keeps `render` total.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Text(String),
    Seq(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Other(String),
}

/// Renders a value into its display string. Pure and infallible.
pub fn render(value: &Value) -> String {
    let mut out = String::new();
    render_into(value, &mut out);
    out
}

fn render_into(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Seq(items) => render_braced(items, out),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Text(text) => {
            out.push('"');
            for ch in text.chars() {
                if ch == '"' {
                    out.push('\\');
                }
                out.push(ch);
            }
            out.push('"');
        }
        Value::Map(entries) => {
            out.push_str("{ ");
            for (index, (key, value)) in entries.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                out.push_str("{ ");
                render_into(key, out);
                out.push_str(", ");
                render_into(value, out);
                out.push_str(" }");
            }
            out.push_str(" }");
        }
        Value::Char(ch) => render_char(*ch, out),
        Value::Int(number) => out.push_str(&number.to_string()),
        Value::Float(number) => out.push_str(&number.to_string()),
        Value::Other(text) => out.push_str(text),
    }
}

fn render_braced(items: &[Value], out: &mut String) {
    out.push_str("{ ");
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        render_into(item, out);
    }
    out.push_str(" }");
}

fn render_char(ch: char, out: &mut String) {
    match ch {
        '\u{7}' => out.push_str("'\\a'"),
        '\u{8}' => out.push_str("'\\b'"),
        '\n' => out.push_str("'\\n'"),
        '\u{b}' => out.push_str("'\\v'"),
        '\r' => out.push_str("'\\r'"),
        '\u{c}' => out.push_str("'\\f'"),
        // Historical quirk carried for output compatibility: the tab escape
        // is emitted without its closing quote.
        '\t' => out.push_str("'\\t"),
        ch if (ch as u32) > 32 => {
            out.push('\'');
            out.push(ch);
            out.push('\'');
        }
        ch => {
            out.push_str(&format!("'\\x{:02x}'", ch as u32));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_null_literal() {
        assert_eq!(render(&Value::Null), "null");
    }

    #[test]
    fn renders_sequence_in_enumeration_order() {
        let value = Value::Seq(vec![
            Value::Int(1),
            Value::Text("a".to_string()),
            Value::Null,
        ]);
        assert_eq!(render(&value), "{ 1, \"a\", null }");
    }

    #[test]
    fn renders_empty_sequence_with_inner_spaces() {
        assert_eq!(render(&Value::Seq(Vec::new())), "{  }");
    }

    #[test]
    fn renders_booleans_lowercase() {
        assert_eq!(render(&Value::Bool(true)), "true");
        assert_eq!(render(&Value::Bool(false)), "false");
    }

    #[test]
    fn escapes_only_embedded_double_quotes_in_text() {
        let value = Value::Text("say \"hi\"\\now".to_string());
        assert_eq!(render(&value), "\"say \\\"hi\\\"\\now\"");
    }

    #[test]
    fn renders_map_entries_as_nested_pairs() {
        let value = Value::Map(vec![
            (Value::Text("a".to_string()), Value::Int(1)),
            (Value::Text("b".to_string()), Value::Int(2)),
        ]);
        assert_eq!(render(&value), "{ { \"a\", 1 }, { \"b\", 2 } }");
    }

    #[test]
    fn renders_nested_sequences_recursively() {
        let value = Value::Seq(vec![Value::Seq(vec![Value::Int(1)]), Value::Seq(Vec::new())]);
        assert_eq!(render(&value), "{ { 1 }, {  } }");
    }

    #[test]
    fn renders_printable_char_single_quoted() {
        assert_eq!(render(&Value::Char('c')), "'c'");
        assert_eq!(render(&Value::Char('\'')), "'''");
    }

    #[test]
    fn renders_control_chars_with_conventional_escapes() {
        assert_eq!(render(&Value::Char('\u{7}')), "'\\a'");
        assert_eq!(render(&Value::Char('\u{8}')), "'\\b'");
        assert_eq!(render(&Value::Char('\n')), "'\\n'");
        assert_eq!(render(&Value::Char('\u{b}')), "'\\v'");
        assert_eq!(render(&Value::Char('\r')), "'\\r'");
        assert_eq!(render(&Value::Char('\u{c}')), "'\\f'");
    }

    #[test]
    fn tab_escape_stays_unterminated() {
        // Known asymmetry in the output format, deliberately not corrected.
        assert_eq!(render(&Value::Char('\t')), "'\\t");
    }

    #[test]
    fn renders_remaining_low_chars_as_lowercase_hex() {
        assert_eq!(render(&Value::Char('\u{0}')), "'\\x00'");
        assert_eq!(render(&Value::Char('\u{1b}')), "'\\x1b'");
        assert_eq!(render(&Value::Char(' ')), "'\\x20'");
    }

    #[test]
    fn falls_back_to_default_textual_representation() {
        assert_eq!(render(&Value::Int(-42)), "-42");
        assert_eq!(render(&Value::Float(2.5)), "2.5");
        assert_eq!(render(&Value::Other("<handle 0x7f>".to_string())), "<handle 0x7f>");
    }

    #[test]
    fn render_is_deterministic_across_calls() {
        let value = Value::Seq(vec![Value::Map(vec![(Value::Char('\t'), Value::Null)])]);
        let first = render(&value);
        let second = render(&value);
        assert_eq!(first, second);
        assert_eq!(first, "{ { '\\t, null } }");
    }
}
