//! Dashboard template variable substitution.
//!
//! Panel requests carry a scope of variable bindings; query fields may
//! reference them as `$name` or `${name}`. Substitution applies one of
//! three formats: plain text, CSV expansion (multi-value variables join
//! with commas for the caller to re-split), or regex-safe encoding
//! (metacharacters escaped, multi-value variables become an alternation
//! group).

use serde::Deserialize;
use std::collections::HashMap;

/// A variable binding supplied by the panel layer. Multi-value variables
/// carry every selected value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Single(String),
    Multi(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScopedVar {
    #[serde(default)]
    pub text: Option<String>,
    pub value: VarValue,
}

pub type ScopedVars = HashMap<String, ScopedVar>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Plain,
    Csv,
    Regex,
}

/// Replaces every `$name` / `${name}` reference bound in `scope`.
/// Unbound references are left untouched.
pub fn replace(input: &str, scope: &ScopedVars, format: Format) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let tail = &rest[dollar..];

        match read_reference(tail) {
            Some((name, consumed)) => {
                match scope.get(name) {
                    Some(var) => out.push_str(&format_value(&var.value, format)),
                    None => out.push_str(&tail[..consumed]),
                }
                rest = &tail[consumed..];
            }
            None => {
                out.push('$');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Parses a variable reference at the start of `input` (which begins with
/// `$`). Returns the variable name and the total consumed length.
fn read_reference(input: &str) -> Option<(&str, usize)> {
    let rest = &input[1..];
    if let Some(stripped) = rest.strip_prefix('{') {
        let end = stripped.find('}')?;
        let name = &stripped[..end];
        if name.is_empty() || !name.bytes().all(is_name_byte) {
            return None;
        }
        return Some((name, name.len() + 3));
    }

    let len = rest.bytes().take_while(|b| is_name_byte(*b)).count();
    if len == 0 {
        return None;
    }
    Some((&rest[..len], len + 1))
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn format_value(value: &VarValue, format: Format) -> String {
    match (value, format) {
        (VarValue::Single(v), Format::Plain | Format::Csv) => v.clone(),
        (VarValue::Single(v), Format::Regex) => escape_regex(v),
        (VarValue::Multi(values), Format::Plain | Format::Csv) => values.join(","),
        (VarValue::Multi(values), Format::Regex) => {
            let escaped: Vec<String> = values.iter().map(|v| escape_regex(v)).collect();
            format!("({})", escaped.join("|"))
        }
    }
}

fn escape_regex(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(
            ch,
            '\\' | '^' | '$' | '.' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
