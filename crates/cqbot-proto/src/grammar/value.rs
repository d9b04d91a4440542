//! Option values and coercion.

use std::collections::BTreeMap;
use std::fmt;

use super::decl::OptionDecl;

/// Parsed options keyed by camelCase option name.
pub type Options = BTreeMap<String, OptionValue>;

/// The value of one option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// A flag, or a negated flag.
    Bool(bool),
    /// A numeric-looking parameter.
    Number(f64),
    /// Any other parameter, or a parameter of a string-typed option.
    String(String),
}

impl OptionValue {
    /// The flag value, if this is a flag.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The number, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The string, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Loose truthiness: `false`, `0`, NaN and the empty string are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            OptionValue::Bool(b) => *b,
            OptionValue::Number(n) => *n != 0.0 && !n.is_nan(),
            OptionValue::String(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Number(n) => write!(f, "{n}"),
            OptionValue::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<f64> for OptionValue {
    fn from(n: f64) -> Self {
        OptionValue::Number(n)
    }
}

impl From<i64> for OptionValue {
    fn from(n: i64) -> Self {
        OptionValue::Number(n as f64)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::String(s.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::String(s)
    }
}

/// A raw option parameter: either implied by the flag's presence or text.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Param<'a> {
    Implied,
    Text(&'a str),
}

/// Coerces a raw parameter according to the option's declaration.
pub(crate) fn parse_value(param: Param<'_>, decl: Option<&OptionDecl>, quoted: bool) -> OptionValue {
    let text = match param {
        Param::Text("") if quoted => return OptionValue::String(String::new()),
        Param::Implied | Param::Text("") => {
            if let Some(default) = decl.and_then(|d| d.settings.default.clone()) {
                return default;
            }
            if decl.is_some_and(|d| d.settings.is_string) {
                return OptionValue::String(String::new());
            }
            return OptionValue::Bool(true);
        }
        Param::Text(text) => text,
    };

    if decl.is_some_and(|d| d.settings.is_string) {
        return OptionValue::String(text.to_owned());
    }
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => OptionValue::Number(n),
        _ => OptionValue::String(text.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::OptionSettings;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(parse_value(Param::Text("10"), None, false), OptionValue::Number(10.0));
        assert_eq!(parse_value(Param::Text("1e3"), None, false), OptionValue::Number(1000.0));
        assert_eq!(parse_value(Param::Text("inf"), None, false), OptionValue::from("inf"));
        assert_eq!(parse_value(Param::Text("abc"), None, false), OptionValue::from("abc"));
    }

    #[test]
    fn test_implied_values() {
        let string_opt = OptionDecl::parse(
            "-a [alpha]",
            "",
            OptionSettings {
                is_string: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(parse_value(Param::Implied, None, false), OptionValue::Bool(true));
        assert_eq!(parse_value(Param::Implied, Some(&string_opt), false), OptionValue::from(""));
        assert_eq!(parse_value(Param::Text("123"), Some(&string_opt), false), OptionValue::from("123"));
        assert_eq!(parse_value(Param::Text(""), None, true), OptionValue::from(""));
    }

    #[test]
    fn test_truthiness() {
        assert!(!OptionValue::Number(0.0).is_truthy());
        assert!(!OptionValue::from("").is_truthy());
        assert!(OptionValue::from("x").is_truthy());
    }
}
