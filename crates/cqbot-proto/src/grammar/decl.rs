//! Argument and option declarations.

use std::collections::HashMap;

use crate::error::{ProtocolError, Result};
use crate::util::camel_case;

use super::value::{OptionValue, Options};

/// One positional argument slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgDecl {
    /// Display name.
    pub name: String,
    /// Declared with angle brackets.
    pub required: bool,
    /// `...name`: collects every remaining token.
    pub variadic: bool,
    /// `name...`: takes the rest of the line verbatim.
    pub greedy: bool,
}

impl ArgDecl {
    fn from_bracket(inner: &str, required: bool) -> Self {
        let inner = inner.trim();
        let (name, variadic, greedy) = if let Some(name) = inner.strip_prefix("...") {
            (name, true, false)
        } else if let Some(name) = inner.strip_suffix("...") {
            (name, false, true)
        } else {
            (inner, false, false)
        };
        Self {
            name: name.to_owned(),
            required,
            variadic,
            greedy,
        }
    }
}

/// Returns the text before the first bracket, trimmed.
///
/// ```
/// use cqbot_proto::grammar::strip_brackets;
///
/// assert_eq!(strip_brackets("echo <text> [more]"), "echo");
/// assert_eq!(strip_brackets("-b, --beta <beta>"), "-b, --beta");
/// ```
pub fn strip_brackets(source: &str) -> &str {
    match source.find(['<', '[']) {
        Some(at) => source[..at].trim(),
        None => source.trim(),
    }
}

/// Reads the bracketed argument slots of a declaration, in textual order.
///
/// ```
/// use cqbot_proto::grammar::parse_arguments;
///
/// let args = parse_arguments("cmd <a> [b] [...c]");
/// assert_eq!(args.len(), 3);
/// assert!(args[0].required && !args[1].required && args[2].variadic);
/// ```
pub fn parse_arguments(source: &str) -> Vec<ArgDecl> {
    let mut result = Vec::new();
    let mut rest = source;
    while let Some(open) = rest.find(['<', '[']) {
        let required = rest[open..].starts_with('<');
        let close = if required { '>' } else { ']' };
        let body = &rest[open + 1..];
        let Some(end) = body.find(close) else {
            break;
        };
        if !body[..end].trim().is_empty() {
            result.push(ArgDecl::from_bracket(&body[..end], required));
        }
        rest = &body[end + 1..];
    }
    result
}

/// Per-option configuration supplied at registration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSettings {
    /// Value used when the option is given without a parameter or not at all.
    pub default: Option<OptionValue>,
    /// Left out of help output.
    pub hidden: bool,
    /// Minimum authority needed to use the option.
    pub authority: i64,
    /// Invocations using this option are not billed against usage limits.
    pub not_usage: bool,
    /// Parameters stay strings instead of being coerced to numbers.
    pub is_string: bool,
}

/// A declared option.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    /// Declaration as written, e.g. `-C, --no-gamma`.
    pub raw_name: String,
    /// Dash names with dashes and `no-` stripped.
    pub names: Vec<String>,
    /// camelCase key of each name, index-aligned with `names`.
    pub camel_names: Vec<String>,
    /// Which names were written with a `no-` prefix, index-aligned with `names`.
    pub negated_names: Vec<bool>,
    /// Any name was written with a `no-` prefix.
    pub negated: bool,
    /// Declared with an angle-bracket parameter.
    pub required: bool,
    /// Declared without any parameter.
    pub is_boolean: bool,
    /// Help text.
    pub description: String,
    /// Registration settings.
    pub settings: OptionSettings,
}

impl OptionDecl {
    /// Parses an option declaration such as `-b, --beta <beta>`.
    ///
    /// ```
    /// use cqbot_proto::grammar::{OptionDecl, OptionSettings, OptionValue};
    ///
    /// let opt = OptionDecl::parse("-C, --no-gamma", "", OptionSettings::default()).unwrap();
    /// assert_eq!(opt.names, vec!["C", "gamma"]);
    /// assert!(opt.negated && opt.is_boolean);
    /// assert_eq!(opt.settings.default, Some(OptionValue::Bool(true)));
    /// ```
    pub fn parse(raw: &str, description: &str, mut settings: OptionSettings) -> Result<Self> {
        let mut names = Vec::new();
        let mut camel_names = Vec::new();
        let mut negated_names = Vec::new();

        for piece in strip_brackets(raw).split(',') {
            let piece = piece.trim();
            let piece = piece
                .strip_prefix("--")
                .or_else(|| piece.strip_prefix('-'))
                .unwrap_or(piece);
            let (name, negated) = match piece.strip_prefix("no-") {
                Some(name) => (name, true),
                None => (piece, false),
            };
            if name.is_empty() {
                continue;
            }
            camel_names.push(camel_case(name));
            names.push(name.to_owned());
            negated_names.push(negated);
        }

        if names.is_empty() {
            return Err(ProtocolError::EmptyOption(raw.to_owned()));
        }

        let negated = negated_names.iter().any(|&n| n);
        if negated {
            settings.default = Some(OptionValue::Bool(true));
        }

        let required = raw.contains('<');
        let is_boolean = !required && !raw.contains('[');

        Ok(Self {
            raw_name: raw.to_owned(),
            names,
            camel_names,
            negated_names,
            negated,
            required,
            is_boolean,
            description: description.to_owned(),
            settings,
        })
    }

    /// Whether any key of this option is present in `options`.
    pub fn is_supplied(&self, options: &Options) -> bool {
        self.camel_names.iter().any(|key| options.contains_key(key))
    }

    /// Stores `value`, received under `name`, into every key of this option.
    ///
    /// For negated options the keys written with `no-` carry the logical
    /// state while the plain aliases carry its inverse, so `-C` for
    /// `-C, --no-gamma` yields `{C: true, gamma: false}`.
    pub(crate) fn assign(&self, options: &mut Options, name: &str, value: OptionValue, via_no: bool) {
        if !self.negated {
            for key in &self.camel_names {
                options.insert(key.clone(), value.clone());
            }
            return;
        }

        let named_negated = self
            .names
            .iter()
            .position(|n| n == name)
            .is_some_and(|i| self.negated_names[i]);
        let on = if via_no {
            false
        } else if named_negated {
            value.is_truthy()
        } else {
            !value.is_truthy()
        };
        for (key, &negated) in self.camel_names.iter().zip(&self.negated_names) {
            options.insert(key.clone(), OptionValue::Bool(if negated { on } else { !on }));
        }
    }

    /// The value `key` takes when the option is not supplied.
    pub fn default_for(&self, key: &str) -> Option<OptionValue> {
        let default = self.settings.default.clone()?;
        let negated = self
            .camel_names
            .iter()
            .position(|k| k == key)
            .map(|i| self.negated_names[i])?;
        if self.negated && !negated {
            return Some(OptionValue::Bool(!default.is_truthy()));
        }
        Some(default)
    }
}

/// The options of one command, indexed by every dash name.
#[derive(Debug, Clone, Default)]
pub struct OptionTable {
    decls: Vec<OptionDecl>,
    by_name: HashMap<String, usize>,
    by_key: HashMap<String, usize>,
}

impl OptionTable {
    /// Adds an option. Fails with the first name already taken.
    pub fn insert(&mut self, decl: OptionDecl) -> std::result::Result<(), String> {
        if let Some(taken) = decl.names.iter().find(|n| self.by_name.contains_key(*n)) {
            return Err(taken.clone());
        }
        let index = self.decls.len();
        for name in &decl.names {
            self.by_name.insert(name.clone(), index);
        }
        for key in &decl.camel_names {
            self.by_key.insert(key.clone(), index);
        }
        self.decls.push(decl);
        Ok(())
    }

    /// Looks an option up by dash name (`beta`, `b`).
    pub fn get(&self, name: &str) -> Option<&OptionDecl> {
        self.by_name.get(name).map(|&i| &self.decls[i])
    }

    /// Looks an option up by camelCase key.
    pub fn by_key(&self, key: &str) -> Option<&OptionDecl> {
        self.by_key.get(key).map(|&i| &self.decls[i])
    }

    /// Options in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &OptionDecl> {
        self.decls.iter()
    }

    /// Number of declared options.
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    /// Whether no option is declared.
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_order_is_textual() {
        let args = parse_arguments("cmd [a] <b>");
        assert_eq!(args[0].name, "a");
        assert!(!args[0].required);
        assert_eq!(args[1].name, "b");
        assert!(args[1].required);
    }

    #[test]
    fn test_greedy_and_variadic() {
        let args = parse_arguments("cmd [...rest] [tail...]");
        assert!(args[0].variadic && !args[0].greedy);
        assert_eq!(args[0].name, "rest");
        assert!(args[1].greedy && !args[1].variadic);
        assert_eq!(args[1].name, "tail");
    }

    #[test]
    fn test_unterminated_bracket() {
        assert!(parse_arguments("cmd <oops").is_empty());
    }

    #[test]
    fn test_option_kinds() {
        let flag = OptionDecl::parse("-a, --alpha", "", OptionSettings::default()).unwrap();
        assert!(flag.is_boolean && !flag.required);
        let opt = OptionDecl::parse("-b [beta]", "", OptionSettings::default()).unwrap();
        assert!(!opt.is_boolean && !opt.required);
        let req = OptionDecl::parse("--max-count <n>", "", OptionSettings::default()).unwrap();
        assert!(req.required);
        assert_eq!(req.camel_names, vec!["maxCount"]);
    }

    #[test]
    fn test_empty_option_rejected() {
        assert!(OptionDecl::parse("<x>", "", OptionSettings::default()).is_err());
    }

    #[test]
    fn test_table_rejects_duplicates() {
        let mut table = OptionTable::default();
        table
            .insert(OptionDecl::parse("-a, --alpha", "", OptionSettings::default()).unwrap())
            .unwrap();
        let err = table
            .insert(OptionDecl::parse("-b, --alpha", "", OptionSettings::default()).unwrap())
            .unwrap_err();
        assert_eq!(err, "alpha");
        assert!(table.get("a").is_some());
        assert!(table.by_key("alpha").is_some());
    }

    #[test]
    fn test_negated_defaults() {
        let opt = OptionDecl::parse("-C, --no-gamma", "", OptionSettings::default()).unwrap();
        assert_eq!(opt.default_for("gamma"), Some(OptionValue::Bool(true)));
        assert_eq!(opt.default_for("C"), Some(OptionValue::Bool(false)));
        assert_eq!(opt.default_for("delta"), None);
    }
}
