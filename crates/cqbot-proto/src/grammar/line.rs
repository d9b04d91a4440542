//! Runtime tokenization of command lines.

use crate::util::camel_case;

use super::decl::{ArgDecl, OptionTable};
use super::value::{parse_value, Options, Param};

const QUOTES: [char; 4] = ['"', '\'', '“', '”'];

/// The result of tokenizing one command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLine {
    /// The text that was parsed.
    pub source: String,
    /// Positional tokens, padded with empty strings up to the declared count.
    pub args: Vec<String>,
    /// How many positional tokens were actually present.
    pub supplied: usize,
    /// Options keyed by camelCase name.
    pub options: Options,
    /// Option names that matched no declaration, in first-seen order.
    pub unknown: Vec<String>,
    /// Everything after a bare `--`.
    pub rest: String,
}

/// A materialized argument handed to a command action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// A single slot (plain or greedy).
    Single(String),
    /// A variadic slot.
    Variadic(Vec<String>),
}

impl Argument {
    /// The slot as text; variadic slots are joined with spaces.
    pub fn text(&self) -> String {
        match self {
            Argument::Single(s) => s.clone(),
            Argument::Variadic(items) => items.join(" "),
        }
    }

    /// Whether the slot holds nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Argument::Single(s) => s.is_empty(),
            Argument::Variadic(items) => items.is_empty(),
        }
    }
}

struct Token<'a> {
    content: &'a str,
    quoted: bool,
    rest: &'a str,
}

/// Splits the first token off `source`.
fn next_token(source: &str) -> Token<'_> {
    if let Some(open) = source.chars().next().filter(|c| QUOTES.contains(c)) {
        let body = &source[open.len_utf8()..];
        let mut chars = body.char_indices().peekable();
        while let Some((at, c)) = chars.next() {
            if !QUOTES.contains(&c) {
                continue;
            }
            let closes = match chars.peek() {
                Some((_, next)) => next.is_whitespace(),
                None => true,
            };
            if closes {
                return Token {
                    content: &body[..at],
                    quoted: true,
                    rest: body[at + c.len_utf8()..].trim_start(),
                };
            }
        }
        return Token {
            content: body,
            quoted: true,
            rest: "",
        };
    }

    let end = source.find(char::is_whitespace).unwrap_or(source.len());
    Token {
        content: &source[..end],
        quoted: false,
        rest: source[end..].trim_start(),
    }
}

/// Tokenizes `source` against argument and option declarations.
///
/// ```
/// use cqbot_proto::grammar::{parse_arguments, parse_line, OptionTable, OptionValue};
///
/// let args = parse_arguments("cmd <foo> [bar]");
/// let parsed = parse_line("-x 3 hello", &args, &OptionTable::default());
/// assert_eq!(parsed.args, vec!["hello", ""]);
/// assert_eq!(parsed.options["x"], OptionValue::Number(3.0));
/// assert_eq!(parsed.unknown, vec!["x"]);
/// ```
pub fn parse_line(source: &str, args_decl: &[ArgDecl], options_decl: &OptionTable) -> ParsedLine {
    let mut result = ParsedLine {
        source: source.to_owned(),
        ..Default::default()
    };
    let mut source = source.trim_start();

    while !source.is_empty() {
        let slot_is_greedy = args_decl
            .get(result.args.len())
            .is_some_and(|slot| slot.greedy);
        if slot_is_greedy && !source.starts_with('-') {
            result.args.push(source.to_owned());
            break;
        }

        let token = next_token(source);
        let arg = token.content;
        source = token.rest;

        if token.quoted || !arg.starts_with('-') || arg == "-" {
            result.args.push(arg.to_owned());
            continue;
        }
        if arg == "--" {
            result.rest = source.to_owned();
            break;
        }

        let dashes = arg.len() - arg.trim_start_matches('-').len();
        let body = &arg[dashes..];

        if let Some(name) = body.strip_prefix("no-") {
            match options_decl.get(name) {
                Some(decl) => {
                    decl.assign(&mut result.options, name, false.into(), true);
                }
                None => {
                    remember_unknown(&mut result.unknown, name);
                    result.options.insert(camel_case(name), false.into());
                }
            }
            continue;
        }

        let (name, inline) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };
        let names: Vec<String> = if dashes == 2 {
            vec![name.to_owned()]
        } else {
            name.chars().map(String::from).collect()
        };
        let Some(last) = names.last() else {
            continue;
        };

        let mut quoted = false;
        let mut param = inline.unwrap_or("");
        let last_is_boolean = options_decl.get(last).is_some_and(|d| d.is_boolean);
        if param.is_empty() && !source.is_empty() && !source.starts_with('-') && !last_is_boolean {
            let token = next_token(source);
            param = token.content;
            quoted = token.quoted;
            source = token.rest;
        }

        for (i, name) in names.iter().enumerate() {
            let decl = options_decl.get(name);
            let raw = if i + 1 < names.len() {
                Param::Implied
            } else {
                Param::Text(param)
            };
            let value = parse_value(raw, decl, quoted);
            match decl {
                Some(decl) => decl.assign(&mut result.options, name, value, false),
                None => {
                    remember_unknown(&mut result.unknown, name);
                    result.options.insert(camel_case(name), value);
                }
            }
        }
    }

    result.supplied = result.args.len();
    if result.args.len() < args_decl.len() {
        result.args.resize(args_decl.len(), String::new());
    }
    result
}

fn remember_unknown(unknown: &mut Vec<String>, name: &str) {
    if !unknown.iter().any(|n| n == name) {
        unknown.push(name.to_owned());
    }
}

/// Turns parsed positional tokens into per-slot arguments.
///
/// Variadic slots take the supplied tokens from their index on; padding
/// never ends up inside a variadic slot.
///
/// ```
/// use cqbot_proto::grammar::{materialize, parse_arguments, parse_line, Argument, OptionTable};
///
/// let decl = parse_arguments("cmd <a> [b] [...c]");
/// let parsed = parse_line("x y z w", &decl, &OptionTable::default());
/// assert_eq!(
///     materialize(&decl, &parsed),
///     vec![
///         Argument::Single("x".into()),
///         Argument::Single("y".into()),
///         Argument::Variadic(vec!["z".into(), "w".into()]),
///     ]
/// );
/// ```
pub fn materialize(args_decl: &[ArgDecl], parsed: &ParsedLine) -> Vec<Argument> {
    let mut out = Vec::with_capacity(args_decl.len());
    for (i, slot) in args_decl.iter().enumerate() {
        if slot.variadic {
            let from = i.min(parsed.supplied);
            out.push(Argument::Variadic(parsed.args[from..parsed.supplied].to_vec()));
        } else {
            out.push(Argument::Single(parsed.args.get(i).cloned().unwrap_or_default()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_quotes() {
        let token = next_token("“你好 世界” rest");
        assert!(token.quoted);
        assert_eq!(token.content, "你好 世界");
        assert_eq!(token.rest, "rest");

        let token = next_token("\"it's fine\" x");
        assert_eq!(token.content, "it's fine");
        assert_eq!(token.rest, "x");
    }

    #[test]
    fn test_unclosed_quote_takes_everything() {
        let token = next_token("\"open ended");
        assert_eq!(token.content, "open ended");
        assert_eq!(token.rest, "");
    }

    #[test]
    fn test_inline_value() {
        let parsed = parse_line("--level=3 -x=abc", &[], &OptionTable::default());
        assert_eq!(parsed.options["level"], 3.0.into());
        assert_eq!(parsed.options["x"], "abc".into());
    }

    #[test]
    fn test_supplied_count() {
        let decl = super::super::parse_arguments("cmd <a> <b>");
        let parsed = parse_line("only", &decl, &OptionTable::default());
        assert_eq!(parsed.supplied, 1);
        assert_eq!(parsed.args, vec!["only", ""]);
    }

    #[test]
    fn test_lone_dash_is_positional() {
        let parsed = parse_line("- x", &[], &OptionTable::default());
        assert_eq!(parsed.args, vec!["-", "x"]);
    }
}
