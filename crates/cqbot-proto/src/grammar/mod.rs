//! Command grammar.
//!
//! Two halves:
//!
//! - **declarations**: `"echo <text> [...more]"` is split into a bare name
//!   and ordered [`ArgDecl`]s; `"-C, --no-gamma <level>"` becomes an
//!   [`OptionDecl`] reachable by each dash name and its camelCase key.
//! - **lines**: [`parse_line`] tokenizes the text that follows a command
//!   name against those declarations, producing a [`ParsedLine`].
//!
//! Parsing never fails. Missing arguments are padded with empty strings
//! and unknown options are recorded; it is up to the caller to decide
//! whether either is an error.

mod decl;
mod line;
mod value;

pub use self::decl::{
    parse_arguments, strip_brackets, ArgDecl, OptionDecl, OptionSettings, OptionTable,
};
pub use self::line::{materialize, parse_line, Argument, ParsedLine};
pub use self::value::{OptionValue, Options};
