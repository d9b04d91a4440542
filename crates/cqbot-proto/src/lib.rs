//! # cqbot-proto
//!
//! Pure, I/O-free building blocks for CQHTTP-style message bots.
//!
//! ## Features
//!
//! - Conversation scopes as an include/exclude set algebra ([`ScopeSet`])
//! - Hierarchical event paths (`/group/10000/message/normal`) ([`EventPath`])
//! - Command declaration parsing and runtime argument tokenization ([`grammar`])
//! - Gateway event model with JSON decoding (feature `serde`)
//!
//! ## Quick Start
//!
//! ```rust
//! use cqbot_proto::{ContextKind, ScopeSet};
//!
//! let everywhere = ScopeSet::all();
//! let group = ScopeSet::group(10000);
//!
//! assert!(everywhere.contains(&group));
//! assert!(group.matches(ContextKind::Group, 10000));
//! assert!(!group.matches(ContextKind::User, 10000));
//! ```
//!
//! ```rust
//! use cqbot_proto::grammar::{parse_arguments, parse_line, OptionTable};
//!
//! let args = parse_arguments("echo <text...>");
//! let parsed = parse_line("hello -- world", &args, &OptionTable::default());
//! assert_eq!(parsed.args, vec!["hello -- world".to_string()]);
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
#[cfg(feature = "serde")]
pub mod event;
pub mod grammar;
pub mod path;
pub mod scope;
pub mod util;

pub use self::error::{ProtocolError, Result};
#[cfg(feature = "serde")]
pub use self::event::{
    Event, MessageEvent, MessageKind, MetaEvent, NoticeEvent, RequestEvent, SendEvent, Sender,
};
pub use self::grammar::{
    ArgDecl, OptionDecl, OptionSettings, OptionTable, OptionValue, Options, ParsedLine,
};
pub use self::path::{ContextKind, EventPath, Target};
pub use self::scope::{IdSet, ScopeSet};
