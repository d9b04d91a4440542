//! Integration tests for command registration rules and plugins.

mod common;

use common::TestApp;
use cqbot::{CommandConfig, Context, PluginOptions, RegistrationError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

#[test]
fn test_duplicate_command_name() {
    let t = TestApp::new();
    t.app.command("roll").unwrap();
    let err = t.app.command("dice").unwrap().alias("roll").unwrap_err();
    assert_eq!(err, RegistrationError::DuplicateCommand("roll".into()));
}

#[test]
fn test_same_name_extends_command() {
    let t = TestApp::new();
    let first = t.app.command("roll <sides>").unwrap();
    let second = t
        .app
        .command_with("roll", CommandConfig::new().description("Roll a die"))
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.declaration(), "roll <sides>");
    assert_eq!(first.settings().description.as_deref(), Some("Roll a die"));
}

#[test]
fn test_names_are_lowercased() {
    let t = TestApp::new();
    let command = t.app.command("Roll").unwrap();
    assert_eq!(command.name(), "roll");
    assert!(t.app.get_command("ROLL", None).is_some());
}

#[test]
fn test_duplicate_option() {
    let t = TestApp::new();
    let command = t.app.command("echo").unwrap().option("-l, --loud", "").unwrap();
    let err = command.option("--loud", "").unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateOption(_)));
}

#[test]
fn test_invalid_name() {
    let t = TestApp::new();
    assert!(matches!(
        t.app.command("\"quoted\""),
        Err(RegistrationError::InvalidName(_))
    ));
    assert!(matches!(t.app.command("-x"), Err(RegistrationError::InvalidName(_))));
}

#[test]
fn test_wrong_context() {
    let t = TestApp::new();
    t.app.group(10).command("local").unwrap();
    let err = t.app.command("local").unwrap_err();
    assert_eq!(err, RegistrationError::WrongContext("local".into()));

    // Same or narrower scope is fine.
    assert!(t.app.group(10).command("local").is_ok());
}

#[test]
fn test_child_outside_parent_scope() {
    let t = TestApp::new();
    t.app.users().command("profile").unwrap();
    let err = t.app.command("profile/edit").unwrap_err();
    assert_eq!(err, RegistrationError::WrongContext("profile".into()));
}

#[test]
fn test_wrong_subcommand() {
    let t = TestApp::new();
    t.app.command("rank/daily").unwrap();
    let err = t.app.command("score/daily").unwrap_err();
    assert_eq!(err, RegistrationError::WrongSubcommand("daily".into()));
}

#[test]
fn test_top_level_command_not_adopted() {
    let t = TestApp::new();
    let daily = t.app.command("daily").unwrap();
    let err = t.app.command("rank/daily").unwrap_err();
    assert_eq!(err, RegistrationError::WrongSubcommand("daily".into()));
    assert!(daily.parent().is_none());

    let err = t.app.command("rank").unwrap().subcommand("daily").unwrap_err();
    assert_eq!(err, RegistrationError::WrongSubcommand("daily".into()));
    assert!(t.app.get_command("rank", None).unwrap().children().is_empty());
}

#[test]
fn test_subcommand_tree() {
    let t = TestApp::new();
    let child = t.app.command("rank/daily <date>").unwrap();
    let parent = t.app.get_command("rank", None).unwrap();

    assert_eq!(child.name(), "daily");
    assert_eq!(child.declaration(), "daily <date>");
    assert!(Arc::ptr_eq(&child.parent().unwrap(), &parent));
    assert_eq!(parent.children().len(), 1);

    let dotted = parent.subcommand(".weekly").unwrap();
    assert_eq!(dotted.name(), "rank.weekly");
    assert_eq!(parent.children().len(), 2);
}

#[test]
fn test_scoped_lookup() {
    let t = TestApp::new();
    t.app.group(10).command("local").unwrap();
    let inside = cqbot_proto::Target::new(cqbot_proto::ContextKind::Group, 10);
    let outside = cqbot_proto::Target::new(cqbot_proto::ContextKind::Group, 11);
    assert!(t.app.get_command("local", Some(inside)).is_some());
    assert!(t.app.get_command("local", Some(outside)).is_none());
    assert!(t.app.list_commands(Some(outside)).iter().all(|c| c.name() != "local"));
}

#[test]
fn test_plugin_installation() {
    let t = TestApp::new();
    let installs = Arc::new(AtomicU32::new(0));

    let counter = installs.clone();
    let plugin = move |ctx: &Context, prefix: String| -> Result<(), RegistrationError> {
        counter.fetch_add(1, Ordering::SeqCst);
        ctx.command(&format!("{}-ping", prefix))?;
        Ok(())
    };
    t.app.groups().plugin(plugin.clone(), "team".to_string()).unwrap();
    t.app
        .plugin(plugin, PluginOptions::<String>::Disabled)
        .unwrap();

    assert_eq!(installs.load(Ordering::SeqCst), 1);
    let command = t.app.get_command("team-ping", None).unwrap();
    assert_eq!(command.scope(), &cqbot_proto::ScopeSet::all_groups());
}

#[test]
fn test_contexts_are_memoized() {
    let t = TestApp::new();
    let a = t.app.group(1).plus(&t.app.group(2));
    let b = t.app.group(2).plus(&t.app.group(1));
    assert_eq!(a.scope(), b.scope());
    assert!(Arc::ptr_eq(a.receiver(), b.receiver()));
    assert!(!Arc::ptr_eq(a.receiver(), t.app.groups().receiver()));
}
