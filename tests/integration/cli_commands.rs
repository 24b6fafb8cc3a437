//! Commands run through the CLI context against a scratch container.

use super::fixtures::write_container;
use clap::Parser;
use partmirror::config::PartMirrorConfig;
use partmirror::tooling::{Cli, CliContext, Commands};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn scratch() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let container = temp.path().join("doc.zip");
    write_container(&container, &[("a/x.xml", b"<a/>"), ("a/y.bin", &[0xDE, 0xAD])]);
    (temp, container)
}

#[test]
fn test_status_json_lists_every_part() {
    let (temp, container) = scratch();
    let ctx = CliContext::new(PartMirrorConfig::default());

    let out = ctx
        .execute(&Commands::Status {
            container,
            format: "json".to_string(),
        })
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    let parts = value["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0]["part"], "a/x.xml");
    assert_eq!(parts[0]["kind"], "unchanged");
    assert!(temp.path().join(".partmirror").is_dir());
}

#[test]
fn test_status_reports_user_edit() {
    let (temp, container) = scratch();
    let ctx = CliContext::new(PartMirrorConfig::default());
    let view = ctx
        .execute(&Commands::View {
            container: container.clone(),
            part: "a/x.xml".to_string(),
        })
        .unwrap();
    fs::write(&view, b"<edited/>").unwrap();

    let out = ctx
        .execute(&Commands::Status {
            container,
            format: "json".to_string(),
        })
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["parts"][0]["kind"], "changed_by_user");
    assert_eq!(value["parts"][1]["kind"], "unchanged");
    drop(temp);
}

#[test]
fn test_unknown_status_format_is_rejected() {
    let (_temp, container) = scratch();
    let ctx = CliContext::new(PartMirrorConfig::default());
    let result = ctx.execute(&Commands::Status {
        container,
        format: "yaml".to_string(),
    });
    assert!(result.is_err());
}

#[test]
fn test_view_and_diff_print_cache_paths() {
    let (_temp, container) = scratch();
    let ctx = CliContext::new(PartMirrorConfig::default());

    let view = ctx
        .execute(&Commands::View {
            container: container.clone(),
            part: "a/y.bin".to_string(),
        })
        .unwrap();
    assert!(view.ends_with("y.bin"));
    assert_eq!(fs::read(&view).unwrap(), vec![0xDE, 0xAD]);

    let diff = ctx
        .execute(&Commands::Diff {
            container,
            part: "a/y.bin".to_string(),
        })
        .unwrap();
    let lines: Vec<&str> = diff.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("a/y.bin (previous"));
    assert!(lines[1].ends_with("prev.y.bin"));
    assert_eq!(lines[2], view);
}

#[test]
fn test_view_of_folder_fails() {
    let (_temp, container) = scratch();
    let ctx = CliContext::new(PartMirrorConfig::default());
    let result = ctx.execute(&Commands::View {
        container,
        part: "a".to_string(),
    });
    assert!(result.is_err());
}

#[test]
fn test_reset_restores_and_close_removes() {
    let (temp, container) = scratch();
    let ctx = CliContext::new(PartMirrorConfig::default());
    let view = ctx
        .execute(&Commands::View {
            container: container.clone(),
            part: "a/x.xml".to_string(),
        })
        .unwrap();
    fs::write(&view, b"<edited/>").unwrap();

    let out = ctx
        .execute(&Commands::Reset {
            container: container.clone(),
            yes: true,
        })
        .unwrap();
    assert!(out.starts_with("Loaded 2 part(s)"));
    assert_eq!(fs::read(&view).unwrap(), b"<a/>");

    let out = ctx.execute(&Commands::Close { container }).unwrap();
    assert!(out.starts_with("Removed"));
    assert!(!temp.path().join(".partmirror").exists());
}

#[test]
fn test_missing_container_is_an_error() {
    let temp = TempDir::new().unwrap();
    let ctx = CliContext::new(PartMirrorConfig::default());
    let result = ctx.execute(&Commands::Status {
        container: temp.path().join("absent.zip"),
        format: "text".to_string(),
    });
    assert!(result.is_err());
}

#[test]
fn test_log_flags_override_config() {
    let (_temp, container) = scratch();
    let cli = Cli::try_parse_from([
        "partmirror".to_string(),
        "status".to_string(),
        container.display().to_string(),
        "--verbose".to_string(),
        "--log-format".to_string(),
        "json".to_string(),
    ])
    .unwrap();

    let config = cli.load_config().unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
}
