//! Unit tests for the storage module.
//!
//! Naming and containment logic, plus filesystem containment checks against
//! a scratch directory.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use chrono::{Local, TimeZone};

use super::{quick_save_name, resolve_in_library, LibraryEntry};
use crate::config::SavePattern;
use crate::error::AppError;

fn fixed_now() -> chrono::DateTime<Local> {
    Local.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap()
}

#[test]
fn test_timestamp_name_is_valid_filename() {
    let name = quick_save_name(SavePattern::Timestamp, fixed_now(), |_| false);
    assert!(name.starts_with("screenshot_"));
    assert!(name.ends_with(".png"));
    // Valid on Windows: no reserved characters.
    assert!(!name.contains(|c| "<>:\"/\\|?*".contains(c)));
}

#[test]
fn test_date_name_format() {
    let name = quick_save_name(SavePattern::Date, fixed_now(), |_| false);
    assert_eq!(name, "screenshot_2025-03-14_15-09-26.png");
}

#[test]
fn test_date_name_collision_suffix() {
    let taken: HashSet<&str> = ["screenshot_2025-03-14_15-09-26.png"].into_iter().collect();
    let name = quick_save_name(SavePattern::Date, fixed_now(), |c| taken.contains(c));
    assert_eq!(name, "screenshot_2025-03-14_15-09-26_2.png");
}

#[test]
fn test_increment_fills_first_gap() {
    // 1 and 3 exist; the first unused index is 2.
    let taken: HashSet<&str> = ["screenshot_1.png", "screenshot_3.png"]
        .into_iter()
        .collect();
    let name = quick_save_name(SavePattern::Increment, fixed_now(), |c| taken.contains(c));
    assert_eq!(name, "screenshot_2.png");
}

#[test]
fn test_increment_starts_at_one() {
    let name = quick_save_name(SavePattern::Increment, fixed_now(), |_| false);
    assert_eq!(name, "screenshot_1.png");
}

fn scratch_library(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "quickshot_test_{}_{}",
        tag,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(dir.join("nested")).unwrap();
    dir
}

#[test]
fn test_resolve_accepts_library_children() {
    let root = scratch_library("accept");
    fs::write(root.join("shot.png"), b"x").unwrap();
    fs::write(root.join("nested").join("deep.png"), b"x").unwrap();

    assert!(resolve_in_library(&root, "shot.png").is_ok());
    assert!(resolve_in_library(&root, "nested/deep.png").is_ok());
    // Absolute paths inside the library are fine too.
    let absolute = root.join("shot.png").to_string_lossy().to_string();
    assert!(resolve_in_library(&root, &absolute).is_ok());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn test_resolve_rejects_escapes() {
    let root = scratch_library("escape");
    let outside = root.parent().unwrap().join("outside.png");
    fs::write(&outside, b"x").unwrap();

    // Traversal out of the library.
    let err = resolve_in_library(&root, "../outside.png").unwrap_err();
    assert!(matches!(err, AppError::PathEscape));

    // Absolute path elsewhere.
    let err = resolve_in_library(&root, &outside.to_string_lossy()).unwrap_err();
    assert!(matches!(err, AppError::PathEscape));

    // The root itself is not a valid target.
    let err = resolve_in_library(&root, ".").unwrap_err();
    assert!(matches!(err, AppError::PathEscape));

    // Traversal that dips out and back in is fine after canonicalization.
    fs::write(root.join("shot.png"), b"x").unwrap();
    let root_name = root.file_name().unwrap().to_string_lossy().to_string();
    let sneaky = format!("../{}/shot.png", root_name);
    assert!(resolve_in_library(&root, &sneaky).is_ok());

    let _ = fs::remove_file(&outside);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn test_resolve_rejects_missing_files() {
    let root = scratch_library("missing");
    // Nonexistent targets fail containment, not with an I/O error.
    let err = resolve_in_library(&root, "no_such.png").unwrap_err();
    assert!(matches!(err, AppError::PathEscape));
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn test_library_entry_serialization() {
    let entry = LibraryEntry {
        file_name: "screenshot_42.png".to_string(),
        path: "C:\\Users\\test\\Pictures\\QuickShot\\screenshot_42.png".to_string(),
        size_bytes: 123_456,
        modified_at: 1_741_965_000_000,
    };

    let json = serde_json::to_string(&entry).expect("Failed to serialize");
    assert!(json.contains("\"fileName\":\"screenshot_42.png\""));
    assert!(json.contains("123456"));
    assert!(json.contains("\"modifiedAt\""));
}
