use super::*;
use tempfile::tempdir;

#[test]
fn test_versioned_path_starts_at_v1() {
    let dir = tempdir().unwrap();
    let path = versioned_path(dir.path(), "technical_concept_demo", "md").unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "technical_concept_demo_v1.md"
    );
}

#[test]
fn test_versioned_path_skips_existing_versions() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("summary_demo_v1.txt"), "one").unwrap();
    std::fs::write(dir.path().join("summary_demo_v2.txt"), "two").unwrap();
    let path = versioned_path(dir.path(), "summary_demo", "txt").unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "summary_demo_v3.txt"
    );
}

#[test]
fn test_versioned_path_rejects_overlong_paths() {
    let dir = tempdir().unwrap();
    let stem = "x".repeat(MAX_OUTPUT_PATH_LEN);
    let err = versioned_path(dir.path(), &stem, "md").unwrap_err();
    assert!(matches!(err, OutputPathError::TooLong { .. }));
    assert!(err.to_string().contains("Choose a shorter output directory"));
}

#[test]
fn test_layout_creates_subdirectories() {
    let dir = tempdir().unwrap();
    let layout = OutputLayout::new(dir.path().join("out"));
    let docs = layout.docs_dir().unwrap();
    let logs = layout.logs_dir().unwrap();
    assert!(docs.is_dir());
    assert!(logs.is_dir());
    assert!(docs.starts_with(layout.root()));
}

#[test]
fn test_layout_reports_blocked_directory() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("out");
    std::fs::write(&blocker, "not a directory").unwrap();
    let layout = OutputLayout::new(&blocker);
    assert!(layout.diagrams_dir().is_err());
}

#[test]
fn test_sanitize_replaces_forbidden_characters() {
    assert_eq!(sanitize_file_stem("Shop: v2/beta?"), "Shop_v2_beta");
}

#[test]
fn test_sanitize_collapses_whitespace() {
    assert_eq!(
        sanitize_file_stem("  Inventory   Sync  Service "),
        "Inventory_Sync_Service"
    );
}

#[test]
fn test_sanitize_empty_name() {
    assert_eq!(sanitize_file_stem(""), "unnamed_project");
    assert_eq!(sanitize_file_stem("???"), "unnamed_project");
}

#[test]
fn test_sanitize_caps_length() {
    let long = "a".repeat(300);
    assert_eq!(sanitize_file_stem(&long).chars().count(), 100);
}

#[test]
fn test_permission_denied_maps_to_hint() {
    let err = OutputPathError::from_io(
        Path::new("/restricted"),
        std::io::Error::from(std::io::ErrorKind::PermissionDenied),
    );
    assert!(matches!(err, OutputPathError::PermissionDenied { .. }));
}
