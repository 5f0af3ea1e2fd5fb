use std::path::PathBuf;

use vizdeck::prefs::{AppPrefs, PrefsError};

fn temp_prefs_path(tag: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("vizdeck-test-{}-{}", std::process::id(), tag))
        .join("prefs.txt")
}

#[test]
fn parse_reads_known_keys_and_skips_comments() {
    let text = "\
# vizdeck runtime prefs v1
random_mode = true

global_mutation=off
visualizer = plasma
unknown_key = whatever
";
    let prefs = AppPrefs::parse(text).expect("parse should succeed");
    assert!(prefs.random_mode);
    assert!(!prefs.global_mutation);
    assert_eq!(prefs.visualizer.as_deref(), Some("plasma"));
}

#[test]
fn parse_rejects_malformed_lines_with_position() {
    let err = AppPrefs::parse("random_mode=true\nnot a kv line\n")
        .expect_err("line without '=' must fail");
    assert!(matches!(err, PrefsError::Parse { line: 2, .. }));

    let err = AppPrefs::parse("random_mode=maybe\n").expect_err("bad bool must fail");
    assert!(matches!(err, PrefsError::Parse { line: 1, .. }));
}

#[test]
fn empty_visualizer_means_none() {
    let prefs = AppPrefs::parse("visualizer=\n").expect("parse should succeed");
    assert_eq!(prefs.visualizer, None);
}

#[test]
fn load_missing_file_yields_defaults() {
    let path = temp_prefs_path("missing");
    let prefs = AppPrefs::load(Some(&path)).expect("missing file is not an error");
    assert_eq!(prefs, AppPrefs::default());
}

#[test]
fn load_without_path_yields_defaults() {
    let prefs = AppPrefs::load(None).expect("no path is not an error");
    assert_eq!(prefs, AppPrefs::default());
}

#[test]
fn save_then_load_round_trips() {
    let path = temp_prefs_path("roundtrip");
    let prefs = AppPrefs {
        random_mode: true,
        global_mutation: true,
        visualizer: Some("kaleidoscope".to_string()),
    };

    prefs.save(Some(&path)).expect("save should succeed");
    let loaded = AppPrefs::load(Some(&path)).expect("load should succeed");
    assert_eq!(loaded, prefs);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
