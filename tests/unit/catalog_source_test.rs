//! Tests for catalog sources

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use effect_engine::core::{EffectDefinition, EffectSource};
use effect_engine::infra::{InMemoryEffectSource, JsonDirectorySource};
use serde_json::json;
use uuid::Uuid;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

struct TempDir(PathBuf);

impl TempDir {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("effect-engine-{}", Uuid::new_v4()));
        fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    fn write(&self, name: &str, contents: &str) {
        fs::write(self.0.join(name), contents).unwrap();
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

// ============================================================================
// IN-MEMORY SOURCE
// ============================================================================

#[test]
fn test_in_memory_source_edits() {
    let source = InMemoryEffectSource::new(vec![EffectDefinition::new("rainbow", "rainbow.py")]);
    source.upsert(EffectDefinition::new("police", "police.py"));
    source.upsert(EffectDefinition::new("rainbow", "rainbow-v2.py"));

    let loaded = source.load().unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].script.as_str(), "rainbow-v2.py");

    assert!(source.remove("police"));
    assert!(!source.remove("police"));
    assert_eq!(source.load().unwrap().len(), 1);
}

#[test]
fn test_in_memory_source_notifies_watchers() {
    let source = InMemoryEffectSource::default();
    let rx = source.watch().expect("in-memory source is watchable");

    source.replace(vec![EffectDefinition::new("rainbow", "rainbow.py")]);
    source.upsert(EffectDefinition::new("police", "police.py"));

    // Ticks coalesce into a single pending notification.
    assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_dropped_watcher_is_forgotten() {
    let source = InMemoryEffectSource::default();
    drop(source.watch());
    source.replace(Vec::new());
    let rx = source.watch().unwrap();
    source.replace(Vec::new());
    assert!(rx.try_recv().is_ok());
}

// ============================================================================
// JSON DIRECTORY SOURCE
// ============================================================================

#[test]
fn test_json_directory_loads_definitions() {
    let dir = TempDir::new();
    dir.write(
        "swirl.json",
        &json!({
            "name": "Rainbow swirl",
            "script": "swirl.py",
            "args": {"rotation-time": 20.0},
            "schema": {"required": ["rotation-time"], "properties": {"rotation-time": "number"}}
        })
        .to_string(),
    );
    dir.write("notes.txt", "not an effect");

    let effects = JsonDirectorySource::new([&dir.0]).load().unwrap();
    assert_eq!(effects.len(), 1);
    let swirl = &effects[0];
    assert_eq!(swirl.name, "Rainbow swirl");
    assert_eq!(swirl.script.as_str(), dir.0.join("swirl.py").to_string_lossy());
    assert_eq!(swirl.args, json!({"rotation-time": 20.0}));
    assert_eq!(swirl.file.as_deref(), Some(dir.0.join("swirl.json").as_path()));
}

#[test]
fn test_json_directory_skips_bad_files() {
    let dir = TempDir::new();
    dir.write("a.json", r#"{"name": "candle", "script": "/opt/fx/candle.py"}"#);
    dir.write("b.json", "{ truncated");
    dir.write("c.json", r#"{"name": "", "script": "x.py"}"#);
    dir.write(
        "d.json",
        r#"{"name": "strobe", "script": "strobe.py", "args": {"hz": "fast"},
            "schema": {"properties": {"hz": "number"}}}"#,
    );

    let effects = JsonDirectorySource::new([&dir.0]).load().unwrap();
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].name, "candle");
    assert_eq!(effects[0].script.as_str(), "/opt/fx/candle.py");
    assert_eq!(effects[0].args, json!({}));
}

#[test]
fn test_json_directory_missing_dir_is_empty() {
    let missing = std::env::temp_dir().join(format!("effect-engine-missing-{}", Uuid::new_v4()));
    let source = JsonDirectorySource::new([missing]);
    assert!(source.load().unwrap().is_empty());
    assert!(source.watch().is_none());
}

#[test]
fn test_json_directory_keeps_scan_order() {
    let user = TempDir::new();
    let system = TempDir::new();
    user.write("fire.json", r#"{"name": "fire", "script": "user-fire.py"}"#);
    system.write("fire.json", r#"{"name": "fire", "script": "system-fire.py"}"#);
    system.write("ice.json", r#"{"name": "ice", "script": "ice.py"}"#);

    let source = JsonDirectorySource::new([&user.0, &system.0]);
    assert_eq!(source.dirs().len(), 2);
    let names: Vec<String> = source.load().unwrap().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["fire", "fire", "ice"]);
}
