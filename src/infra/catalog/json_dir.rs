//! Catalog source reading one JSON definition file per effect.
//!
//! File shape:
//!
//! ```json
//! {
//!   "name": "Rainbow swirl",
//!   "script": "swirl.py",
//!   "args": { "rotation-time": 20.0 },
//!   "schema": { "required": [], "properties": { "rotation-time": "number" } }
//! }
//! ```
//!
//! Relative script paths resolve against the file's directory. Directories
//! are scanned in the given order and files by name, so on a name clash the
//! earlier directory wins.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::{AppResult, EffectDefinition, EffectSchema, EffectSource, EngineError, ScriptRef};

#[derive(Debug, Deserialize)]
struct EffectFile {
    name: String,
    script: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    schema: EffectSchema,
}

/// Catalog source scanning directories of `*.json` effect files.
#[derive(Debug, Clone)]
pub struct JsonDirectorySource {
    dirs: Vec<PathBuf>,
}

impl JsonDirectorySource {
    /// Scan `dirs` in order.
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Directories scanned by this source.
    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn scan_dir(dir: &Path, out: &mut Vec<EffectDefinition>) -> Result<(), EngineError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "effect directory missing; skipped");
                return Ok(());
            }
            Err(e) => {
                return Err(EngineError::Catalog(format!("read {}: {e}", dir.display())));
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        for path in files {
            match load_file(&path) {
                Ok(definition) => out.push(definition),
                Err(e) => warn!(file = %path.display(), error = ?e, "effect file skipped"),
            }
        }
        Ok(())
    }
}

fn load_file(path: &Path) -> AppResult<EffectDefinition> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let file: EffectFile = serde_json::from_str(&text).context("parsing effect definition")?;
    anyhow::ensure!(!file.name.trim().is_empty(), "effect name is empty");
    anyhow::ensure!(!file.script.trim().is_empty(), "script reference is empty");

    let script = Path::new(&file.script);
    let script = if script.is_absolute() {
        file.script.clone()
    } else {
        path.parent()
            .unwrap_or_else(|| Path::new("."))
            .join(script)
            .to_string_lossy()
            .into_owned()
    };

    let args = if file.args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        file.args
    };
    file.schema
        .validate(&args)
        .map_err(|reason| anyhow::anyhow!("default args violate schema: {reason}"))?;

    Ok(EffectDefinition {
        name: file.name,
        script: ScriptRef::new(script),
        args,
        schema: file.schema,
        file: Some(path.to_path_buf()),
    })
}

impl EffectSource for JsonDirectorySource {
    fn load(&self) -> Result<Vec<EffectDefinition>, EngineError> {
        let mut effects = Vec::new();
        for dir in &self.dirs {
            Self::scan_dir(dir, &mut effects)?;
        }
        debug!(count = effects.len(), "effect definitions loaded from disk");
        Ok(effects)
    }
}
