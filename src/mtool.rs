//! MTool translation files.
//!
//! MTool exports a flat JSON object mapping each source string to its
//! translation (untranslated entries carry the source text as value). The
//! file is consumed positionally by MTool, so entry order is preserved on
//! both read and write.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationFile {
    entries: Vec<(String, String)>,
}

impl TranslationFile {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// Read and parse an MTool JSON export.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read translation file {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("Failed to parse translation file {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let value: Value = serde_json::from_str(raw).context("Invalid JSON")?;

        let Value::Object(map) = value else {
            bail!("Expected a JSON object of source text to translation");
        };

        let mut entries = Vec::with_capacity(map.len());
        for (key, value) in map {
            let value = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => bail!(
                    "Value for key {:?} must be a string, found {}",
                    key,
                    json_type_name(&other)
                ),
            };
            entries.push((key, value));
        }

        Ok(Self { entries })
    }

    /// Serialize as MTool expects it: 4-space indent, UTF-8 text unescaped.
    pub fn to_json_string(&self) -> Result<String> {
        let map: serde_json::Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        map.serialize(&mut serializer)
            .context("Failed to serialize translation file")?;
        buf.push(b'\n');

        String::from_utf8(buf).context("Serialized translation file is not UTF-8")
    }

    /// Write the file through a sibling temp file so a crash never leaves a
    /// truncated output behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory {}", parent.display())
                })?;
            }
        }

        let contents = self.to_json_string()?;
        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        std::fs::write(&tmp_path, contents)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to move {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the value of an existing entry. Returns false if the key is unknown.
    pub fn set(&mut self, key: &str, value: String) -> bool {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => {
                entry.1 = value;
                true
            }
            None => false,
        }
    }

    /// Replace the value at a known position.
    pub fn set_at(&mut self, index: usize, value: String) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.1 = value;
        }
    }

    pub fn entry_at(&self, index: usize) -> Option<(&str, &str)> {
        self.entries
            .get(index)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Build a key lookup for files that are consulted repeatedly (resume).
    pub fn to_lookup(&self) -> std::collections::HashMap<&str, &str> {
        self.iter().collect()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
