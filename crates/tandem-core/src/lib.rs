//! Shared types and persisted configuration for the Tandem completion
//! pipeline. Leaf dependency for every other crate in the workspace.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Runtime directory for settings and logs, relative to the workspace.
pub fn runtime_dir(workspace: &Path) -> PathBuf {
    workspace.join(".tandem")
}

/// The closed set of supported completion backends.
///
/// The persisted configuration addresses providers by numeric index; any
/// index outside the known set maps to [`ProviderKind::Groq`], the
/// documented default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Groq,
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => ProviderKind::OpenAi,
            2 => ProviderKind::Gemini,
            _ => ProviderKind::Groq,
        }
    }

    pub fn index(&self) -> i64 {
        match self {
            ProviderKind::Groq => 0,
            ProviderKind::OpenAi => 1,
            ProviderKind::Gemini => 2,
        }
    }

    /// Key under the `api` map in the settings document.
    pub fn config_key(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Per-provider API credentials and model selection. Absent fields default
/// to empty strings; the adapter surfaces the failure at call time instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCredentials {
    pub key: String,
    pub model: String,
}

/// The single persisted settings document.
///
/// Wire shape: `{"defaultApi": 0, "inlineSuggestion": 1, "api": {"groq":
/// {"key": "...", "model": "..."}}}`. Read at session construction and
/// again before every provider call; written on explicit settings
/// submission or provider switch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub default_api: i64,
    /// 0 or 1; whether diagnostic-triggered inline suggestions are active.
    pub inline_suggestion: u8,
    pub api: BTreeMap<String, ProviderCredentials>,
}

impl AppConfig {
    pub fn settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.json")
    }

    /// Load the settings document. A missing or corrupt file yields the
    /// default configuration so downstream callers hit default-value paths
    /// rather than fail.
    pub fn load(workspace: &Path) -> Self {
        let path = Self::settings_path(workspace);
        let Ok(raw) = fs::read_to_string(&path) else {
            return Self::default();
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    /// Load the settings document, creating it with defaults when no file
    /// exists yet.
    pub fn ensure(workspace: &Path) -> Result<Self> {
        let path = Self::settings_path(workspace);
        if path.exists() {
            return Ok(Self::load(workspace));
        }
        let cfg = Self::default();
        cfg.save(workspace)?;
        Ok(cfg)
    }

    pub fn save(&self, workspace: &Path) -> Result<()> {
        let path = Self::settings_path(workspace);
        fs::create_dir_all(
            path.parent()
                .ok_or_else(|| anyhow::anyhow!("invalid settings path"))?,
        )?;
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn provider(&self) -> ProviderKind {
        ProviderKind::from_index(self.default_api)
    }

    pub fn credentials(&self, kind: ProviderKind) -> ProviderCredentials {
        self.api.get(kind.config_key()).cloned().unwrap_or_default()
    }

    pub fn suggestions_enabled(&self) -> bool {
        self.inline_suggestion == 1
    }
}

/// Merge a single field into the raw settings document by dotted path and
/// rewrite the whole file. Intermediate objects are created as needed;
/// unknown fields already present in the document are preserved.
pub fn set_value(workspace: &Path, dotted_path: &str, value: serde_json::Value) -> Result<()> {
    let mut value = value;
    // The sidebar submits the provider index as a string.
    if dotted_path == "defaultApi"
        && let Some(s) = value.as_str()
    {
        value = serde_json::Value::from(s.trim().parse::<i64>().unwrap_or(0));
    }

    let mut doc = read_raw_settings(workspace);
    let mut slot = &mut doc;
    let mut segments = dotted_path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let obj = slot
            .as_object_mut()
            .ok_or_else(|| anyhow::anyhow!("settings path '{dotted_path}' crosses a non-object"))?;
        if segments.peek().is_none() {
            obj.insert(segment.to_string(), value);
            break;
        }
        slot = obj
            .entry(segment.to_string())
            .or_insert_with(|| serde_json::json!({}));
        if !slot.is_object() {
            *slot = serde_json::json!({});
        }
    }
    write_raw_settings(workspace, &doc)
}

/// Update only the currently selected provider's credentials. Empty
/// arguments leave the stored value untouched.
pub fn set_api_key_model(workspace: &Path, key: &str, model: &str) -> Result<()> {
    let mut doc = read_raw_settings(workspace);
    let provider = doc
        .get("defaultApi")
        .and_then(|v| v.as_i64())
        .map(ProviderKind::from_index)
        .unwrap_or(ProviderKind::Groq);

    let api = doc
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("settings document is not an object"))?
        .entry("api".to_string())
        .or_insert_with(|| serde_json::json!({}));
    if !api.is_object() {
        *api = serde_json::json!({});
    }
    let entry = api
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("settings 'api' is not an object"))?
        .entry(provider.config_key().to_string())
        .or_insert_with(|| serde_json::json!({}));
    if !entry.is_object() {
        *entry = serde_json::json!({});
    }
    let entry = entry
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("settings provider entry is not an object"))?;
    if !key.is_empty() {
        entry.insert("key".to_string(), serde_json::Value::from(key));
    }
    if !model.is_empty() {
        entry.insert("model".to_string(), serde_json::Value::from(model));
    }
    write_raw_settings(workspace, &doc)
}

fn read_raw_settings(workspace: &Path) -> serde_json::Value {
    let path = AppConfig::settings_path(workspace);
    fs::read_to_string(&path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .filter(serde_json::Value::is_object)
        .unwrap_or_else(|| serde_json::json!({}))
}

fn write_raw_settings(workspace: &Path, doc: &serde_json::Value) -> Result<()> {
    let path = AppConfig::settings_path(workspace);
    fs::create_dir_all(
        path.parent()
            .ok_or_else(|| anyhow::anyhow!("invalid settings path"))?,
    )?;
    fs::write(path, serde_json::to_vec_pretty(doc)?)?;
    Ok(())
}

/// Zero-based position within a document. The wire name of the column
/// field is `position`, matching the response contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextPosition {
    pub line: u32,
    pub position: u32,
}

impl TextPosition {
    pub fn new(line: u32, position: u32) -> Self {
        Self { line, position }
    }
}

/// Half-open is not implied: a range contains its end position, matching
/// the editor's own `Range.contains` semantics the original relies on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineRange {
    pub start: TextPosition,
    pub end: TextPosition,
}

impl LineRange {
    pub fn new(start: TextPosition, end: TextPosition) -> Self {
        Self { start, end }
    }

    pub fn at(position: TextPosition) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn contains(&self, pos: TextPosition) -> bool {
        let after_start = pos.line > self.start.line
            || (pos.line == self.start.line && pos.position >= self.start.position);
        let before_end =
            pos.line < self.end.line || (pos.line == self.end.line && pos.position <= self.end.position);
        after_start && before_end
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Snapshot of the editor's active document at trigger time.
#[derive(Debug, Clone, Default)]
pub struct DocumentSnapshot {
    pub path: PathBuf,
    pub language_id: String,
    pub text: String,
    pub cursor: TextPosition,
}

impl DocumentSnapshot {
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Information,
    Hint,
}

/// An editor-reported issue anchored to a document range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    pub range: LineRange,
    pub severity: DiagnosticSeverity,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Which system-role template and context-inclusion policy a request uses.
/// Immutable once a request is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    ChatWithContext,
    ChatWithoutContext,
    InlineSuggestion,
    InlineTooltip,
}

/// Canonical parsed result produced by the response normalizer from any
/// provider's raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StandardResponse {
    pub code: String,
    pub message: String,
    pub line_range: LineRange,
}

/// Named display surfaces in the sidebar webview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplayElement {
    DisplayCode,
    DisplayMessage,
    AdditionalMessageInput,
}

/// The one message shape the core emits toward the UI collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayUpdate {
    pub command: String,
    pub element: DisplayElement,
    pub content: String,
}

impl DisplayUpdate {
    pub fn new(element: DisplayElement, content: impl Into<String>) -> Self {
        Self {
            command: "updateDisplay".to_string(),
            element,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn provider_index_fallback_is_groq() {
        assert_eq!(ProviderKind::from_index(0), ProviderKind::Groq);
        assert_eq!(ProviderKind::from_index(1), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::from_index(2), ProviderKind::Gemini);
        assert_eq!(ProviderKind::from_index(-1), ProviderKind::Groq);
        assert_eq!(ProviderKind::from_index(99), ProviderKind::Groq);
    }

    #[test]
    fn missing_settings_file_loads_defaults() {
        let workspace = TempDir::new().expect("tempdir");
        let cfg = AppConfig::load(workspace.path());
        assert_eq!(cfg.default_api, 0);
        assert_eq!(cfg.inline_suggestion, 0);
        assert!(cfg.api.is_empty());
    }

    #[test]
    fn corrupt_settings_file_loads_defaults() {
        let workspace = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(runtime_dir(workspace.path())).expect("dir");
        std::fs::write(AppConfig::settings_path(workspace.path()), "not json {").expect("write");
        let cfg = AppConfig::load(workspace.path());
        assert_eq!(cfg.default_api, 0);
    }

    #[test]
    fn roundtrips_settings_document() {
        let workspace = TempDir::new().expect("tempdir");
        let mut cfg = AppConfig::default();
        cfg.default_api = 2;
        cfg.inline_suggestion = 1;
        cfg.api.insert(
            "gemini".to_string(),
            ProviderCredentials {
                key: "k".to_string(),
                model: "m".to_string(),
            },
        );
        cfg.save(workspace.path()).expect("save");

        let loaded = AppConfig::load(workspace.path());
        assert_eq!(loaded.provider(), ProviderKind::Gemini);
        assert!(loaded.suggestions_enabled());
        assert_eq!(loaded.credentials(ProviderKind::Gemini).key, "k");
        assert_eq!(loaded.credentials(ProviderKind::Groq), ProviderCredentials::default());
    }

    #[test]
    fn set_value_merges_single_field_and_preserves_unknown_fields() {
        let workspace = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(runtime_dir(workspace.path())).expect("dir");
        std::fs::write(
            AppConfig::settings_path(workspace.path()),
            r#"{"defaultApi": 1, "themeToggleState": 1}"#,
        )
        .expect("write");

        set_value(workspace.path(), "defaultApi", serde_json::json!("2")).expect("set");
        set_value(workspace.path(), "api.groq.model", serde_json::json!("llama3")).expect("set");

        let raw = std::fs::read_to_string(AppConfig::settings_path(workspace.path())).expect("read");
        let doc: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(doc["defaultApi"], 2);
        assert_eq!(doc["themeToggleState"], 1);
        assert_eq!(doc["api"]["groq"]["model"], "llama3");
    }

    #[test]
    fn set_api_key_model_updates_only_selected_provider() {
        let workspace = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(runtime_dir(workspace.path())).expect("dir");
        std::fs::write(
            AppConfig::settings_path(workspace.path()),
            r#"{"defaultApi": 1, "api": {"openai": {"key": "old", "model": "gpt"}, "groq": {"key": "g"}}}"#,
        )
        .expect("write");

        set_api_key_model(workspace.path(), "new-key", "").expect("update");

        let cfg = AppConfig::load(workspace.path());
        assert_eq!(cfg.credentials(ProviderKind::OpenAi).key, "new-key");
        // Empty model argument leaves the stored model untouched.
        assert_eq!(cfg.credentials(ProviderKind::OpenAi).model, "gpt");
        assert_eq!(cfg.credentials(ProviderKind::Groq).key, "g");
    }

    #[test]
    fn range_contains_positions_inclusively() {
        let range = LineRange::new(TextPosition::new(2, 4), TextPosition::new(4, 0));
        assert!(range.contains(TextPosition::new(2, 4)));
        assert!(range.contains(TextPosition::new(3, 0)));
        assert!(range.contains(TextPosition::new(4, 0)));
        assert!(!range.contains(TextPosition::new(2, 3)));
        assert!(!range.contains(TextPosition::new(4, 1)));
    }

    #[test]
    fn standard_response_uses_wire_field_names() {
        let parsed: StandardResponse = serde_json::from_str(
            r#"{"code":"x=1","message":"ok","lineRange":{"start":{"line":1,"position":2},"end":{"line":3,"position":4}}}"#,
        )
        .expect("parse");
        assert_eq!(parsed.code, "x=1");
        assert_eq!(parsed.line_range.start.position, 2);
    }

    #[test]
    fn display_update_carries_fixed_command() {
        let update = DisplayUpdate::new(DisplayElement::DisplayCode, "fn main() {}");
        let json = serde_json::to_value(&update).expect("json");
        assert_eq!(json["command"], "updateDisplay");
        assert_eq!(json["element"], "displayCode");
    }
}
