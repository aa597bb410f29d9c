//! Request orchestration: the session state machine behind the sidebar,
//! the diagnostic-triggered inline completion provider, and the hover
//! fix-in-chat flow.
//!
//! One logical thread of control per session. Session state is mutated
//! only by the handlers here, giving it single-writer semantics. There is
//! no cancellation and no queueing: a trigger arriving while another
//! request is in flight is simply a new request, and the last response to
//! resolve wins, overwriting session state. That race is accepted, not a
//! guaranteed-fresh contract.

use anyhow::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tandem_context::build_context;
use tandem_core::{
    AppConfig, Diagnostic, DisplayElement, DisplayUpdate, DocumentSnapshot, LineRange,
    RequestType, TextPosition, set_api_key_model, set_value,
};
use tandem_errors::classify;
use tandem_llm::{client_for, normalize};
use tandem_observe::{EventEnvelope, Observer, RequestEvent};
use tandem_prompt::{ComposedPrompt, compose, fix_prompt};
use uuid::Uuid;

/// The editor collaborator: document access, diagnostics, edits, and
/// user-visible notifications. The core never touches the editor host
/// directly.
pub trait EditorHost {
    fn active_document(&self) -> Option<DocumentSnapshot>;
    /// Project root containing `path`, if the editor knows one.
    fn workspace_root(&self, path: &Path) -> Option<PathBuf>;
    fn diagnostics(&self, path: &Path) -> Vec<Diagnostic>;
    /// Replace the text at `range` with `text`. Attempted at most once per
    /// Set action; failures are reported, never retried.
    fn apply_edit(&self, path: &Path, range: &LineRange, text: &str) -> Result<()>;
    fn show_info(&self, message: &str);
    fn show_error(&self, message: &str);
}

/// The UI collaborator. The core only emits named content updates; it
/// never renders.
pub trait DisplaySink {
    fn update_display(&self, update: DisplayUpdate);
}

/// Seam over provider resolution and dispatch, swappable in tests.
pub trait ProviderGateway {
    fn complete(&self, cfg: &AppConfig, prompt: &str, system_role: &str) -> Result<String>;
}

/// Production gateway: resolves the adapter from configuration on every
/// request, so a provider switch takes effect immediately.
pub struct LiveGateway;

impl ProviderGateway for LiveGateway {
    fn complete(&self, cfg: &AppConfig, prompt: &str, system_role: &str) -> Result<String> {
        Ok(client_for(cfg)?.complete(prompt, system_role))
    }
}

/// Sidebar session state. Owned exclusively by the orchestrator; reset to
/// defaults by the Reject action.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub last_code: String,
    pub last_message: String,
    pub last_range: LineRange,
    pub context_enabled: bool,
    pub pending_additional_text: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            last_code: String::new(),
            last_message: String::new(),
            last_range: LineRange::default(),
            context_enabled: true,
            pending_additional_text: String::new(),
        }
    }
}

/// Messages arriving from the sidebar webview.
#[derive(Debug, Clone)]
pub enum SidebarCommand {
    Get,
    Set,
    Reject,
    ToggleContext { enabled: bool },
    UpdateAdditionalMessage { message: String },
    ApiSelected { index: i64 },
    SubmitSettings { api_key: String, model_name: String },
    ToggleInlineSuggestions { enabled: bool },
    ShowInfo { text: String },
    ShowError { text: String },
}

/// One inline completion item: `insert_text` inserted at `range`.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineCompletion {
    pub insert_text: String,
    pub range: LineRange,
}

pub struct Orchestrator<E, D, G> {
    workspace: PathBuf,
    editor: E,
    display: D,
    gateway: G,
    observer: Observer,
    session_id: Uuid,
    seq_no: u64,
    state: SessionState,
    current_diagnostic: Option<Diagnostic>,
}

impl<E: EditorHost, D: DisplaySink, G: ProviderGateway> Orchestrator<E, D, G> {
    pub fn new(workspace: &Path, editor: E, display: D, gateway: G) -> Result<Self> {
        Ok(Self {
            workspace: workspace.to_path_buf(),
            editor,
            display,
            gateway,
            observer: Observer::new(workspace)?,
            session_id: Uuid::now_v7(),
            seq_no: 0,
            state: SessionState::default(),
            current_diagnostic: None,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn current_diagnostic(&self) -> Option<&Diagnostic> {
        self.current_diagnostic.as_ref()
    }

    pub fn handle_command(&mut self, command: SidebarCommand) {
        match command {
            SidebarCommand::Get => self.handle_get(),
            SidebarCommand::Set => self.handle_set(),
            SidebarCommand::Reject => self.handle_reject(),
            SidebarCommand::ToggleContext { enabled } => {
                self.state.context_enabled = enabled;
            }
            SidebarCommand::UpdateAdditionalMessage { message } => {
                self.state.pending_additional_text = message;
            }
            SidebarCommand::ApiSelected { index } => {
                if let Err(err) = set_value(&self.workspace, "defaultApi", serde_json::json!(index))
                {
                    self.editor.show_error(&classify(&err).format());
                }
            }
            SidebarCommand::SubmitSettings { api_key, model_name } => {
                if api_key.is_empty() && model_name.is_empty() {
                    return;
                }
                if let Err(err) = set_api_key_model(&self.workspace, &api_key, &model_name) {
                    self.editor.show_error(&classify(&err).format());
                }
            }
            SidebarCommand::ToggleInlineSuggestions { enabled } => {
                let value = serde_json::json!(if enabled { 1 } else { 0 });
                if let Err(err) = set_value(&self.workspace, "inlineSuggestion", value) {
                    self.editor.show_error(&classify(&err).format());
                }
            }
            SidebarCommand::ShowInfo { text } => self.editor.show_info(&text),
            SidebarCommand::ShowError { text } => self.editor.show_error(&text),
        }
    }

    /// Manual sidebar request: prompt per the context flag, provider call,
    /// normalize, store, display. Errors leave prior session state
    /// untouched.
    fn handle_get(&mut self) {
        let cfg = AppConfig::load(&self.workspace);
        let doc = self.editor.active_document();

        let composed = if self.state.context_enabled {
            let root = doc
                .as_ref()
                .and_then(|d| self.editor.workspace_root(&d.path));
            let blob = build_context(doc.as_ref(), root.as_deref());
            compose(
                RequestType::ChatWithContext,
                Some(&blob),
                Some(&self.state.pending_additional_text),
            )
        } else {
            // Without context the user text stands alone; when it is empty
            // the full active document text takes its place.
            let user_text = if self.state.pending_additional_text.is_empty() {
                doc.as_ref().map(|d| d.text.clone()).unwrap_or_default()
            } else {
                self.state.pending_additional_text.clone()
            };
            compose(RequestType::ChatWithoutContext, None, Some(&user_text))
        };

        let request_type = if self.state.context_enabled {
            "chat_with_context"
        } else {
            "chat_without_context"
        };
        self.record(RequestEvent::RequestStarted {
            source: "sidebar".to_string(),
            request_type: request_type.to_string(),
        });
        self.dispatch(&cfg, composed);
    }

    /// Shared provider-call tail for Get and fix-in-chat.
    fn dispatch(&mut self, cfg: &AppConfig, composed: ComposedPrompt) {
        match self
            .gateway
            .complete(cfg, &composed.prompt, composed.system_role)
        {
            Ok(raw) => {
                self.update(DisplayElement::AdditionalMessageInput, "");

                let parse_ok = serde_json::from_str::<serde_json::Value>(&raw)
                    .map(|v| v.is_object())
                    .unwrap_or(false);
                let response = normalize(&raw);
                self.record(RequestEvent::ResponseReceived {
                    provider: cfg.provider().to_string(),
                    parse_ok,
                });

                self.state.last_code = response.code;
                self.state.last_message = response.message;
                self.state.last_range = response.line_range;
                self.update(DisplayElement::DisplayCode, &self.state.last_code.clone());
                self.update(DisplayElement::DisplayMessage, &self.state.last_message.clone());
            }
            Err(err) => {
                let user = classify(&err);
                self.observer.warn_log(&user.message);
                self.editor.show_error(&user.format());
            }
        }
    }

    /// Apply the stored suggestion at its stored range. Requires a pending
    /// suggestion; the edit is attempted at most once and state is cleared
    /// regardless of the edit's outcome.
    fn handle_set(&mut self) {
        let Some(doc) = self.editor.active_document() else {
            self.report_precondition("No active editor found.");
            return;
        };
        if self.state.last_code.is_empty() {
            self.report_precondition("No code suggestion available to set.");
            return;
        }

        let range = self.state.last_range;
        let code = std::mem::take(&mut self.state.last_code);
        self.state.last_range = LineRange::default();

        match self.editor.apply_edit(&doc.path, &range, &code) {
            Ok(()) => {
                self.record(RequestEvent::EditApplied);
                self.editor.show_info("Code suggestion applied successfully.");
                self.update(DisplayElement::DisplayCode, "");
                self.update(
                    DisplayElement::DisplayMessage,
                    "Code suggestion applied. Ready for next suggestion.",
                );
            }
            Err(err) => {
                self.observer.warn_log(&format!("edit failed: {err}"));
                self.editor.show_error("Failed to apply code suggestion.");
            }
        }
    }

    /// Unconditionally reset all session fields and blank both display
    /// surfaces. Always succeeds.
    fn handle_reject(&mut self) {
        self.state = SessionState::default();
        self.record(RequestEvent::SessionCleared);
        self.update(DisplayElement::DisplayMessage, "");
        self.update(DisplayElement::DisplayCode, "");
    }

    /// Inline completion provider entry point. Fires only when an
    /// error-severity diagnostic covers the position; everything else is
    /// an empty list, not an error.
    pub fn inline_completions(
        &mut self,
        doc: &DocumentSnapshot,
        position: TextPosition,
    ) -> Vec<InlineCompletion> {
        let has_error_here = self
            .editor
            .diagnostics(&doc.path)
            .iter()
            .any(|d| d.is_error() && d.range.contains(position));
        if !has_error_here {
            return Vec::new();
        }

        let cfg = AppConfig::load(&self.workspace);
        let root = self.editor.workspace_root(&doc.path);
        let blob = build_context(Some(doc), root.as_deref());
        let composed = compose(RequestType::InlineSuggestion, Some(&blob), None);

        self.record(RequestEvent::RequestStarted {
            source: "inline".to_string(),
            request_type: "inline_suggestion".to_string(),
        });

        match self
            .gateway
            .complete(&cfg, &composed.prompt, composed.system_role)
        {
            Ok(raw) => {
                let response = normalize(&raw);
                self.record(RequestEvent::ResponseReceived {
                    provider: cfg.provider().to_string(),
                    parse_ok: !response.code.is_empty(),
                });
                if response.code.is_empty() {
                    Vec::new()
                } else {
                    vec![InlineCompletion {
                        insert_text: response.code,
                        range: LineRange::at(position),
                    }]
                }
            }
            Err(err) => {
                self.observer.warn_log(&classify(&err).message);
                Vec::new()
            }
        }
    }

    /// Hover handler: remember the diagnostic under the hovered position.
    /// Each new hover over a diagnostic overwrites the previous capture.
    pub fn capture_diagnostic(
        &mut self,
        path: &Path,
        position: TextPosition,
    ) -> Option<Diagnostic> {
        let found = self
            .editor
            .diagnostics(path)
            .into_iter()
            .find(|d| d.range.contains(position));
        if let Some(diagnostic) = &found {
            self.current_diagnostic = Some(diagnostic.clone());
        }
        found
    }

    /// Hover "fix in chat": requires an active editor and a previously
    /// captured diagnostic. The captured diagnostic is consumed once the
    /// dispatch is attempted, regardless of its outcome; precondition
    /// failures leave it in place.
    pub fn fix_in_chat(&mut self) {
        let Some(doc) = self.editor.active_document() else {
            self.report_precondition("No active editor found");
            return;
        };
        let Some(diagnostic) = self.current_diagnostic.take() else {
            self.report_precondition(
                "No error selected. Please hover over an error and try again.",
            );
            return;
        };

        let cfg = AppConfig::load(&self.workspace);
        let prompt_text = fix_prompt(&diagnostic, &doc);
        let composed = compose(RequestType::InlineTooltip, None, Some(&prompt_text));

        self.record(RequestEvent::RequestStarted {
            source: "hover".to_string(),
            request_type: "inline_tooltip".to_string(),
        });
        self.dispatch(&cfg, composed);
    }

    fn report_precondition(&mut self, message: &str) {
        self.record(RequestEvent::PreconditionFailed {
            message: message.to_string(),
        });
        self.editor.show_error(message);
    }

    fn update(&self, element: DisplayElement, content: &str) {
        self.display.update_display(DisplayUpdate::new(element, content));
    }

    fn record(&mut self, event: RequestEvent) {
        self.seq_no += 1;
        let envelope = EventEnvelope {
            seq_no: self.seq_no,
            at: Utc::now(),
            session_id: self.session_id,
            event,
        };
        // The log is a flight recorder; a failed write never surfaces.
        let _ = self.observer.record_event(&envelope);
    }
}
