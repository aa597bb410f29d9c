//! System-role templates and prompt assembly.
//!
//! Each [`RequestType`] maps to exactly one fixed system-role template and
//! one prompt-assembly rule. Composition never fails: missing context or
//! user text is treated as an empty string, not an error.

use tandem_context::ContextBlob;
use tandem_core::{Diagnostic, DocumentSnapshot, RequestType};

/// Role for sidebar requests that carry project context and a code window.
pub const CHAT_CONTEXT_ROLE: &str = r#"You are Tandem, an AI pair programmer embedded in a code editor.

You receive a code window around the user's cursor, project context (language, directory tree, a rough symbol index), and optionally a request from the user. Use the context to keep suggestions consistent with the surrounding project: match its language, naming, and style. Never invent files or symbols that do not appear in the context.

Respond ONLY with a single JSON object, no prose outside it:
{"code": "<replacement or completion code>", "message": "<one-sentence explanation>", "lineRange": {"start": {"line": 0, "position": 0}, "end": {"line": 0, "position": 0}}}
Line and position values are zero-based and identify where `code` should replace existing text. Use a zero range when no replacement target applies."#;

/// Role for sidebar requests that carry only the user's message.
pub const CHAT_MESSAGE_ROLE: &str = r#"You are Tandem, an AI pair programmer embedded in a code editor.

You receive a request or a piece of code from the user with no project context. Answer from the request alone; do not assume anything about the surrounding project.

Respond ONLY with a single JSON object, no prose outside it:
{"code": "<replacement or completion code>", "message": "<one-sentence explanation>", "lineRange": {"start": {"line": 0, "position": 0}, "end": {"line": 0, "position": 0}}}
Line and position values are zero-based and identify where `code` should replace existing text. Use a zero range when no replacement target applies."#;

/// Role for diagnostic-triggered inline completions.
pub const INLINE_SUGGESTION_ROLE: &str = r#"You are Tandem, providing an inline code completion at a position the editor has flagged with an error.

You receive a code window and project context. Produce the smallest completion that resolves the flagged problem at the cursor. Output code only in the `code` field; it is inserted verbatim at the cursor.

Respond ONLY with a single JSON object, no prose outside it:
{"code": "<replacement or completion code>", "message": "<one-sentence explanation>", "lineRange": {"start": {"line": 0, "position": 0}, "end": {"line": 0, "position": 0}}}
Line and position values are zero-based and identify where `code` should replace existing text. Use a zero range when no replacement target applies."#;

/// Role for hover-initiated fix requests built from a diagnostic.
pub const INLINE_TOOLTIP_ROLE: &str = r#"You are Tandem, fixing a compiler or linter error the user hovered over.

You receive the diagnostic message, the full document, and the error's line and column. Produce a corrected version of the faulty code and set `lineRange` to the region your `code` should replace.

Respond ONLY with a single JSON object, no prose outside it:
{"code": "<replacement or completion code>", "message": "<one-sentence explanation>", "lineRange": {"start": {"line": 0, "position": 0}, "end": {"line": 0, "position": 0}}}
Line and position values are zero-based and identify where `code` should replace existing text. Use a zero range when no replacement target applies."#;

/// A prompt ready for provider dispatch.
#[derive(Debug, Clone)]
pub struct ComposedPrompt {
    pub prompt: String,
    pub system_role: &'static str,
}

/// The fixed template for a request type. Always non-empty.
pub fn system_role(request_type: RequestType) -> &'static str {
    match request_type {
        RequestType::ChatWithContext => CHAT_CONTEXT_ROLE,
        RequestType::ChatWithoutContext => CHAT_MESSAGE_ROLE,
        RequestType::InlineSuggestion => INLINE_SUGGESTION_ROLE,
        RequestType::InlineTooltip => INLINE_TOOLTIP_ROLE,
    }
}

/// Assemble the final prompt for a request type.
pub fn compose(
    request_type: RequestType,
    context: Option<&ContextBlob>,
    user_text: Option<&str>,
) -> ComposedPrompt {
    let window = context.map(|b| b.code_window.as_str()).unwrap_or_default();
    let context_text = context.map(ContextBlob::context_text).unwrap_or_default();
    let user_text = user_text.unwrap_or_default();

    let prompt = match request_type {
        RequestType::ChatWithContext => format!("{window}\n{context_text}\n{user_text}"),
        RequestType::ChatWithoutContext => user_text.to_string(),
        RequestType::InlineSuggestion => format!("{window}\n{context_text}"),
        RequestType::InlineTooltip => user_text.to_string(),
    };

    ComposedPrompt {
        prompt,
        system_role: system_role(request_type),
    }
}

/// Build the tooltip fix prompt from a captured diagnostic: the message,
/// the full document fenced with its language id, and the 1-based
/// line/column of the diagnostic start.
pub fn fix_prompt(diagnostic: &Diagnostic, doc: &DocumentSnapshot) -> String {
    format!(
        "Error: {}\nCode:\n```{}\n{}\n```\nPlease provide a fix for the error at line {}, column {}.",
        diagnostic.message,
        doc.language_id,
        doc.text,
        diagnostic.range.start.line + 1,
        diagnostic.range.start.position + 1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tandem_core::{DiagnosticSeverity, LineRange, TextPosition};

    const ALL_TYPES: [RequestType; 4] = [
        RequestType::ChatWithContext,
        RequestType::ChatWithoutContext,
        RequestType::InlineSuggestion,
        RequestType::InlineTooltip,
    ];

    #[test]
    fn every_request_type_has_a_nonempty_role() {
        for rt in ALL_TYPES {
            assert!(!system_role(rt).is_empty());
            assert!(system_role(rt).contains("lineRange"));
        }
    }

    #[test]
    fn compose_tolerates_absent_context_and_user_text() {
        for rt in ALL_TYPES {
            let composed = compose(rt, None, None);
            assert!(!composed.system_role.is_empty());
            // Prompt may be empty text but is always produced.
            assert!(composed.prompt.len() < 16);
        }
    }

    #[test]
    fn message_only_chat_sends_user_text_alone() {
        let composed = compose(RequestType::ChatWithoutContext, None, Some("fix bug"));
        assert_eq!(composed.prompt, "fix bug");
        assert_eq!(composed.system_role, CHAT_MESSAGE_ROLE);
    }

    #[test]
    fn context_chat_layers_window_context_and_user_text() {
        let blob = ContextBlob {
            language_label: "Rust".to_string(),
            directory_tree: "Directory Tree:\nmain.rs\n".to_string(),
            file_symbol_index: String::new(),
            code_window: "Code:\nfn main() {}".to_string(),
        };
        let composed = compose(RequestType::ChatWithContext, Some(&blob), Some("add logging"));
        assert!(composed.prompt.starts_with("Code:\nfn main() {}"));
        assert!(composed.prompt.contains("Language: Rust"));
        assert!(composed.prompt.ends_with("add logging"));

        let inline = compose(RequestType::InlineSuggestion, Some(&blob), None);
        assert!(inline.prompt.contains("Directory Tree:"));
        assert!(!inline.prompt.contains("add logging"));
        assert_eq!(inline.system_role, INLINE_SUGGESTION_ROLE);
    }

    #[test]
    fn fix_prompt_reports_one_based_location() {
        let diagnostic = Diagnostic {
            message: "undefined var".to_string(),
            range: LineRange::at(TextPosition::new(10, 4)),
            severity: DiagnosticSeverity::Error,
        };
        let doc = DocumentSnapshot {
            path: PathBuf::from("main.py"),
            language_id: "python".to_string(),
            text: "print(x)".to_string(),
            cursor: TextPosition::default(),
        };
        let prompt = fix_prompt(&diagnostic, &doc);
        assert!(prompt.starts_with("Error: undefined var\n"));
        assert!(prompt.contains("```python\nprint(x)\n```"));
        assert!(prompt.contains("line 11, column 5"));
    }
}
