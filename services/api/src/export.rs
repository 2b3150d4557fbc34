//! services/api/src/export.rs
//!
//! The export workflow: serializes a user-selected set of conversation
//! messages into a downloadable artifact, either a real PDF or a plain
//! text file served under the word-processor media type.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document as PdfDocument, Object, Stream};
use serde::Deserialize;
use utoipa::ToSchema;

use doc_chat_core::domain::{Message, MessageRole};

pub const PDF_FILE_NAME: &str = "chat.pdf";
pub const DOCX_FILE_NAME: &str = "chat.docx";
pub const PDF_MEDIA_TYPE: &str = "application/pdf";
/// The docx artifact carries plain text under this media type; it is a
/// compatibility shortcut, not a real OOXML container.
pub const DOCX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

// Page geometry (US Letter, 1in margins) and type metrics.
const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 72;
const FONT_SIZE: i64 = 11;
const LINE_HEIGHT: i64 = 14;
/// Column width the message text is wrapped to.
const WRAP_COLUMNS: usize = 90;

/// Target format for an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Docx,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Select at least one message to export")]
    EmptySelection,
    #[error("PDF rendering failed: {0}")]
    Pdf(String),
}

/// One downloadable artifact.
#[derive(Debug)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
    pub file_name: &'static str,
}

/// Renders the given messages (already filtered to the selection, in
/// log order) into the requested format. An empty selection is a
/// validation failure and produces no file.
pub fn export_messages(
    messages: &[Message],
    format: ExportFormat,
) -> Result<ExportArtifact, ExportError> {
    if messages.is_empty() {
        return Err(ExportError::EmptySelection);
    }
    match format {
        ExportFormat::Pdf => Ok(ExportArtifact {
            bytes: render_pdf(messages)?,
            media_type: PDF_MEDIA_TYPE,
            file_name: PDF_FILE_NAME,
        }),
        ExportFormat::Docx => Ok(ExportArtifact {
            bytes: render_docx_text(messages).into_bytes(),
            media_type: DOCX_MEDIA_TYPE,
            file_name: DOCX_FILE_NAME,
        }),
    }
}

pub fn role_label(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Model => "model",
    }
}

/// `ROLE: text` blocks separated by one blank line.
fn render_docx_text(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", role_label(m.role).to_uppercase(), m.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Greedy word wrap to `width` columns; words longer than a full line
/// are hard-split.
fn word_wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > width {
            // Flush whatever is pending, then split the oversized word.
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(width).collect();
            let head_len = head.len();
            lines.push(head);
            word = &word[head_len..];
        }
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Stacks each message as `[role] text`, word-wrapped, top to bottom
/// with fixed per-line spacing; starts a new page when the column is
/// full.
fn render_pdf(messages: &[Message]) -> Result<Vec<u8>, ExportError> {
    let mut pages_ops: Vec<Vec<Operation>> = Vec::new();
    let mut current: Vec<Operation> = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    for message in messages {
        let block = format!("[{}] {}", role_label(message.role), message.text);
        for line in word_wrap(&block, WRAP_COLUMNS) {
            if y < MARGIN {
                pages_ops.push(std::mem::take(&mut current));
                y = PAGE_HEIGHT - MARGIN;
            }
            current.push(Operation::new("BT", vec![]));
            current.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]));
            current.push(Operation::new("Td", vec![MARGIN.into(), y.into()]));
            current.push(Operation::new("Tj", vec![Object::string_literal(line)]));
            current.push(Operation::new("ET", vec![]));
            y -= LINE_HEIGHT;
        }
        // One blank line between messages.
        y -= LINE_HEIGHT;
    }
    pages_ops.push(current);

    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    let page_count = pages_ops.len() as i64;
    for operations in pages_ops {
        let content = Content { operations };
        let encoded = content
            .encode()
            .map_err(|e| ExportError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use doc_chat_core::domain::SourceMode;

    fn message(id: u64, role: MessageRole, text: &str) -> Message {
        Message {
            id,
            role,
            text: text.to_string(),
            sent_at: Utc::now(),
            mode: SourceMode::Doc,
        }
    }

    #[test]
    fn empty_selection_is_rejected() {
        let err = export_messages(&[], ExportFormat::Pdf).unwrap_err();
        assert!(matches!(err, ExportError::EmptySelection));
        let err = export_messages(&[], ExportFormat::Docx).unwrap_err();
        assert!(matches!(err, ExportError::EmptySelection));
    }

    #[test]
    fn docx_export_is_plain_role_text_blocks() {
        let messages = [
            message(1, MessageRole::User, "What is this about?"),
            message(2, MessageRole::Model, "It is about exporting."),
        ];
        let artifact = export_messages(&messages, ExportFormat::Docx).unwrap();
        assert_eq!(artifact.file_name, DOCX_FILE_NAME);
        assert_eq!(artifact.media_type, DOCX_MEDIA_TYPE);
        assert_eq!(
            String::from_utf8(artifact.bytes).unwrap(),
            "USER: What is this about?\n\nMODEL: It is about exporting."
        );
    }

    #[test]
    fn pdf_export_produces_a_parseable_pdf() {
        let messages = [
            message(1, MessageRole::User, "hello"),
            message(2, MessageRole::Model, "hi there"),
        ];
        let artifact = export_messages(&messages, ExportFormat::Pdf).unwrap();
        assert_eq!(artifact.file_name, PDF_FILE_NAME);
        assert!(artifact.bytes.starts_with(b"%PDF"));

        let parsed = lopdf::Document::load_mem(&artifact.bytes).unwrap();
        let text = parsed.extract_text(&[1]).unwrap();
        assert!(text.contains("[user] hello"));
        assert!(text.contains("[model] hi there"));
    }

    #[test]
    fn long_conversations_paginate() {
        let long_text = "word ".repeat(400);
        let messages: Vec<Message> = (0..30)
            .map(|i| message(i, MessageRole::User, long_text.trim()))
            .collect();
        let artifact = export_messages(&messages, ExportFormat::Pdf).unwrap();
        let parsed = lopdf::Document::load_mem(&artifact.bytes).unwrap();
        assert!(parsed.get_pages().len() > 1);
    }

    #[test]
    fn word_wrap_respects_the_column_width() {
        let lines = word_wrap("one two three four five", 9);
        assert_eq!(lines, vec!["one two", "three", "four five"]);
        for line in &lines {
            assert!(line.chars().count() <= 9);
        }
    }

    #[test]
    fn word_wrap_hard_splits_oversized_words() {
        let lines = word_wrap("abcdefghijklmnop", 5);
        assert_eq!(lines, vec!["abcde", "fghij", "klmno", "p"]);
    }

    #[test]
    fn word_wrap_of_empty_text_yields_one_empty_line() {
        assert_eq!(word_wrap("", 10), vec![String::new()]);
    }
}
