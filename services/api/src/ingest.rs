//! services/api/src/ingest.rs
//!
//! The document ingestion pipeline: turns one uploaded file (bytes +
//! declared media type + filename) into a stored `Document` record with
//! extracted text content.

use chrono::Utc;
use uuid::Uuid;

use doc_chat_core::domain::{Document, DocumentKind};

/// Instruction assigned to every freshly ingested document; editable by
/// an admin afterwards.
const DEFAULT_INSTRUCTION: &str =
    "Answer the user's questions using the content of this document.";

/// Ingestion failure. The document collection is never touched when
/// extraction fails.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("Uploaded file is not valid UTF-8 text: {0}")]
    Text(String),
}

/// Builds a new document record from an uploaded file.
///
/// Page-oriented media types go through per-page text extraction; every
/// other upload is decoded as plain text. No size cap is applied here;
/// truncation happens later, at prompt assembly.
pub fn ingest_file(
    bytes: &[u8],
    content_type: &str,
    filename: &str,
) -> Result<Document, IngestError> {
    let (content, kind) = if is_pdf_media_type(content_type) {
        (extract_pdf_text(bytes)?, DocumentKind::Pdf)
    } else {
        (decode_plain_text(bytes)?, DocumentKind::Text)
    };
    Ok(Document {
        id: Uuid::new_v4(),
        name: filename.to_string(),
        content,
        instruction: DEFAULT_INSTRUCTION.to_string(),
        uploaded_at: Utc::now(),
        kind,
    })
}

fn is_pdf_media_type(content_type: &str) -> bool {
    content_type.contains("pdf")
}

/// Walks every page in page order, extracts the page's text fragments,
/// and joins fragments and pages with single spaces. Handles any page
/// count.
fn extract_pdf_text(bytes: &[u8]) -> Result<String, IngestError> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|e| IngestError::Pdf(e.to_string()))?;
    let mut out = String::new();
    // get_pages keys are 1-based page numbers in document order.
    for page_number in document.get_pages().keys() {
        let page_text = document
            .extract_text(&[*page_number])
            .map_err(|e| IngestError::Pdf(e.to_string()))?;
        let fragments: Vec<&str> = page_text.split_whitespace().collect();
        if fragments.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&fragments.join(" "));
    }
    Ok(out)
}

fn decode_plain_text(bytes: &[u8]) -> Result<String, IngestError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| IngestError::Text(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document as PdfDocument, Object, Stream};

    /// Builds a valid PDF with one line of text per page.
    fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
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
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().unwrap(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages.len() as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn plain_text_upload_is_decoded_directly() {
        let doc = ingest_file(b"Hello world", "text/plain", "hello.txt").unwrap();
        assert_eq!(doc.content, "Hello world");
        assert_eq!(doc.kind, DocumentKind::Text);
        assert_eq!(doc.name, "hello.txt");
        assert!(!doc.instruction.is_empty());
    }

    #[test]
    fn unknown_media_types_fall_back_to_plain_text() {
        let doc = ingest_file(b"a,b,c", "text/csv", "table.csv").unwrap();
        assert_eq!(doc.content, "a,b,c");
        assert_eq!(doc.kind, DocumentKind::Text);
    }

    #[test]
    fn multi_page_pdf_joins_pages_in_order() {
        let bytes = pdf_with_pages(&["First page text", "Second page text", "Third page text"]);
        let doc = ingest_file(&bytes, "application/pdf", "report.pdf").unwrap();
        assert_eq!(
            doc.content,
            "First page text Second page text Third page text"
        );
        assert_eq!(doc.kind, DocumentKind::Pdf);
    }

    #[test]
    fn corrupt_pdf_fails_with_ingest_error() {
        let err = ingest_file(b"not a pdf", "application/pdf", "bad.pdf").unwrap_err();
        assert!(matches!(err, IngestError::Pdf(_)));
    }

    #[test]
    fn invalid_utf8_text_fails_with_ingest_error() {
        let err = ingest_file(&[0xff, 0xfe, 0x00], "text/plain", "bad.txt").unwrap_err();
        assert!(matches!(err, IngestError::Text(_)));
    }
}
