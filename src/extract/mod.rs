//! Content extraction: turns one attached file into content units

pub mod docx;
pub mod pdf;
pub mod workbook;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::error::{ChatError, Result};
use crate::models::{ContentUnit, PendingAttachment};

/// Converts a single attachment into an ordered sequence of content units.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, attachment: &PendingAttachment) -> Result<Vec<ContentUnit>>;
}

/// Format handler chosen for an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    Image,
    Word,
    Pdf,
    Workbook,
    PlainText,
    Unsupported,
}

#[derive(Debug, Clone, Copy)]
enum Key {
    MediaPrefix(&'static str),
    Suffix(&'static str),
}

impl Key {
    fn matches(self, media_type: &str, lower_name: &str) -> bool {
        match self {
            Key::MediaPrefix(prefix) => media_type.starts_with(prefix),
            Key::Suffix(suffix) => lower_name.ends_with(suffix),
        }
    }
}

// Evaluated top to bottom, first match wins.
const DISPATCH: &[(Key, Decoder)] = &[
    (Key::MediaPrefix("image/"), Decoder::Image),
    (Key::Suffix(".docx"), Decoder::Word),
    (Key::Suffix(".pdf"), Decoder::Pdf),
    (Key::Suffix(".xlsx"), Decoder::Workbook),
    (Key::Suffix(".xls"), Decoder::Workbook),
    (Key::MediaPrefix("text/"), Decoder::PlainText),
    (Key::Suffix(".txt"), Decoder::PlainText),
    (Key::Suffix(".csv"), Decoder::PlainText),
    (Key::Suffix(".json"), Decoder::PlainText),
    (Key::Suffix(".md"), Decoder::PlainText),
];

impl Decoder {
    pub fn select(media_type: &str, name: &str) -> Self {
        let lower_name = name.to_lowercase();
        DISPATCH
            .iter()
            .find(|(key, _)| key.matches(media_type, &lower_name))
            .map(|(_, decoder)| *decoder)
            .unwrap_or(Decoder::Unsupported)
    }
}

/// Human-readable marker placed in front of every text unit derived from a file.
pub fn origin_marker(name: &str) -> String {
    format!("--- Content from {name} ---\n")
}

fn unsupported_notice(attachment: &PendingAttachment) -> String {
    format!(
        "[Attached file {} has type {}, which is not supported for content extraction]",
        attachment.name, attachment.media_type
    )
}

/// Decode already-read bytes with the given handler.
pub fn decode(
    decoder: Decoder,
    attachment: &PendingAttachment,
    bytes: Vec<u8>,
) -> Result<Vec<ContentUnit>> {
    let name = attachment.name.as_str();
    let parse_err = |e: anyhow::Error| ChatError::parse(name, &e);

    let unit = match decoder {
        Decoder::Image => {
            ContentUnit::inline(attachment.media_type.clone(), STANDARD.encode(&bytes))
        }
        Decoder::Word => {
            let paragraphs = docx::paragraphs(&bytes).map_err(parse_err)?;
            ContentUnit::text(origin_marker(name) + &paragraphs.join("\n"))
        }
        Decoder::Pdf => {
            let pages = pdf::page_texts(&bytes).map_err(parse_err)?;
            ContentUnit::text(origin_marker(name) + &pages.join("\n"))
        }
        Decoder::Workbook => {
            let sheets = workbook::sheet_blocks(&bytes).map_err(parse_err)?;
            ContentUnit::text(origin_marker(name) + &sheets.concat())
        }
        Decoder::PlainText => {
            ContentUnit::text(origin_marker(name) + &String::from_utf8_lossy(&bytes))
        }
        Decoder::Unsupported => ContentUnit::text(unsupported_notice(attachment)),
    };

    Ok(vec![unit])
}

/// Extractor backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExtractor;

impl FileExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for FileExtractor {
    async fn extract(&self, attachment: &PendingAttachment) -> Result<Vec<ContentUnit>> {
        let decoder = Decoder::select(&attachment.media_type, &attachment.name);
        tracing::debug!(
            file = %attachment.name,
            media_type = %attachment.media_type,
            ?decoder,
            "Extracting attachment"
        );

        if decoder == Decoder::Unsupported {
            tracing::warn!(
                file = %attachment.name,
                media_type = %attachment.media_type,
                "No extractor for media type, sending a placeholder"
            );
            return decode(decoder, attachment, Vec::new());
        }

        let bytes = tokio::fs::read(&attachment.path)
            .await
            .map_err(|source| ChatError::FileRead {
                file: attachment.name.clone(),
                source,
            })?;

        decode(decoder, attachment, bytes)
    }
}
