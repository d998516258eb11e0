use anyhow::{Context, Result};
use std::io::{Cursor, Read};
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";

/// Raw text of a Word document body, one entry per non-empty paragraph.
pub fn paragraphs(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).context("not a Word document container")?;
    let mut entry = archive
        .by_name(DOCUMENT_PART)
        .with_context(|| format!("missing {DOCUMENT_PART}"))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .context("failed to read document body")?;

    Ok(xml_to_paragraphs(&xml))
}

fn xml_to_paragraphs(xml: &str) -> Vec<String> {
    let mut text = String::with_capacity(xml.len());
    let mut tag = String::new();
    let mut in_tag = false;
    for ch in xml.chars() {
        match ch {
            '<' if !in_tag => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                if let Some(replacement) = tag_text(&tag) {
                    text.push(replacement);
                }
            }
            _ if in_tag => tag.push(ch),
            _ => text.push(ch),
        }
    }

    decode_xml_entities(&text)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// What a markup tag stands for in plain text, if anything.
fn tag_text(tag: &str) -> Option<char> {
    let body = tag.trim_end_matches('/').trim();
    let name = body.split_whitespace().next().unwrap_or_default();
    match name {
        "/w:p" | "w:br" | "w:cr" => Some('\n'),
        // <w:tab> with attributes is a tab stop definition, not a tab
        "w:tab" if body == name => Some('\t'),
        _ => None,
    }
}

fn decode_xml_entities(text: &str) -> String {
    // &amp; last, so "&amp;lt;" stays "&lt;"
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
