use anyhow::{Context, Result};
use lopdf::content::Content;
use lopdf::{Document, Encoding, Object, ObjectId};
use std::collections::BTreeMap;

/// Text of every page in page order. Text runs within a page are joined by
/// single spaces. Any page that fails to extract fails the whole document.
pub fn page_texts(bytes: &[u8]) -> Result<Vec<String>> {
    let document = Document::load_mem(bytes).context("not a readable PDF document")?;

    // get_pages is keyed by 1-based page number, so iteration is page order
    document
        .get_pages()
        .into_iter()
        .map(|(page, page_id)| {
            let runs = page_runs(&document, page_id)
                .with_context(|| format!("failed to extract text from page {page}"))?;
            Ok(join_runs(&runs))
        })
        .collect()
}

/// One string per text-showing operator on the page, in content order.
fn page_runs(document: &Document, page_id: ObjectId) -> Result<Vec<String>> {
    let encodings = document
        .get_page_fonts(page_id)?
        .into_iter()
        .map(|(name, font)| font.get_font_encoding(document).map(|encoding| (name, encoding)))
        .collect::<lopdf::Result<BTreeMap<Vec<u8>, Encoding>>>()?;
    let content = Content::decode(&document.get_page_content(page_id)?)?;

    let mut runs = Vec::new();
    let mut current = None;
    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tf" => {
                let font = operation
                    .operands
                    .first()
                    .context("Tf without a font operand")?
                    .as_name()?;
                current = encodings.get(font);
            }
            "Tj" | "TJ" | "'" | "\"" => match current {
                Some(encoding) => {
                    let mut run = String::new();
                    collect_run(&mut run, encoding, &operation.operands)?;
                    runs.push(run);
                }
                None => tracing::warn!("Text shown without a font, skipping run"),
            },
            _ => {}
        }
    }
    Ok(runs)
}

fn collect_run(run: &mut String, encoding: &Encoding, operands: &[Object]) -> Result<()> {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => run.push_str(&Document::decode_text(encoding, bytes)?),
            Object::Array(items) => collect_run(run, encoding, items)?,
            // large negative TJ adjustments are word gaps
            Object::Integer(adjust) if *adjust < -100 => run.push(' '),
            _ => {}
        }
    }
    Ok(())
}

fn join_runs(runs: &[String]) -> String {
    runs.iter()
        .flat_map(|run| run.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}
