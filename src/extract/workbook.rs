use anyhow::{Context, Result};
use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;

/// One block per sheet, in workbook order: a header line naming the sheet
/// followed by the sheet as comma-separated rows.
///
/// Handles both the legacy (.xls) and the modern (.xlsx) formats.
pub fn sheet_blocks(bytes: &[u8]) -> Result<Vec<String>> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).context("not a readable workbook")?;

    let names = workbook.sheet_names();
    names
        .into_iter()
        .map(|name| {
            let range = workbook
                .worksheet_range(&name)
                .with_context(|| format!("failed to read sheet {name}"))?;
            Ok(format!("--- Sheet: {name} ---\n{}\n", range_to_csv(&range)))
        })
        .collect()
}

fn range_to_csv(range: &Range<Data>) -> String {
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::Empty => String::new(),
                    other => csv_field(&other.to_string()),
                })
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
