use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use tracing::debug;
use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::errors::AppError;

/// Result of one field write. Failures here are recovered: the document
/// is still produced, the skip is only reported for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Written { field: String, cell: String },
    Skipped { field: String, reason: String },
}

/// One in-memory instance of the report template. Never shared between
/// requests; dropped after serialization.
pub struct TemplateDocument {
    book: Spreadsheet,
    /// Member coordinate → anchor (top-left) coordinate, covering every
    /// cell of every merged range on the first sheet. Built once at load
    /// so each write is a hash lookup instead of a range scan.
    merge_anchors: HashMap<(u32, u32), (u32, u32)>,
}

impl TemplateDocument {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let data = std::fs::read(path).map_err(|e| AppError::TemplateLoad(e.to_string()))?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, AppError> {
        let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(data), true)
            .map_err(|e| AppError::TemplateLoad(e.to_string()))?;
        let merge_anchors = build_merge_map(&book);
        Ok(Self { book, merge_anchors })
    }

    /// Write `value` into the cell at `address`, redirecting writes that
    /// target a merged-region member to the region's anchor. Any fault is
    /// absorbed into a `Skipped` outcome; nothing propagates.
    pub fn set_cell(&mut self, field: &str, address: &str, value: &str) -> FieldOutcome {
        let Some((col, row)) = parse_coordinate(address) else {
            return FieldOutcome::Skipped {
                field: field.to_string(),
                reason: format!("unparseable cell address '{address}'"),
            };
        };

        let (col, row) = self
            .merge_anchors
            .get(&(col, row))
            .copied()
            .unwrap_or((col, row));
        let target = coordinate_to_a1(col, row);

        let Some(sheet) = self.book.get_sheet_mut(&0) else {
            return FieldOutcome::Skipped {
                field: field.to_string(),
                reason: "workbook has no sheets".to_string(),
            };
        };
        sheet.get_cell_mut(target.as_str()).set_value(value);
        debug!(field = %field, cell = %target, "cell written");

        FieldOutcome::Written {
            field: field.to_string(),
            cell: target,
        }
    }

    /// Current value at an A1 address on the first sheet (empty string
    /// for untouched cells).
    pub fn value_at(&self, address: &str) -> String {
        self.book
            .get_sheet(&0)
            .map(|sheet| sheet.get_value(address))
            .unwrap_or_default()
    }

    pub(crate) fn sheet_mut(&mut self) -> Option<&mut Worksheet> {
        self.book.get_sheet_mut(&0)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AppError> {
        let mut cursor = Cursor::new(Vec::new());
        umya_spreadsheet::writer::xlsx::write_writer(&self.book, &mut cursor)
            .map_err(|e| AppError::Render(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

fn build_merge_map(book: &Spreadsheet) -> HashMap<(u32, u32), (u32, u32)> {
    let mut map = HashMap::new();
    let Some(sheet) = book.get_sheet(&0) else {
        return map;
    };
    for range in sheet.get_merge_cells() {
        let Some((c0, r0, c1, r1)) = parse_range(&range.get_range()) else {
            continue;
        };
        for row in r0..=r1 {
            for col in c0..=c1 {
                map.insert((col, row), (c0, r0));
            }
        }
    }
    map
}

// ─── A1 coordinate helpers ───────────────────────────────────────────────────

/// "C" → 3, "AA" → 27. Columns are 1-based.
fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut n: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        n = n.checked_mul(26)?;
        n = n.checked_add((ch.to_ascii_uppercase() as u8 - b'A') as u32 + 1)?;
    }
    Some(n)
}

fn column_letters(mut col: u32) -> String {
    let mut out = Vec::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        out.push(b'A' + rem);
        col = (col - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// "C8" → (3, 8). Rejects anything that is not letters-then-digits.
fn parse_coordinate(address: &str) -> Option<(u32, u32)> {
    let split = address.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = address.split_at(split);
    let col = column_number(letters)?;
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((col, row))
}

fn coordinate_to_a1(col: u32, row: u32) -> String {
    format!("{}{}", column_letters(col), row)
}

/// "A1:B2" (or a degenerate single-cell "A1") → (min_col, min_row,
/// max_col, max_row).
fn parse_range(range: &str) -> Option<(u32, u32, u32, u32)> {
    let mut parts = range.splitn(2, ':');
    let (c0, r0) = parse_coordinate(parts.next()?)?;
    let (c1, r1) = match parts.next() {
        Some(end) => parse_coordinate(end)?,
        None => (c0, r0),
    };
    Some((c0.min(c1), r0.min(r1), c0.max(c1), r0.max(r1)))
}
