//! Minimal single-sheet SpreadsheetML workbook codec.
//!
//! Encoding is byte-deterministic: parts are written in a fixed order with
//! a fixed timestamp, so the same table always yields the same bytes.

use std::io::{Cursor, Read, Seek, Write};

use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::StorageError;
use crate::layout::{Cell, Row, Table};

const SHEET_PATH: &str = "xl/worksheets/sheet1.xml";
const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    r#"</Types>"#
);

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#
);

const WORKBOOK: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    r#"<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>"#,
    r#"</workbook>"#
);

const WORKBOOK_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    r#"</Relationships>"#
);

/// Serializes `table` into `.xlsx` bytes, row-major, no header row.
pub fn encode_table(table: &Table) -> Result<Vec<u8>, StorageError> {
    let sheet = sheet_xml(table);
    let parts: [(&str, &str); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        (SHEET_PATH, &sheet),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        zip.start_file(name, part_options())
            .map_err(|e| StorageError::Encode(format!("Failed to start part {}: {}", name, e)))?;
        zip.write_all(content.as_bytes())
            .map_err(|e| StorageError::Encode(format!("Failed to write part {}: {}", name, e)))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| StorageError::Encode(format!("Failed to finish archive: {}", e)))?;
    Ok(cursor.into_inner())
}

fn part_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
}

fn sheet_xml(table: &Table) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        r#"<sheetData>"#
    ));

    for (row_idx, row) in table.rows().iter().enumerate() {
        let row_number = row_idx + 1;
        xml.push_str(&format!(r#"<row r="{}">"#, row_number));
        for (col_idx, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_name(col_idx), row_number);
            match cell {
                // Kept as a value-less cell so row width survives a round trip.
                Cell::Empty => xml.push_str(&format!(r#"<c r="{}"/>"#, reference)),
                Cell::Text(text) => xml.push_str(&format!(
                    r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                    reference,
                    escape(&encode_ooxml_text(text))
                )),
                Cell::Number(n) => {
                    xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n))
                }
                Cell::Bool(b) => xml.push_str(&format!(
                    r#"<c r="{}" t="b"><v>{}</v></c>"#,
                    reference,
                    u8::from(*b)
                )),
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Characters XML 1.0 cannot carry, plus CR, which parsers fold into LF.
fn needs_ooxml_escape(c: char) -> bool {
    (c < ' ' && c != '\t' && c != '\n') || c == '\u{FFFE}' || c == '\u{FFFF}'
}

/// Code point of an `_xHHHH_` sequence at the start of `s`.
fn ooxml_escape_at(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.len() < 7 || !bytes.starts_with(b"_x") || bytes[6] != b'_' {
        return None;
    }
    if !bytes[2..6].iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    u32::from_str_radix(&s[2..6], 16).ok()
}

/// Writes unrepresentable characters as `_xHHHH_`. A literal `_xHHHH_` in
/// the input gets its underscore written as `_x005F_`.
fn encode_ooxml_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (idx, c) in text.char_indices() {
        if needs_ooxml_escape(c) {
            out.push_str(&format!("_x{:04X}_", u32::from(c)));
        } else if c == '_' && ooxml_escape_at(&text[idx..]).is_some() {
            out.push_str("_x005F_");
        } else {
            out.push(c);
        }
    }
    out
}

fn decode_ooxml_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("_x") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match ooxml_escape_at(tail).and_then(char::from_u32) {
            Some(c) => {
                out.push(c);
                rest = &tail[7..];
            }
            None => {
                out.push_str("_x");
                rest = &tail[2..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Column letters for a zero-based index: 0 → A, 25 → Z, 26 → AA.
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Zero-based column index from a cell reference such as `"AB12"`.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .map(|b| b.to_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let n = letters
        .iter()
        .fold(0usize, |acc, b| acc * 26 + usize::from(b - b'A' + 1));
    Some(n - 1)
}

/// Reads the first worksheet of an `.xlsx` file back into a table.
///
/// Understands the cell kinds written by [`encode_table`] plus shared
/// strings, which is what other spreadsheet tools emit for text.
pub fn decode_table(bytes: &[u8]) -> Result<Table, StorageError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| StorageError::Decode(format!("Failed to open workbook: {}", e)))?;

    let shared = match read_part(&mut archive, SHARED_STRINGS_PATH)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let sheet = read_part(&mut archive, SHEET_PATH)?
        .ok_or_else(|| StorageError::Decode(format!("Missing {}", SHEET_PATH)))?;

    parse_sheet(&sheet, &shared)
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, StorageError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(StorageError::Decode(format!("Failed to open {}: {}", name, e))),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| StorageError::Decode(format!("Failed to read {}: {}", name, e)))?;
    Ok(Some(content))
}

/// Collects the raw (still escaped) text of the current element. Entity
/// references may arrive as separate events, so they are re-assembled here
/// and unescaped once at the end, followed by `_xHHHH_` sequences.
#[derive(Default)]
struct TextBuffer {
    raw: String,
}

impl TextBuffer {
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.raw.push_str(&String::from_utf8_lossy(bytes));
    }

    fn push_reference(&mut self, name: &[u8]) {
        self.raw.push('&');
        self.push_bytes(name);
        self.raw.push(';');
    }

    fn take(&mut self) -> Result<String, StorageError> {
        let raw = std::mem::take(&mut self.raw);
        unescape(&raw)
            .map(|s| decode_ooxml_text(&s))
            .map_err(|e| StorageError::Decode(format!("Invalid XML text: {}", e)))
    }
}

fn xml_error(e: quick_xml::Error) -> StorageError {
    StorageError::Decode(format!("XML parsing error: {}", e))
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, StorageError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut text = TextBuffer::default();
    let mut in_item = false;
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => in_item = true,
                b"t" if in_item => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => {
                    strings.push(text.take()?);
                    in_item = false;
                }
                _ => {}
            },
            Event::Text(e) if in_text => text.push_bytes(&e),
            Event::GeneralRef(e) if in_text => text.push_reference(&e),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}

#[derive(Clone, Copy, PartialEq)]
enum CellKind {
    Number,
    Bool,
    InlineString,
    SharedString,
    FormulaString,
}

struct PendingCell {
    column: usize,
    kind: CellKind,
}

fn cell_start(e: &BytesStart<'_>, next_column: usize) -> PendingCell {
    let mut column = next_column;
    let mut kind = CellKind::Number;
    for attr in e.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"r" => {
                if let Some(idx) = column_index(&String::from_utf8_lossy(&attr.value)) {
                    column = idx;
                }
            }
            b"t" => {
                kind = match attr.value.as_ref() {
                    b"b" => CellKind::Bool,
                    b"inlineStr" => CellKind::InlineString,
                    b"s" => CellKind::SharedString,
                    b"str" => CellKind::FormulaString,
                    _ => CellKind::Number,
                }
            }
            _ => {}
        }
    }
    PendingCell { column, kind }
}

fn place(row: &mut Row, column: usize, cell: Cell) {
    if row.len() <= column {
        row.resize(column + 1, Cell::Empty);
    }
    row[column] = cell;
}

fn cell_value(kind: CellKind, raw: String, shared: &[String]) -> Result<Cell, StorageError> {
    match kind {
        CellKind::InlineString | CellKind::FormulaString => Ok(Cell::Text(raw)),
        CellKind::Bool => Ok(Cell::Bool(raw.trim() == "1")),
        CellKind::SharedString => {
            let idx: usize = raw
                .trim()
                .parse()
                .map_err(|_| StorageError::Decode(format!("Bad shared string index '{}'", raw)))?;
            shared
                .get(idx)
                .map(|s| Cell::Text(s.clone()))
                .ok_or_else(|| StorageError::Decode(format!("Shared string {} out of range", idx)))
        }
        CellKind::Number => serde_json::from_str::<serde_json::Number>(raw.trim())
            .map(Cell::Number)
            .map_err(|_| StorageError::Decode(format!("Bad numeric cell '{}'", raw))),
    }
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Table, StorageError> {
    let mut reader = Reader::from_str(xml);
    let mut rows: Vec<Row> = Vec::new();
    let mut row: Option<Row> = None;
    let mut pending: Option<PendingCell> = None;
    let mut value: Option<String> = None;
    let mut text = TextBuffer::default();
    let mut capturing = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => row = Some(Vec::new()),
                b"c" => {
                    let next = row.as_ref().map_or(0, Vec::len);
                    pending = Some(cell_start(&e, next));
                    value = None;
                }
                b"v" | b"t" if pending.is_some() => capturing = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => rows.push(Vec::new()),
                b"c" => {
                    let next = row.as_ref().map_or(0, Vec::len);
                    let cell = cell_start(&e, next);
                    if let Some(row) = row.as_mut() {
                        place(row, cell.column, Cell::Empty);
                    }
                }
                // `<t/>` is an empty inline string.
                b"t" if pending.is_some() => value = Some(String::new()),
                _ => {}
            },
            Event::Text(e) if capturing => text.push_bytes(&e),
            Event::GeneralRef(e) if capturing => text.push_reference(&e),
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" if capturing => {
                    let part = text.take()?;
                    value.get_or_insert_with(String::new).push_str(&part);
                    capturing = false;
                }
                b"c" => {
                    if let (Some(cell), Some(row)) = (pending.take(), row.as_mut()) {
                        let decoded = match value.take() {
                            Some(raw) => cell_value(cell.kind, raw, shared)?,
                            None => Cell::Empty,
                        };
                        place(row, cell.column, decoded);
                    }
                }
                b"row" => {
                    if let Some(done) = row.take() {
                        rows.push(done);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(Table::new(rows))
}
