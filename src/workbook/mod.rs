//! Minimal `.xlsx` sheet reader.
//!
//! Only what the Aircraft Characteristics workbook needs: resolve a sheet by
//! name, then return its rows as plain strings. Cells are placed by their A1
//! reference so blank cells that Excel omits do not shift later columns, and
//! omitted blank rows come back as empty rows so row numbers match the sheet.
//! Numeric cells styled with a date format are rendered as the date text the
//! spreadsheet shows (see [`styles`]).

mod styles;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::ImportError;
use styles::CellStyles;

/// Sheet holding the aircraft rows in the published FAA workbook
pub const DEFAULT_SHEET: &str = "ACD_Data";

const MAX_XML_ENTRY_BYTES: u64 = 256 * 1024 * 1024;

/// Read every row of `sheet` from the workbook at `path`, header row included
pub fn read_sheet_rows(path: &Path, sheet: &str) -> Result<Vec<Vec<String>>, ImportError> {
    let open_error = |reason: String| ImportError::OpenWorkbook {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| open_error(e.to_string()))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| open_error(e.to_string()))?;

    let rows = read_rows_from_archive(&mut archive, sheet)?;
    info!(
        "Read {} rows from sheet '{}' of {}",
        rows.len(),
        sheet,
        path.display()
    );
    Ok(rows)
}

/// Same as [`read_sheet_rows`] for a workbook already in memory
pub fn read_sheet_rows_from_bytes(bytes: &[u8], sheet: &str) -> Result<Vec<Vec<String>>, ImportError> {
    let mut archive = ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| {
        ImportError::OpenWorkbook {
            path: "<memory>".into(),
            reason: e.to_string(),
        }
    })?;
    read_rows_from_archive(&mut archive, sheet)
}

fn read_rows_from_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    sheet: &str,
) -> Result<Vec<Vec<String>>, ImportError> {
    let SheetLocation {
        sheet_path,
        date1904,
    } = resolve_sheet_path(archive, sheet)?;
    debug!("Sheet '{}' is stored at {}", sheet, sheet_path);

    let shared_strings = match read_zip_entry_bounded(archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let styles = match read_zip_entry_bounded(archive, "xl/styles.xml")? {
        Some(xml) => CellStyles::parse(&xml, date1904)?,
        None => CellStyles::default(),
    };

    let sheet_xml = read_zip_entry_bounded(archive, &sheet_path)?.ok_or_else(|| {
        ImportError::MalformedWorkbook(format!("worksheet part {} is missing", sheet_path))
    })?;
    parse_sheet_rows(&sheet_xml, &shared_strings, &styles)
}

fn malformed(e: impl std::fmt::Display) -> ImportError {
    ImportError::MalformedWorkbook(e.to_string())
}

/// Returns `Ok(None)` when the entry does not exist
fn read_zip_entry_bounded<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, ImportError> {
    if !archive.file_names().any(|n| n == name) {
        return Ok(None);
    }

    let entry = archive.by_name(name).map_err(malformed)?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(malformed)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ImportError::MalformedWorkbook(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(Some(out))
}

fn attribute(e: &BytesStart<'_>, local_name: &[u8]) -> Result<Option<String>, ImportError> {
    for attr in e.attributes() {
        let attr = attr.map_err(malformed)?;
        if attr.key.local_name().as_ref() == local_name {
            return Ok(Some(attr.unescape_value().map_err(malformed)?.into_owned()));
        }
    }
    Ok(None)
}

struct SheetLocation {
    /// Worksheet part inside the archive, e.g. `xl/worksheets/sheet2.xml`
    sheet_path: String,
    /// Date serials count from 1904-01-01 instead of 1900
    date1904: bool,
}

/// Map a sheet name to its worksheet part via `xl/workbook.xml` and its relationships
fn resolve_sheet_path<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    sheet: &str,
) -> Result<SheetLocation, ImportError> {
    let workbook_xml = read_zip_entry_bounded(archive, "xl/workbook.xml")?
        .ok_or_else(|| ImportError::MalformedWorkbook("xl/workbook.xml is missing".to_string()))?;

    let mut relationship_id = None;
    let mut date1904 = false;
    let mut reader = Reader::from_reader(workbook_xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"workbookPr" =>
            {
                date1904 = matches!(attribute(&e, b"date1904")?.as_deref(), Some("1" | "true"));
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                if attribute(&e, b"name")?.as_deref() == Some(sheet) {
                    relationship_id = attribute(&e, b"id")?;
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(e)),
            _ => {}
        }
        buf.clear();
    }

    let relationship_id = relationship_id.ok_or_else(|| ImportError::SheetNotFound(sheet.to_string()))?;

    let rels_xml = read_zip_entry_bounded(archive, "xl/_rels/workbook.xml.rels")?.ok_or_else(|| {
        ImportError::MalformedWorkbook("xl/_rels/workbook.xml.rels is missing".to_string())
    })?;

    let mut reader = Reader::from_reader(rels_xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if attribute(&e, b"Id")?.as_deref() == Some(relationship_id.as_str()) {
                    let target = attribute(&e, b"Target")?.ok_or_else(|| {
                        ImportError::MalformedWorkbook(format!(
                            "relationship {} has no target",
                            relationship_id
                        ))
                    })?;
                    let sheet_path = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{}", target),
                    };
                    return Ok(SheetLocation {
                        sheet_path,
                        date1904,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(e)),
            _ => {}
        }
        buf.clear();
    }

    Err(ImportError::MalformedWorkbook(format!(
        "relationship {} for sheet '{}' not found",
        relationship_id, sheet
    )))
}

/// Shared string table; rich-text runs are concatenated, phonetic runs skipped
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, ImportError> {
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Text(te)) if in_t && !in_phonetic => {
                if let Some(text) = current.as_mut() {
                    text.push_str(te.unescape().map_err(malformed)?.as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_t = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Zero-based column index of an A1 reference such as `AB12`
fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for c in letters.chars() {
        index = index * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}

/// One-based row number of an A1 reference such as `AB12`
fn row_number(reference: &str) -> Option<usize> {
    reference
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .ok()
}

#[derive(Default)]
struct CellState {
    column: usize,
    kind: Option<String>,
    /// `cellXfs` index from the `s` attribute
    style: Option<usize>,
    value: String,
}

impl CellState {
    fn resolve(self, shared_strings: &[String], styles: &CellStyles) -> Result<String, ImportError> {
        match self.kind.as_deref() {
            Some("s") => {
                let index: usize = self.value.trim().parse().map_err(|_| {
                    ImportError::MalformedWorkbook(format!(
                        "invalid shared string index '{}'",
                        self.value
                    ))
                })?;
                shared_strings.get(index).cloned().ok_or_else(|| {
                    ImportError::MalformedWorkbook(format!(
                        "shared string index {} out of range ({} strings)",
                        index,
                        shared_strings.len()
                    ))
                })
            }
            Some("b") => Ok(match self.value.trim() {
                "1" => "TRUE".to_string(),
                "0" => "FALSE".to_string(),
                other => other.to_string(),
            }),
            None | Some("n") => Ok(self
                .style
                .and_then(|style| styles.render_date(style, &self.value))
                .unwrap_or(self.value)),
            _ => Ok(self.value),
        }
    }
}

fn place_cell(row: &mut Vec<String>, column: usize, value: String) {
    if row.len() <= column {
        row.resize(column + 1, String::new());
    }
    row[column] = value;
}

fn parse_sheet_rows(
    xml: &[u8],
    shared_strings: &[String],
    styles: &CellStyles,
) -> Result<Vec<Vec<String>>, ImportError> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut row: Option<Vec<String>> = None;
    let mut cell: Option<CellState> = None;
    let mut in_value = false;
    let mut in_inline_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    pad_to_row(&mut rows, attribute(&e, b"r")?.as_deref());
                    row = Some(Vec::new());
                }
                b"c" => {
                    let next_column = row.as_ref().map_or(0, Vec::len);
                    let column = attribute(&e, b"r")?
                        .as_deref()
                        .and_then(column_index)
                        .unwrap_or(next_column);
                    cell = Some(CellState {
                        column,
                        kind: attribute(&e, b"t")?,
                        style: attribute(&e, b"s")?.and_then(|s| s.parse().ok()),
                        value: String::new(),
                    });
                }
                b"v" => in_value = true,
                b"t" => in_inline_text = cell.is_some(),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"row" => {
                pad_to_row(&mut rows, attribute(&e, b"r")?.as_deref());
                rows.push(Vec::new());
            }
            Ok(Event::Text(te)) if in_value || in_inline_text => {
                if let Some(cell) = cell.as_mut() {
                    cell.value.push_str(te.unescape().map_err(malformed)?.as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"c" => {
                    if let (Some(finished), Some(row)) = (cell.take(), row.as_mut()) {
                        let column = finished.column;
                        let value = finished.resolve(shared_strings, styles)?;
                        place_cell(row, column, value);
                    }
                }
                b"row" => rows.extend(row.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

/// Insert empty rows for any blank rows Excel left out before row `reference`
fn pad_to_row(rows: &mut Vec<Vec<String>>, reference: Option<&str>) {
    if let Some(number) = reference.and_then(row_number) {
        while rows.len() + 1 < number {
            rows.push(Vec::new());
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Notes" sheetId="1" r:id="rId1"/>
    <sheet name="ACD_Data" sheetId="2" r:id="rId2"/>
  </sheets>
</workbook>"#;

    const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
</Relationships>"#;

    fn escape_xml(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }

    fn column_letters(mut index: usize) -> String {
        let mut letters = Vec::new();
        loop {
            letters.push((b'A' + (index % 26) as u8) as char);
            if index < 26 {
                break;
            }
            index = index / 26 - 1;
        }
        letters.iter().rev().collect()
    }

    /// Build a workbook whose `ACD_Data` sheet holds `rows` as inline strings.
    /// Empty cells are omitted, the way Excel writes them.
    pub(crate) fn workbook_bytes(rows: &[Vec<String>]) -> Vec<u8> {
        let mut sheet = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                sheet.push_str(&format!(
                    r#"<c r="{}{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    column_letters(c),
                    r + 1,
                    escape_xml(value)
                ));
            }
            sheet.push_str("</row>");
        }
        sheet.push_str("</sheetData></worksheet>");

        build_archive(&[
            ("xl/workbook.xml", WORKBOOK_XML),
            ("xl/_rels/workbook.xml.rels", RELS_XML),
            ("xl/worksheets/sheet1.xml", "<worksheet><sheetData/></worksheet>"),
            ("xl/worksheets/sheet2.xml", &sheet),
        ])
    }

    fn build_archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("Z9"), Some(25));
        assert_eq!(column_index("AA10"), Some(26));
        assert_eq!(column_index("AO2"), Some(40));
        assert_eq!(column_index("12"), None);
        assert_eq!(row_number("AO2"), Some(2));
    }

    #[test]
    fn test_mixed_cell_types_and_gaps() {
        let shared = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3">
  <si><t>ICAO Code</t></si>
  <si><r><t>Ces</t></r><r><t>sna</t></r></si>
  <si><t xml:space="preserve"> A&amp;B </t><rPh sb="0" eb="1"><t>x</t></rPh></si>
</sst>"#;
        let sheet = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
  <row r="1"><c r="A1" t="s"><v>0</v></c></row>
  <row r="3">
    <c r="A3" t="inlineStr"><is><t>C172</t></is></c>
    <c r="C3" t="s"><v>1</v></c>
    <c r="E3"><v>12.5</v></c>
    <c r="F3" t="str"><v>N/A</v></c>
    <c r="H3" t="s"><v>2</v></c>
    <c r="I3" t="b"><v>1</v></c>
    <c r="J3" s="4"/>
  </row>
</sheetData></worksheet>"#;
        let bytes = build_archive(&[
            ("xl/workbook.xml", WORKBOOK_XML),
            ("xl/_rels/workbook.xml.rels", RELS_XML),
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet2.xml", sheet),
        ]);

        let rows = read_sheet_rows_from_bytes(&bytes, DEFAULT_SHEET).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["ICAO Code"]);
        assert!(rows[1].is_empty());
        assert_eq!(
            rows[2],
            vec!["C172", "", "Cessna", "", "12.5", "N/A", "", " A&B ", "TRUE"]
        );
    }

    #[test]
    fn test_date_styled_cells_read_as_dates() {
        let styles = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts>
  <cellXfs count="3">
    <xf numFmtId="0"/>
    <xf numFmtId="164" applyNumberFormat="1"/>
    <xf numFmtId="14" applyNumberFormat="1"/>
  </cellXfs>
</styleSheet>"#;
        let sheet = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
  <row r="2">
    <c r="A2" t="inlineStr"><is><t>B738</t></is></c>
    <c r="W2" s="0"><v>174200</v></c>
    <c r="AN2" s="2"><v>45233</v></c>
    <c r="AO2" s="1"><v>45233</v></c>
  </row>
</sheetData></worksheet>"#;
        let bytes = build_archive(&[
            ("xl/workbook.xml", WORKBOOK_XML),
            ("xl/_rels/workbook.xml.rels", RELS_XML),
            ("xl/styles.xml", styles),
            ("xl/worksheets/sheet2.xml", sheet),
        ]);

        let rows = read_sheet_rows_from_bytes(&bytes, DEFAULT_SHEET).unwrap();
        let row = &rows[1];
        assert_eq!(row[0], "B738");
        assert_eq!(row[22], "174200");
        assert_eq!(row[39], "11-03-23");
        assert_eq!(row[40], "2023-11-03");
    }

    #[test]
    fn test_date1904_workbook() {
        let workbook = WORKBOOK_XML.replace("<sheets>", r#"<workbookPr date1904="1"/><sheets>"#);
        let styles = r#"<styleSheet><numFmts><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts><cellXfs><xf numFmtId="164"/></cellXfs></styleSheet>"#;
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" s="0"><v>43771</v></c></row></sheetData></worksheet>"#;
        let bytes = build_archive(&[
            ("xl/workbook.xml", workbook.as_str()),
            ("xl/_rels/workbook.xml.rels", RELS_XML),
            ("xl/styles.xml", styles),
            ("xl/worksheets/sheet2.xml", sheet),
        ]);

        let rows = read_sheet_rows_from_bytes(&bytes, DEFAULT_SHEET).unwrap();
        assert_eq!(rows, vec![vec!["2023-11-03".to_string()]]);
    }

    #[test]
    fn test_workbook_fixture_round_trips_through_reader() {
        let rows = vec![
            vec!["ICAO Code".to_string(), "FAA Designator".to_string()],
            vec!["B738".to_string(), String::new(), "Boeing".to_string()],
        ];
        let parsed = read_sheet_rows_from_bytes(&workbook_bytes(&rows), DEFAULT_SHEET).unwrap();
        assert_eq!(parsed[0], rows[0]);
        assert_eq!(parsed[1], vec!["B738", "", "Boeing"]);
    }

    #[test]
    fn test_missing_sheet_is_reported() {
        let bytes = workbook_bytes(&[]);
        let err = read_sheet_rows_from_bytes(&bytes, "Other").unwrap_err();
        assert!(matches!(err, ImportError::SheetNotFound(name) if name == "Other"));
    }

    #[test]
    fn test_not_a_zip_fails_to_open() {
        let err = read_sheet_rows_from_bytes(b"plain text", DEFAULT_SHEET).unwrap_err();
        assert!(matches!(err, ImportError::OpenWorkbook { .. }));
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_sheet_rows(&dir.path().join("absent.xlsx"), DEFAULT_SHEET).unwrap_err();
        assert!(matches!(err, ImportError::OpenWorkbook { .. }));
    }

    #[test]
    fn test_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acd.xlsx");
        std::fs::write(
            &path,
            workbook_bytes(&[vec!["header".to_string()], vec!["A320".to_string()]]),
        )
        .unwrap();

        let rows = read_sheet_rows(&path, DEFAULT_SHEET).unwrap();
        assert_eq!(rows, vec![vec!["header".to_string()], vec!["A320".to_string()]]);
    }
}
