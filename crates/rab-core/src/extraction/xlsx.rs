use std::collections::{BTreeSet, HashMap};
use std::io::{Cursor, Read, Seek};

use calamine::{Data, Reader};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::RabError;
use crate::extraction::{CellValue, SheetGrid, SheetRow, SpreadsheetDecoder};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Spreadsheet backend built on calamine (xlsx, xlsm, xls, ods).
///
/// Hidden rows are read from the worksheet XML of zip-based workbooks;
/// other formats report every row as visible.
pub struct CalamineDecoder;

impl CalamineDecoder {
    pub fn new() -> Self {
        CalamineDecoder
    }
}

impl Default for CalamineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SpreadsheetDecoder for CalamineDecoder {
    fn decode(&self, bytes: &[u8], sheet: Option<&str>) -> Result<SheetGrid, RabError> {
        let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| RabError::Spreadsheet(format!("failed to open workbook: {e}")))?;

        let sheet_names = workbook.sheet_names();
        let sheet_name = match sheet {
            Some(name) => sheet_names
                .iter()
                .find(|s| s.as_str() == name)
                .cloned()
                .ok_or_else(|| RabError::SheetNotFound {
                    name: name.to_string(),
                    available: sheet_names.join(", "),
                })?,
            None => sheet_names
                .first()
                .cloned()
                .ok_or_else(|| RabError::Spreadsheet("workbook has no sheets".into()))?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| {
                RabError::Spreadsheet(format!("failed to read sheet '{sheet_name}': {e}"))
            })?;

        let hidden = if bytes.starts_with(ZIP_MAGIC) {
            let position = sheet_names.iter().position(|s| *s == sheet_name).unwrap_or(0);
            hidden_rows(bytes, &sheet_name, position).unwrap_or_else(|e| {
                warn!(
                    sheet = %sheet_name,
                    error = %e,
                    "could not read hidden rows; treating all rows as visible"
                );
                BTreeSet::new()
            })
        } else {
            BTreeSet::new()
        };

        let (start_row, start_col) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let rows = range
            .rows()
            .enumerate()
            .map(|(i, cells)| {
                let index = start_row + i;
                let mut values = vec![CellValue::Empty; start_col];
                values.extend(cells.iter().map(cell_value));
                SheetRow {
                    index,
                    cells: values,
                    hidden: hidden.contains(&index),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            sheet = %sheet_name,
            rows = rows.len(),
            hidden = hidden.len(),
            "decoded worksheet"
        );

        Ok(SheetGrid {
            sheet_name,
            sheet_names,
            rows,
        })
    }

    fn backend_name(&self) -> &str {
        "calamine"
    }
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(f64_to_decimal(*f)),
        Data::Int(i) => CellValue::Number(Decimal::from(*i)),
        Data::Error(_) => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}

/// Convert f64 to Decimal, preserving reasonable precision.
///
/// Uses string round-trip to avoid floating-point artifacts
/// (e.g., 0.0035_f64 becoming 0.00349999...).
fn f64_to_decimal(f: f64) -> Decimal {
    let s = format!("{f}");
    s.parse::<Decimal>()
        .unwrap_or_else(|_| Decimal::try_from(f).unwrap_or_default())
}

/// Zero-based indices of rows flagged `hidden` in the named worksheet.
fn hidden_rows(
    bytes: &[u8],
    sheet_name: &str,
    position: usize,
) -> Result<BTreeSet<usize>, RabError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    // ods is zipped too but has no SpreadsheetML parts
    if !archive.file_names().any(|n| n == "xl/workbook.xml") {
        return Ok(BTreeSet::new());
    }

    let workbook = read_entry(&mut archive, "xl/workbook.xml")?;
    let rel_id = workbook_sheets(&workbook)?
        .into_iter()
        .find(|(name, _)| name == sheet_name)
        .and_then(|(_, rel_id)| rel_id);

    let target = match rel_id {
        Some(id) => {
            let rels = read_entry(&mut archive, "xl/_rels/workbook.xml.rels")?;
            relationships(&rels)?.remove(&id).map(|t| normalize_target(&t))
        }
        None => None,
    };
    let path = target.unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", position + 1));

    let sheet_xml = read_entry(&mut archive, &path)?;
    hidden_row_indices(&sheet_xml)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String, RabError> {
    let mut entry = archive.by_name(path)?;
    let mut buffer = String::new();
    entry.read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Sheet names and relationship ids from `xl/workbook.xml`.
fn workbook_sheets(xml: &str) -> Result<Vec<(String, Option<String>)>, RabError> {
    let mut reader = XmlReader::from_str(xml);
    let mut sheets = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_value(e, b"name").unwrap_or_default();
                sheets.push((name, attr_value(e, b"id")));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

/// Relationship id to target path from `xl/_rels/workbook.xml.rels`.
fn relationships(xml: &str) -> Result<HashMap<String, String>, RabError> {
    let mut reader = XmlReader::from_str(xml);
    let mut out = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr_value(e, b"Id"), attr_value(e, b"Target")) {
                    out.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

fn normalize_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

fn hidden_row_indices(xml: &str) -> Result<BTreeSet<usize>, RabError> {
    let mut reader = XmlReader::from_str(xml);
    let mut hidden = BTreeSet::new();
    let mut next_index = 0usize;
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"row" => {
                // `r` is one-based; rows without it follow the previous row.
                let index = attr_value(e, b"r")
                    .and_then(|r| r.parse::<usize>().ok())
                    .and_then(|r| r.checked_sub(1))
                    .unwrap_or(next_index);
                next_index = index + 1;
                if matches!(attr_value(e, b"hidden").as_deref(), Some("1" | "true")) {
                    hidden.insert(index);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(hidden)
}

fn attr_value(element: &BytesStart, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .with_checks(false)
        .filter_map(Result::ok)
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use zip::write::FileOptions;

    #[test]
    fn f64_to_decimal_preserves_precision() {
        assert_eq!(f64_to_decimal(0.0035), dec!(0.0035));
        assert_eq!(f64_to_decimal(68.0), dec!(68));
        assert_eq!(f64_to_decimal(1.23), dec!(1.23));
    }

    #[test]
    fn test_hidden_row_indices() {
        let xml = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
<row r="1"><c r="A1"><v>1</v></c></row>
<row r="3" hidden="1"><c r="A3"><v>2</v></c></row>
<row hidden="true"/>
<row r="7" hidden="0"/>
</sheetData>
</worksheet>"#;
        let hidden = hidden_row_indices(xml).unwrap();
        assert_eq!(hidden.into_iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_workbook_sheets_and_relationships() {
        let workbook = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>
<sheet name="Rekap" sheetId="1" r:id="rId1"/>
<sheet name="RAB" sheetId="2" r:id="rId2"/>
</sheets>
</workbook>"#;
        let sheets = workbook_sheets(workbook).unwrap();
        assert_eq!(sheets[1], ("RAB".to_string(), Some("rId2".to_string())));

        let rels = r#"<Relationships>
<Relationship Id="rId1" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Target="/xl/worksheets/sheet2.xml"/>
</Relationships>"#;
        let map = relationships(rels).unwrap();
        assert_eq!(normalize_target(&map["rId1"]), "xl/worksheets/sheet1.xml");
        assert_eq!(normalize_target(&map["rId2"]), "xl/worksheets/sheet2.xml");
    }

    #[test]
    fn test_hidden_rows_from_archive() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buffer);
            let options = FileOptions::default();
            zip.start_file("xl/workbook.xml", options).unwrap();
            zip.write_all(
                br#"<workbook xmlns:r="r"><sheets><sheet name="RAB" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            )
            .unwrap();
            zip.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
            zip.write_all(br#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"/></Relationships>"#)
                .unwrap();
            zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
            zip.write_all(br#"<worksheet><sheetData><row r="5" hidden="1"/></sheetData></worksheet>"#)
                .unwrap();
            zip.finish().unwrap();
        }
        let bytes = buffer.into_inner();
        let hidden = hidden_rows(&bytes, "RAB", 0).unwrap();
        assert!(hidden.contains(&4));
        assert_eq!(hidden.len(), 1);
    }

    #[test]
    fn test_not_a_workbook() {
        let err = CalamineDecoder::new().decode(b"not a workbook", None).unwrap_err();
        assert!(matches!(err, RabError::Spreadsheet(_)));
    }
}
