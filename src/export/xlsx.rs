//! XLSX Workbook Writer
//! Writes a DataFrame as a single-sheet Excel workbook.
//!
//! Uses direct ZIP/XML generation: one worksheet (`Sheet1`), a shared string
//! table for text, numeric cells for numbers and boolean cells for booleans.
//! Dates and datetimes are serial numbers carrying a built-in date format.
//! Missing and non-finite values are left as empty cells.

use super::ExportError;
use crate::data::DataProcessor;
use polars::prelude::*;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
// `polars::prelude` exports its own `zip` module.
use ::zip::write::FileOptions;
use ::zip::ZipWriter;

const SHEET_NAME: &str = "Sheet1";
const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Serial number of 1970-01-01; serials count days from 1899-12-30.
const UNIX_EPOCH_SERIAL: f64 = 25569.0;
/// Serials below this include the phantom 1900-02-29.
const LEAP_BUG_SERIAL: f64 = 61.0;

// Indices into `cellXfs` in styles.xml.
const DATE_STYLE: u8 = 1;
const DATETIME_STYLE: u8 = 2;

/// XLSX generator for exported tables
pub struct XlsxWriter;

/// Cell values of one column, normalized to what a worksheet can store.
enum ColumnCells {
    Number(Float64Chunked),
    Bool(BooleanChunked),
    Text(StringChunked),
    Temporal { serials: Vec<Option<f64>>, style: u8 },
}

impl ColumnCells {
    fn from_column(column: &Column) -> PolarsResult<Self> {
        let dtype = column.dtype();
        if let DataType::Date = dtype {
            let days = column.to_physical_repr();
            let serials = days
                .i32()?
                .into_iter()
                .map(|d| d.map(|d| excel_serial(d as f64)))
                .collect();
            return Ok(ColumnCells::Temporal { serials, style: DATE_STYLE });
        }
        if let DataType::Datetime(unit, _) = dtype {
            let per_day = match unit {
                TimeUnit::Nanoseconds => 86_400_000_000_000.0,
                TimeUnit::Microseconds => 86_400_000_000.0,
                TimeUnit::Milliseconds => 86_400_000.0,
            };
            let ticks = column.to_physical_repr();
            let serials = ticks
                .i64()?
                .into_iter()
                .map(|t| t.map(|t| excel_serial(t as f64 / per_day)))
                .collect();
            return Ok(ColumnCells::Temporal { serials, style: DATETIME_STYLE });
        }

        if DataProcessor::is_numeric(dtype) {
            Ok(ColumnCells::Number(
                column.cast(&DataType::Float64)?.f64()?.clone(),
            ))
        } else if matches!(dtype, DataType::Boolean) {
            Ok(ColumnCells::Bool(column.bool()?.clone()))
        } else {
            Ok(ColumnCells::Text(
                column.cast(&DataType::String)?.str()?.clone(),
            ))
        }
    }
}

/// Shared string table, deduplicating repeated text.
#[derive(Default)]
struct SharedStrings {
    index: HashMap<String, usize>,
    strings: Vec<String>,
    count: usize,
}

impl SharedStrings {
    fn intern(&mut self, text: &str) -> usize {
        self.count += 1;
        if let Some(&idx) = self.index.get(text) {
            return idx;
        }
        let idx = self.strings.len();
        self.strings.push(text.to_string());
        self.index.insert(text.to_string(), idx);
        idx
    }
}

impl XlsxWriter {
    /// Encode the table as an in-memory XLSX workbook.
    pub fn write(df: &DataFrame) -> Result<Vec<u8>, ExportError> {
        let mut shared = SharedStrings::default();
        let sheet = Self::worksheet_xml(df, &mut shared)?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();

        // 1. [Content_Types].xml
        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(Self::content_types_xml().as_bytes())?;

        // 2. _rels/.rels
        zip.start_file("_rels/.rels", options)?;
        zip.write_all(Self::rels_xml().as_bytes())?;

        // 3. xl/workbook.xml and its relationships
        zip.start_file("xl/workbook.xml", options)?;
        zip.write_all(Self::workbook_xml().as_bytes())?;
        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(Self::workbook_rels_xml().as_bytes())?;

        // 4. Worksheet
        zip.start_file("xl/worksheets/sheet1.xml", options)?;
        zip.write_all(sheet.as_bytes())?;

        // 5. Shared strings
        zip.start_file("xl/sharedStrings.xml", options)?;
        zip.write_all(Self::shared_strings_xml(&shared).as_bytes())?;

        // 6. Styles
        zip.start_file("xl/styles.xml", options)?;
        zip.write_all(Self::styles_xml().as_bytes())?;

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    fn worksheet_xml(df: &DataFrame, shared: &mut SharedStrings) -> PolarsResult<String> {
        let columns: Vec<ColumnCells> = df
            .get_columns()
            .iter()
            .map(ColumnCells::from_column)
            .collect::<PolarsResult<_>>()?;
        let letters: Vec<String> = (0..df.width()).map(column_letter).collect();

        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        let _ = write!(xml, r#"<worksheet xmlns="{}">"#, MAIN_NS);
        if let Some(last) = letters.last() {
            let _ = write!(xml, r#"<dimension ref="A1:{}{}"/>"#, last, df.height() + 1);
        }
        xml.push_str("<sheetData>");

        // Header row
        if !letters.is_empty() {
            xml.push_str(r#"<row r="1">"#);
            for (letter, name) in letters.iter().zip(df.get_column_names()) {
                let idx = shared.intern(name.as_str());
                let _ = write!(xml, r#"<c r="{}1" t="s"><v>{}</v></c>"#, letter, idx);
            }
            xml.push_str("</row>");
        }

        // Data rows
        for row in 0..df.height() {
            let r = row + 2;
            let _ = write!(xml, r#"<row r="{}">"#, r);
            for (letter, cells) in letters.iter().zip(&columns) {
                match cells {
                    ColumnCells::Number(ca) => {
                        if let Some(v) = ca.get(row).filter(|v| v.is_finite()) {
                            let _ = write!(xml, r#"<c r="{}{}"><v>{}</v></c>"#, letter, r, v);
                        }
                    }
                    ColumnCells::Bool(ca) => {
                        if let Some(b) = ca.get(row) {
                            let _ = write!(
                                xml,
                                r#"<c r="{}{}" t="b"><v>{}</v></c>"#,
                                letter,
                                r,
                                u8::from(b)
                            );
                        }
                    }
                    ColumnCells::Text(ca) => {
                        if let Some(s) = ca.get(row) {
                            let idx = shared.intern(s);
                            let _ = write!(xml, r#"<c r="{}{}" t="s"><v>{}</v></c>"#, letter, r, idx);
                        }
                    }
                    ColumnCells::Temporal { serials, style } => {
                        if let Some(v) = serials[row] {
                            let _ = write!(
                                xml,
                                r#"<c r="{}{}" s="{}"><v>{}</v></c>"#,
                                letter, r, style, v
                            );
                        }
                    }
                }
            }
            xml.push_str("</row>");
        }

        xml.push_str("</sheetData></worksheet>");
        Ok(xml)
    }

    fn content_types_xml() -> String {
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
  <Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
  <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#
            .to_string()
    }

    fn rels_xml() -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{}">
  <Relationship Id="rId1" Type="{}/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#,
            PACKAGE_REL_NS, REL_NS
        )
    }

    fn workbook_xml() -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{}" xmlns:r="{}">
  <sheets>
    <sheet name="{}" sheetId="1" r:id="rId1"/>
  </sheets>
</workbook>"#,
            MAIN_NS, REL_NS, SHEET_NAME
        )
    }

    fn workbook_rels_xml() -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{0}">
  <Relationship Id="rId1" Type="{1}/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="{1}/styles" Target="styles.xml"/>
  <Relationship Id="rId3" Type="{1}/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#,
            PACKAGE_REL_NS, REL_NS
        )
    }

    fn shared_strings_xml(shared: &SharedStrings) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        let _ = write!(
            xml,
            r#"<sst xmlns="{}" count="{}" uniqueCount="{}">"#,
            MAIN_NS,
            shared.count,
            shared.strings.len()
        );
        for s in &shared.strings {
            let _ = write!(xml, r#"<si><t xml:space="preserve">{}</t></si>"#, escape_xml(s));
        }
        xml.push_str("</sst>");
        xml
    }

    fn styles_xml() -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="{}">
  <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
  <fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
  <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/><xf numFmtId="22" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs>
  <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#,
            MAIN_NS
        )
    }
}

/// Serial number for a count of days since 1970-01-01.
fn excel_serial(unix_days: f64) -> f64 {
    let serial = unix_days + UNIX_EPOCH_SERIAL;
    if serial < LEAP_BUG_SERIAL {
        serial - 1.0
    } else {
        serial
    }
}

/// Spreadsheet column letters: 0 -> A, 25 -> Z, 26 -> AA.
fn column_letter(mut idx: usize) -> String {
    let mut letters: Vec<char> = Vec::new();
    loop {
        letters.push((b'A' + (idx % 26) as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters other than tab/newline are not valid XML 1.0.
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::excel;
    use chrono::NaiveDate;

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(escape_xml("bell\u{7}"), "bell");
    }

    #[test]
    fn shared_strings_are_deduplicated() {
        let mut shared = SharedStrings::default();
        assert_eq!(shared.intern("x"), 0);
        assert_eq!(shared.intern("y"), 1);
        assert_eq!(shared.intern("x"), 0);
        assert_eq!(shared.count, 3);
        assert_eq!(shared.strings, ["x", "y"]);
    }

    #[test]
    fn workbook_round_trips_through_reader() {
        let df = df!(
            "id" => [1i64, 2, 3],
            "price" => [Some(9.5), None, Some(0.25)],
            "in stock" => [Some(true), Some(false), None],
            "note" => [Some("fish & chips"), None, Some("<none>")]
        )
        .unwrap();

        let bytes = XlsxWriter::write(&df).unwrap();
        let parsed = excel::read_xlsx(&bytes).unwrap();

        assert!(parsed.equals_missing(&df));
    }

    #[test]
    fn serials_follow_spreadsheet_calendar() {
        assert_eq!(excel_serial(0.0), 25569.0);
        // 2024-01-01
        assert_eq!(excel_serial(19723.0), 45292.0);
        // 1900-02-28 sits before the phantom leap day.
        assert_eq!(excel_serial(-25509.0), 59.0);
    }

    #[test]
    fn dates_round_trip_as_dates() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let df = df!(
            "id" => [1i64, 2, 3],
            "when" => [Some(day(1)), None, Some(day(31))],
            "at" => [
                Some(day(1).and_hms_opt(12, 0, 0).unwrap()),
                Some(day(2).and_hms_opt(6, 30, 0).unwrap()),
                None
            ]
        )
        .unwrap();

        let bytes = XlsxWriter::write(&df).unwrap();
        let parsed = excel::read_xlsx(&bytes).unwrap();

        assert_eq!(parsed.column("when").unwrap().dtype(), &DataType::Date);
        assert!(parsed.equals_missing(&df));
    }

    #[test]
    fn header_only_table_round_trips() {
        let df = df!("a" => Vec::<i64>::new(), "b" => Vec::<String>::new()).unwrap();
        let bytes = XlsxWriter::write(&df).unwrap();
        let parsed = excel::read_xlsx(&bytes).unwrap();

        assert_eq!(DataProcessor::column_names(&parsed), ["a", "b"]);
        assert_eq!(parsed.height(), 0);
    }
}
