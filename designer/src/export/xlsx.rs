//! Minimal SpreadsheetML package: one worksheet, a styled header row and an
//! auto-filter over the data.

use common::{Error, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde_json::Value;
use std::fmt::Display;
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::models::QueryResult;

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Style index of the header cells in `styles.xml`.
const HEADER_STYLE: &str = "1";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn export_error(e: impl Display) -> Error {
    Error::Export(e.to_string())
}

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(export_error)
}

fn xml_writer() -> Result<XmlWriter> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))),
    )?;
    Ok(writer)
}

/// Spreadsheet column name for a zero-based index: 0 → `A`, 26 → `AA`.
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Excel rejects sheet names over 31 characters or containing `[]:*?/\`.
pub fn sheet_title(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(31)
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').to_string();
    if cleaned.is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

/// Header plus data range, e.g. `A1:C5001`.
fn table_range(result: &QueryResult) -> String {
    let last_column = column_letter(result.columns.len().saturating_sub(1));
    format!("A1:{}{}", last_column, result.rows.len() + 1)
}

pub fn write_workbook(result: &QueryResult, sheet_name: &str) -> Result<Vec<u8>> {
    let title = sheet_title(sheet_name);
    let parts = [
        ("[Content_Types].xml", content_types_xml()),
        ("_rels/.rels", package_rels_xml()),
        ("xl/workbook.xml", workbook_xml(result, &title)?),
        ("xl/_rels/workbook.xml.rels", workbook_rels_xml()),
        ("xl/styles.xml", styles_xml()),
        ("xl/worksheets/sheet1.xml", worksheet_xml(result)?),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, body) in parts {
        zip.start_file(name, options).map_err(export_error)?;
        zip.write_all(&body).map_err(export_error)?;
    }

    let cursor = zip.finish().map_err(export_error)?;
    Ok(cursor.into_inner())
}

fn content_types_xml() -> Vec<u8> {
    br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
  <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#
        .to_vec()
}

fn package_rels_xml() -> Vec<u8> {
    br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
        .to_vec()
}

fn workbook_rels_xml() -> Vec<u8> {
    br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#
        .to_vec()
}

// Font 1 is bold white, fill 2 is solid blue; cell format 1 combines them.
fn styles_xml() -> Vec<u8> {
    br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="2">
    <font><sz val="11"/><name val="Calibri"/></font>
    <font><b/><sz val="11"/><color rgb="FFFFFFFF"/><name val="Calibri"/></font>
  </fonts>
  <fills count="3">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
    <fill><patternFill patternType="solid"><fgColor rgb="FF4472C4"/><bgColor indexed="64"/></patternFill></fill>
  </fills>
  <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="2">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
    <xf numFmtId="0" fontId="1" fillId="2" borderId="0" xfId="0" applyFont="1" applyFill="1"/>
  </cellXfs>
  <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#
        .to_vec()
}

fn workbook_xml(result: &QueryResult, title: &str) -> Result<Vec<u8>> {
    let mut w = xml_writer()?;

    let mut root = BytesStart::new("workbook");
    root.push_attribute(("xmlns", MAIN_NS));
    root.push_attribute(("xmlns:r", REL_NS));
    emit(&mut w, Event::Start(root))?;

    emit(&mut w, Event::Start(BytesStart::new("sheets")))?;
    let mut sheet = BytesStart::new("sheet");
    sheet.push_attribute(("name", title));
    sheet.push_attribute(("sheetId", "1"));
    sheet.push_attribute(("r:id", "rId1"));
    emit(&mut w, Event::Empty(sheet))?;
    emit(&mut w, Event::End(BytesEnd::new("sheets")))?;

    // Excel expects the filter range to be registered as a hidden name.
    if !result.columns.is_empty() {
        let reference = format!(
            "'{}'!$A$1:${}${}",
            title.replace('\'', "''"),
            column_letter(result.columns.len() - 1),
            result.rows.len() + 1
        );

        emit(&mut w, Event::Start(BytesStart::new("definedNames")))?;
        let mut name = BytesStart::new("definedName");
        name.push_attribute(("name", "_xlnm._FilterDatabase"));
        name.push_attribute(("localSheetId", "0"));
        name.push_attribute(("hidden", "1"));
        emit(&mut w, Event::Start(name))?;
        emit(&mut w, Event::Text(BytesText::new(&reference)))?;
        emit(&mut w, Event::End(BytesEnd::new("definedName")))?;
        emit(&mut w, Event::End(BytesEnd::new("definedNames")))?;
    }

    emit(&mut w, Event::End(BytesEnd::new("workbook")))?;
    Ok(w.into_inner().into_inner())
}

fn worksheet_xml(result: &QueryResult) -> Result<Vec<u8>> {
    let mut w = xml_writer()?;

    let mut root = BytesStart::new("worksheet");
    root.push_attribute(("xmlns", MAIN_NS));
    root.push_attribute(("xmlns:r", REL_NS));
    emit(&mut w, Event::Start(root))?;

    if !result.columns.is_empty() {
        let mut dimension = BytesStart::new("dimension");
        dimension.push_attribute(("ref", table_range(result).as_str()));
        emit(&mut w, Event::Empty(dimension))?;
    }

    emit(&mut w, Event::Start(BytesStart::new("sheetData")))?;

    start_row(&mut w, 1)?;
    for (index, column) in result.columns.iter().enumerate() {
        text_cell(&mut w, &cell_ref(index, 1), &column.display_name, Some(HEADER_STYLE))?;
    }
    emit(&mut w, Event::End(BytesEnd::new("row")))?;

    for (offset, row) in result.rows.iter().enumerate() {
        let row_number = offset + 2;
        start_row(&mut w, row_number)?;
        for (index, column) in result.columns.iter().enumerate() {
            let reference = cell_ref(index, row_number);
            match row.get(&column.key()) {
                None | Some(Value::Null) => {}
                Some(Value::String(text)) => text_cell(&mut w, &reference, text, None)?,
                Some(Value::Number(number)) => {
                    value_cell(&mut w, &reference, "n", &number.to_string())?
                }
                Some(Value::Bool(flag)) => {
                    value_cell(&mut w, &reference, "b", if *flag { "1" } else { "0" })?
                }
                Some(nested) => text_cell(&mut w, &reference, &nested.to_string(), None)?,
            }
        }
        emit(&mut w, Event::End(BytesEnd::new("row")))?;
    }

    emit(&mut w, Event::End(BytesEnd::new("sheetData")))?;

    if !result.columns.is_empty() {
        let mut filter = BytesStart::new("autoFilter");
        filter.push_attribute(("ref", table_range(result).as_str()));
        emit(&mut w, Event::Empty(filter))?;
    }

    emit(&mut w, Event::End(BytesEnd::new("worksheet")))?;
    Ok(w.into_inner().into_inner())
}

fn cell_ref(column: usize, row: usize) -> String {
    format!("{}{}", column_letter(column), row)
}

fn start_row(w: &mut XmlWriter, number: usize) -> Result<()> {
    let mut row = BytesStart::new("row");
    row.push_attribute(("r", number.to_string().as_str()));
    emit(w, Event::Start(row))
}

fn text_cell(w: &mut XmlWriter, reference: &str, text: &str, style: Option<&str>) -> Result<()> {
    let mut cell = BytesStart::new("c");
    cell.push_attribute(("r", reference));
    if let Some(style) = style {
        cell.push_attribute(("s", style));
    }
    cell.push_attribute(("t", "inlineStr"));
    emit(w, Event::Start(cell))?;
    emit(w, Event::Start(BytesStart::new("is")))?;
    let mut t = BytesStart::new("t");
    t.push_attribute(("xml:space", "preserve"));
    emit(w, Event::Start(t))?;
    emit(w, Event::Text(BytesText::new(text)))?;
    emit(w, Event::End(BytesEnd::new("t")))?;
    emit(w, Event::End(BytesEnd::new("is")))?;
    emit(w, Event::End(BytesEnd::new("c")))
}

fn value_cell(w: &mut XmlWriter, reference: &str, kind: &str, value: &str) -> Result<()> {
    let mut cell = BytesStart::new("c");
    cell.push_attribute(("r", reference));
    cell.push_attribute(("t", kind));
    emit(w, Event::Start(cell))?;
    emit(w, Event::Start(BytesStart::new("v")))?;
    emit(w, Event::Text(BytesText::new(value)))?;
    emit(w, Event::End(BytesEnd::new("v")))?;
    emit(w, Event::End(BytesEnd::new("c")))
}
