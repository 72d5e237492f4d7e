//! Sparse in-memory worksheet and its `sheetN.xml` rendering

use super::shared_strings::SharedStrings;
use super::xml_writer::XmlWriter;
use crate::error::{ExportError, Result};
use crate::types::CellStyle;
use std::collections::BTreeMap;
use std::io::Write;

pub const MAX_ROWS: u32 = 1_048_576;
pub const MAX_COLUMNS: u32 = 16_384;

/// Column number (1-based) to letters: 1 → A, 27 → AA
pub fn column_letter(col: u32) -> String {
    let mut col_str = String::new();
    let mut n = col;
    while n > 0 {
        let rem = (n - 1) % 26;
        col_str.insert(0, (b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    col_str
}

pub fn cell_ref(row: u32, col: u32) -> String {
    format!("{}{}", column_letter(col), row)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellEntry {
    pub column: u32,
    pub string_index: u32,
    pub style: CellStyle,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowData {
    /// Insertion order; sorted on render
    pub cells: Vec<CellEntry>,
    pub max_column: u32,
    pub height: Option<f64>,
}

/// Worksheet content accumulated before rendering.
///
/// Rows appear on first write and are never removed. Empty values still
/// count towards the row's column span but produce no `<c>` element.
#[derive(Debug, Default)]
pub struct SheetModel {
    rows: BTreeMap<u32, RowData>,
    column_widths: Vec<f64>,
    merges: Vec<String>,
    freeze_header: bool,
    selected: bool,
    drawing: Option<String>,
}

impl SheetModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a trimmed text cell; returns `false` when nothing was stored
    pub fn set_cell(
        &mut self,
        strings: &mut SharedStrings,
        row: u32,
        col: u32,
        value: &str,
        style: CellStyle,
    ) -> Result<bool> {
        check_bounds(row, col)?;

        let data = self.rows.entry(row).or_default();
        data.max_column = data.max_column.max(col);

        let value = value.trim();
        if value.is_empty() {
            return Ok(false);
        }

        let string_index = strings.intern(value);
        data.cells.push(CellEntry {
            column: col,
            string_index,
            style,
        });
        Ok(true)
    }

    /// Grow the row to at least `height` points
    pub fn set_row_height(&mut self, row: u32, height: f64) -> Result<()> {
        check_bounds(row, 1)?;
        let data = self.rows.entry(row).or_default();
        data.height = Some(data.height.map_or(height, |current| current.max(height)));
        Ok(())
    }

    pub fn set_column_widths(&mut self, widths: Vec<f64>) {
        self.column_widths = widths;
    }

    /// Merge columns `first..=last` of `row`
    pub fn merge_row(&mut self, row: u32, first: u32, last: u32) -> Result<()> {
        check_bounds(row, last)?;
        if last > first {
            self.merges
                .push(format!("{}:{}", cell_ref(row, first), cell_ref(row, last)));
        }
        Ok(())
    }

    pub fn freeze_header_row(&mut self) {
        self.freeze_header = true;
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    /// Reference the sheet's drawing through relationship `rel_id`
    pub fn set_drawing(&mut self, rel_id: impl Into<String>) {
        self.drawing = Some(rel_id.into());
    }

    pub fn row(&self, row: u32) -> Option<&RowData> {
        self.rows.get(&row)
    }

    pub fn max_row(&self) -> u32 {
        self.rows.keys().next_back().copied().unwrap_or(0)
    }

    pub fn max_column(&self) -> u32 {
        self.rows.values().map(|r| r.max_column).max().unwrap_or(0)
    }

    /// `A1:<col><row>`, never smaller than `fallback_columns` wide and one row tall
    pub fn dimension(&self, fallback_columns: u32) -> String {
        let cols = self.max_column().max(fallback_columns).max(1);
        let rows = self.max_row().max(1);
        format!("A1:{}", cell_ref(rows, cols))
    }

    pub fn write_xml<W: Write>(&self, writer: &mut XmlWriter<W>, fallback_columns: u32) -> Result<()> {
        writer.declaration()?;
        writer.start_element("worksheet")?;
        writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
        )?;
        writer.attribute(
            "xmlns:r",
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
        )?;
        writer.close_start_tag()?;

        writer.start_element("dimension")?;
        writer.attribute("ref", &self.dimension(fallback_columns))?;
        writer.close_empty()?;

        self.write_sheet_views(writer)?;

        writer.start_element("sheetFormatPr")?;
        writer.attribute("defaultRowHeight", "15")?;
        writer.close_empty()?;

        if !self.column_widths.is_empty() {
            writer.start_element("cols")?;
            writer.close_start_tag()?;
            for (i, width) in self.column_widths.iter().enumerate() {
                writer.start_element("col")?;
                writer.attribute_int("min", i + 1)?;
                writer.attribute_int("max", i + 1)?;
                writer.attribute_num("width", *width)?;
                writer.attribute("customWidth", "1")?;
                writer.close_empty()?;
            }
            writer.end_element("cols")?;
        }

        writer.start_element("sheetData")?;
        writer.close_start_tag()?;
        for (row_number, row) in &self.rows {
            write_row(writer, *row_number, row)?;
        }
        writer.end_element("sheetData")?;

        if !self.merges.is_empty() {
            writer.start_element("mergeCells")?;
            writer.attribute_int("count", self.merges.len())?;
            writer.close_start_tag()?;
            for range in &self.merges {
                writer.start_element("mergeCell")?;
                writer.attribute("ref", range)?;
                writer.close_empty()?;
            }
            writer.end_element("mergeCells")?;
        }

        writer.write_str(
            "<pageMargins left=\"0.7\" right=\"0.7\" top=\"0.75\" bottom=\"0.75\" header=\"0.3\" footer=\"0.3\"/>",
        )?;

        if let Some(rel_id) = &self.drawing {
            writer.start_element("drawing")?;
            writer.attribute("r:id", rel_id)?;
            writer.close_empty()?;
        }

        writer.end_element("worksheet")?;
        writer.flush()
    }

    fn write_sheet_views<W: Write>(&self, writer: &mut XmlWriter<W>) -> Result<()> {
        writer.write_str("<sheetViews>")?;
        writer.start_element("sheetView")?;
        if self.selected {
            writer.attribute("tabSelected", "1")?;
        }
        writer.attribute("workbookViewId", "0")?;

        if !self.freeze_header {
            writer.close_empty()?;
            return writer.write_str("</sheetViews>");
        }

        writer.close_start_tag()?;
        writer.write_str(
            "<pane ySplit=\"1\" topLeftCell=\"A2\" activePane=\"bottomLeft\" state=\"frozen\"/>\
             <selection pane=\"bottomLeft\" activeCell=\"A2\" sqref=\"A2\"/>",
        )?;
        writer.end_element("sheetView")?;
        writer.write_str("</sheetViews>")
    }
}

fn write_row<W: Write>(writer: &mut XmlWriter<W>, row_number: u32, row: &RowData) -> Result<()> {
    writer.start_element("row")?;
    writer.attribute_int("r", row_number)?;
    if row.max_column > 0 {
        writer.attribute("spans", &format!("1:{}", row.max_column))?;
    }
    if let Some(height) = row.height {
        writer.attribute_num("ht", height)?;
        writer.attribute("customHeight", "1")?;
    }

    if row.cells.is_empty() {
        return writer.close_empty();
    }
    writer.close_start_tag()?;

    let mut cells = row.cells.clone();
    cells.sort_by_key(|c| c.column);

    for cell in &cells {
        writer.start_element("c")?;
        writer.attribute("r", &cell_ref(row_number, cell.column))?;
        if cell.style != CellStyle::Default {
            writer.attribute_int("s", cell.style.index())?;
        }
        writer.attribute("t", "s")?;
        writer.close_start_tag()?;

        writer.start_element("v")?;
        writer.close_start_tag()?;
        let mut buf = itoa::Buffer::new();
        writer.write_str(buf.format(cell.string_index))?;
        writer.end_element("v")?;

        writer.end_element("c")?;
    }

    writer.end_element("row")
}

fn check_bounds(row: u32, col: u32) -> Result<()> {
    if row == 0 || row > MAX_ROWS || col == 0 || col > MAX_COLUMNS {
        return Err(ExportError::InvalidCell(format!("row {}, column {}", row, col)));
    }
    Ok(())
}
