//! The export pipeline: payloads → rows and assets → package.

use crate::assets::{AssetPipeline, Fetcher};
use crate::config::ExportOptions;
use crate::error::{ExportError, Result};
use crate::extract::field_payload;
use crate::layout::{self, ImageStacker, ATTACHMENT_COLUMN_WIDTHS, NOTICE_ROW_HEIGHT_PT};
use crate::types::{CellStyle, Column, Form, Payload, Submission};
use crate::xlsx::drawing::{
    self, DRAWING_PART, DRAWING_RELS_PART, SHEET1_RELS_PART, SHEET_DRAWING_REL_ID,
};
use crate::xlsx::parts::{self, ContentTypes, DocProperties};
use crate::xlsx::xml_writer::render;
use crate::xlsx::{write_package, PackagePart, SharedStrings, SheetModel};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, info, warn};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Outcome of a finished export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Submission rows written (the no-submissions notice is not counted)
    pub rows: usize,
    /// Pictures placed on the data sheet
    pub images_embedded: usize,
    /// Distinct PDF parts in the package
    pub pdfs_embedded: usize,
    /// Attachment occurrences that fell back to plain links
    pub failed_downloads: usize,
    pub path: PathBuf,
}

/// Audit trail of PDF attachments: `Row | Column | Original URL | Part or status`.
///
/// Created on the first PDF; only rendered as a sheet when at least one PDF
/// was actually embedded.
#[derive(Debug, Default)]
struct AttachmentLog {
    rows: Vec<[String; 4]>,
}

/// Builds one workbook. Owns every cache and counter for the duration of
/// the export; nothing is shared between exporters.
pub struct WorkbookExporter<F: Fetcher> {
    form: Form,
    columns: Vec<Column>,
    options: ExportOptions,
    strings: SharedStrings,
    sheet: SheetModel,
    attachments: Option<AttachmentLog>,
    assets: AssetPipeline<F>,
    stacker: ImageStacker,
    next_row: u32,
    failed_downloads: usize,
}

impl<F: Fetcher> WorkbookExporter<F> {
    /// Start a workbook and write its header row.
    ///
    /// Columns are re-indexed `1..=N` in the given order.
    pub fn new(form: Form, columns: Vec<Column>, options: ExportOptions, fetcher: F) -> Result<Self> {
        if columns.is_empty() {
            return Err(ExportError::NoColumns);
        }
        let columns = crate::columns::reindex(columns);

        let mut strings = SharedStrings::new();
        let mut sheet = SheetModel::new();
        sheet.freeze_header_row();
        sheet.set_selected(true);
        sheet.set_column_widths(columns.iter().map(layout::column_width).collect());
        for column in &columns {
            sheet.set_cell(&mut strings, 1, column.index, &column.header, CellStyle::Header)?;
        }

        Ok(WorkbookExporter {
            form,
            columns,
            options,
            strings,
            sheet,
            attachments: None,
            assets: AssetPipeline::new(fetcher),
            stacker: ImageStacker::new(),
            next_row: 2,
            failed_downloads: 0,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Append one row per submission. May be called repeatedly.
    pub fn write_submissions(&mut self, submissions: &[Submission]) -> Result<()> {
        let payloads: Vec<Vec<Option<Payload>>> = submissions
            .iter()
            .map(|submission| {
                self.columns
                    .iter()
                    .map(|column| {
                        column.field.as_ref().map(|field| {
                            field_payload(submission, field, self.options.uploads.as_ref())
                        })
                    })
                    .collect()
            })
            .collect();

        let (image_urls, pdf_urls) = collect_urls(&payloads);
        self.assets.prefetch(&image_urls, &pdf_urls);

        for (submission, row_payloads) in submissions.iter().zip(payloads) {
            let row = self.next_row;
            self.next_row += 1;
            self.write_row(row, submission, row_payloads)?;
        }

        debug!("wrote {} submission row(s)", submissions.len());
        Ok(())
    }

    fn write_row(&mut self, row: u32, submission: &Submission, payloads: Vec<Option<Payload>>) -> Result<()> {
        let columns = std::mem::take(&mut self.columns);
        let result = self.write_cells(row, submission, &columns, payloads);
        self.columns = columns;
        result
    }

    fn write_cells(
        &mut self,
        row: u32,
        submission: &Submission,
        columns: &[Column],
        payloads: Vec<Option<Payload>>,
    ) -> Result<()> {
        for (column, payload) in columns.iter().zip(payloads) {
            match payload {
                Some(payload) => self.write_field(row, column, payload)?,
                None => {
                    let date = format_submission_date(&submission.submitted_at, &self.options.date_format);
                    self.sheet
                        .set_cell(&mut self.strings, row, column.index, &date, CellStyle::Body)?;
                }
            }
        }
        Ok(())
    }

    fn write_field(&mut self, row: u32, column: &Column, payload: Payload) -> Result<()> {
        let mut text = payload.text;

        for url in &payload.images {
            let Some(asset) = self.assets.resolve_image(url) else {
                self.failed_downloads += 1;
                append_link(&mut text, url);
                continue;
            };
            match self.stacker.place(row, column.index, asset.height_px) {
                Some(placement) => {
                    self.sheet.set_row_height(row, placement.row_height_pt)?;
                    self.assets
                        .anchor_image(url, &asset, row, column.index, placement.row_offset_px);
                }
                None => {
                    debug!("no room left in row {} for {}, writing it as a link", row, url);
                    append_link(&mut text, url);
                }
            }
        }

        for url in &payload.pdfs {
            let status = match self.assets.resolve_pdf(url) {
                Some(part) => part,
                None => {
                    self.failed_downloads += 1;
                    append_link(&mut text, url);
                    self.options.labels.download_failed.clone()
                }
            };
            self.log_attachment(row, &column.header, url, &status);
        }

        self.sheet
            .set_cell(&mut self.strings, row, column.index, &text, CellStyle::Body)?;
        Ok(())
    }

    fn log_attachment(&mut self, source_row: u32, column: &str, url: &str, status: &str) {
        self.attachments
            .get_or_insert_with(AttachmentLog::default)
            .rows
            .push([source_row.to_string(), column.to_string(), url.to_string(), status.to_string()]);
    }

    /// Materialize the audit sheet from the buffered log rows
    fn build_attachment_sheet(&mut self, log: AttachmentLog) -> Result<SheetModel> {
        let mut sheet = SheetModel::new();
        sheet.set_column_widths(ATTACHMENT_COLUMN_WIDTHS.to_vec());
        for (i, header) in self.options.labels.attachment_headers.iter().enumerate() {
            sheet.set_cell(&mut self.strings, 1, i as u32 + 1, header, CellStyle::Header)?;
        }
        for (row, values) in (2u32..).zip(&log.rows) {
            for (col, value) in (1u32..).zip(values) {
                sheet.set_cell(&mut self.strings, row, col, value, CellStyle::Body)?;
            }
        }
        Ok(sheet)
    }

    /// Render every part and write the package to `dest`
    pub fn save(mut self, dest: impl AsRef<Path>) -> Result<ExportSummary> {
        let dest = dest.as_ref();
        let rows = (self.next_row - 2) as usize;
        let column_count = self.columns.len() as u32;

        if rows == 0 {
            self.sheet.set_cell(
                &mut self.strings,
                2,
                1,
                &self.options.labels.no_submissions,
                CellStyle::Body,
            )?;
            self.sheet.set_row_height(2, NOTICE_ROW_HEIGHT_PT)?;
            self.sheet.merge_row(2, 1, column_count)?;
        }

        let props = self.doc_properties();
        let pdfs_embedded = self.assets.embedded_pdfs();
        let attachments = match self.attachments.take() {
            Some(log) if pdfs_embedded > 0 => Some(self.build_attachment_sheet(log)?),
            _ => None,
        };
        let assets = self.assets.finalize();
        if assets.has_drawing() {
            self.sheet.set_drawing(SHEET_DRAWING_REL_ID);
        }

        let mut sheet_names = vec![parts::sanitize_sheet_name(&self.options.labels.submissions_sheet)];
        if attachments.is_some() {
            let name = parts::unique_sheet_name(&self.options.labels.attachments_sheet, &sheet_names);
            sheet_names.push(name);
        }

        let content_types = ContentTypes {
            sheet_count: sheet_names.len(),
            has_drawing: assets.has_drawing(),
            image_extensions: assets.image_extensions(),
            pdf_parts: assets.pdfs.iter().map(|p| p.path()).collect(),
        };

        let mut package = vec![
            PackagePart::owned("[Content_Types].xml", content_types.to_xml()?),
            PackagePart::owned("_rels/.rels", parts::root_rels_xml()?),
            PackagePart::owned("docProps/core.xml", parts::core_xml(&props)?),
            PackagePart::owned("docProps/app.xml", parts::app_xml(&props, &sheet_names)?),
            PackagePart::owned("xl/workbook.xml", parts::workbook_xml(&sheet_names)?),
            PackagePart::owned(
                "xl/_rels/workbook.xml.rels",
                parts::workbook_rels_xml(sheet_names.len())?,
            ),
            PackagePart::borrowed("xl/styles.xml", parts::STYLES_XML.as_bytes()),
            PackagePart::borrowed("xl/theme/theme1.xml", parts::THEME_XML.as_bytes()),
            PackagePart::owned("xl/sharedStrings.xml", render(|w| self.strings.write_xml(w))?),
            PackagePart::owned(
                "xl/worksheets/sheet1.xml",
                render(|w| self.sheet.write_xml(w, column_count))?,
            ),
        ];

        if let Some(sheet) = &attachments {
            package.push(PackagePart::owned(
                "xl/worksheets/sheet2.xml",
                render(|w| sheet.write_xml(w, ATTACHMENT_COLUMN_WIDTHS.len() as u32))?,
            ));
        }

        if assets.has_drawing() {
            package.push(PackagePart::owned(SHEET1_RELS_PART, drawing::sheet_rels_xml()?));
            package.push(PackagePart::owned(DRAWING_PART, drawing::drawing_xml(&assets.anchors)?));
            package.push(PackagePart::owned(
                DRAWING_RELS_PART,
                drawing::drawing_rels_xml(&assets.media)?,
            ));
            for media in &assets.media {
                package.push(PackagePart::borrowed(media.path(), &media.asset.bytes));
            }
        }

        for pdf in &assets.pdfs {
            package.push(PackagePart::borrowed(pdf.path(), &pdf.bytes));
        }

        write_package(dest, &package, self.options.compression_level)?;

        let summary = ExportSummary {
            rows,
            images_embedded: assets.anchors.len(),
            pdfs_embedded: assets.pdfs.len(),
            failed_downloads: self.failed_downloads,
            path: dest.to_path_buf(),
        };
        info!(
            "exported form {} to {}: {} row(s), {} image(s), {} pdf(s), {} failed download(s)",
            self.form.id,
            dest.display(),
            summary.rows,
            summary.images_embedded,
            summary.pdfs_embedded,
            summary.failed_downloads
        );
        if summary.failed_downloads > 0 {
            warn!(
                "{} attachment(s) could not be embedded and were written as links",
                summary.failed_downloads
            );
        }
        Ok(summary)
    }

    fn doc_properties(&self) -> DocProperties {
        let title = if self.form.title.trim().is_empty() {
            self.options.labels.title_prefix.clone()
        } else {
            format!("{} – {}", self.options.labels.title_prefix, self.form.title.trim())
        };
        let creator = self
            .options
            .creator
            .clone()
            .unwrap_or_else(|| self.options.application.clone());

        DocProperties {
            title,
            company: self.options.company.clone().unwrap_or_default(),
            creator,
            application: self.options.application.clone(),
            created: self.options.created_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Export `submissions` to an `.xlsx` at `dest`, downloading attachments
/// over HTTP.
#[cfg(feature = "http")]
pub fn export_workbook(
    form: Form,
    columns: Vec<Column>,
    submissions: &[Submission],
    dest: impl AsRef<Path>,
    options: ExportOptions,
) -> Result<ExportSummary> {
    let fetcher = crate::assets::HttpFetcher::from_options(&options)?;
    export_workbook_with(form, columns, submissions, dest, options, fetcher)
}

/// Export with a caller-supplied attachment fetcher
pub fn export_workbook_with<F: Fetcher>(
    form: Form,
    columns: Vec<Column>,
    submissions: &[Submission],
    dest: impl AsRef<Path>,
    options: ExportOptions,
    fetcher: F,
) -> Result<ExportSummary> {
    let mut exporter = WorkbookExporter::new(form, columns, options, fetcher)?;
    exporter.write_submissions(submissions)?;
    exporter.save(dest)
}

/// Image and PDF URLs in discovery order
fn collect_urls(payloads: &[Vec<Option<Payload>>]) -> (Vec<String>, Vec<String>) {
    let mut images = Vec::new();
    let mut pdfs = Vec::new();
    for payload in payloads.iter().flatten().flatten() {
        images.extend(payload.images.iter().cloned());
        pdfs.extend(payload.pdfs.iter().cloned());
    }
    (images, pdfs)
}

/// Keep an unembeddable attachment visible as a link
fn append_link(text: &mut String, url: &str) {
    if text.contains(url) {
        return;
    }
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(url);
}

/// Render a stored submission date with `format`.
///
/// Values that do not parse, or a format chrono rejects, leave the input
/// unchanged.
pub fn format_submission_date(raw: &str, format: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let Some(parsed) = parse_date(raw) else {
        return raw.to_string();
    };

    let mut out = String::new();
    match write!(out, "{}", parsed.format(format)) {
        Ok(()) => out,
        Err(_) => raw.to_string(),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
