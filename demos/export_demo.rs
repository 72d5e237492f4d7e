//! Demo: export a small contact form with an image and a PDF attachment
//!
//! Attachments are served by an in-process fetcher so the demo runs offline.

use formsheet::{
    export_workbook_with, prepare_columns, select_columns, ExportOptions, FetchError, FetchResult,
    FetchedBody, FieldDescriptor, Form, RawValue, Submission,
};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== formsheet export demo ===\n");

    let fields = vec![
        FieldDescriptor::new(1, "name", "Name"),
        FieldDescriptor::new(2, "email", "Email"),
        FieldDescriptor::new(3, "photo", "Photo").with_type("file_upload"),
        FieldDescriptor::new(4, "cv", "CV").with_type("file_upload"),
        FieldDescriptor::new(5, "notes", "Notes"),
    ];
    let columns = prepare_columns(&fields, "Submission Date");
    println!("Columns:");
    for column in &columns {
        println!("  {} {:<16} ({})", column.index, column.header, column.id);
    }

    // Drop the notes column
    let selected = select_columns(
        &columns,
        &["submission_date", "field_1", "field_2", "field_3", "field_4"],
    )?;

    let submissions = vec![
        Submission::new(101, "2024-01-05 10:00:00")
            .with_meta("name", "Alice")
            .with_meta("email", "alice@example.com")
            .with_meta("photo", "https://uploads.example.com/alice.png")
            .with_meta("cv", "https://uploads.example.com/alice-cv.pdf"),
        Submission::new(102, "2024-01-06T14:30:00")
            .with_meta("name", "Bob")
            .with_meta("email", "bob@example.com")
            .with_meta(
                "photo",
                RawValue::from(r#"{"value":"https://uploads.example.com/missing.png","label":"Bob's photo"}"#),
            ),
    ];

    let fetcher = |url: &str| -> FetchResult {
        if url.contains("missing") {
            return Err(FetchError::Status(404));
        }
        if url.ends_with(".pdf") {
            return Ok(FetchedBody::new(b"%PDF-1.4\n%%EOF\n".to_vec()).with_content_type("application/pdf"));
        }
        let mut buffer = Cursor::new(Vec::new());
        RgbImage::from_pixel(160, 120, Rgb([30, 120, 200]))
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(FetchedBody::new(buffer.into_inner()).with_content_type("image/png"))
    };

    let options = ExportOptions::from_env()
        .with_creator("Example Site")
        .with_company("Example Site");

    let summary = export_workbook_with(
        Form::new(7, "Contact"),
        selected,
        &submissions,
        "formsheet_demo.xlsx",
        options,
        fetcher,
    )?;

    println!("\nWrote {}", summary.path.display());
    println!("  rows:             {}", summary.rows);
    println!("  images embedded:  {}", summary.images_embedded);
    println!("  pdfs embedded:    {}", summary.pdfs_embedded);
    println!("  failed downloads: {}", summary.failed_downloads);

    println!("\n=== COMPLETED ===");
    Ok(())
}
