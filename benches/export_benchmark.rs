use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use formsheet::{
    export_workbook_with, extract, prepare_columns, ExportOptions, FieldDescriptor, Form,
    OfflineFetcher, RawValue, Submission,
};
use tempfile::NamedTempFile;

fn fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new(1, "name", "Name"),
        FieldDescriptor::new(2, "email", "Email"),
        FieldDescriptor::new(3, "message", "Message"),
        FieldDescriptor::new(4, "topics", "Topics"),
    ]
}

fn submissions(count: u64) -> Vec<Submission> {
    (0..count)
        .map(|i| {
            Submission::new(i, "2024-01-05 10:00:00")
                .with_meta("name", format!("Name_{}", i))
                .with_meta("email", format!("user{}@example.com", i))
                .with_meta("message", format!("Message body {}\r\nsecond line", i % 50))
                .with_meta(
                    "topics",
                    "a:2:{i:0;s:7:\"billing\";i:1;s:7:\"support\";}",
                )
        })
        .collect()
}

fn benchmark_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");
    group.sample_size(10);

    for size in [100u64, 1000, 5000].iter() {
        let rows = submissions(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| {
                let temp = NamedTempFile::new().unwrap();
                let summary = export_workbook_with(
                    Form::new(1, "Contact"),
                    prepare_columns(&fields(), "Submission Date"),
                    rows,
                    temp.path(),
                    ExportOptions::default(),
                    OfflineFetcher,
                )
                .unwrap();
                black_box(summary);
            });
        });
    }

    group.finish();
}

fn benchmark_extract(c: &mut Criterion) {
    let upload = RawValue::from(
        "a:1:{i:0;a:2:{s:3:\"url\";s:25:\"https://cdn.example/c.png\";s:9:\"file_name\";s:11:\"holiday.png\";}}",
    );
    let decoded = formsheet::extract::decode_meta_value(&upload);

    c.bench_function("extract_upload_descriptor", |b| {
        b.iter(|| black_box(extract(black_box(&decoded), None)));
    });
}

criterion_group!(benches, benchmark_export, benchmark_extract);
criterion_main!(benches);
