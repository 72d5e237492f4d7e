//! Value extraction: turns nested submission values into cell payloads
//!
//! A payload carries the display text of a value plus every link found in it,
//! split into images and PDFs by file extension. Extraction is a pure
//! recursive walk over [`RawValue`]; it never fails, malformed input simply
//! degrades to text.

pub mod decode;
pub mod links;

use crate::config::UploadRoot;
use crate::types::{FieldDescriptor, Payload, RawValue, Submission};
use links::{
    basename, classify, is_file_url, is_web_url, locate_upload_url, path_to_url, scan_urls, LinkKind,
};

pub use decode::{decode_meta_value, decode_str, unserialize};

/// Keys whose presence marks a file-upload descriptor
pub const UPLOAD_KEYS: [&str; 6] = ["tmp_name", "file_path", "file_name", "url", "path", "saved_name"];

/// Extract the payload of a single (already decoded) value
pub fn extract(value: &RawValue, uploads: Option<&UploadRoot>) -> Payload {
    let mut payload = prepare(value, uploads);
    finish(&mut payload);
    payload
}

/// Payload for `field` in `submission`.
///
/// Meta keys are tried in candidate order; the first one producing text or
/// links wins.
pub fn field_payload(
    submission: &Submission,
    field: &FieldDescriptor,
    uploads: Option<&UploadRoot>,
) -> Payload {
    for key in candidate_meta_keys(field) {
        let Some(values) = submission.meta.get(&key) else {
            continue;
        };
        let payload = merge_values(values, uploads);
        if !payload.is_empty() {
            return payload;
        }
    }
    Payload::default()
}

/// Meta keys a field's value may be stored under
pub fn candidate_meta_keys(field: &FieldDescriptor) -> Vec<String> {
    let candidates = [
        field.key.trim().to_string(),
        field.id.to_string(),
        format!("field_{}", field.id),
        format!("_field_{}", field.id),
    ];

    let mut keys: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !candidate.is_empty() && !keys.contains(&candidate) {
            keys.push(candidate);
        }
    }
    keys
}

/// Decode and combine every stored value of one meta key
fn merge_values(values: &[RawValue], uploads: Option<&UploadRoot>) -> Payload {
    let mut texts: Vec<String> = Vec::new();
    let mut merged = Payload::default();

    for value in values {
        let payload = extract(&decode_meta_value(value), uploads);
        if !payload.text.is_empty() {
            push_unique(&mut texts, payload.text);
        }
        extend_unique(&mut merged.links, payload.links);
        extend_unique(&mut merged.images, payload.images);
        extend_unique(&mut merged.pdfs, payload.pdfs);
    }

    merged.text = if texts.is_empty() {
        merged.links.join("\n")
    } else {
        texts.join("\n")
    };
    merged
}

fn prepare(value: &RawValue, uploads: Option<&UploadRoot>) -> Payload {
    if !value.is_container() {
        let text = value.scalar_text().unwrap_or_default().trim().to_string();
        let mut payload = Payload::default();
        if is_web_url(&text) {
            payload.links.push(text.clone());
        } else if let Some(url) = path_to_url(&text, uploads) {
            if classify(&url) != LinkKind::Other {
                payload.links.push(url);
            }
        }
        payload.text = text;
        return payload;
    }

    if is_upload_descriptor(value, uploads) {
        return upload_payload(value, uploads);
    }

    if let RawValue::Map(map) = value {
        if let Some(inner) = map.get("value") {
            let mut payload = prepare(inner, uploads);
            if payload.text.is_empty() {
                if let Some(label) = map.get("label").and_then(RawValue::scalar_text) {
                    payload.text = label.trim().to_string();
                }
            }
            if !payload.is_empty() {
                return payload;
            }
        }
    }

    let mut texts: Vec<String> = Vec::new();
    let mut payload = Payload::default();
    for (key, item) in value.entries() {
        if key == "value" {
            continue;
        }
        let item_payload = prepare(item, uploads);
        if !item_payload.text.is_empty() {
            texts.push(item_payload.text);
        }
        extend_unique(&mut payload.links, item_payload.links);
    }
    payload.text = texts.join(", ");
    payload
}

/// Scan the text for embedded URLs and sort every link into images and PDFs
fn finish(payload: &mut Payload) {
    let mut links: Vec<String> = Vec::with_capacity(payload.links.len());
    let found = std::mem::take(&mut payload.links)
        .into_iter()
        .map(|l| l.trim().to_string())
        .chain(scan_urls(&payload.text));
    for link in found {
        if !link.is_empty() {
            push_unique(&mut links, link);
        }
    }

    for link in &links {
        match classify(link) {
            LinkKind::Image => push_unique(&mut payload.images, link.clone()),
            LinkKind::Pdf => push_unique(&mut payload.pdfs, link.clone()),
            LinkKind::Other => {}
        }
    }

    if payload.text.is_empty() && !links.is_empty() {
        payload.text = links.join("\n");
    }
    payload.links = links;
}

fn is_upload_descriptor(value: &RawValue, uploads: Option<&UploadRoot>) -> bool {
    if let RawValue::Map(map) = value {
        if UPLOAD_KEYS.iter().any(|key| map.contains_key(*key)) {
            return true;
        }

        match map.get("value") {
            Some(RawValue::String(s)) => {
                if is_file_url(s) || path_to_url(s, uploads).is_some() {
                    return true;
                }
            }
            Some(inner) if inner.is_container() => {
                if is_upload_descriptor(inner, uploads) {
                    return true;
                }
                let nested = inner.entries().into_iter().any(|(_, child)| match child {
                    RawValue::String(s) => is_file_url(s),
                    other => other.is_container() && is_upload_descriptor(other, uploads),
                });
                if nested {
                    return true;
                }
            }
            _ => {}
        }
    }

    value
        .first_container()
        .is_some_and(|first| is_upload_descriptor(first, uploads))
}

fn upload_payload(value: &RawValue, uploads: Option<&UploadRoot>) -> Payload {
    let url = resolve_file_url(value, uploads);
    let mut payload = Payload {
        text: guess_file_label(value, &url),
        ..Payload::default()
    };
    if payload.text.is_empty() {
        payload.text = url.clone();
    }
    if is_web_url(&url) {
        payload.links.push(url);
    }
    payload
}

/// Best-effort public URL of an upload descriptor, empty when none resolves
fn resolve_file_url(value: &RawValue, uploads: Option<&UploadRoot>) -> String {
    let mut candidates: Vec<String> = ["url", "value", "file_url", "file_path", "path", "tmp_name", "saved_name"]
        .iter()
        .filter_map(|key| value.non_empty_str(key))
        .map(str::to_string)
        .collect();

    if let Some(first) = value.first_container() {
        let nested = resolve_file_url(first, uploads);
        if !nested.is_empty() {
            candidates.push(nested);
        }
    }

    for candidate in candidates {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            continue;
        }
        if is_web_url(candidate) {
            return candidate.to_string();
        }
        if let Some(url) = path_to_url(candidate, uploads) {
            return url;
        }
    }

    let Some(uploads) = uploads else {
        return String::new();
    };
    ["file_path", "path", "tmp_name", "value", "url"]
        .iter()
        .filter_map(|key| value.non_empty_str(key))
        .find_map(|candidate| locate_upload_url(candidate, uploads))
        .unwrap_or_default()
}

fn guess_file_label(value: &RawValue, resolved_url: &str) -> String {
    for key in ["file_name", "saved_name", "filename", "name"] {
        if let Some(label) = value.get(key).and_then(RawValue::scalar_text) {
            if !label.trim().is_empty() {
                return label.trim().to_string();
            }
        }
    }

    for key in ["url", "value"] {
        if let Some(reference) = value.non_empty_str(key) {
            let name = basename(reference);
            if !name.is_empty() {
                return name;
            }
        }
    }

    if let Some(first) = value.first_container() {
        let label = guess_file_label(first, resolved_url);
        if !label.is_empty() {
            return label;
        }
    }

    basename(resolved_url)
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}

fn extend_unique(items: &mut Vec<String>, more: Vec<String>) {
    for item in more {
        push_unique(items, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map<const N: usize>(pairs: [(&str, RawValue); N]) -> RawValue {
        RawValue::from(pairs)
    }

    #[test]
    fn test_plain_scalar() {
        let payload = extract(&RawValue::from("  Alice "), None);
        assert_eq!(payload.text, "Alice");
        assert!(payload.links.is_empty());
    }

    #[test]
    fn test_scalar_url_is_classified() {
        let payload = extract(&RawValue::from("https://example.com/photo.JPG"), None);
        assert_eq!(payload.text, "https://example.com/photo.JPG");
        assert_eq!(payload.images, vec!["https://example.com/photo.JPG"]);
        assert!(payload.pdfs.is_empty());
    }

    #[test]
    fn test_value_label_fallback() {
        let value = map([("value", RawValue::from("")), ("label", RawValue::from("Option A"))]);
        assert_eq!(extract(&value, None).text, "Option A");

        let value = map([("value", RawValue::from("opt_a")), ("label", RawValue::from("Option A"))]);
        assert_eq!(extract(&value, None).text, "opt_a");
    }

    #[test]
    fn test_list_joins_with_comma() {
        let value = RawValue::List(vec![
            RawValue::from("red"),
            RawValue::from(""),
            RawValue::from("blue"),
        ]);
        assert_eq!(extract(&value, None).text, "red, blue");
    }

    #[test]
    fn test_upload_descriptor_prefers_file_name() {
        let value = RawValue::List(vec![map([
            ("file_name", RawValue::from("resume.pdf")),
            ("url", RawValue::from("https://example.com/uploads/abc123.pdf")),
        ])]);
        let payload = extract(&value, None);
        assert_eq!(payload.text, "resume.pdf");
        assert_eq!(payload.pdfs, vec!["https://example.com/uploads/abc123.pdf"]);
        assert!(payload.images.is_empty());
    }

    #[test]
    fn test_upload_label_from_url_basename() {
        let value = map([("url", RawValue::from("https://example.com/u/pic.png?x=1"))]);
        let payload = extract(&value, None);
        assert_eq!(payload.text, "pic.png");
        assert_eq!(payload.images, vec!["https://example.com/u/pic.png?x=1"]);
    }

    #[test]
    fn test_upload_path_resolved_through_upload_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scan.pdf"), b"%PDF").unwrap();
        let root = UploadRoot::new(dir.path(), "https://site.example/uploads");

        let path = dir.path().join("scan.pdf").to_string_lossy().into_owned();
        let value = map([("file_path", RawValue::from(path))]);
        let payload = extract(&value, Some(&root));
        assert_eq!(payload.pdfs, vec!["https://site.example/uploads/scan.pdf"]);
        assert_eq!(payload.text, "scan.pdf");
    }

    #[test]
    fn test_upload_located_on_disk_as_last_resort() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("uploads").join("2024")).unwrap();
        std::fs::create_dir(dir.path().join("tmp")).unwrap();
        std::fs::write(dir.path().join("uploads").join("2024").join("cv.pdf"), b"%PDF").unwrap();
        let root = UploadRoot::new(dir.path().join("uploads"), "https://site.example/uploads");

        let indirect = dir
            .path()
            .join("tmp")
            .join("..")
            .join("uploads")
            .join("2024")
            .join("cv.pdf")
            .to_string_lossy()
            .into_owned();
        let value = map([("tmp_name", RawValue::from(indirect)), ("name", RawValue::from("CV"))]);

        let payload = extract(&value, Some(&root));
        assert_eq!(payload.pdfs, vec!["https://site.example/uploads/2024/cv.pdf"]);
        assert_eq!(payload.text, "CV");
    }

    #[test]
    fn test_scalar_upload_path_becomes_link() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("2024")).unwrap();
        std::fs::write(dir.path().join("2024").join("a.png"), b"png").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"txt").unwrap();
        let root = UploadRoot::new(dir.path(), "https://site.example/uploads");

        let path = dir.path().join("2024").join("a.png").to_string_lossy().into_owned();
        let payload = extract(&RawValue::from(path.clone()), Some(&root));
        assert_eq!(payload.images, vec!["https://site.example/uploads/2024/a.png"]);
        assert_eq!(payload.text, path);

        let notes = dir.path().join("notes.txt").to_string_lossy().into_owned();
        let payload = extract(&RawValue::from(notes), Some(&root));
        assert!(payload.links.is_empty());

        let payload = extract(&RawValue::from(path), None);
        assert!(payload.images.is_empty());
    }

    #[test]
    fn test_urls_in_free_text() {
        let value = RawValue::from("Docs: https://a.example/one.pdf and https://a.example/two.png.");
        let payload = extract(&value, None);
        assert_eq!(payload.pdfs, vec!["https://a.example/one.pdf"]);
        assert_eq!(payload.images, vec!["https://a.example/two.png"]);
        assert_eq!(payload.links.len(), 2);
    }

    #[test]
    fn test_links_deduplicated_in_first_seen_order() {
        let value = RawValue::List(vec![
            RawValue::from("https://a.example/b.png"),
            RawValue::from("https://a.example/a.png"),
            RawValue::from("https://a.example/b.png"),
        ]);
        let payload = extract(&value, None);
        assert_eq!(
            payload.images,
            vec!["https://a.example/b.png", "https://a.example/a.png"]
        );
    }

    #[test]
    fn test_candidate_keys() {
        let field = FieldDescriptor::new(5, "email", "Email");
        assert_eq!(
            candidate_meta_keys(&field),
            vec!["email", "5", "field_5", "_field_5"]
        );
        let keyless = FieldDescriptor::new(5, "", "Email");
        assert_eq!(candidate_meta_keys(&keyless), vec!["5", "field_5", "_field_5"]);
    }

    #[test]
    fn test_field_payload_skips_empty_candidates() {
        let field = FieldDescriptor::new(3, "name", "Name");
        let submission = Submission::new(1, "2024-01-05 10:00:00")
            .with_meta("name", "")
            .with_meta("field_3", "Alice")
            .with_meta("field_3", "Alice")
            .with_meta("field_3", "Bob");
        assert_eq!(field_payload(&submission, &field, None).text, "Alice\nBob");
    }

    #[test]
    fn test_field_payload_decodes_serialized_values() {
        let field = FieldDescriptor::new(9, "", "Upload");
        let stored = "a:1:{i:0;a:1:{s:3:\"url\";s:26:\"https://example.com/cv.pdf\";}}";
        let submission = Submission::new(1, "").with_meta("_field_9", stored);
        let payload = field_payload(&submission, &field, None);
        assert_eq!(payload.text, "cv.pdf");
        assert_eq!(payload.pdfs, vec!["https://example.com/cv.pdf"]);
    }

    #[test]
    fn test_malformed_serialized_value_is_text() {
        let field = FieldDescriptor::new(2, "note", "Note");
        let submission = Submission::new(1, "").with_meta("note", "a:3:{oops");
        assert_eq!(field_payload(&submission, &field, None).text, "a:3:{oops");
    }
}
