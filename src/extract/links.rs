//! URL classification and discovery

use crate::config::UploadRoot;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use url::Url;

pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// What a link points at, judged by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Image,
    Pdf,
    Other,
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)https?://\S+").expect("static URL pattern compiles"))
}

/// Absolute http(s) URL with a host
pub fn is_web_url(candidate: &str) -> bool {
    match Url::parse(candidate.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
        Err(_) => false,
    }
}

/// Path component of a URL, or the input itself minus query and fragment
fn path_part(reference: &str) -> String {
    let reference = reference.trim();
    if let Ok(url) = Url::parse(reference) {
        // drive letters parse as schemes
        if url.has_host() {
            return url.path().to_string();
        }
    }
    let end = reference.find(['?', '#']).unwrap_or(reference.len());
    reference[..end].replace('\\', "/")
}

/// Lowercase extension of the referenced file, empty when there is none
pub fn extension_of(reference: &str) -> String {
    Path::new(&path_part(reference))
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Last path segment of a URL or file path
pub fn basename(reference: &str) -> String {
    path_part(reference)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

pub fn is_pdf_extension(ext: &str) -> bool {
    ext.eq_ignore_ascii_case("pdf")
}

pub fn classify(reference: &str) -> LinkKind {
    let ext = extension_of(reference);
    if is_image_extension(&ext) {
        LinkKind::Image
    } else if is_pdf_extension(&ext) {
        LinkKind::Pdf
    } else {
        LinkKind::Other
    }
}

/// A web URL that points at an image or PDF
pub fn is_file_url(candidate: &str) -> bool {
    is_web_url(candidate) && classify(candidate) != LinkKind::Other
}

/// Absolute URLs embedded in free text, first-seen order, no duplicates.
///
/// Trailing sentence punctuation is not part of the URL.
pub fn scan_urls(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in url_pattern().find_iter(text) {
        let url = m
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '}', '\'', '"', '>']);
        if is_web_url(url) && !found.iter().any(|f| f == url) {
            found.push(url.to_string());
        }
    }
    found
}

/// Public URL of a stored upload path, if it lives under the upload root
pub fn path_to_url(path: &str, uploads: Option<&UploadRoot>) -> Option<String> {
    let uploads = uploads?;
    let path = path.trim().replace('\\', "/");
    if path.is_empty() {
        return None;
    }

    let base_dir = uploads.base_dir.to_string_lossy().replace('\\', "/");
    let base_dir = format!("{}/", base_dir.trim_end_matches('/'));
    let base_url = format!("{}/", uploads.base_url.trim_end_matches('/'));

    if let Some(relative) = path.strip_prefix(&base_dir) {
        return Some(format!("{}{}", base_url, relative.trim_start_matches('/')));
    }

    let relative = path.trim_start_matches('/');
    if uploads.base_dir.join(relative).is_file() {
        return Some(format!("{}{}", base_url, relative));
    }

    None
}

/// Find a stored upload on disk and map it under the upload root.
///
/// Tries the candidate as given, as a URL below `base_url`, and relative to
/// `base_dir`. Paths are canonicalized before matching, so `..` segments and
/// a symlinked upload root still resolve.
pub fn locate_upload_url(candidate: &str, uploads: &UploadRoot) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    let base_dir = uploads.base_dir.canonicalize().ok()?;
    let base_url = format!("{}/", uploads.base_url.trim_end_matches('/'));

    let mut paths = vec![PathBuf::from(candidate)];
    if let Some(rest) = candidate.strip_prefix(&base_url) {
        paths.push(uploads.base_dir.join(rest.trim_start_matches('/')));
    }
    paths.push(uploads.base_dir.join(candidate.trim_start_matches('/')));

    paths
        .into_iter()
        .filter(|path| path.is_file())
        .filter_map(|path| path.canonicalize().ok())
        .find_map(|path| {
            let relative = path.strip_prefix(&base_dir).ok()?;
            let segments: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            (!segments.is_empty()).then(|| format!("{}{}", base_url, segments.join("/")))
        })
}
