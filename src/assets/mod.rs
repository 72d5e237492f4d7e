//! Attachment resolution for one export.
//!
//! Every URL is fetched at most once per [`AssetPipeline`]; the result (bytes
//! or failure) is cached under the MD5 of the URL. Images that survive are
//! anchored as they are placed, but media part numbers, relationship ids and
//! shape ids are only handed out in [`AssetPipeline::finalize`], so the
//! numbering is contiguous over survivors.

pub mod fetch;
pub mod image;

#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::{FetchResult, FetchedBody, Fetcher, OfflineFetcher};

use indexmap::IndexMap;
use log::{debug, warn};
use md5::{Digest, Md5};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

pub type CacheKey = [u8; 16];

pub fn cache_key(url: &str) -> CacheKey {
    let digest = Md5::digest(url.as_bytes());
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest);
    key
}

/// A decoded, embeddable image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub extension: String,
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Debug, Clone)]
struct PendingAnchor {
    key: CacheKey,
    asset: Arc<ImageAsset>,
    row: u32,
    column: u32,
    row_offset_px: u32,
}

/// `xl/media/imageN.<ext>`
#[derive(Debug, Clone)]
pub struct MediaPart {
    pub number: usize,
    pub asset: Arc<ImageAsset>,
}

impl MediaPart {
    pub fn file_name(&self) -> String {
        format!("image{}.{}", self.number, self.asset.extension)
    }

    pub fn path(&self) -> String {
        format!("xl/media/{}", self.file_name())
    }

    /// Relationship id inside `drawing1.xml.rels`
    pub fn rel_id(&self) -> String {
        format!("rId{}", self.number)
    }
}

/// One picture placed on the data sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawingAnchor {
    pub shape_id: u32,
    pub media_number: usize,
    /// 1-based sheet row
    pub row: u32,
    /// 1-based sheet column
    pub column: u32,
    pub row_offset_px: u32,
    pub width_px: u32,
    pub height_px: u32,
}

/// `xl/embeddings/fileN.pdf`
#[derive(Debug, Clone)]
pub struct PdfPart {
    pub number: usize,
    pub bytes: Arc<[u8]>,
}

impl PdfPart {
    pub fn path(&self) -> String {
        pdf_part_path(self.number)
    }
}

fn pdf_part_path(number: usize) -> String {
    format!("xl/embeddings/file{}.pdf", number)
}

/// Surviving assets with their final numbering
#[derive(Debug, Clone, Default)]
pub struct FinalAssets {
    pub media: Vec<MediaPart>,
    pub anchors: Vec<DrawingAnchor>,
    pub pdfs: Vec<PdfPart>,
}

impl FinalAssets {
    pub fn has_drawing(&self) -> bool {
        !self.anchors.is_empty()
    }

    /// Distinct media extensions, for content type defaults
    pub fn image_extensions(&self) -> BTreeSet<&str> {
        self.media
            .iter()
            .map(|m| m.asset.extension.as_str())
            .collect()
    }
}

/// Cache and bookkeeping for the attachments of one export
pub struct AssetPipeline<F: Fetcher> {
    fetcher: F,
    image_cache: HashMap<CacheKey, Option<Arc<ImageAsset>>>,
    pdf_cache: HashMap<CacheKey, Option<Arc<[u8]>>>,
    embedded_pdfs: IndexMap<CacheKey, Arc<[u8]>>,
    anchors: Vec<PendingAnchor>,
    fetches: usize,
}

impl<F: Fetcher> AssetPipeline<F> {
    pub fn new(fetcher: F) -> Self {
        AssetPipeline {
            fetcher,
            image_cache: HashMap::new(),
            pdf_cache: HashMap::new(),
            embedded_pdfs: IndexMap::new(),
            anchors: Vec::new(),
            fetches: 0,
        }
    }

    /// Number of requests handed to the fetcher so far
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    /// Download every not-yet-cached URL up front.
    ///
    /// With the `parallel` feature the downloads fan out over rayon's pool;
    /// later `resolve_*` calls are then pure cache hits.
    pub fn prefetch<S: AsRef<str>>(&mut self, image_urls: &[S], pdf_urls: &[S]) {
        let pending_images = pending(image_urls, |key| self.image_cache.contains_key(key));
        let pending_pdfs = pending(pdf_urls, |key| self.pdf_cache.contains_key(key));
        if pending_images.is_empty() && pending_pdfs.is_empty() {
            return;
        }

        debug!(
            "prefetching {} image(s) and {} pdf(s)",
            pending_images.len(),
            pending_pdfs.len()
        );
        self.fetches += pending_images.len() + pending_pdfs.len();

        for (key, asset) in fan_out(&self.fetcher, pending_images, load_image::<F>) {
            self.image_cache.insert(key, asset);
        }
        for (key, bytes) in fan_out(&self.fetcher, pending_pdfs, load_pdf::<F>) {
            self.pdf_cache.insert(key, bytes);
        }
    }

    /// The image behind `url`, or `None` when it cannot be embedded
    pub fn resolve_image(&mut self, url: &str) -> Option<Arc<ImageAsset>> {
        let key = cache_key(url);
        if let Some(cached) = self.image_cache.get(&key) {
            return cached.clone();
        }

        self.fetches += 1;
        let asset = load_image(&self.fetcher, url);
        self.image_cache.insert(key, asset.clone());
        asset
    }

    /// Embed the PDF behind `url`; returns its package part path
    pub fn resolve_pdf(&mut self, url: &str) -> Option<String> {
        let key = cache_key(url);
        let bytes = match self.pdf_cache.get(&key) {
            Some(cached) => cached.clone(),
            None => {
                self.fetches += 1;
                let bytes = load_pdf(&self.fetcher, url);
                self.pdf_cache.insert(key, bytes.clone());
                bytes
            }
        }?;

        let (index, _) = self.embedded_pdfs.insert_full(key, bytes);
        Some(pdf_part_path(index + 1))
    }

    /// Record a placed image; numbering happens in [`finalize`](Self::finalize)
    pub fn anchor_image(
        &mut self,
        url: &str,
        asset: &Arc<ImageAsset>,
        row: u32,
        column: u32,
        row_offset_px: u32,
    ) {
        self.anchors.push(PendingAnchor {
            key: cache_key(url),
            asset: Arc::clone(asset),
            row,
            column,
            row_offset_px,
        });
    }

    pub fn embedded_pdfs(&self) -> usize {
        self.embedded_pdfs.len()
    }

    /// Assign media numbers, relationship ids and shape ids to survivors
    pub fn finalize(self) -> FinalAssets {
        let mut media: IndexMap<CacheKey, Arc<ImageAsset>> = IndexMap::new();
        let mut anchors = Vec::with_capacity(self.anchors.len());

        for (i, pending) in self.anchors.into_iter().enumerate() {
            let (index, _) = media.insert_full(pending.key, Arc::clone(&pending.asset));
            anchors.push(DrawingAnchor {
                shape_id: (i + 1) as u32,
                media_number: index + 1,
                row: pending.row,
                column: pending.column,
                row_offset_px: pending.row_offset_px,
                width_px: pending.asset.width_px,
                height_px: pending.asset.height_px,
            });
        }

        FinalAssets {
            media: media
                .into_values()
                .enumerate()
                .map(|(i, asset)| MediaPart {
                    number: i + 1,
                    asset,
                })
                .collect(),
            anchors,
            pdfs: self
                .embedded_pdfs
                .into_values()
                .enumerate()
                .map(|(i, bytes)| PdfPart {
                    number: i + 1,
                    bytes,
                })
                .collect(),
        }
    }
}

/// Unique, uncached URLs in first-seen order
fn pending<S: AsRef<str>>(urls: &[S], cached: impl Fn(&CacheKey) -> bool) -> Vec<(CacheKey, String)> {
    let mut seen = BTreeSet::new();
    urls.iter()
        .map(|url| (cache_key(url.as_ref()), url.as_ref().to_string()))
        .filter(|(key, _)| !cached(key) && seen.insert(*key))
        .collect()
}

#[cfg(feature = "parallel")]
fn fan_out<F, T, L>(fetcher: &F, pending: Vec<(CacheKey, String)>, load: L) -> Vec<(CacheKey, T)>
where
    F: Fetcher,
    T: Send,
    L: Fn(&F, &str) -> T + Sync + Send,
{
    use rayon::prelude::*;

    pending
        .into_par_iter()
        .map(|(key, url)| (key, load(fetcher, &url)))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn fan_out<F, T, L>(fetcher: &F, pending: Vec<(CacheKey, String)>, load: L) -> Vec<(CacheKey, T)>
where
    F: Fetcher,
    L: Fn(&F, &str) -> T,
{
    pending
        .into_iter()
        .map(|(key, url)| (key, load(fetcher, &url)))
        .collect()
}

fn load_image<F: Fetcher>(fetcher: &F, url: &str) -> Option<Arc<ImageAsset>> {
    let body = match fetcher.fetch(url) {
        Ok(body) => body,
        Err(err) => {
            warn!("image {} not embedded: {}", url, err);
            return None;
        }
    };

    match image::probe(&body.bytes, url) {
        Ok(info) => {
            debug!(
                "fetched image {} ({}, {}x{}, served as {})",
                url,
                info.mime,
                info.width_px,
                info.height_px,
                body.content_type.as_deref().unwrap_or("unknown")
            );
            Some(Arc::new(ImageAsset {
                bytes: body.bytes,
                mime: info.mime,
                extension: info.extension,
                width_px: info.width_px,
                height_px: info.height_px,
            }))
        }
        Err(err) => {
            warn!("image {} not embedded: {}", url, err);
            None
        }
    }
}

fn load_pdf<F: Fetcher>(fetcher: &F, url: &str) -> Option<Arc<[u8]>> {
    match fetcher.fetch(url) {
        Ok(body) if !body.bytes.is_empty() => {
            debug!("fetched pdf {} ({} bytes)", url, body.bytes.len());
            Some(Arc::from(body.bytes))
        }
        Ok(_) => {
            warn!("pdf {} not embedded: empty response body", url);
            None
        }
        Err(err) => {
            warn!("pdf {} not embedded: {}", url, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use ::image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        RgbImage::new(width, height)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn fake_fetcher(calls: Arc<AtomicUsize>) -> impl Fetcher {
        let image = png(10, 30);
        move |url: &str| -> FetchResult {
            calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("broken") {
                Err(FetchError::Status(404))
            } else if url.ends_with(".pdf") {
                Ok(FetchedBody::new(b"%PDF-1.4 test".to_vec()))
            } else {
                Ok(FetchedBody::new(image.clone()).with_content_type("image/png"))
            }
        }
    }

    #[test]
    fn test_image_fetched_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = AssetPipeline::new(fake_fetcher(calls.clone()));

        let first = pipeline.resolve_image("https://x.example/a.png").unwrap();
        let second = pipeline.resolve_image("https://x.example/a.png").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.fetch_count(), 1);
        assert_eq!(first.bytes, second.bytes);
        assert_eq!((first.width_px, first.height_px), (10, 30));
    }

    #[test]
    fn test_failures_are_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = AssetPipeline::new(fake_fetcher(calls.clone()));

        assert!(pipeline.resolve_image("https://x.example/broken.png").is_none());
        assert!(pipeline.resolve_image("https://x.example/broken.png").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_finalize_numbers_survivors_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = AssetPipeline::new(fake_fetcher(calls));

        let a = pipeline.resolve_image("https://x.example/a.png").unwrap();
        assert!(pipeline.resolve_image("https://x.example/broken.png").is_none());
        let b = pipeline.resolve_image("https://x.example/b.png").unwrap();

        pipeline.anchor_image("https://x.example/a.png", &a, 2, 2, 0);
        pipeline.anchor_image("https://x.example/b.png", &b, 3, 2, 0);
        pipeline.anchor_image("https://x.example/a.png", &a, 4, 2, 0);

        let assets = pipeline.finalize();
        assert_eq!(assets.media.len(), 2);
        assert_eq!(assets.media[1].path(), "xl/media/image2.png");
        assert_eq!(assets.media[1].rel_id(), "rId2");

        let numbering: Vec<(u32, usize)> = assets
            .anchors
            .iter()
            .map(|a| (a.shape_id, a.media_number))
            .collect();
        assert_eq!(numbering, vec![(1, 1), (2, 2), (3, 1)]);
    }

    #[test]
    fn test_pdf_parts_are_deduplicated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = AssetPipeline::new(fake_fetcher(calls.clone()));

        assert_eq!(
            pipeline.resolve_pdf("https://x.example/broken.pdf"),
            None
        );
        assert_eq!(
            pipeline.resolve_pdf("https://x.example/cv.pdf").as_deref(),
            Some("xl/embeddings/file1.pdf")
        );
        assert_eq!(
            pipeline.resolve_pdf("https://x.example/cv.pdf").as_deref(),
            Some("xl/embeddings/file1.pdf")
        );
        assert_eq!(
            pipeline.resolve_pdf("https://x.example/other.pdf").as_deref(),
            Some("xl/embeddings/file2.pdf")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(pipeline.finalize().pdfs.len(), 2);
    }

    #[test]
    fn test_prefetch_fills_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = AssetPipeline::new(fake_fetcher(calls.clone()));

        let images = ["https://x.example/a.png", "https://x.example/a.png", "https://x.example/b.png"];
        pipeline.prefetch(&images, &[]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(pipeline.resolve_image("https://x.example/b.png").is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
