//! Decoding image sources for image layers.
//!
//! Only the pixel dimensions are needed to place an image on the surface, so
//! decoding stops at the header.

use crate::storage::BoxFuture;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::io::{Cursor, Read};
use std::time::Duration;
use thiserror::Error;

/// Largest remote image that will be downloaded.
pub const MAX_IMAGE_BYTES: u64 = 32 * 1024 * 1024;

/// Image errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ImageError {
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),
    #[error("Unsupported image source: {0}")]
    UnsupportedSource(String),
    #[error("Failed to fetch image: {0}")]
    Fetch(String),
    #[error("Failed to decode image: {0}")]
    Decode(String),
}

/// Result type for image operations.
pub type ImageResult<T> = Result<T, ImageError>;

/// Intrinsic size of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
}

/// Resolves an image layer's `src` into a decoded image.
pub trait ImageLoader: Send + Sync {
    fn load(&self, src: &str) -> BoxFuture<'_, ImageResult<DecodedImage>>;
}

/// Build a `data:<mime>;base64,<payload>` URL.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a base64 data URL into its media type and decoded bytes.
pub fn parse_data_url(src: &str) -> ImageResult<(String, Vec<u8>)> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| ImageError::InvalidDataUrl("missing data: prefix".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageError::InvalidDataUrl("missing payload".to_string()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| ImageError::InvalidDataUrl("only base64 payloads are supported".to_string()))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| ImageError::InvalidDataUrl(e.to_string()))?;
    Ok((mime.to_string(), bytes))
}

/// Read the dimensions of an encoded image (format sniffed from its bytes).
pub fn decode_dimensions(bytes: &[u8]) -> ImageResult<DecodedImage> {
    let (width, height) = ::image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ImageError::Decode(e.to_string()))?;
    Ok(DecodedImage { width, height })
}

/// Loads data URLs in-process and http(s) URLs over the network.
pub struct SourceLoader {
    agent: ureq::Agent,
}

impl Default for SourceLoader {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl SourceLoader {
    pub fn new(timeout: Duration) -> Self {
        Self { agent: ureq::AgentBuilder::new().timeout(timeout).build() }
    }

    fn fetch(&self, url: &str) -> ImageResult<Vec<u8>> {
        let response = self.agent.get(url).call().map_err(|e| ImageError::Fetch(e.to_string()))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_IMAGE_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| ImageError::Fetch(e.to_string()))?;
        Ok(bytes)
    }
}

impl ImageLoader for SourceLoader {
    fn load(&self, src: &str) -> BoxFuture<'_, ImageResult<DecodedImage>> {
        let src = src.to_string();
        Box::pin(async move {
            let bytes = if src.starts_with("data:") {
                parse_data_url(&src)?.1
            } else if src.starts_with("http://") || src.starts_with("https://") {
                self.fetch(&src)?
            } else {
                let shown: String = src.chars().take(32).collect();
                return Err(ImageError::UnsupportedSource(shown));
            };
            decode_dimensions(&bytes)
        })
    }
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ::image::RgbaImage::new(width, height);
    let mut out = Cursor::new(Vec::new());
    ::image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ::image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::block_on;

    #[test]
    fn test_data_url_roundtrip() {
        let url = encode_data_url("image/png", &[1, 2, 3, 4]);
        assert!(url.starts_with("data:image/png;base64,"));

        let (mime, bytes) = parse_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rejects_malformed_data_urls() {
        assert!(parse_data_url("image/png;base64,AAAA").is_err());
        assert!(parse_data_url("data:image/png;base64").is_err());
        assert!(parse_data_url("data:text/plain,hello").is_err());
        assert!(parse_data_url("data:image/png;base64,!!!").is_err());
    }

    #[test]
    fn test_loads_png_dimensions() {
        let loader = SourceLoader::default();
        let src = encode_data_url("image/png", &png_bytes(40, 25));

        let decoded = block_on(loader.load(&src)).unwrap();
        assert_eq!(decoded, DecodedImage { width: 40, height: 25 });
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let loader = SourceLoader::default();
        let src = encode_data_url("image/png", b"not an image");

        assert!(matches!(block_on(loader.load(&src)), Err(ImageError::Decode(_))));
    }

    #[test]
    fn test_unsupported_source() {
        let loader = SourceLoader::default();
        assert!(matches!(
            block_on(loader.load("file:///tmp/cat.png")),
            Err(ImageError::UnsupportedSource(_))
        ));
    }
}
