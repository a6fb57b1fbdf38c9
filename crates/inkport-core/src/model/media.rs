//! Media type detection for asset payloads.

use serde::{Deserialize, Serialize};

/// Fallback MIME type when nothing better is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Media types the whiteboard knows how to embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Png,
    Jpeg,
    Gif,
    WebP,
    Svg,
    Mp4,
    WebM,
}

impl MediaType {
    /// Get MIME type for this media type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Gif => "image/gif",
            MediaType::WebP => "image/webp",
            MediaType::Svg => "image/svg+xml",
            MediaType::Mp4 => "video/mp4",
            MediaType::WebM => "video/webm",
        }
    }

    /// Detect media type from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(MediaType::Png),
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            "gif" => Some(MediaType::Gif),
            "webp" => Some(MediaType::WebP),
            "svg" => Some(MediaType::Svg),
            "mp4" => Some(MediaType::Mp4),
            "webm" => Some(MediaType::WebM),
            _ => None,
        }
    }

    /// Detect media type from a path or URL ending in an extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Detect media type from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(MediaType::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(MediaType::Jpeg);
        }

        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(MediaType::Gif);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(MediaType::WebP);
        }

        // ISO base media: ....ftyp
        if data.len() >= 8 && &data[4..8] == b"ftyp" {
            return Some(MediaType::Mp4);
        }

        // EBML header
        if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return Some(MediaType::WebM);
        }

        let head = &data[..data.len().min(256)];
        let text = String::from_utf8_lossy(head);
        let text = text.trim_start_matches('\u{feff}').trim_start();
        if text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg")) {
            return Some(MediaType::Svg);
        }

        None
    }
}

/// Pick the MIME type for fetched bytes.
///
/// Preference order: the transport's content type, the record's declared type,
/// then sniffing.
pub fn choose_mime_type(content_type: Option<&str>, declared: Option<&str>, data: &[u8]) -> String {
    let usable = |value: Option<&str>| {
        value
            .map(|v| v.split(';').next().unwrap_or(v).trim())
            .filter(|v| !v.is_empty() && *v != OCTET_STREAM)
            .map(str::to_string)
    };

    usable(content_type)
        .or_else(|| usable(declared))
        .or_else(|| MediaType::from_magic_bytes(data).map(|m| m.mime_type().to_string()))
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}
