//! Opaque image handles passed between the session store and collaborators.
//!
//! Browsers hand photos over as data URIs (`data:<mime>;base64,<payload>`),
//! and the generation services accept and return raw base64 or bytes. The
//! [`Image`] type keeps the decoded bytes behind an `Arc` so the session can
//! hold several handles without copying.

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{JudgmentError, Result};

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG image format.
    Png,
    /// JPEG image format.
    Jpeg,
    /// GIF image format.
    Gif,
    /// WebP image format.
    Webp,
}

impl ImageFormat {
    /// Attempts to detect image format from a MIME type.
    ///
    /// Parameters after `;` are ignored, so `image/png; charset=binary` works.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Attempts to detect image format from file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Attempts to detect image format from a file path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Returns the canonical MIME type.
    #[must_use]
    pub const fn mime(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::Gif => write!(f, "gif"),
            Self::Webp => write!(f, "webp"),
        }
    }
}

/// An immutable, cheaply clonable image.
///
/// Equality compares format and bytes, so two handles are equal exactly when
/// they would render the same picture bit for bit.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    format: ImageFormat,
    bytes: Arc<[u8]>,
}

impl Image {
    /// Wraps raw image bytes.
    #[must_use]
    pub fn new(format: ImageFormat, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            format,
            bytes: bytes.into(),
        }
    }

    /// Decodes a `data:<mime>;base64,<payload>` URI.
    ///
    /// # Errors
    ///
    /// Returns `JudgmentError::InvalidImage` if the URI is malformed, the MIME
    /// type is unsupported, the payload is not base64, or it decodes to nothing.
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| JudgmentError::invalid_image("expected a data: URI"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| JudgmentError::invalid_image("data URI has no payload"))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| JudgmentError::invalid_image("data URI must be base64 encoded"))?;
        let format = ImageFormat::from_mime(mime)
            .ok_or_else(|| JudgmentError::invalid_image(format!("unsupported MIME type '{mime}'")))?;
        Self::from_base64(format, payload)
    }

    /// Decodes a bare base64 payload.
    ///
    /// # Errors
    ///
    /// Returns `JudgmentError::InvalidImage` if the payload is not valid base64
    /// or is empty.
    pub fn from_base64(format: ImageFormat, payload: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| JudgmentError::invalid_image(format!("invalid base64 payload: {e}")))?;
        if bytes.is_empty() {
            return Err(JudgmentError::invalid_image("image payload is empty"));
        }
        Ok(Self::new(format, bytes))
    }

    /// Returns the image format.
    #[must_use]
    pub const fn format(&self) -> ImageFormat {
        self.format
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the image holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encodes the bytes as standard base64 without a data URI header.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Encodes the image as a data URI.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.format.mime(), self.to_base64())
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Serialize for Image {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_data_uri())
    }
}

impl<'de> Deserialize<'de> for Image {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let uri = String::deserialize(deserializer)?;
        Self::from_data_uri(&uri).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PNG_URI: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[test]
    fn test_format_from_mime() {
        assert_eq!(ImageFormat::from_mime("image/png"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_mime("image/jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(
            ImageFormat::from_mime("IMAGE/JPEG; charset=binary"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::from_mime("text/plain"), None);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ImageFormat::from_path(Path::new("refs/robot.JPG")),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_path(Path::new("refs/glitch.webp")),
            Some(ImageFormat::Webp)
        );
        assert_eq!(ImageFormat::from_path(Path::new("refs/notes")), None);
    }

    #[test]
    fn test_from_data_uri() {
        let image = Image::from_data_uri(PNG_URI).unwrap();
        assert_eq!(image.format(), ImageFormat::Png);
        assert_eq!(&image.bytes()[1..4], b"PNG");
        assert_eq!(image.to_data_uri(), PNG_URI);
    }

    #[test]
    fn test_from_data_uri_rejects_malformed_input() {
        for uri in [
            "iVBORw0KGgo=",
            "data:image/png;base64",
            "data:image/png,iVBORw0KGgo=",
            "data:text/plain;base64,aGVsbG8=",
            "data:image/png;base64,***",
            "data:image/png;base64,",
        ] {
            let err = Image::from_data_uri(uri).unwrap_err();
            assert!(
                matches!(err, JudgmentError::InvalidImage { .. }),
                "expected InvalidImage for {uri}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_equality_is_bitwise() {
        let a = Image::new(ImageFormat::Png, vec![1, 2, 3]);
        let b = Image::new(ImageFormat::Png, vec![1, 2, 3]);
        let c = Image::new(ImageFormat::Jpeg, vec![1, 2, 3]);
        let d = Image::new(ImageFormat::Png, vec![1, 2, 4]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_debug_hides_bytes() {
        let image = Image::new(ImageFormat::Gif, vec![0u8; 2048]);
        let debug = format!("{image:?}");
        assert!(debug.contains("len: 2048"));
        assert!(!debug.contains("[0, 0"));
    }

    #[test]
    fn test_serde_uses_data_uri() {
        let image = Image::from_data_uri(PNG_URI).unwrap();
        let json = serde_json::to_string(&image).unwrap();
        assert_eq!(json, format!("\"{PNG_URI}\""));

        let restored: Image = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, image);

        let bad: std::result::Result<Image, _> = serde_json::from_str(r#""not an image""#);
        assert!(bad.is_err());
    }
}
