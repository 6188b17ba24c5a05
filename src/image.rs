//! Image payload validation and MIME sniffing.
//!
//! Uploaded photos are validated against the size limits the generation
//! backends impose before any bytes go over the wire. The format is sniffed
//! from file-signature bytes rather than trusted from a filename.

/// Maximum accepted image payload (10 MiB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Payloads smaller than this are treated as corrupt rather than images.
pub const MIN_IMAGE_BYTES: usize = 100;

/// MIME types the generation backends accept.
pub const SUPPORTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// Sniff the MIME type from file-signature bytes.
///
/// Recognizes PNG, WebP, and JPEG signatures. Returns `None` for anything
/// else; unrecognized payloads are rejected rather than assumed to be JPEG.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some("image/png");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"\xff\xd8\xff") {
        return Some("image/jpeg");
    }
    None
}

/// Validate an image payload and return its sniffed MIME type.
///
/// # Errors
///
/// Returns an `ImageError` describing the first failed check: empty payload,
/// size above [`MAX_IMAGE_BYTES`], size below [`MIN_IMAGE_BYTES`], or an
/// unrecognized file signature.
pub fn validate_image(bytes: &[u8]) -> Result<&'static str, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge {
            size_mb: bytes.len() as f64 / 1024.0 / 1024.0,
        });
    }
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(ImageError::TooSmall);
    }
    sniff_mime(bytes).ok_or(ImageError::UnsupportedFormat)
}

/// Errors produced by image payload validation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ImageError {
    #[error("image payload is empty")]
    Empty,

    #[error("image exceeds the 10MB size limit ({size_mb:.1}MB)")]
    TooLarge { size_mb: f64 },

    #[error("image file is too small to be a valid photo")]
    TooSmall,

    #[error("unsupported image format (expected JPEG, PNG, or WebP)")]
    UnsupportedFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal payload carrying the given signature, padded past the
    /// corrupt-file threshold.
    fn padded(signature: &[u8]) -> Vec<u8> {
        let mut bytes = signature.to_vec();
        bytes.resize(MIN_IMAGE_BYTES + 20, 0);
        bytes
    }

    #[test]
    fn test_sniff_png() {
        assert_eq!(sniff_mime(b"\x89PNG\r\n\x1a\n....."), Some("image/png"));
    }

    #[test]
    fn test_sniff_jpeg() {
        assert_eq!(sniff_mime(b"\xff\xd8\xff\xe0JFIF"), Some("image/jpeg"));
    }

    #[test]
    fn test_sniff_webp() {
        assert_eq!(sniff_mime(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some("image/webp"));
    }

    #[test]
    fn test_sniff_unknown_is_none() {
        assert_eq!(sniff_mime(b"GIF89a..."), None);
        assert_eq!(sniff_mime(b"plain text"), None);
        assert_eq!(sniff_mime(b""), None);
    }

    #[test]
    fn test_validate_accepts_padded_png() {
        let bytes = padded(b"\x89PNG\r\n\x1a\n");
        assert_eq!(validate_image(&bytes), Ok("image/png"));
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert_eq!(validate_image(&[]), Err(ImageError::Empty));
    }

    #[test]
    fn test_validate_rejects_oversized() {
        let bytes = vec![0xffu8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            validate_image(&bytes),
            Err(ImageError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_tiny_payload() {
        let bytes = b"\xff\xd8\xff tiny".to_vec();
        assert_eq!(validate_image(&bytes), Err(ImageError::TooSmall));
    }

    #[test]
    fn test_validate_rejects_unknown_signature() {
        let bytes = padded(b"GIF89a");
        assert_eq!(validate_image(&bytes), Err(ImageError::UnsupportedFormat));
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let err = validate_image(&vec![0u8; MAX_IMAGE_BYTES + 1]).unwrap_err();
        assert!(err.to_string().contains("10MB"));
        assert_eq!(
            ImageError::UnsupportedFormat.to_string(),
            "unsupported image format (expected JPEG, PNG, or WebP)"
        );
    }
}
