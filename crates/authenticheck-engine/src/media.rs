use std::fs;
use std::path::Path;

use authenticheck_contracts::VerificationError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

/// Transport-safe image payload: base64 bytes plus declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: String,
    pub mime_type: String,
}

impl EncodedImage {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: BASE64.encode(bytes),
            mime_type: mime_type.into(),
        }
    }

    /// `inlineData` request part.
    pub fn to_part(&self) -> Value {
        json!({
            "inlineData": {
                "mimeType": self.mime_type,
                "data": self.data,
            }
        })
    }
}

/// Reads and encodes an image file. `declared_mime` wins over anything
/// inferred from the extension or the file header.
pub fn encode_image_file(
    path: &Path,
    declared_mime: Option<&str>,
) -> Result<EncodedImage, VerificationError> {
    let bytes = fs::read(path).map_err(|err| {
        VerificationError::Encoding(format!("failed reading {}: {err}", path.display()))
    })?;
    if bytes.is_empty() {
        return Err(VerificationError::Encoding(format!(
            "{} is empty",
            path.display()
        )));
    }
    let mime = declared_mime
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| mime_for_path(path).map(str::to_string))
        .or_else(|| sniff_mime(&bytes))
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(EncodedImage::from_bytes(&bytes, mime))
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type().to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{encode_image_file, EncodedImage, BASE64};
    use base64::Engine as _;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn encodes_bytes_losslessly() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("shoe.jpg");
        let payload = vec![0xFF, 0xD8, 0xFF, 0x00, 0x42];
        fs::write(&path, &payload)?;

        let encoded = encode_image_file(&path, None)?;
        assert_eq!(encoded.mime_type, "image/jpeg");
        assert_eq!(BASE64.decode(encoded.data.as_bytes())?, payload);
        Ok(())
    }

    #[test]
    fn declared_mime_overrides_extension() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("upload.bin");
        fs::write(&path, b"raw")?;
        let encoded = encode_image_file(&path, Some("image/webp"))?;
        assert_eq!(encoded.mime_type, "image/webp");
        Ok(())
    }

    #[test]
    fn header_sniffing_fills_missing_extension() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("upload");
        fs::write(&path, PNG_MAGIC)?;
        assert_eq!(encode_image_file(&path, None)?.mime_type, "image/png");
        Ok(())
    }

    #[test]
    fn missing_file_is_an_encoding_error() {
        let err = encode_image_file(std::path::Path::new("/nonexistent/photo.png"), None)
            .unwrap_err();
        assert!(err.is_encoding());
    }

    #[test]
    fn empty_file_is_an_encoding_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("empty.png");
        fs::write(&path, b"")?;
        assert!(encode_image_file(&path, None).unwrap_err().is_encoding());
        Ok(())
    }

    #[test]
    fn inline_part_uses_camel_case_keys() {
        let part = EncodedImage::from_bytes(b"abc", "image/png").to_part();
        assert_eq!(part["inlineData"]["mimeType"], "image/png");
        assert_eq!(part["inlineData"]["data"], "YWJj");
    }
}
