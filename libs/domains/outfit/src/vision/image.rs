use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use strum::{AsRefStr, Display};

use crate::error::{OutfitError, OutfitResult};

/// Raster formats accepted by the vision endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum ImageFormat {
    #[strum(serialize = "image/png")]
    Png,
    #[strum(serialize = "image/jpeg")]
    Jpeg,
    #[strum(serialize = "image/gif")]
    Gif,
    #[strum(serialize = "image/webp")]
    Webp,
}

impl ImageFormat {
    /// Detect the format from magic bytes
    pub fn sniff(bytes: &[u8]) -> OutfitResult<Self> {
        if bytes.is_empty() {
            return Err(OutfitError::InvalidInput("image is empty".to_string()));
        }
        match bytes {
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Ok(ImageFormat::Png),
            [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Ok(ImageFormat::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => {
                Ok(ImageFormat::Webp)
            }
            _ => Err(OutfitError::InvalidInput(
                "unsupported image format, expected PNG, JPEG, GIF or WEBP".to_string(),
            )),
        }
    }

    pub fn mime_type(&self) -> &str {
        self.as_ref()
    }
}

/// `data:<mime>;base64,<payload>` URL for inline upload
pub fn data_url(bytes: &[u8]) -> OutfitResult<String> {
    let format = ImageFormat::sniff(bytes)?;
    Ok(format!("data:{};base64,{}", format, STANDARD.encode(bytes)))
}
