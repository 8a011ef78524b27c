use mime::Mime;

use crate::errors::BackendError;

const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// The meal photo formats we accept.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn mime_type(&self) -> Mime {
        match self {
            ImageFormat::Jpeg => mime::IMAGE_JPEG,
            ImageFormat::Png => mime::IMAGE_PNG,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

/// Identifies an uploaded image by its leading bytes. The declared
/// content type of the part is ignored.
pub fn identify(data: &[u8]) -> Result<ImageFormat, BackendError> {
    if data.starts_with(JPEG_SIGNATURE) {
        Ok(ImageFormat::Jpeg)
    } else if data.starts_with(PNG_SIGNATURE) {
        Ok(ImageFormat::Png)
    } else {
        Err(BackendError::UnsupportedImageFormat)
    }
}
