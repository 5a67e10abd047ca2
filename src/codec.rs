//! Base64 / data-URI handling and raster encode/decode.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use serde_json::Value;

use crate::errors::{Result, SegError};

pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Extracts and decodes the base64 payload of a request's `image` field.
///
/// Accepts either a bare base64 string or a data URI. When a comma is present
/// everything up to and including the first comma is discarded. ASCII
/// whitespace inside the payload (line-wrapped base64) is ignored.
pub fn decode_image(input: &Value) -> Result<Vec<u8>> {
    let Value::String(text) = input else {
        return Err(SegError::invalid_input("image must be a base64 string"));
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(SegError::invalid_input("image must not be empty"));
    }

    let payload = text.split_once(',').map_or(text, |(_, payload)| payload);
    let payload: Vec<u8> = payload
        .bytes()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(payload)
        .map_err(|e| SegError::decode("base64 decoding", e))
}

/// Decodes raster bytes to 8-bit RGB.
///
/// Alpha is dropped and grayscale is replicated across the three channels.
pub fn decode_raster(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| SegError::decode("raster decoding", e))?;
    Ok(image.into_rgb8())
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| SegError::encode("png encoding", e))?;
    Ok(buffer.into_inner())
}

pub fn to_data_uri(bytes: &[u8]) -> String {
    let mut uri = String::from(PNG_DATA_URI_PREFIX);
    STANDARD.encode_string(bytes, &mut uri);
    uri
}
