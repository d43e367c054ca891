//! Intrinsic image properties, decoded independently of the PDF container.
//!
//! Only headers are decoded for JPEG streams; raw sample streams are inflated
//! and checked against the declared geometry. Nothing is re-encoded.

use super::backend::EmbeddedImage;
use flate2::read::ZlibDecoder;
use image::{ColorType, ImageDecoder, ImageFormat, ImageReader};
use std::io::{Cursor, Read};

/// Native encoding of an embedded image stream, from its filter chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEncoding {
    Jpeg,
    Jpeg2000,
    Jbig2,
    Ccitt,
    Flate,
    /// No filter: uncompressed samples
    Raw,
    /// Unrecognized filter or a filter chain
    Other(String),
}

impl NativeEncoding {
    pub fn from_filters(filters: &[String]) -> Self {
        match filters {
            [] => NativeEncoding::Raw,
            [single] => match single.as_str() {
                "DCTDecode" | "DCT" => NativeEncoding::Jpeg,
                "JPXDecode" => NativeEncoding::Jpeg2000,
                "JBIG2Decode" => NativeEncoding::Jbig2,
                "CCITTFaxDecode" | "CCF" => NativeEncoding::Ccitt,
                "FlateDecode" | "Fl" => NativeEncoding::Flate,
                other => NativeEncoding::Other(other.to_string()),
            },
            chain => NativeEncoding::Other(chain.join("+")),
        }
    }

    /// File extension used for the stored bytes
    pub fn extension(&self) -> &str {
        match self {
            NativeEncoding::Jpeg => "jpeg",
            NativeEncoding::Jpeg2000 => "jpx",
            NativeEncoding::Jbig2 => "jb2",
            NativeEncoding::Ccitt => "ccitt",
            NativeEncoding::Flate => "flate",
            NativeEncoding::Raw => "raw",
            NativeEncoding::Other(_) => "bin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrinsicProperties {
    pub width: u32,
    pub height: u32,
    pub mode: String,
    pub size_bytes: usize,
    /// Horizontal resolution in DPI, 0 when undeclared
    pub resolution: u32,
}

/// Decode intrinsic properties of `image`; `Err` carries the reason
pub fn inspect(image: &EmbeddedImage, encoding: &NativeEncoding) -> Result<IntrinsicProperties, String> {
    match encoding {
        NativeEncoding::Jpeg => inspect_jpeg(&image.data),
        NativeEncoding::Flate => {
            let expected = expected_sample_len(image)?;
            let inflated = inflate_bounded(&image.data, expected).map_err(|e| format!("inflate failed: {e}"))?;
            check_samples(image, expected, inflated)
        }
        NativeEncoding::Raw => check_samples(image, expected_sample_len(image)?, image.data.len()),
        other => Err(format!("no intrinsic decoder for {} streams", other.extension())),
    }
}

fn inspect_jpeg(data: &[u8]) -> Result<IntrinsicProperties, String> {
    let decoder = ImageReader::with_format(Cursor::new(data), ImageFormat::Jpeg)
        .into_decoder()
        .map_err(|e| format!("jpeg header: {e}"))?;
    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err("jpeg declares zero dimensions".to_string());
    }

    Ok(IntrinsicProperties {
        width,
        height,
        mode: color_type_mode(decoder.color_type()),
        size_bytes: data.len(),
        resolution: jfif_density(data),
    })
}

/// Bytes needed for the declared geometry, rows padded to whole bytes
fn expected_sample_len(image: &EmbeddedImage) -> Result<usize, String> {
    let (width, height) = (image.declared_width, image.declared_height);
    if width == 0 || height == 0 {
        return Err("declared dimensions are zero".to_string());
    }

    let bits = image.bits_per_component.unwrap_or(8).max(1) as usize;
    let components = image.components().unwrap_or(1) as usize;
    (width as usize)
        .checked_mul(components)
        .and_then(|row_bits| row_bits.checked_mul(bits))
        .and_then(|row_bits| row_bits.div_ceil(8).checked_mul(height as usize))
        .ok_or_else(|| format!("declared geometry overflows: {width}x{height}"))
}

/// Inflate at most `limit + 1` bytes; only "at least `limit`" matters
fn inflate_bounded(data: &[u8], limit: usize) -> std::io::Result<usize> {
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut samples = Vec::new();
    ZlibDecoder::new(data).take(cap).read_to_end(&mut samples)
}

/// Validate a sample buffer length against the declared geometry
fn check_samples(image: &EmbeddedImage, expected: usize, sample_len: usize) -> Result<IntrinsicProperties, String> {
    let (width, height) = (image.declared_width, image.declared_height);
    if sample_len < expected {
        return Err(format!(
            "sample buffer has {sample_len} bytes, {width}x{height} needs {expected}"
        ));
    }

    let bits = image.bits_per_component.unwrap_or(8).max(1) as usize;
    let components = image.components().unwrap_or(1) as usize;
    Ok(IntrinsicProperties {
        width,
        height,
        mode: sample_mode(image.color_space.as_deref(), components, bits),
        size_bytes: image.data.len(),
        resolution: 0,
    })
}

fn color_type_mode(color: ColorType) -> String {
    match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "I;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        ColorType::Rgb32F => "RGB;32F",
        ColorType::Rgba32F => "RGBA;32F",
        other => return format!("{other:?}"),
    }
    .to_string()
}

fn sample_mode(color_space: Option<&str>, components: usize, bits: usize) -> String {
    match (color_space, components, bits) {
        (Some("Indexed"), _, _) => "P",
        (_, 1, 1) => "1",
        (_, 1, 16) => "I;16",
        (_, 1, _) => "L",
        (Some("Lab"), 3, _) => "LAB",
        (_, 3, _) => "RGB",
        (_, 4, _) => "CMYK",
        _ => return format!("{components}x{bits}"),
    }
    .to_string()
}

/// X density from a JFIF APP0 header, converted to DPI
fn jfif_density(data: &[u8]) -> u32 {
    // SOI, APP0, length(2), "JFIF\0", version(2), units(1), Xdensity(2)
    if data.len() < 16 || data[0..4] != [0xFF, 0xD8, 0xFF, 0xE0] || &data[6..11] != b"JFIF\0" {
        return 0;
    }
    let density = u32::from(u16::from_be_bytes([data[14], data[15]]));
    match data[13] {
        1 => density,
        2 => (f64::from(density) * 2.54).round() as u32,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use image::{DynamicImage, RgbImage};
    use std::io::Write;

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    fn embedded(data: Vec<u8>, filters: &[&str], color_space: &str, width: u32, height: u32) -> EmbeddedImage {
        EmbeddedImage {
            object_ref: (7, 0),
            declared_width: width,
            declared_height: height,
            color_space: Some(color_space.to_string()),
            declared_components: None,
            bits_per_component: Some(8),
            filters: filters.iter().map(|f| f.to_string()).collect(),
            data,
        }
    }

    #[test]
    fn test_encoding_from_filters() {
        assert_eq!(NativeEncoding::from_filters(&[]), NativeEncoding::Raw);
        assert_eq!(NativeEncoding::from_filters(&["DCTDecode".to_string()]), NativeEncoding::Jpeg);
        assert_eq!(NativeEncoding::from_filters(&["JPXDecode".to_string()]).extension(), "jpx");
        let chain = NativeEncoding::from_filters(&["FlateDecode".to_string(), "DCTDecode".to_string()]);
        assert_eq!(chain, NativeEncoding::Other("FlateDecode+DCTDecode".to_string()));
    }

    #[test]
    fn test_inspect_jpeg() {
        let data = jpeg_bytes(32, 20);
        let image = embedded(data.clone(), &["DCTDecode"], "DeviceRGB", 32, 20);

        let props = inspect(&image, &NativeEncoding::Jpeg).unwrap();
        assert_eq!((props.width, props.height), (32, 20));
        assert_eq!(props.mode, "RGB");
        assert_eq!(props.size_bytes, data.len());
    }

    #[test]
    fn test_inspect_corrupt_jpeg_fails() {
        let image = embedded(vec![0xFF, 0xD8, 0x00, 0x01], &["DCTDecode"], "DeviceRGB", 4, 4);
        assert!(inspect(&image, &NativeEncoding::Jpeg).is_err());
    }

    #[test]
    fn test_inspect_flate_gray_samples() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[128u8; 6 * 4]).unwrap();
        let data = encoder.finish().unwrap();
        let image = embedded(data, &["FlateDecode"], "DeviceGray", 6, 4);

        let props = inspect(&image, &NativeEncoding::Flate).unwrap();
        assert_eq!((props.width, props.height), (6, 4));
        assert_eq!(props.mode, "L");
        assert_eq!(props.resolution, 0);
    }

    #[test]
    fn test_inspect_short_raw_buffer_fails() {
        let image = embedded(vec![0u8; 10], &[], "DeviceRGB", 4, 4);
        let err = inspect(&image, &NativeEncoding::Raw).unwrap_err();
        assert!(err.contains("needs 48"));
    }

    #[test]
    fn test_overflowing_geometry_fails() {
        let image = embedded(vec![0u8; 16], &[], "DeviceRGB", 4_000_000_000, 4_000_000_000);
        let err = inspect(&image, &NativeEncoding::Raw).unwrap_err();
        assert!(err.contains("overflows"), "{err}");

        let flate = embedded(vec![0x78, 0x9C], &["FlateDecode"], "DeviceRGB", 4_000_000_000, 4_000_000_000);
        assert!(inspect(&flate, &NativeEncoding::Flate).unwrap_err().contains("overflows"));
    }

    #[test]
    fn test_inflate_stops_past_declared_size() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&vec![0u8; 1 << 20]).unwrap();
        let data = encoder.finish().unwrap();

        assert_eq!(inflate_bounded(&data, 24).unwrap(), 25);

        let image = embedded(data, &["FlateDecode"], "DeviceGray", 6, 4);
        let props = inspect(&image, &NativeEncoding::Flate).unwrap();
        assert_eq!((props.width, props.height), (6, 4));
    }

    #[test]
    fn test_unsupported_encoding_fails() {
        let image = embedded(vec![1, 2, 3], &["JBIG2Decode"], "DeviceGray", 4, 4);
        assert!(inspect(&image, &NativeEncoding::Jbig2).is_err());
    }

    #[test]
    fn test_jfif_density() {
        let mut header = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        header.extend_from_slice(b"JFIF\0");
        header.extend_from_slice(&[0x01, 0x01, 0x01, 0x01, 0x2C, 0x01, 0x2C]);
        assert_eq!(jfif_density(&header), 300);

        header[13] = 2;
        header[14..16].copy_from_slice(&118u16.to_be_bytes());
        assert_eq!(jfif_density(&header), 300);

        assert_eq!(jfif_density(b"not a jpeg at all"), 0);
    }

    #[test]
    fn test_sample_modes() {
        assert_eq!(sample_mode(Some("DeviceGray"), 1, 1), "1");
        assert_eq!(sample_mode(Some("DeviceCMYK"), 4, 8), "CMYK");
        assert_eq!(sample_mode(Some("Indexed"), 1, 8), "P");
        assert_eq!(sample_mode(Some("ICCBased"), 3, 8), "RGB");
    }
}
