//! Decoding, resizing and JPEG re-encoding of PDF image XObjects.

use flate2::read::ZlibDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};
use std::io::Read;

use crate::error::ImageError;

/// Reference chains longer than this are treated as broken
const MAX_REFERENCE_DEPTH: usize = 8;

/// Larger images are skipped rather than decoded
const MAX_IMAGE_PIXELS: i64 = 1 << 27;

/// Pixel layout of a raw (non-JPEG) image stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorModel {
    pub fn components(&self) -> usize {
        match self {
            ColorModel::Gray => 1,
            ColorModel::Rgb => 3,
            ColorModel::Cmyk => 4,
        }
    }
}

/// A JPEG-encoded replacement image
#[derive(Debug, Clone)]
pub struct EncodedJpeg {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// PDF color space name for the encoded pixels
    pub color_space: &'static str,
}

/// Follow indirect references to the underlying object
pub fn resolve<'a>(doc: &'a Document, mut object: &'a Object) -> &'a Object {
    for _ in 0..MAX_REFERENCE_DEPTH {
        match object {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => object = target,
                Err(_) => break,
            },
            _ => break,
        }
    }
    object
}

fn name_of(object: &Object) -> Option<&[u8]> {
    match object {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

/// Color space of an image XObject
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageColorSpace {
    Device(ColorModel),
    /// Palette image: each sample indexes `lookup`, which holds
    /// `hival + 1` entries of `base.components()` bytes
    Indexed { base: ColorModel, lookup: Vec<u8> },
}

/// Determine the color space declared by an image dictionary
pub fn color_space(doc: &Document, dict: &Dictionary) -> Result<ImageColorSpace, ImageError> {
    let space = dict
        .get(b"ColorSpace")
        .map_err(|_| ImageError::UnsupportedColorSpace("missing".to_string()))?;

    match resolve(doc, space) {
        Object::Array(items)
            if items.first().and_then(|o| name_of(resolve(doc, o))) == Some(&b"Indexed"[..]) =>
        {
            indexed_color_space(doc, items)
        }
        other => base_color_model(doc, other).map(ImageColorSpace::Device),
    }
}

/// `[/Indexed base hival lookup]`
fn indexed_color_space(doc: &Document, items: &[Object]) -> Result<ImageColorSpace, ImageError> {
    let malformed = || ImageError::UnsupportedColorSpace("malformed Indexed".to_string());

    let base = base_color_model(doc, resolve(doc, items.get(1).ok_or_else(malformed)?))?;
    let hival = items
        .get(2)
        .and_then(|o| resolve(doc, o).as_i64().ok())
        .filter(|h| (0..=255).contains(h))
        .ok_or_else(malformed)? as usize;

    let mut lookup = match items.get(3).map(|o| resolve(doc, o)) {
        Some(Object::String(bytes, _)) => bytes.clone(),
        Some(Object::Stream(stream)) if stream.dict.get(b"Filter").is_ok() => stream
            .decompressed_content()
            .map_err(|e| ImageError::Decode(format!("palette: {}", e)))?,
        Some(Object::Stream(stream)) => stream.content.clone(),
        _ => return Err(malformed()),
    };

    let expected = (hival + 1) * base.components();
    if lookup.len() < expected {
        return Err(ImageError::DataSize {
            got: lookup.len(),
            expected,
        });
    }
    lookup.truncate(expected);

    Ok(ImageColorSpace::Indexed { base, lookup })
}

/// A non-palette color space: a device name or an ICCBased profile
fn base_color_model(doc: &Document, space: &Object) -> Result<ColorModel, ImageError> {
    match space {
        Object::Name(name) => named_color_model(name),
        Object::Array(items) => {
            let family = items
                .first()
                .and_then(|o| name_of(resolve(doc, o)))
                .ok_or_else(|| ImageError::UnsupportedColorSpace("malformed array".to_string()))?;

            if family == b"ICCBased" {
                let components = items
                    .get(1)
                    .and_then(|o| match resolve(doc, o) {
                        Object::Stream(profile) => profile.dict.get(b"N").ok(),
                        _ => None,
                    })
                    .and_then(|n| n.as_i64().ok());
                match components {
                    Some(1) => Ok(ColorModel::Gray),
                    Some(3) => Ok(ColorModel::Rgb),
                    Some(4) => Ok(ColorModel::Cmyk),
                    other => Err(ImageError::UnsupportedColorSpace(format!(
                        "ICCBased with {:?} components",
                        other
                    ))),
                }
            } else {
                named_color_model(family)
            }
        }
        other => Err(ImageError::UnsupportedColorSpace(format!("{:?}", other))),
    }
}

fn named_color_model(name: &[u8]) -> Result<ColorModel, ImageError> {
    match name {
        b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorModel::Gray),
        b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorModel::Rgb),
        b"DeviceCMYK" | b"CMYK" => Ok(ColorModel::Cmyk),
        other => Err(ImageError::UnsupportedColorSpace(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

/// The single filter applied to a stream, if any. Filter chains are not
/// supported.
pub fn stream_filter(dict: &Dictionary) -> Result<Option<Vec<u8>>, ImageError> {
    match dict.get(b"Filter") {
        Err(_) => Ok(None),
        Ok(Object::Name(name)) => Ok(Some(name.clone())),
        Ok(Object::Array(filters)) => match filters.as_slice() {
            [] => Ok(None),
            [Object::Name(name)] => Ok(Some(name.clone())),
            _ => Err(ImageError::UnsupportedFilter("filter chain".to_string())),
        },
        Ok(other) => Err(ImageError::UnsupportedFilter(format!("{:?}", other))),
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).and_then(Object::as_i64).ok()
}

/// Validated image dimensions. Rejects empty images and anything whose
/// pixel count exceeds `MAX_IMAGE_PIXELS`.
fn image_dimensions(dict: &Dictionary) -> Result<(u32, u32), ImageError> {
    let width = dimension(dict, b"Width").unwrap_or(0);
    let height = dimension(dict, b"Height").unwrap_or(0);
    let too_large = width
        .checked_mul(height)
        .map_or(true, |pixels| pixels > MAX_IMAGE_PIXELS);
    if width <= 0 || height <= 0 || too_large {
        return Err(ImageError::Dimensions { width, height });
    }
    Ok((width as u32, height as u32))
}

/// Decode an image XObject into pixels that can be JPEG-encoded
pub fn decode_image(doc: &Document, stream: &Stream) -> Result<DynamicImage, ImageError> {
    let dict = &stream.dict;

    if matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true))) {
        return Err(ImageError::Unsupported("stencil mask".to_string()));
    }
    if dict.get(b"Decode").is_ok() {
        return Err(ImageError::Unsupported("custom Decode array".to_string()));
    }

    let (width, height) = image_dimensions(dict)?;

    let raw = match stream_filter(dict)?.as_deref() {
        Some(b"DCTDecode") => {
            let img = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .map_err(|e| ImageError::Decode(e.to_string()))?;
            return Ok(prepare_for_jpeg(img));
        }
        Some(b"FlateDecode") => {
            if has_predictor(doc, dict) {
                return Err(ImageError::UnsupportedFilter(
                    "FlateDecode with predictor".to_string(),
                ));
            }
            inflate(&stream.content)?
        }
        None => stream.content.clone(),
        Some(other) => {
            return Err(ImageError::UnsupportedFilter(
                String::from_utf8_lossy(other).into_owned(),
            ))
        }
    };

    let bits = match dimension(dict, b"BitsPerComponent").unwrap_or(8) {
        bits @ (1 | 2 | 4 | 8) => bits as u8,
        other => return Err(ImageError::UnsupportedBitDepth(other)),
    };

    match color_space(doc, dict)? {
        ImageColorSpace::Device(model) => {
            let samples = unpack_samples(raw, width, height, model.components(), bits, true)?;
            raw_to_image(samples, width, height, model)
        }
        ImageColorSpace::Indexed { base, lookup } => {
            let indices = unpack_samples(raw, width, height, 1, bits, false)?;
            let pixels = expand_palette(&indices, base, &lookup);
            raw_to_image(pixels, width, height, base)
        }
    }
}

fn has_predictor(doc: &Document, dict: &Dictionary) -> bool {
    let Ok(params) = dict.get(b"DecodeParms") else {
        return false;
    };
    let params = match resolve(doc, params) {
        Object::Array(items) => items.first().map(|o| resolve(doc, o)),
        other => Some(other),
    };
    match params {
        Some(Object::Dictionary(d)) => dimension(d, b"Predictor").unwrap_or(1) > 1,
        _ => false,
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, ImageError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| ImageError::Decode(e.to_string()))?;
    Ok(decoded)
}

/// Expand packed 1/2/4-bit samples to one byte each. Rows start on a byte
/// boundary. With `scale`, values are stretched to 0..=255; otherwise they
/// are kept as-is (palette indices). 8-bit data is returned unchanged.
pub fn unpack_samples(
    raw: Vec<u8>,
    width: u32,
    height: u32,
    components: usize,
    bits: u8,
    scale: bool,
) -> Result<Vec<u8>, ImageError> {
    if bits == 8 {
        return Ok(raw);
    }

    let bits = bits as usize;
    let row_samples = width as usize * components;
    let row_bytes = (row_samples * bits + 7) / 8;
    let expected = row_bytes * height as usize;
    if raw.len() < expected {
        return Err(ImageError::DataSize {
            got: raw.len(),
            expected,
        });
    }

    let max = (1u16 << bits) - 1;
    let mut samples = Vec::with_capacity(row_samples * height as usize);
    for row in raw.chunks_exact(row_bytes).take(height as usize) {
        for i in 0..row_samples {
            let offset = i * bits;
            let shift = 8 - bits - offset % 8;
            let value = (row[offset / 8] >> shift) as u16 & max;
            let value = if scale { value * 255 / max } else { value };
            samples.push(value as u8);
        }
    }
    Ok(samples)
}

/// Replace palette indices with their base color entries. Out-of-range
/// indices clamp to the last entry.
fn expand_palette(indices: &[u8], base: ColorModel, lookup: &[u8]) -> Vec<u8> {
    let n = base.components();
    let last = lookup.len() / n - 1;
    let mut pixels = Vec::with_capacity(indices.len() * n);
    for &index in indices {
        let start = (index as usize).min(last) * n;
        pixels.extend_from_slice(&lookup[start..start + n]);
    }
    pixels
}

/// Build an image from raw 8-bit samples
pub fn raw_to_image(
    mut raw: Vec<u8>,
    width: u32,
    height: u32,
    model: ColorModel,
) -> Result<DynamicImage, ImageError> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(model.components()))
        .ok_or(ImageError::Dimensions {
            width: width as i64,
            height: height as i64,
        })?;
    if raw.len() < expected {
        return Err(ImageError::DataSize {
            got: raw.len(),
            expected,
        });
    }
    raw.truncate(expected);

    let size_error = || ImageError::DataSize {
        got: expected,
        expected,
    };

    match model {
        ColorModel::Gray => GrayImage::from_raw(width, height, raw)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(size_error),
        ColorModel::Rgb => RgbImage::from_raw(width, height, raw)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(size_error),
        ColorModel::Cmyk => {
            let rgb: Vec<u8> = raw.chunks_exact(4).flat_map(cmyk_to_rgb).collect();
            RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(size_error)
        }
    }
}

fn cmyk_to_rgb(px: &[u8]) -> [u8; 3] {
    let k = 1.0 - px[3] as f32 / 255.0;
    let channel = |v: u8| ((1.0 - v as f32 / 255.0) * k * 255.0).round() as u8;
    [channel(px[0]), channel(px[1]), channel(px[2])]
}

/// Convert to a pixel format JPEG can carry. Transparency is composited onto
/// white.
pub fn prepare_for_jpeg(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
        DynamicImage::ImageLumaA8(la) => {
            let (w, h) = la.dimensions();
            DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| {
                let p = la.get_pixel(x, y);
                Luma([over_white(p[0], p[1])])
            }))
        }
        DynamicImage::ImageRgba8(rgba) => {
            let (w, h) = rgba.dimensions();
            DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
                let p = rgba.get_pixel(x, y);
                Rgb([
                    over_white(p[0], p[3]),
                    over_white(p[1], p[3]),
                    over_white(p[2], p[3]),
                ])
            }))
        }
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

fn over_white(value: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((value as u32 * a + 255 * (255 - a) + 127) / 255) as u8
}

/// Shrink the image so neither side exceeds `max_dimension`, keeping the
/// aspect ratio. Smaller images are returned unchanged.
pub fn fit_within(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let max_dimension = max_dimension.max(1);
    let (width, height) = (img.width(), img.height());
    if width <= max_dimension && height <= max_dimension {
        return img;
    }

    let scale = f64::min(
        max_dimension as f64 / width as f64,
        max_dimension as f64 / height as f64,
    );
    let new_width = ((width as f64 * scale).round() as u32).clamp(1, max_dimension);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, max_dimension);
    img.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

/// Encode as baseline JPEG at the given quality
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<EncodedJpeg, ImageError> {
    let mut data = Vec::new();
    let (width, height, color_space) = {
        let mut encoder = JpegEncoder::new_with_quality(&mut data, quality.clamp(1, 100));
        match img {
            DynamicImage::ImageLuma8(gray) => {
                encoder
                    .encode(gray.as_raw(), gray.width(), gray.height(), ColorType::L8)
                    .map_err(|e| ImageError::Encode(e.to_string()))?;
                (gray.width(), gray.height(), "DeviceGray")
            }
            other => {
                let rgb = other.to_rgb8();
                encoder
                    .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
                    .map_err(|e| ImageError::Encode(e.to_string()))?;
                (rgb.width(), rgb.height(), "DeviceRGB")
            }
        }
    };

    Ok(EncodedJpeg {
        data,
        width,
        height,
        color_space,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, StringFormat};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn test_fit_within_preserves_aspect() {
        let img = fit_within(gradient(400, 200), 100);
        assert_eq!((img.width(), img.height()), (100, 50));
    }

    #[test]
    fn test_fit_within_leaves_small_images() {
        let img = fit_within(gradient(80, 60), 100);
        assert_eq!((img.width(), img.height()), (80, 60));
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0]), [255, 255, 255]);
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 255]), [0, 0, 0]);
        assert_eq!(cmyk_to_rgb(&[255, 0, 0, 0]), [0, 255, 255]);
    }

    #[test]
    fn test_raw_to_image_rejects_short_data() {
        let err = raw_to_image(vec![0; 10], 4, 4, ColorModel::Rgb).unwrap_err();
        assert!(matches!(err, ImageError::DataSize { got: 10, expected: 48 }));
    }

    #[test]
    fn test_rgba_flattened_onto_white() {
        let rgba = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 0]));
        let flat = prepare_for_jpeg(DynamicImage::ImageRgba8(rgba));
        match flat {
            DynamicImage::ImageRgb8(rgb) => assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]),
            other => panic!("unexpected pixel format: {:?}", other.color()),
        }
    }

    #[test]
    fn test_encode_gray_keeps_gray() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([128])));
        let jpeg = encode_jpeg(&gray, 50).unwrap();
        assert_eq!(jpeg.color_space, "DeviceGray");
        assert_eq!((jpeg.width, jpeg.height), (16, 16));
        assert!(jpeg.data.starts_with(&[0xFF, 0xD8]));
    }

    #[test]
    fn test_color_space_names() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! { "ColorSpace" => "DeviceCMYK" };
        assert_eq!(
            color_space(&doc, &dict).unwrap(),
            ImageColorSpace::Device(ColorModel::Cmyk)
        );

        let separation = dictionary! {
            "ColorSpace" => vec![Object::Name(b"Separation".to_vec()), "Spot".into()],
        };
        assert!(matches!(
            color_space(&doc, &separation),
            Err(ImageError::UnsupportedColorSpace(_))
        ));
    }

    #[test]
    fn test_color_space_icc_based() {
        let mut doc = Document::with_version("1.5");
        let profile = doc.add_object(Stream::new(dictionary! { "N" => 1 }, vec![]));
        let dict = dictionary! {
            "ColorSpace" => vec![Object::Name(b"ICCBased".to_vec()), Object::Reference(profile)],
        };
        assert_eq!(
            color_space(&doc, &dict).unwrap(),
            ImageColorSpace::Device(ColorModel::Gray)
        );
    }

    fn indexed_rgb(hival: i64, lookup: Vec<u8>) -> Object {
        Object::Array(vec![
            Object::Name(b"Indexed".to_vec()),
            "DeviceRGB".into(),
            Object::Integer(hival),
            Object::String(lookup, StringFormat::Hexadecimal),
        ])
    }

    #[test]
    fn test_indexed_short_lookup_rejected() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! { "ColorSpace" => indexed_rgb(3, vec![0; 6]) };
        assert!(matches!(
            color_space(&doc, &dict),
            Err(ImageError::DataSize { got: 6, expected: 12 })
        ));
    }

    #[test]
    fn test_decode_indexed_palette() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Width" => 2,
                "Height" => 1,
                "BitsPerComponent" => 8,
                "ColorSpace" => indexed_rgb(1, vec![255, 0, 0, 0, 0, 255]),
            },
            vec![0, 1],
        );
        let img = decode_image(&doc, &stream).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 0, 255]);
    }

    #[test]
    fn test_decode_four_bit_indexed_with_palette_stream() {
        let mut doc = Document::with_version("1.5");
        let palette = doc.add_object(Stream::new(dictionary! {}, vec![0, 128, 255]));
        let stream = Stream::new(
            dictionary! {
                "Width" => 3,
                "Height" => 1,
                "BitsPerComponent" => 4,
                "ColorSpace" => vec![
                    Object::Name(b"Indexed".to_vec()),
                    "DeviceGray".into(),
                    Object::Integer(2),
                    Object::Reference(palette),
                ],
            },
            vec![0x01, 0x20],
        );
        match decode_image(&doc, &stream).unwrap() {
            DynamicImage::ImageLuma8(gray) => assert_eq!(gray.as_raw(), &vec![0, 128, 255]),
            other => panic!("unexpected pixel format: {:?}", other.color()),
        }
    }

    #[test]
    fn test_decode_one_bit_gray() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Width" => 10,
                "Height" => 2,
                "BitsPerComponent" => 1,
                "ColorSpace" => "DeviceGray",
            },
            vec![0b1010_1010, 0b1100_0000, 0xFF, 0xC0],
        );
        let gray = decode_image(&doc, &stream).unwrap().to_luma8();
        let row0: Vec<u8> = (0..10).map(|x| gray.get_pixel(x, 0).0[0]).collect();
        assert_eq!(row0, [255, 0, 255, 0, 255, 0, 255, 0, 255, 255]);
        assert!((0..10).all(|x| gray.get_pixel(x, 1).0[0] == 255));
    }

    #[test]
    fn test_unpack_two_bit_rgb_scales_to_full_range() {
        let samples = unpack_samples(vec![0b0001_1011, 0b0000_0000], 1, 1, 3, 2, true).unwrap();
        assert_eq!(samples, [0, 85, 170]);
    }

    #[test]
    fn test_sixteen_bit_unsupported() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Width" => 1,
                "Height" => 1,
                "BitsPerComponent" => 16,
                "ColorSpace" => "DeviceGray",
            },
            vec![0, 0],
        );
        assert!(matches!(
            decode_image(&doc, &stream),
            Err(ImageError::UnsupportedBitDepth(16))
        ));
    }

    #[test]
    fn test_huge_dimensions_are_an_error() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Width" => u32::MAX as i64,
                "Height" => u32::MAX as i64,
                "BitsPerComponent" => 8,
                "ColorSpace" => "DeviceRGB",
            },
            vec![0; 64],
        );
        assert!(matches!(
            decode_image(&doc, &stream),
            Err(ImageError::Dimensions { .. })
        ));
        assert!(matches!(
            raw_to_image(vec![0; 64], u32::MAX, u32::MAX, ColorModel::Rgb),
            Err(ImageError::Dimensions { .. })
        ));
    }

    #[test]
    fn test_filter_chain_rejected() {
        let dict = dictionary! {
            "Filter" => vec![Object::Name(b"ASCII85Decode".to_vec()), Object::Name(b"FlateDecode".to_vec())],
        };
        assert!(stream_filter(&dict).is_err());
        assert_eq!(stream_filter(&dictionary! {}).unwrap(), None);
    }
}
