//! Resource graph walker: visits every page of an open document, finds the
//! image XObjects reachable from each page's resource dictionary, and hands
//! them to the transform pipeline. Replacement happens at the shared object
//! slot, so pages referencing the same image all observe the rewrite.

use std::collections::HashSet;
use std::io::Read;

use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::config::TransformConfig;
use crate::error::TransformError;
use crate::transform::{self, EncodedRaster, Outcome};

/// Per-document traversal counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Distinct image resources reached from page resource tables.
    pub examined: usize,
    /// Images replaced by a re-encoded equivalent.
    pub rewritten: usize,
    /// Images left in their original encoded form.
    pub skipped: usize,
}

/// Visit every image resource reachable from the document's pages and replace
/// qualifying ones with re-encoded versions.
///
/// An image shared by several pages is visited once. Decode or encode
/// failures on a single image are logged and leave that resource untouched;
/// they never abort the document.
pub fn rewrite_images(doc: &mut Document, config: &TransformConfig) -> WalkStats {
    let mut stats = WalkStats::default();
    let mut visited: HashSet<ObjectId> = HashSet::new();

    let pages = doc.get_pages();
    for (page_number, &page_id) in pages.iter() {
        for (name, image_id) in page_image_resources(doc, page_id) {
            if !visited.insert(image_id) {
                continue;
            }
            stats.examined += 1;

            match rewrite_one(doc, image_id, config) {
                Ok(true) => {
                    log::debug!("page {}: rewrote image /{}", page_number, name);
                    stats.rewritten += 1;
                }
                Ok(false) => stats.skipped += 1,
                Err(e) => {
                    log::warn!(
                        "page {}: leaving image /{} ({} {}) unchanged: {}",
                        page_number,
                        name,
                        image_id.0,
                        image_id.1,
                        e
                    );
                    stats.skipped += 1;
                }
            }
        }
    }

    stats
}

/// Decode, transform, and replace a single image object.
///
/// Returns `Ok(true)` when the object was replaced, `Ok(false)` on a skip.
fn rewrite_one(
    doc: &mut Document,
    image_id: ObjectId,
    config: &TransformConfig,
) -> Result<bool, TransformError> {
    let stream = match doc.get_object(image_id) {
        Ok(Object::Stream(s)) => s.clone(),
        _ => return Ok(false),
    };

    let width = dict_u32(&stream.dict, b"Width").unwrap_or(0);
    let height = dict_u32(&stream.dict, b"Height").unwrap_or(0);
    // Degenerate sources are skipped before any decoding happens.
    if width <= 1 || height <= 1 {
        return Ok(false);
    }

    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .map(|cs| color_space_name(cs, doc))
        .unwrap_or_else(|| "DeviceRGB".to_string());
    let bits_per_component = dict_u32(&stream.dict, b"BitsPerComponent").unwrap_or(8);

    let raster = decode_image_stream(&stream, width, height, &color_space, bits_per_component)?;

    match transform::apply(&raster, config)? {
        Outcome::Encoded(encoded) => {
            let new_stream = build_image_stream(&encoded);
            doc.objects.insert(image_id, Object::Stream(new_stream));
            Ok(true)
        }
        Outcome::Skip(reason) => {
            log::debug!("skipping image ({} {}): {}", image_id.0, image_id.1, reason);
            Ok(false)
        }
    }
}

/// Collect the image XObject entries of a page's resource dictionary, in
/// resource-table iteration order. Non-image resource kinds (Form XObjects,
/// fonts, color spaces) are skipped.
fn page_image_resources(doc: &Document, page_id: ObjectId) -> Vec<(String, ObjectId)> {
    let page_dict = match doc.get_object(page_id) {
        Ok(Object::Dictionary(d)) => d.clone(),
        _ => return Vec::new(),
    };

    let resources = page_resources(doc, &page_dict);
    let mut images = Vec::new();

    for (name, object_id) in xobject_entries(doc, &resources) {
        if let Ok(Object::Stream(stream)) = doc.get_object(object_id) {
            if dict_name(&stream.dict, b"Subtype").as_deref() == Some("Image") {
                images.push((name, object_id));
            }
        }
    }

    images
}

/// Resources are an inheritable page attribute; a page without its own entry
/// can pick it up from any ancestor page-tree node.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// Page resources, following the `/Parent` chain up the page tree for
/// inherited resource dictionaries.
fn page_resources(doc: &Document, page_dict: &Dictionary) -> Object {
    if let Ok(resources) = page_dict.get(b"Resources") {
        return resources.clone();
    }

    let mut parent = page_dict.get(b"Parent").ok().cloned();
    // Depth cap guards against parent cycles in malformed trees.
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        let parent_dict = match parent {
            Some(Object::Reference(id)) => match doc.get_object(id) {
                Ok(Object::Dictionary(d)) => d,
                _ => return Object::Null,
            },
            _ => return Object::Null,
        };
        if let Ok(resources) = parent_dict.get(b"Resources") {
            return resources.clone();
        }
        parent = parent_dict.get(b"Parent").ok().cloned();
    }

    Object::Null
}

/// XObject entries (name -> object id) from a resources object.
fn xobject_entries(doc: &Document, resources: &Object) -> Vec<(String, ObjectId)> {
    let mut result = Vec::new();

    let res_dict = match resolve(doc, resources) {
        Some(Object::Dictionary(d)) => d,
        _ => return result,
    };

    let xobjects = match res_dict.get(b"XObject") {
        Ok(x) => x,
        Err(_) => return result,
    };

    if let Some(Object::Dictionary(xobj_dict)) = resolve(doc, xobjects) {
        for (name, value) in xobj_dict.iter() {
            if let Object::Reference(object_id) = value {
                result.push((String::from_utf8_lossy(name).to_string(), *object_id));
            }
        }
    }

    result
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        _ => Some(obj),
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key).ok().and_then(|obj| match obj {
        // Negative or oversized declared values are treated as absent.
        Object::Integer(n) => u32::try_from(*n).ok(),
        _ => None,
    })
}

fn pixel_bytes(width: u32, height: u32, channels: usize) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(channels)
}

fn dict_name(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key).ok().and_then(|obj| match obj {
        Object::Name(n) => Some(String::from_utf8_lossy(n).to_string()),
        Object::Array(arr) => arr.first().and_then(|f| match f {
            Object::Name(n) => Some(String::from_utf8_lossy(n).to_string()),
            _ => None,
        }),
        _ => None,
    })
}

/// Color space name from a PDF object, following references.
fn color_space_name(obj: &Object, doc: &Document) -> String {
    match obj {
        Object::Name(name) => String::from_utf8_lossy(name).to_string(),
        Object::Array(arr) => {
            if let Some(Object::Name(name)) = arr.first() {
                String::from_utf8_lossy(name).to_string()
            } else {
                "Unknown".to_string()
            }
        }
        Object::Reference(id) => {
            if let Ok(resolved) = doc.get_object(*id) {
                color_space_name(resolved, doc)
            } else {
                "Unknown".to_string()
            }
        }
        _ => "Unknown".to_string(),
    }
}

/// Decode a PDF image stream into a raster.
fn decode_image_stream(
    stream: &Stream,
    width: u32,
    height: u32,
    color_space: &str,
    bits_per_component: u32,
) -> Result<DynamicImage, TransformError> {
    let content = &stream.content;
    let filter = dict_name(&stream.dict, b"Filter");

    let decoded_data = match filter.as_deref() {
        Some("FlateDecode") => {
            let mut decoder = ZlibDecoder::new(&content[..]);
            let mut decoded = Vec::new();
            decoder
                .read_to_end(&mut decoded)
                .map_err(|e| TransformError::Decode(e.to_string()))?;
            decoded
        }
        Some("DCTDecode") => {
            let img = image::load_from_memory_with_format(content, ImageFormat::Jpeg)
                .map_err(|e| TransformError::Decode(e.to_string()))?;
            return Ok(img);
        }
        Some("JPXDecode") => {
            let img = image::load_from_memory(content)
                .map_err(|e| TransformError::Decode(e.to_string()))?;
            return Ok(img);
        }
        None => content.clone(),
        Some(other) => {
            return Err(TransformError::UnsupportedFilter(other.to_string()));
        }
    };

    if bits_per_component != 8 {
        return Err(TransformError::Decode(format!(
            "unsupported bit depth: {}",
            bits_per_component
        )));
    }

    let dimension_overflow =
        || TransformError::Decode(format!("image dimensions overflow: {}x{}", width, height));

    match color_space {
        "DeviceRGB" | "RGB" | "CalRGB" => {
            let expected = pixel_bytes(width, height, 3).ok_or_else(dimension_overflow)?;
            if decoded_data.len() < expected {
                return Err(TransformError::Decode(format!(
                    "RGB data too short: {} bytes, expected {}",
                    decoded_data.len(),
                    expected
                )));
            }
            let img = RgbImage::from_raw(width, height, decoded_data[..expected].to_vec())
                .ok_or_else(|| TransformError::Decode("bad RGB buffer".to_string()))?;
            Ok(DynamicImage::ImageRgb8(img))
        }
        "DeviceGray" | "Gray" | "CalGray" => {
            let expected = pixel_bytes(width, height, 1).ok_or_else(dimension_overflow)?;
            if decoded_data.len() < expected {
                return Err(TransformError::Decode(format!(
                    "gray data too short: {} bytes, expected {}",
                    decoded_data.len(),
                    expected
                )));
            }
            let img = GrayImage::from_raw(width, height, decoded_data[..expected].to_vec())
                .ok_or_else(|| TransformError::Decode("bad gray buffer".to_string()))?;
            Ok(DynamicImage::ImageLuma8(img))
        }
        "DeviceCMYK" | "CMYK" => {
            let expected = pixel_bytes(width, height, 4).ok_or_else(dimension_overflow)?;
            if decoded_data.len() < expected {
                return Err(TransformError::Decode(format!(
                    "CMYK data too short: {} bytes, expected {}",
                    decoded_data.len(),
                    expected
                )));
            }
            let mut rgb_data = Vec::with_capacity(expected / 4 * 3);
            for chunk in decoded_data[..expected].chunks(4) {
                let c = chunk[0] as f32 / 255.0;
                let m = chunk[1] as f32 / 255.0;
                let y = chunk[2] as f32 / 255.0;
                let k = chunk[3] as f32 / 255.0;
                rgb_data.push(((1.0 - c) * (1.0 - k) * 255.0) as u8);
                rgb_data.push(((1.0 - m) * (1.0 - k) * 255.0) as u8);
                rgb_data.push(((1.0 - y) * (1.0 - k) * 255.0) as u8);
            }
            let img = RgbImage::from_raw(width, height, rgb_data)
                .ok_or_else(|| TransformError::Decode("bad CMYK buffer".to_string()))?;
            Ok(DynamicImage::ImageRgb8(img))
        }
        "ICCBased" => {
            // No profile handling; guess the layout from the data size.
            let pixels = pixel_bytes(width, height, 1).ok_or_else(dimension_overflow)?;
            let rgb_len = pixel_bytes(width, height, 3).ok_or_else(dimension_overflow)?;
            if decoded_data.len() >= rgb_len {
                let img = RgbImage::from_raw(width, height, decoded_data[..rgb_len].to_vec())
                    .ok_or_else(|| TransformError::Decode("bad ICC buffer".to_string()))?;
                Ok(DynamicImage::ImageRgb8(img))
            } else if decoded_data.len() >= pixels {
                let img = GrayImage::from_raw(width, height, decoded_data[..pixels].to_vec())
                    .ok_or_else(|| TransformError::Decode("bad ICC buffer".to_string()))?;
                Ok(DynamicImage::ImageLuma8(img))
            } else {
                Err(TransformError::Decode(
                    "ICCBased data too short for any known layout".to_string(),
                ))
            }
        }
        other => Err(TransformError::UnsupportedColorSpace(other.to_string())),
    }
}

/// Wrap re-encoded JPEG bytes into an image XObject stream.
fn build_image_stream(encoded: &EncodedRaster) -> Stream {
    let color_space: &[u8] = if encoded.grayscale {
        b"DeviceGray"
    } else {
        b"DeviceRGB"
    };

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(encoded.width as i64));
    dict.set("Height", Object::Integer(encoded.height as i64));
    dict.set("ColorSpace", Object::Name(color_space.to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
    dict.set("Length", Object::Integer(encoded.data.len() as i64));

    Stream::new(dict, encoded.data.clone())
}
