//! Library-based recompression backend.
//!
//! Loads the document with lopdf, re-encodes every raster image reachable
//! from a page as JPEG at the step's size cap and quality, then compresses
//! the remaining streams and saves. Text, vector content and fonts are never
//! touched. Images that cannot be decoded are skipped.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use super::codec::{self, resolve};
use super::{Backend, BackendKind};
use crate::error::{BackendError, ImageError};
use crate::model::CompressionStep;

/// Guard against cyclic page trees
const MAX_PAGE_TREE_DEPTH: usize = 32;

/// Per-document tally of the image pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageStats {
    pub total: usize,
    pub recompressed: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct ImageBackend;

impl ImageBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for ImageBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Fallback
    }

    fn announce(&self) -> Vec<String> {
        vec![
            "Ghostscript not found - using built-in image recompression (less effective)"
                .to_string(),
            "Install Ghostscript for much better compression:".to_string(),
            "  https://ghostscript.com/releases/gsdnld.html".to_string(),
        ]
    }

    fn recompress(
        &self,
        input: &Path,
        output: &Path,
        step: &CompressionStep,
    ) -> Result<u64, BackendError> {
        let mut doc = Document::load(input)
            .map_err(|e| BackendError::Pdf(format!("Failed to load {}: {}", input.display(), e)))?;

        let stats = recompress_images(&mut doc, step);
        log::debug!(
            "Step '{}': {} images, {} recompressed, {} skipped",
            step.name,
            stats.total,
            stats.recompressed,
            stats.skipped
        );

        let bytes = save_compressed(&mut doc)?;
        fs::write(output, &bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// Compress all remaining streams and serialize the document.
fn save_compressed(doc: &mut Document) -> Result<Vec<u8>, BackendError> {
    doc.compress();

    let mut output = Cursor::new(Vec::new());
    doc.save_to(&mut output)
        .map_err(|e| BackendError::Pdf(format!("Failed to save compressed PDF: {}", e)))?;

    Ok(output.into_inner())
}

/// Re-encode every page image in place
pub fn recompress_images(doc: &mut Document, step: &CompressionStep) -> ImageStats {
    let mut stats = ImageStats::default();

    for id in collect_document_images(doc) {
        stats.total += 1;

        let replacement = match doc.get_object(id) {
            Ok(Object::Stream(stream)) => recompress_stream(doc, stream, step),
            _ => Err(ImageError::Unsupported("not a stream".to_string())),
        };

        match replacement {
            Ok(stream) => {
                doc.objects.insert(id, Object::Stream(stream));
                stats.recompressed += 1;
            }
            Err(e) => {
                log::debug!("Skipping image {:?}: {}", id, e);
                stats.skipped += 1;
            }
        }
    }

    stats
}

/// Decode, downsize and JPEG-encode one image. Fails with `NotSmaller` when
/// the result would not save space.
fn recompress_stream(
    doc: &Document,
    stream: &Stream,
    step: &CompressionStep,
) -> Result<Stream, ImageError> {
    let img = codec::decode_image(doc, stream)?;
    let img = codec::fit_within(img, step.max_dimension);
    let jpeg = codec::encode_jpeg(&img, step.quality)?;

    if jpeg.data.len() >= stream.content.len() {
        return Err(ImageError::NotSmaller);
    }

    let mut dict = stream.dict.clone();
    for key in ["DecodeParms", "Decode", "Length", "DL"] {
        dict.remove(key.as_bytes());
    }
    dict.set("Width", Object::Integer(jpeg.width as i64));
    dict.set("Height", Object::Integer(jpeg.height as i64));
    dict.set("ColorSpace", Object::Name(jpeg.color_space.as_bytes().to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));

    Ok(Stream::new(dict, jpeg.data).with_compression(false))
}

/// All image XObjects reachable from page resources, including those nested
/// in Form XObjects. Shared images are listed once.
pub fn collect_document_images(doc: &Document) -> Vec<ObjectId> {
    let mut images = Vec::new();
    let mut seen = HashSet::new();

    for page_id in doc.get_pages().into_values() {
        if let Some(resources) = page_resources(doc, page_id) {
            for id in xobject_refs(doc, resources) {
                collect_images_recursive(doc, id, &mut images, &mut seen);
            }
        }
    }

    images
}

/// Page resources, inherited from the page tree when the page has none
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return as_dictionary(doc, resources);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }

    None
}

fn as_dictionary<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object) {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Object ids in a resource dictionary's `/XObject` entry
fn xobject_refs(doc: &Document, resources: &Dictionary) -> Vec<ObjectId> {
    resources
        .get(b"XObject")
        .ok()
        .and_then(|x| as_dictionary(doc, x))
        .map(|xobjects| {
            xobjects
                .iter()
                .filter_map(|(_, value)| value.as_reference().ok())
                .collect()
        })
        .unwrap_or_default()
}

fn collect_images_recursive(
    doc: &Document,
    id: ObjectId,
    images: &mut Vec<ObjectId>,
    seen: &mut HashSet<ObjectId>,
) {
    if !seen.insert(id) {
        return;
    }

    let Ok(Object::Stream(stream)) = doc.get_object(id) else {
        return;
    };

    match stream.dict.get(b"Subtype") {
        Ok(Object::Name(subtype)) if subtype.as_slice() == b"Image" => images.push(id),
        Ok(Object::Name(subtype)) if subtype.as_slice() == b"Form" => {
            if let Some(resources) = stream
                .dict
                .get(b"Resources")
                .ok()
                .and_then(|r| as_dictionary(doc, r))
            {
                for child in xobject_refs(doc, resources) {
                    collect_images_recursive(doc, child, images, seen);
                }
            }
        }
        _ => {}
    }
}
