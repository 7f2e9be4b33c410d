#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document, Object, Stream};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use pdf_compress::model::step_index;
use pdf_compress::{Backend, BackendError, BackendFactory, BackendKind, CompressionStep};

pub const MB: u64 = 1024 * 1024;

/// Page content used by `write_sample_pdf`
pub const SAMPLE_CONTENT: &[u8] =
    b"BT /F1 24 Tf 72 720 Td (Hello PDF) Tj ET\nq 400 0 0 300 100 300 cm /Im1 Do Q\n";

/// Gradient with pseudo-random noise: compresses poorly with Flate, well
/// with JPEG.
pub fn noisy_rgb(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x2545_f491;
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let noise = (state & 0x1f) as u8;
            data.push(((x * 255 / width.max(1)) as u8).saturating_add(noise));
            data.push(((y * 255 / height.max(1)) as u8).saturating_add(noise));
            data.push(128u8.wrapping_add(noise));
        }
    }
    data
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// One-page PDF with a line of text and a Flate-compressed RGB image.
/// Returns the file size.
pub fn write_sample_pdf(path: &Path, width: u32, height: u32) -> u64 {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        deflate(&noisy_rgb(width, height)),
    ));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
        "XObject" => dictionary! { "Im1" => image_id },
    });
    let content_id = doc.add_object(Stream::new(dictionary! {}, SAMPLE_CONTENT.to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    doc.save(path).unwrap();
    fs::metadata(path).unwrap().len()
}

/// Create a sparse file of exactly `len` bytes
pub fn sized_file(path: &Path, len: u64) {
    File::create(path).unwrap().set_len(len).unwrap();
}

/// Backend returning a fixed outcome per ladder step: `Some(size)` writes a
/// file of that size, `None` fails the step.
#[derive(Clone)]
pub struct ScriptedBackend {
    pub kind: BackendKind,
    pub sizes: [Option<u64>; 6],
    pub calls: Arc<Mutex<Vec<&'static str>>>,
}

impl ScriptedBackend {
    pub fn new(kind: BackendKind, sizes: [Option<u64>; 6]) -> Self {
        Self {
            kind,
            sizes,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn factory(&self) -> BackendFactory {
        let backend = self.clone();
        Arc::new(move || Box::new(backend.clone()) as Box<dyn Backend>)
    }
}

impl Backend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn recompress(
        &self,
        _input: &Path,
        output: &Path,
        step: &CompressionStep,
    ) -> Result<u64, BackendError> {
        self.calls.lock().unwrap().push(step.name);
        let index = step_index(step.name).unwrap();
        match self.sizes[index] {
            Some(size) => {
                sized_file(output, size);
                Ok(size)
            }
            None => Err(BackendError::Pdf("corrupt document".to_string())),
        }
    }
}

/// Factory that fails the test if the engine ever asks for a backend
pub fn forbidden_factory() -> BackendFactory {
    Arc::new(|| -> Box<dyn Backend> { panic!("backend must not be created") })
}
