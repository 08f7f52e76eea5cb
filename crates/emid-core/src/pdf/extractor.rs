//! Text and image extraction using lopdf and pdf-extract.

use std::collections::BTreeSet;

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Document, Object, ObjectId, Stream};
use tracing::{debug, trace};

use crate::error::PdfError;

/// A loaded, decrypted PDF.
pub struct PdfDocument {
    document: Document,
    raw_data: Vec<u8>,
}

impl PdfDocument {
    /// Parse a PDF from bytes. Empty-password encryption is removed;
    /// anything stronger is rejected.
    pub fn load(data: &[u8]) -> Result<Self, PdfError> {
        let mut document = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        let raw_data = if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract reads bytes, so hand it the decrypted copy.
            let mut decrypted = Vec::new();
            document
                .save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        let page_count = document.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }
        debug!("Loaded PDF with {} pages", page_count);

        Ok(Self { document, raw_data })
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Full text layer.
    pub fn text(&self) -> Result<String, PdfError> {
        pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    /// Non-blank text layer lines, trimmed, in document order.
    pub fn text_lines(&self) -> Result<Vec<String>, PdfError> {
        Ok(self
            .text()?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    /// Decodable image XObjects, page by page. An image shared between
    /// pages is returned once.
    pub fn images(&self) -> Vec<DynamicImage> {
        let mut seen: BTreeSet<ObjectId> = BTreeSet::new();
        let mut images = Vec::new();

        for (page_num, page_id) in self.document.get_pages() {
            for id in self.page_image_ids(page_id) {
                if !seen.insert(id) {
                    continue;
                }
                let Ok(Object::Stream(stream)) = self.document.get_object(id) else {
                    continue;
                };
                if let Some(image) = self.decode_image(stream) {
                    trace!("Page {}: image {:?} {}x{}", page_num, id, image.width(), image.height());
                    images.push(image);
                }
            }
        }

        debug!("Decoded {} embedded images", images.len());
        images
    }

    /// Object ids of the image XObjects a page references, following
    /// inherited resources.
    fn page_image_ids(&self, page_id: ObjectId) -> Vec<ObjectId> {
        let Some(resources) = self.resources(page_id) else {
            return Vec::new();
        };
        let Ok(xobjects) = resources.get(b"XObject") else {
            return Vec::new();
        };
        let Ok((_, Object::Dictionary(xobjects))) = self.document.dereference(xobjects) else {
            return Vec::new();
        };

        xobjects
            .iter()
            .filter_map(|(_, object)| object.as_reference().ok())
            .collect()
    }

    fn resources(&self, node_id: ObjectId) -> Option<&lopdf::Dictionary> {
        let Ok(Object::Dictionary(node)) = self.document.get_object(node_id) else {
            return None;
        };

        if let Ok(resources) = node.get(b"Resources") {
            if let Ok((_, Object::Dictionary(dict))) = self.document.dereference(resources) {
                return Some(dict);
            }
        }

        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        self.resources(parent)
    }

    fn decode_image(&self, stream: &Stream) -> Option<DynamicImage> {
        let dict = &stream.dict;
        if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
            return None;
        }

        let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
        let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;

        let filter = dict.get(b"Filter").ok().and_then(|filter| match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(filters) => filters.last().and_then(|o| o.as_name().ok()),
            _ => None,
        });

        match filter {
            Some(b"DCTDecode") => {
                return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                    .ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Skipping unsupported image filter {:?}", filter.map(String::from_utf8_lossy));
                return None;
            }
            _ => {}
        }

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8);
        if bits != 8 {
            trace!("Skipping image with {} bits per component", bits);
            return None;
        }

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                Object::Reference(r) => self.document.get_object(*r).ok().and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        raw_to_image(data, width, height, color_space)
    }
}

fn raw_to_image(mut data: Vec<u8>, width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = width as usize * height as usize;

    match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= pixels * 3 => {
            data.truncate(pixels * 3);
            RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8)
        }
        b"DeviceGray" | b"G" if data.len() >= pixels => {
            data.truncate(pixels);
            GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8)
        }
        _ => {
            trace!(
                "Could not decode raw image: {} bytes for {}x{} {}",
                data.len(),
                width,
                height,
                String::from_utf8_lossy(color_space)
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rejects_garbage() {
        assert!(matches!(
            PdfDocument::load(b"not a pdf"),
            Err(PdfError::Parse(_))
        ));
    }

    #[test]
    fn test_raw_rgb() {
        let image = raw_to_image(vec![255, 0, 0, 0, 255, 0], 2, 1, b"DeviceRGB").unwrap();
        assert_eq!((image.width(), image.height()), (2, 1));
        assert_eq!(image.to_rgb8().get_pixel(1, 0).0, [0, 255, 0]);
    }

    #[test]
    fn test_raw_gray_ignores_padding() {
        let image = raw_to_image(vec![10, 20, 30, 40, 99], 2, 2, b"DeviceGray").unwrap();
        assert_eq!(image.to_luma8().get_pixel(1, 1).0, [40]);
    }

    #[test]
    fn test_raw_too_short() {
        assert!(raw_to_image(vec![0; 5], 2, 1, b"DeviceRGB").is_none());
        assert!(raw_to_image(vec![0; 4], 2, 1, b"DeviceCMYK").is_none());
    }
}
