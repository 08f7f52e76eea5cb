//! PDF input: text layer and embedded scans.

mod extractor;

pub use extractor::PdfDocument;

/// PDF magic bytes.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Whether `data` starts like a PDF file.
pub fn is_pdf(data: &[u8]) -> bool {
    data.starts_with(PDF_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(b"%PDF-1.7\n..."));
        assert!(!is_pdf(b"\x89PNG\r\n"));
        assert!(!is_pdf(b""));
    }
}
