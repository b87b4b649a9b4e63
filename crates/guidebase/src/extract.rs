//! Text extraction for uploaded documents.
//!
//! Uploads are identified by file extension: `.pdf` goes through PDF text
//! extraction, `.html` is decoded as UTF-8 text; anything else is rejected
//! before the pipeline does any work.

use thiserror::Error;

/// Recognized upload types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Html,
}

impl SourceKind {
    /// Determine the source kind from a file name, `None` when the
    /// extension is unsupported.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.ends_with(".pdf") {
            Some(Self::Pdf)
        } else if name.ends_with(".html") {
            Some(Self::Html)
        } else {
            None
        }
    }
}

/// Extraction failure: the upload had a recognized extension but its bytes
/// could not be turned into text.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("HTML is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Extract plain text from upload bytes.
pub fn extract_text(bytes: &[u8], kind: SourceKind) -> Result<String, ExtractError> {
    match kind {
        SourceKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractError::Pdf(e.to_string())),
        SourceKind::Html => Ok(String::from_utf8(bytes.to_vec())?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_supported_extensions() {
        assert_eq!(SourceKind::from_file_name("manual.pdf"), Some(SourceKind::Pdf));
        assert_eq!(SourceKind::from_file_name("guide.html"), Some(SourceKind::Html));
    }

    #[test]
    fn rejects_other_extensions() {
        assert_eq!(SourceKind::from_file_name("notes.txt"), None);
        assert_eq!(SourceKind::from_file_name("archive.zip"), None);
        assert_eq!(SourceKind::from_file_name("no-extension"), None);
    }

    #[test]
    fn html_decodes_as_utf8() {
        let text = extract_text("<p>héllo</p>".as_bytes(), SourceKind::Html).unwrap();
        assert_eq!(text, "<p>héllo</p>");
    }

    #[test]
    fn invalid_utf8_html_is_an_error() {
        let err = extract_text(&[0xff, 0xfe, 0x00], SourceKind::Html).unwrap_err();
        assert!(matches!(err, ExtractError::Utf8(_)));
    }

    #[test]
    fn invalid_pdf_is_an_error() {
        let err = extract_text(b"not a pdf", SourceKind::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }
}
