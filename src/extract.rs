//! Text extraction for ingested documents.
//!
//! `.txt` files are decoded as UTF-8 with invalid byte sequences dropped;
//! `.pdf` files go through `pdf-extract`, with page breaks turned into
//! newlines. Anything else is rejected so the caller can abort the add.

use std::path::Path;

#[derive(Debug)]
pub enum ExtractError {
    UnsupportedExtension(String),
    Io(String),
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedExtension(ext) if ext.is_empty() => {
                write!(f, "unsupported file type: no extension")
            }
            ExtractError::UnsupportedExtension(ext) => {
                write!(f, "unsupported file type: .{}", ext)
            }
            ExtractError::Io(e) => write!(f, "could not read file: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Document formats accepted by [`extract_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" => Ok(DocumentKind::Text),
            "pdf" => Ok(DocumentKind::Pdf),
            _ => Err(ExtractError::UnsupportedExtension(ext)),
        }
    }
}

/// Read `path` and return its plain text.
pub fn extract_file(path: &Path) -> Result<String, ExtractError> {
    let kind = DocumentKind::from_path(path)?;
    let bytes =
        std::fs::read(path).map_err(|e| ExtractError::Io(format!("{}: {}", path.display(), e)))?;
    extract_text(&bytes, kind)
}

pub fn extract_text(bytes: &[u8], kind: DocumentKind) -> Result<String, ExtractError> {
    match kind {
        DocumentKind::Text => Ok(decode_utf8_skipping_invalid(bytes)),
        DocumentKind::Pdf => extract_pdf(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(text.replace('\u{c}', "\n"))
}

/// UTF-8 decode that drops invalid sequences instead of substituting U+FFFD.
fn decode_utf8_skipping_invalid(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => bytes = &rest[len..],
                    // Truncated sequence at the end of input.
                    None => return out,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_with_invalid_bytes_is_kept_minus_the_bad_bytes() {
        let bytes = b"Dang \xff\xferecharge\xe0";
        let text = extract_text(bytes, DocumentKind::Text).unwrap();
        assert_eq!(text, "Dang recharge");
    }

    #[test]
    fn devanagari_text_survives() {
        let text = extract_text("भूजल स्तर".as_bytes(), DocumentKind::Text).unwrap();
        assert_eq!(text, "भूजल स्तर");
    }

    #[test]
    fn unsupported_extension_rejected() {
        let err = DocumentKind::from_path(Path::new("report.docx")).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedExtension(ref e) if e == "docx"));
        assert!(DocumentKind::from_path(Path::new("README")).is_err());
        assert_eq!(
            DocumentKind::from_path(Path::new("Notes.TXT")).unwrap(),
            DocumentKind::Text
        );
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", DocumentKind::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = extract_file(Path::new("/nonexistent/dir/notes.txt")).unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }
}
