//! Input validation: make sure the PDF path points at a readable PDF
//! before any engine is touched.
//!
//! pdfium reports a missing file and a non-PDF file with the same opaque
//! error, so we check existence, read permission and the `%PDF` magic bytes
//! up front and return a precise [`Pdf2JsonError`] instead.

use crate::error::Pdf2JsonError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate `path` and return it as an owned path.
pub fn validate_pdf(path: &Path) -> Result<PathBuf, Pdf2JsonError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(Pdf2JsonError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(Pdf2JsonError::CorruptPdf {
            path,
            detail: "path is a directory".into(),
        });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic != b"%PDF" => {
                    return Err(Pdf2JsonError::NotAPdf { path, magic });
                }
                Ok(()) => {}
                Err(e) => {
                    return Err(Pdf2JsonError::CorruptPdf {
                        path,
                        detail: format!("cannot read header: {e}"),
                    });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2JsonError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2JsonError::FileNotFound { path });
        }
    }

    debug!("Validated local PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_not_found() {
        let err = validate_pdf(Path::new("/definitely/not/a/real/file.pdf")).unwrap_err();
        assert!(matches!(err, Pdf2JsonError::FileNotFound { .. }));
        assert!(err.is_document_read_error());
    }

    #[test]
    fn wrong_magic_is_not_a_pdf() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"PK\x03\x04 zip archive").unwrap();
        let err = validate_pdf(tmp.path()).unwrap_err();
        assert!(matches!(err, Pdf2JsonError::NotAPdf { magic, .. } if &magic == b"PK\x03\x04"));
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%P").unwrap();
        let err = validate_pdf(tmp.path()).unwrap_err();
        assert!(matches!(err, Pdf2JsonError::CorruptPdf { .. }));
    }

    #[test]
    fn pdf_header_is_accepted() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n").unwrap();
        assert_eq!(validate_pdf(tmp.path()).unwrap(), tmp.path());
    }
}
