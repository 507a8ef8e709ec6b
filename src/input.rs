//! Input resolution: read markup from a `.tex` file or stdin.
//!
//! Exam sheets come out of every editor imaginable, so text is cleaned on
//! the way in: a UTF-8 byte-order mark is dropped and Windows line endings
//! become `\n`. Nothing else is touched; the parser is whitespace-tolerant.

use crate::error::Tex2DocxError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Where the markup comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Read everything from standard input.
    Stdin,
    /// Read a local file.
    File(PathBuf),
}

impl InputSource {
    /// `-` means stdin; anything else is a path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            InputSource::Stdin
        } else {
            InputSource::File(PathBuf::from(arg))
        }
    }

    /// Path used in error messages.
    pub fn display_path(&self) -> PathBuf {
        match self {
            InputSource::Stdin => PathBuf::from("<stdin>"),
            InputSource::File(p) => p.clone(),
        }
    }
}

/// Read and clean the markup from `source`.
pub async fn read_source(source: &InputSource) -> Result<String, Tex2DocxError> {
    match source {
        InputSource::File(path) => read_file(path).await,
        InputSource::Stdin => {
            let mut bytes = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut bytes)
                .await
                .map_err(|e| Tex2DocxError::InputReadFailed {
                    path: source.display_path(),
                    source: e,
                })?;
            decode(bytes, &source.display_path())
        }
    }
}

/// Read and clean a local `.tex` file.
pub async fn read_file(path: &Path) -> Result<String, Tex2DocxError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => Tex2DocxError::InputNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => Tex2DocxError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Tex2DocxError::InputReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    decode(bytes, path)
}

fn decode(bytes: Vec<u8>, path: &Path) -> Result<String, Tex2DocxError> {
    let text = String::from_utf8(bytes).map_err(|e| Tex2DocxError::InputReadFailed {
        path: path.to_path_buf(),
        source: std::io::Error::new(ErrorKind::InvalidData, e),
    })?;
    Ok(clean_text(&text))
}

/// Strip a leading BOM and normalise `\r\n` / lone `\r` to `\n`.
pub fn clean_text(text: &str) -> String {
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_means_stdin() {
        assert_eq!(InputSource::from_arg("-"), InputSource::Stdin);
        assert_eq!(
            InputSource::from_arg("de_thi.tex"),
            InputSource::File(PathBuf::from("de_thi.tex"))
        );
    }

    #[test]
    fn clean_text_strips_bom_and_crlf() {
        assert_eq!(clean_text("\u{FEFF}a\r\nb\rc\n"), "a\nb\nc\n");
        assert_eq!(clean_text("plain"), "plain");
    }

    #[tokio::test]
    async fn missing_file_is_input_not_found() {
        let err = read_file(Path::new("/nonexistent/de_thi.tex")).await.unwrap_err();
        assert!(matches!(err, Tex2DocxError::InputNotFound { .. }));
    }

    #[tokio::test]
    async fn invalid_utf8_is_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.tex");
        std::fs::write(&path, [0x43, 0xE2, 0x75, 0x28]).unwrap();
        let err = read_file(&path).await.unwrap_err();
        assert!(matches!(err, Tex2DocxError::InputReadFailed { .. }));
    }

    #[tokio::test]
    async fn reads_and_cleans_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.tex");
        std::fs::write(&path, "\u{FEFF}\\begin{ex}x\\end{ex}\r\n").unwrap();
        let text = read_file(&path).await.unwrap();
        assert_eq!(text, "\\begin{ex}x\\end{ex}\n");
    }
}
