//! Gzip compression of upload payloads.
//!
//! [`PayloadCompressor`] checks the file name before touching the
//! filesystem, then reads and gzip-encodes the content on the blocking
//! thread pool so the async executor stays responsive.

use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use ingest_core::config::DEFAULT_EXTENSION;
use ingest_core::UploadError;

/// Suffix appended to the original file name.
pub const COMPRESSED_SUFFIX: &str = ".gz";

/// A gzip-compressed file ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedPayload {
    /// Original name plus [`COMPRESSED_SUFFIX`].
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Size of the uncompressed content in bytes.
    pub original_len: usize,
}

/// Validates and compresses user-supplied files.
#[derive(Debug, Clone)]
pub struct PayloadCompressor {
    accepted_extension: String,
}

impl Default for PayloadCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION)
    }
}

impl PayloadCompressor {
    /// `accepted_extension` is matched case-insensitively, with or without
    /// a leading dot.
    pub fn new(accepted_extension: impl Into<String>) -> Self {
        let ext: String = accepted_extension.into();
        Self {
            accepted_extension: ext.trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    pub fn accepted_extension(&self) -> &str {
        &self.accepted_extension
    }

    /// Reject names that do not end in `.<accepted_extension>`.
    pub fn validate_name(&self, name: &str) -> Result<(), UploadError> {
        let suffix = format!(".{}", self.accepted_extension);
        let lower = name.to_ascii_lowercase();
        if lower.len() > suffix.len() && lower.ends_with(&suffix) {
            Ok(())
        } else {
            Err(UploadError::Validation(format!(
                "{name} is not a {suffix} file"
            )))
        }
    }

    /// Validate, read and compress the file at `path`.
    pub async fn compress_file(&self, path: &Path) -> Result<CompressedPayload, UploadError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                UploadError::Validation(format!("{} has no usable file name", path.display()))
            })?
            .to_string();
        self.validate_name(&name)?;

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            UploadError::Compression(format!("Failed to read {}: {e}", path.display()))
        })?;

        self.compress_bytes(name, bytes).await
    }

    /// Validate `name` and compress in-memory content.
    pub async fn compress_bytes(
        &self,
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<CompressedPayload, UploadError> {
        let name = name.into();
        self.validate_name(&name)?;

        let original_len = bytes.len();
        let compressed = tokio::task::spawn_blocking(move || gzip(&bytes))
            .await
            .map_err(|e| UploadError::Compression(format!("Compression task failed: {e}")))??;

        tracing::debug!(
            file_name = %name,
            original_len,
            compressed_len = compressed.len(),
            "Payload compressed",
        );

        Ok(CompressedPayload {
            file_name: format!("{name}{COMPRESSED_SUFFIX}"),
            bytes: compressed,
            original_len,
        })
    }
}

/// Gzip-encode `data` in one pass.
pub fn gzip(data: &[u8]) -> Result<Vec<u8>, UploadError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| UploadError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| UploadError::Compression(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use assert_matches::assert_matches;
    use flate2::read::GzDecoder;

    use super::*;

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn accepts_extension_case_insensitively() {
        let compressor = PayloadCompressor::default();
        assert!(compressor.validate_name("products.csv").is_ok());
        assert!(compressor.validate_name("PRODUCTS.CSV").is_ok());
        assert!(compressor.validate_name("Mixed.CsV").is_ok());
    }

    #[test]
    fn rejects_other_names() {
        let compressor = PayloadCompressor::default();
        for name in ["report.txt", "products.csv.bak", "csv", ".csv", "productscsv"] {
            assert_matches!(
                compressor.validate_name(name),
                Err(UploadError::Validation(_)),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn custom_extension_with_dot() {
        let compressor = PayloadCompressor::new(".TSV");
        assert_eq!(compressor.accepted_extension(), "tsv");
        assert!(compressor.validate_name("rows.tsv").is_ok());
        assert!(compressor.validate_name("rows.csv").is_err());
    }

    #[tokio::test]
    async fn compress_bytes_appends_suffix() {
        let data = b"sku,name\nabc,Widget\n".to_vec();
        let payload = PayloadCompressor::default()
            .compress_bytes("products.csv", data.clone())
            .await
            .unwrap();

        assert_eq!(payload.file_name, "products.csv.gz");
        assert_eq!(payload.original_len, data.len());
        assert_eq!(&payload.bytes[..2], &[0x1f, 0x8b]);
        assert_eq!(gunzip(&payload.bytes), data);
    }

    #[tokio::test]
    async fn empty_file_round_trips() {
        let payload = PayloadCompressor::default()
            .compress_bytes("empty.csv", Vec::new())
            .await
            .unwrap();
        assert!(gunzip(&payload.bytes).is_empty());
    }

    #[tokio::test]
    async fn invalid_name_is_rejected_before_reading() {
        // The path does not exist; validation must fail first.
        let result = PayloadCompressor::default()
            .compress_file(Path::new("/definitely/missing/report.txt"))
            .await;
        assert_matches!(result, Err(UploadError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_file_is_compression_error() {
        let result = PayloadCompressor::default()
            .compress_file(Path::new("/definitely/missing/products.csv"))
            .await;
        assert_matches!(result, Err(UploadError::Compression(_)));
    }
}
