//! Emulator log preparation for submission.

use std::fs;
use std::io::Write;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Local};
use flate2::Compression;
use flate2::write::ZlibEncoder;

use panel_core::report::AttachedLog;

use crate::error::{Error, Result};

/// Compress a log file into the attached-log form the panel expects:
/// zlib at maximum compression, base64 encoded, stamped with the file's
/// modification time.
pub fn compress_log_file(path: impl AsRef<Path>) -> Result<AttachedLog> {
    let path = path.as_ref();
    let content = fs::read(path).map_err(|e| Error::io(e, path))?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(&content)
        .and_then(|()| encoder.finish())
        .map(|compressed| {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let datetime = fs::metadata(path)
                .and_then(|m| m.modified())
                .map(|mtime| {
                    DateTime::<Local>::from(mtime)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string()
                })
                .unwrap_or_default();
            AttachedLog {
                filename,
                datetime,
                size_original: content.len() as u64,
                size_compressed: compressed.len() as u64,
                data: BASE64.encode(&compressed),
            }
        })
        .map_err(|e| Error::io(e, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    #[test]
    fn test_compressed_log_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("emulator.log");
        let plain = b"[2004-01-15 12:00:00] CM connect ok\n".repeat(100);
        std::fs::write(&path, &plain).expect("write");

        let log = compress_log_file(&path).expect("compress");
        assert_eq!(log.filename, "emulator.log");
        assert_eq!(log.size_original, plain.len() as u64);
        assert!(log.size_compressed < log.size_original);
        assert!(!log.datetime.is_empty());

        let compressed = BASE64.decode(&log.data).expect("base64");
        assert_eq!(compressed.len() as u64, log.size_compressed);
        let mut decoder = ZlibDecoder::new(compressed.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).expect("inflate");
        assert_eq!(out, plain);
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = compress_log_file("/nonexistent/emulator.log").expect_err("missing");
        assert!(matches!(err, Error::Io { .. }));
    }
}
