//! Chunked payload streaming into an open volume

use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use super::CHUNK_SIZE;
use crate::error::{Error, Result};

/// Copy exactly `length` bytes of `name` from `source` into `dest`.
///
/// A source that ends early was removed or truncated mid-build and is
/// reported as [`Error::SourceNotFound`]; a failing write is
/// [`Error::WriteFailed`].
pub fn copy_payload<R: Read, W: Write>(
    source: &mut R,
    dest: &mut W,
    length: u64,
    name: &str,
    working_dir: &Path,
) -> Result<u64> {
    let mut buffer = vec![0u8; CHUNK_SIZE.min(usize::try_from(length).unwrap_or(CHUNK_SIZE))];
    let mut remaining = length;

    while remaining > 0 {
        let chunk = buffer.len().min(usize::try_from(remaining).unwrap_or(buffer.len()));
        if let Err(err) = source.read_exact(&mut buffer[..chunk]) {
            tracing::debug!("Source {} ended early: {}", name, err);
            return Err(Error::SourceNotFound {
                name: name.to_string(),
                working_dir: working_dir.to_path_buf(),
            });
        }

        dest.write_all(&buffer[..chunk]).map_err(|source| Error::WriteFailed {
            name: name.to_string(),
            source,
        })?;
        remaining -= chunk as u64;
    }

    Ok(length)
}

/// Whether an IO error means the disk ran out of room.
#[must_use]
pub fn is_disk_full(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::StorageFull | ErrorKind::WriteZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    #[test]
    fn test_copies_across_chunk_boundary() {
        let data: Vec<u8> = (0..CHUNK_SIZE * 2 + 17).map(|i| (i % 251) as u8).collect();
        let mut out = Vec::new();
        let copied = copy_payload(
            &mut Cursor::new(&data),
            &mut out,
            data.len() as u64,
            "big.bin",
            Path::new("."),
        )
        .unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(out, data);
    }

    #[test]
    fn test_copies_only_length_bytes() {
        let data = b"0123456789";
        let mut out = Vec::new();
        copy_payload(&mut Cursor::new(data), &mut out, 4, "a", Path::new(".")).unwrap();
        assert_eq!(out, b"0123");
    }

    #[test]
    fn test_short_source_is_not_found() {
        let mut out = Vec::new();
        let err = copy_payload(&mut Cursor::new(b"abc"), &mut out, 10, "gone.wav", Path::new("."))
            .unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { ref name, .. } if name == "gone.wav"));
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::StorageFull, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_reports_disk_full() {
        let err = copy_payload(&mut Cursor::new(b"abc"), &mut FullDisk, 3, "a.txt", Path::new("."))
            .unwrap_err();
        match err {
            Error::WriteFailed { name, source } => {
                assert_eq!(name, "a.txt");
                assert!(is_disk_full(&source));
            }
            other => panic!("unexpected error: {other}"),
        }
        let message = Error::WriteFailed {
            name: "a.txt".into(),
            source: io::Error::new(ErrorKind::StorageFull, "full"),
        }
        .to_string();
        assert!(message.contains("possibly disk full"));
    }
}
