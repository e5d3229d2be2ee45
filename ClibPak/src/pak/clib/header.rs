//! Obfuscated table of contents stored in the primary volume
//!
//! Layout after the volume signature: the stored seed as 4 raw bytes, then
//! (every byte obfuscated) volume count, volume names, entry count, entry
//! names, offsets, lengths and volume indices. Integers are little-endian
//! `i32`, strings are NUL-terminated.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{LibraryEntry, LibraryIndex, PseudoRand, MAX_DATAFILENAME_LENGTH, MAX_FILENAME_LENGTH, MAX_FILES, MAX_VOLUMES};
use crate::error::{Error, Result};

/// Size in bytes of the encoded header for `index`, seed included.
///
/// Depends only on the names and counts, never on offsets or lengths.
#[must_use]
pub fn encoded_header_len(index: &LibraryIndex) -> usize {
    let volume_names: usize = index.volume_names.iter().map(|n| n.len() + 1).sum();
    let entry_names: usize = index.entries.iter().map(|e| e.name.len() + 1).sum();
    // seed, volume count, entry count; then offset + length + volume per entry
    4 + 4 + volume_names + 4 + entry_names + index.entries.len() * 9
}

/// Encode the header for `index`, obfuscated with `seed`.
pub fn encode_header(index: &LibraryIndex, seed: i32) -> Result<Vec<u8>> {
    let mut plain = Vec::with_capacity(encoded_header_len(index));

    plain.write_i32::<LittleEndian>(count_field(index.volume_names.len())?)?;
    for name in &index.volume_names {
        put_cstring(&mut plain, name)?;
    }

    plain.write_i32::<LittleEndian>(count_field(index.entries.len())?)?;
    for entry in &index.entries {
        put_cstring(&mut plain, &entry.name)?;
    }
    for entry in &index.entries {
        plain.write_i32::<LittleEndian>(entry.offset as i32)?;
    }
    for entry in &index.entries {
        plain.write_i32::<LittleEndian>(entry.length as i32)?;
    }
    for entry in &index.entries {
        plain.write_u8(entry.volume)?;
    }

    PseudoRand::new(seed).obfuscate(&mut plain);

    let mut out = Vec::with_capacity(plain.len() + 4);
    out.write_i32::<LittleEndian>(PseudoRand::stored_seed(seed))?;
    out.extend_from_slice(&plain);
    Ok(out)
}

/// Decode a header, returning the table and the real seed.
///
/// `reader` must be positioned right after the volume signature.
pub fn decode_header<R: Read>(reader: R) -> Result<(LibraryIndex, i32)> {
    let mut reader = reader;
    let stored = reader.read_i32::<LittleEndian>().map_err(eof)?;
    let rng = PseudoRand::from_stored_seed(stored);
    let seed = stored.wrapping_add(super::RAND_SEED_SALT);
    let mut input = Deobfuscator { inner: reader, rng };

    let num_volumes = input.read_i32::<LittleEndian>().map_err(eof)?;
    let num_volumes = usize::try_from(num_volumes)
        .ok()
        .filter(|n| (1..=MAX_VOLUMES).contains(n))
        .ok_or_else(|| Error::InvalidFormat(format!("bad data file count: {num_volumes}")))?;

    let mut volume_names = Vec::with_capacity(num_volumes);
    for _ in 0..num_volumes {
        volume_names.push(input.read_cstring(MAX_DATAFILENAME_LENGTH)?);
    }

    let num_files = input.read_i32::<LittleEndian>().map_err(eof)?;
    let num_files = usize::try_from(num_files)
        .ok()
        .filter(|n| *n <= MAX_FILES)
        .ok_or_else(|| Error::InvalidFormat(format!("bad file count: {num_files}")))?;

    let mut names = Vec::with_capacity(num_files);
    for _ in 0..num_files {
        names.push(input.read_cstring(MAX_FILENAME_LENGTH)?);
    }
    let mut offsets = Vec::with_capacity(num_files);
    for _ in 0..num_files {
        offsets.push(input.read_i32::<LittleEndian>().map_err(eof)? as u32);
    }
    let mut lengths = Vec::with_capacity(num_files);
    for _ in 0..num_files {
        lengths.push(input.read_i32::<LittleEndian>().map_err(eof)? as u32);
    }

    let mut entries = Vec::with_capacity(num_files);
    for ((name, offset), length) in names.into_iter().zip(offsets).zip(lengths) {
        let volume = input.read_u8().map_err(eof)?;
        if usize::from(volume) >= num_volumes {
            return Err(Error::InvalidFormat(format!(
                "entry '{name}' refers to data file {volume} of {num_volumes}"
            )));
        }
        entries.push(LibraryEntry {
            name,
            offset,
            length,
            volume,
        });
    }

    Ok((
        LibraryIndex {
            volume_names,
            entries,
        },
        seed,
    ))
}

fn count_field(count: usize) -> Result<i32> {
    i32::try_from(count).map_err(|_| Error::TooManyFiles {
        count,
        max: MAX_FILES,
    })
}

fn put_cstring(out: &mut Vec<u8>, text: &str) -> Result<()> {
    if text.as_bytes().contains(&0) {
        return Err(Error::InvalidPath(format!("name contains NUL: {text:?}")));
    }
    out.extend_from_slice(text.as_bytes());
    out.push(0);
    Ok(())
}

fn eof(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::UnexpectedEof
    } else {
        Error::Io(err)
    }
}

/// Undoes the header obfuscation on the fly.
struct Deobfuscator<R: Read> {
    inner: R,
    rng: PseudoRand,
}

impl<R: Read> Read for Deobfuscator<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.rng.deobfuscate(&mut buf[..n]);
        Ok(n)
    }
}

impl<R: Read> Deobfuscator<R> {
    /// Read a NUL-terminated string strictly shorter than `limit` bytes.
    fn read_cstring(&mut self, limit: usize) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            let b = self.read_u8().map_err(eof)?;
            if b == 0 {
                break;
            }
            bytes.push(b);
            if bytes.len() >= limit {
                return Err(Error::InvalidFormat(format!(
                    "name exceeds {limit} bytes in library header"
                )));
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
