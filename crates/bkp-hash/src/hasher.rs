use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use bkp_utils::error::classify_io;
use bkp_utils::{CancelToken, Result, IO_CHUNK_SIZE};

use crate::hex::hex_to_string;

/// Streaming SHA-256 computation.
///
/// Data is fed incrementally with [`update`](Sha256Hasher::update) or
/// through the [`std::io::Write`] implementation, then finalised into a
/// 64-character lowercase hex digest.
#[derive(Default)]
pub struct Sha256Hasher {
    inner: sha2::Sha256,
}

impl Sha256Hasher {
    pub fn new() -> Self {
        use digest::Digest;
        Self {
            inner: sha2::Sha256::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        use digest::Digest;
        self.inner.update(data);
    }

    pub fn finalize_hex(self) -> String {
        use digest::Digest;
        hex_to_string(self.inner.finalize().as_slice())
    }
}

impl std::io::Write for Sha256Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Convenience: hash a byte slice in one call.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut h = Sha256Hasher::new();
    h.update(data);
    h.finalize_hex()
}

/// Hash everything `reader` yields, polling for cancellation once per chunk.
pub fn hash_reader(reader: &mut impl Read, context: &Path, cancel: &CancelToken) -> Result<String> {
    let mut hasher = Sha256Hasher::new();
    let mut chunk = vec![0u8; IO_CHUNK_SIZE];
    loop {
        cancel.check()?;
        let n = reader
            .read(&mut chunk)
            .map_err(|e| classify_io(e, "unable to read", context))?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    Ok(hasher.finalize_hex())
}

/// Hash a file's contents without buffering it whole.
pub fn hash_file(path: &Path, cancel: &CancelToken) -> Result<String> {
    let file = File::open(path).map_err(|e| classify_io(e, "unable to open", path))?;
    let mut reader = BufReader::with_capacity(IO_CHUNK_SIZE, file);
    hash_reader(&mut reader, path, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bkp_utils::ErrorKind;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn known_vectors() {
        assert_eq!(hash_bytes(b"abc"), ABC_SHA256);
        assert_eq!(hash_bytes(b""), EMPTY_SHA256);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut h = Sha256Hasher::new();
        h.update(b"a");
        h.update(b"b");
        h.update(b"c");
        assert_eq!(h.finalize_hex(), ABC_SHA256);
    }

    #[test]
    fn file_hashing_streams() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        // Larger than one chunk so at least two reads happen.
        let data = vec![0x5au8; IO_CHUNK_SIZE * 2 + 17];
        std::fs::write(&path, &data).unwrap();

        let cancel = CancelToken::new();
        assert_eq!(hash_file(&path, &cancel).unwrap(), hash_bytes(&data));
    }

    #[test]
    fn cancellation_interrupts_hashing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::write(&path, b"data").unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = hash_file(&path, &cancel).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn missing_file_is_classified() {
        let cancel = CancelToken::new();
        let err = hash_file(Path::new("/no/such/file"), &cancel).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }
}
