//! Content hashing for cache-busting file names.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::{Digest, Md5};

/// Number of hex characters embedded in hashed file names.
pub const HASH_LEN: usize = 8;

/// Compute the short content hash of a byte slice.
///
/// Returns the first 8 lowercase hex digits of the MD5 digest.
pub fn content_hash(data: &[u8]) -> String {
    let digest = Md5::digest(data);
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_LEN);
    hex
}

/// Compute the short content hash of a file, reading it in chunks.
///
/// # Errors
/// Returns error if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(HASH_LEN);
    Ok(hex)
}

/// Insert `hash` before the final extension of `file_name`.
///
/// Names without an extension, and dotfiles whose only dot is the leading
/// one, get the hash appended instead.
pub fn add_hash_to_filename(file_name: &str, hash: &str) -> String {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => {
            let (stem, ext) = file_name.split_at(idx);
            format!("{stem}.{hash}{ext}")
        }
        _ => format!("{file_name}.{hash}"),
    }
}
