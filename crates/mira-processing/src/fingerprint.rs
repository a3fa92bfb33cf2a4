use sha2::{Digest, Sha256};

/// SHA-256 of file bytes, hex encoded.
pub fn content_sha256(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Identity of a set of files: hash over (name, size, content hash) of every
/// file, independent of order. Any content change alters the fingerprint even
/// when the size stays the same.
pub fn file_set_fingerprint<'a, I>(files: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut entries: Vec<(String, usize, String)> = files
        .into_iter()
        .map(|(name, bytes)| (name.to_string(), bytes.len(), content_sha256(bytes)))
        .collect();
    entries.sort();

    let mut hasher = Sha256::new();
    for (name, size, digest) in &entries {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(size.to_le_bytes());
        hasher.update(digest.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_independent() {
        let a = file_set_fingerprint([("a.txt", &b"one"[..]), ("b.txt", &b"two"[..])]);
        let b = file_set_fingerprint([("b.txt", &b"two"[..]), ("a.txt", &b"one"[..])]);
        assert_eq!(a, b);
    }

    #[test]
    fn same_size_content_change_detected() {
        let a = file_set_fingerprint([("a.txt", &b"aaaa"[..])]);
        let b = file_set_fingerprint([("a.txt", &b"bbbb"[..])]);
        assert_ne!(a, b);
    }

    #[test]
    fn rename_detected() {
        let a = file_set_fingerprint([("a.txt", &b"same"[..])]);
        let b = file_set_fingerprint([("b.txt", &b"same"[..])]);
        assert_ne!(a, b);
    }

    #[test]
    fn known_sha256() {
        assert_eq!(
            content_sha256(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
