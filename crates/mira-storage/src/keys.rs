//! Shared key generation for storage backends.
//!
//! Key format: `{tenant_id}/{principal_id}/{sha256}/{filename}`.

use uuid::Uuid;

const FALLBACK_FILENAME: &str = "upload.bin";

/// Generate the content-addressed key for an upload. `filename` is
/// sanitized first.
pub fn content_key(tenant_id: Uuid, principal_id: Uuid, sha256: &str, filename: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        tenant_id,
        principal_id,
        sha256,
        sanitize_filename(filename)
    )
}

/// Reduce a client-supplied name to a safe basename.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .replace('\0', "");
    let base = base.trim();

    if base.is_empty() || base == "." || base == ".." {
        FALLBACK_FILENAME.to_string()
    } else {
        base.to_string()
    }
}

/// Reject keys that could escape the storage root. Dots inside a segment
/// (`Roadmap..final.txt`) are fine; `.` and `..` segments are not.
pub(crate) fn validate_key(key: &str) -> bool {
    !(key.is_empty()
        || key.starts_with('/')
        || key.contains('\0')
        || key.split(['/', '\\']).any(|segment| segment == ".." || segment == "."))
}
