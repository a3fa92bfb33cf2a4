use chardetng::EncodingDetector;
use encoding_rs::Encoding;

use super::{ExtractMetadata, Extracted};

/// Decode plain text with encoding detection. A byte-order mark wins;
/// otherwise the detector guesses. When the guess cannot decode the bytes
/// cleanly, fall back to lossy UTF-8 and record it.
pub(super) fn extract(bytes: &[u8]) -> Extracted {
    let (encoding, body, confident) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..], true),
        None => {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            let (encoding, confident) = detector.guess_assess(None, true);
            (encoding, bytes, confident)
        }
    };

    let mut metadata = ExtractMetadata {
        encoding: Some(encoding.name().to_string()),
        encoding_confident: Some(confident),
        ..Default::default()
    };

    let text = match encoding.decode_without_bom_handling_and_without_replacement(body) {
        Some(text) => text.into_owned(),
        None => {
            tracing::warn!(
                encoding = encoding.name(),
                "Detected encoding failed to decode, falling back to lossy UTF-8"
            );
            metadata.lossy_fallback = true;
            String::from_utf8_lossy(body).into_owned()
        }
    };

    Extracted { text, metadata }
}
