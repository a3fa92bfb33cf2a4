//! Shared plumbing for the `mira` and `check_storage` binaries.

pub mod app;
pub mod storage_report;

/// Truncate a string to `max_len` characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Show only the last four characters of a secret.
pub fn mask_secret(value: &str) -> String {
    let count = value.chars().count();
    if count <= 8 {
        return "****".to_string();
    }
    let tail: String = value.chars().skip(count - 4).collect();
    format!("****{}", tail)
}

/// `1,234 bytes (1.2 KB)`
pub fn format_bytes(bytes: u64) -> String {
    let digits = bytes.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{} bytes ({:.1} KB)", grouped, bytes as f64 / 1024.0)
}

/// Initialize tracing for CLI binaries. `RUST_LOG` overrides the `info`
/// default; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("abc", 2), "...");
    }

    #[test]
    fn truncate_string_counts_characters() {
        assert_eq!(truncate_string("plan für März", 8), "plan ...");
        assert_eq!(truncate_string("📚📚📚", 3), "📚📚📚");
    }

    #[test]
    fn mask_secret_hides_short_values_entirely() {
        assert_eq!(mask_secret("sk-abc"), "****");
        assert_eq!(mask_secret("sk-proj-1234567890abcd"), "****abcd");
    }

    #[test]
    fn format_bytes_groups_thousands() {
        assert_eq!(format_bytes(0), "0 bytes (0.0 KB)");
        assert_eq!(format_bytes(512), "512 bytes (0.5 KB)");
        assert_eq!(format_bytes(1_234_567), "1,234,567 bytes (1205.6 KB)");
    }
}
