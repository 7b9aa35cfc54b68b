use regex::Regex;

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Human-readable size, e.g. `1.5 KB`, using 1024 steps and at most two
/// decimals.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut exponent = 0;
    while value >= 1024.0 && exponent < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        exponent += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;

    format!("{} {}", rounded, SIZE_UNITS[exponent])
}

/// Hugging Face repo ids are `name` or `owner/name`.
pub fn is_valid_repo_id(repo_id: &str) -> bool {
    Regex::new(r"^(?:[A-Za-z0-9][A-Za-z0-9_.-]*/)?[A-Za-z0-9][A-Za-z0-9_.-]*$")
        .map(|re| re.is_match(repo_id))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1024 * 1024), "1 MB");
        assert_eq!(format_bytes(2_684_354_560), "2.5 GB");
    }

    #[test]
    fn test_repo_id() {
        assert!(is_valid_repo_id("TinyLlama/TinyLlama-1.1B-Chat-v1.0"));
        assert!(is_valid_repo_id("gpt2"));
        assert!(!is_valid_repo_id("org/sub/model"));
        assert!(!is_valid_repo_id("org/"));
        assert!(!is_valid_repo_id("https://huggingface.co/gpt2"));
    }
}
