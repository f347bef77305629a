//! Human-readable byte counts.

/// Format a byte count the way progress messages display it.
///
/// Uses decimal units: below 1000 bytes the raw count is shown, below one
/// million whole kilobytes, otherwise megabytes with two decimals.
pub fn friendly_size(size_in_bytes: u64) -> String {
    if size_in_bytes < 1_000 {
        return format!("{} bytes", size_in_bytes);
    }
    if size_in_bytes < 1_000_000 {
        return format!("{} kb", size_in_bytes / 1_000);
    }

    // Truncate to two decimals rather than round.
    let hundredths = size_in_bytes / 10_000;
    format!("{}.{:02} mb", hundredths / 100, hundredths % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes() {
        assert_eq!(friendly_size(0), "0 bytes");
        assert_eq!(friendly_size(999), "999 bytes");
    }

    #[test]
    fn test_kilobytes() {
        assert_eq!(friendly_size(1_000), "1 kb");
        assert_eq!(friendly_size(999_999), "999 kb");
    }

    #[test]
    fn test_megabytes() {
        assert_eq!(friendly_size(1_000_000), "1.00 mb");
        assert_eq!(friendly_size(12_345_678), "12.34 mb");
    }
}
