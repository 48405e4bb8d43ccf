//! Countdown display formatting.

/// Format a remaining-seconds value as `M:SS`.
///
/// Minutes are not zero-padded, seconds always are.
pub fn format_time_remaining(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert_eq!(format_time_remaining(0), "0:00");
    }

    #[test]
    fn test_over_a_minute() {
        assert_eq!(format_time_remaining(65), "1:05");
    }

    #[test]
    fn test_just_under_ten_minutes() {
        assert_eq!(format_time_remaining(599), "9:59");
    }

    #[test]
    fn test_single_digit_seconds_padded() {
        assert_eq!(format_time_remaining(9), "0:09");
        assert_eq!(format_time_remaining(60), "1:00");
        assert_eq!(format_time_remaining(615), "10:15");
    }
}
