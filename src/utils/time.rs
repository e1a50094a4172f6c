/// Format seconds as `M:SS`, the seek-bar preview label.
pub fn format_clock(seconds: f64) -> String {
    let total_seconds = clamp_seconds(seconds);
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Format seconds as `mm:ss`, or `h:mm:ss` once an hour is reached.
pub fn seconds_to_time(seconds: f64) -> String {
    let total_seconds = clamp_seconds(seconds);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Time left until `duration`, prefixed with `-`.
pub fn remaining_time(current: f64, duration: f64) -> String {
    format!("-{}", seconds_to_time(duration - current))
}

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn clamp_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(7.3), "0:07");
        assert_eq!(format_clock(75.9), "1:15");
        assert_eq!(format_clock(3725.0), "62:05");
        assert_eq!(format_clock(-3.0), "0:00");
    }

    #[test]
    fn test_seconds_to_time() {
        assert_eq!(seconds_to_time(5.0), "00:05");
        assert_eq!(seconds_to_time(65.5), "01:05");
        assert_eq!(seconds_to_time(3661.0), "1:01:01");
        assert_eq!(remaining_time(30.0, 90.0), "-01:00");
        assert_eq!(remaining_time(95.0, 90.0), "-00:00");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
