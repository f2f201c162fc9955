//! Human-readable formatting of sizes, speeds, durations and load stages.

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Formats a byte count with binary (1024) units and at most two decimals.
///
/// ```
/// use depthlens::utils::format_file_size;
///
/// assert_eq!(format_file_size(0.0), "0 B");
/// assert_eq!(format_file_size(1536.0), "1.5 KB");
/// ```
pub fn format_file_size(bytes: f64) -> String {
    if bytes <= 0.0 || !bytes.is_finite() {
        return "0 B".to_string();
    }
    let exponent = (bytes.ln() / 1024f64.ln())
        .floor()
        .clamp(0.0, (SIZE_UNITS.len() - 1) as f64) as usize;
    let value = bytes / 1024f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", SIZE_UNITS[exponent])
}

/// Formats a transfer rate, e.g. `"2.5 MB/s"`.
pub fn format_speed(bytes_per_second: f64) -> String {
    format!("{}/s", format_file_size(bytes_per_second))
}

/// Formats a duration in seconds as `"42s"` or `"3m 5s"`.
pub fn format_time(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{}s", seconds.round());
    }
    let minutes = (seconds / 60.0).floor();
    let remaining = (seconds % 60.0).round();
    format!("{minutes}m {remaining}s")
}

/// Caption describing what a model load is doing at `percentage`.
pub fn loading_stage_caption(percentage: f64) -> &'static str {
    match percentage {
        p if p < 10.0 => "Initializing pipeline...",
        p if p < 30.0 => "Starting download...",
        p if p < 60.0 => "Downloading model files...",
        p if p < 80.0 => "Processing model data...",
        p if p < 95.0 => "Loading model into memory...",
        p if p < 100.0 => "Finalizing setup...",
        _ => "Model ready!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0.0), "0 B");
        assert_eq!(format_file_size(512.0), "512 B");
        assert_eq!(format_file_size(1024.0), "1 KB");
        assert_eq!(format_file_size(1536.0), "1.5 KB");
        assert_eq!(format_file_size(25.0 * 1024.0 * 1024.0), "25 MB");
        assert_eq!(format_file_size(1_234_567.0), "1.18 MB");
        assert_eq!(format_file_size(3.0 * 1024f64.powi(5)), "3072 TB");
    }

    #[test]
    fn test_format_speed_and_time() {
        assert_eq!(format_speed(2048.0), "2 KB/s");
        assert_eq!(format_time(42.4), "42s");
        assert_eq!(format_time(59.4), "59s");
        assert_eq!(format_time(185.0), "3m 5s");
        assert_eq!(format_time(60.0), "1m 0s");
    }

    #[test]
    fn test_loading_stage_caption() {
        assert_eq!(loading_stage_caption(5.0), "Initializing pipeline...");
        assert_eq!(loading_stage_caption(10.0), "Starting download...");
        assert_eq!(loading_stage_caption(45.0), "Downloading model files...");
        assert_eq!(loading_stage_caption(79.9), "Processing model data...");
        assert_eq!(loading_stage_caption(85.0), "Loading model into memory...");
        assert_eq!(loading_stage_caption(98.0), "Finalizing setup...");
        assert_eq!(loading_stage_caption(100.0), "Model ready!");
    }
}
