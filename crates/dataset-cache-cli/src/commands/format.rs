const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_owned();
    }

    let mut size = bytes as f64;
    let mut unit = 0usize;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{size:.1} {}", SIZE_UNITS[unit])
}

pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0) as u64;
        let secs = (seconds % 60.0) as u64;
        format!("{minutes}m {secs}s")
    } else {
        let hours = (seconds / 3600.0) as u64;
        let minutes = ((seconds % 3600.0) / 60.0) as u64;
        format!("{hours}h {minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_scale_through_units() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512.0 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(7_340_032), "7.0 MB");
    }

    #[test]
    fn durations_pick_a_sensible_unit() {
        assert_eq!(format_duration(2.34), "2.3s");
        assert_eq!(format_duration(150.0), "2m 30s");
        assert_eq!(format_duration(4500.0), "1h 15m");
    }
}
