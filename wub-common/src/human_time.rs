//! Human-readable clock formatting for progress displays
//!
//! Progress bars show elapsed and total time as `M:SS`, with minutes
//! unbounded (a 75 minute routine shows `75:00`).

/// Format milliseconds as `M:SS`, truncating partial seconds.
///
/// # Examples
///
/// ```
/// use wub_common::human_time::format_clock;
///
/// assert_eq!(format_clock(0), "0:00");
/// assert_eq!(format_clock(59_999), "0:59");
/// assert_eq!(format_clock(61_000), "1:01");
/// assert_eq!(format_clock(4_500_000), "75:00");
/// ```
pub fn format_clock(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{}:{:02}", minutes, seconds)
}

/// Format signed milliseconds as `M:SS`, prefixing negative values with `-`.
///
/// Used for seek previews where an offset may point before the start.
pub fn format_clock_signed(ms: i64) -> String {
    if ms < 0 {
        format!("-{}", format_clock(ms.unsigned_abs()))
    } else {
        format_clock(ms as u64)
    }
}
