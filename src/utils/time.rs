/// This is the standard way of rendering an accumulated total in playtally.
/// Sub-second precision is kept on disk but nobody wants to read it.
pub fn format_duration(total_seconds: f64) -> String {
    let total = total_seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}h {minutes}m {seconds}s")
}
