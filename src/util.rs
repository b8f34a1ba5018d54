use crate::session::MIN_ELAPSED_MINUTES;

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let avg = mean(data)?;
    let variance = data.iter().map(|v| (avg - v).powi(2)).sum::<f64>() / data.len() as f64;
    Some(variance.sqrt())
}

/// Keys per minute with the elapsed minutes floored so a zero-length session
/// still yields a finite rate.
pub fn keys_per_minute(keys: u64, elapsed_secs: f64) -> f64 {
    keys as f64 / (elapsed_secs / 60.0).max(MIN_ELAPSED_MINUTES)
}

/// `75.3` -> `"1:15.3"`, `9.04` -> `"9.0s"`
pub fn format_secs(secs: f64) -> String {
    let secs = secs.max(0.0);
    if secs < 60.0 {
        return format!("{secs:.1}s");
    }
    let minutes = (secs / 60.0).floor();
    format!("{}:{:04.1}", minutes as u64, secs - minutes * 60.0)
}
