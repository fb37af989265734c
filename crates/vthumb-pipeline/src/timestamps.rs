//! Deterministic sample-time generation.

/// Generate the ordered sample times `k / rate` for `k = 0, 1, 2, …`
/// while the time stays within the duration.
///
/// The first timestamp is exactly 0 and the last never exceeds the
/// duration; when `duration * rate` is an integer the last timestamp
/// equals the duration exactly. Non-positive inputs yield an empty
/// sequence.
pub fn sample_times(duration_sec: f64, sample_rate_hz: f64) -> Vec<f64> {
    if duration_sec <= 0.0 || sample_rate_hz <= 0.0 {
        return Vec::new();
    }

    let mut times = Vec::new();
    let mut k: u64 = 0;
    loop {
        let t = k as f64 / sample_rate_hz;
        if t > duration_sec {
            break;
        }
        times.push(t);
        k += 1;
    }
    times
}
