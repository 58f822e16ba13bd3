//! Single-bin Goertzel energy estimator

use std::f64::consts::TAU;

/// Magnitude of `freq_hz` within `window`.
///
/// Runs the two-pole recurrence `q0 = 2cos(w)q1 - q2 + x[n]` over the whole
/// window and normalises the final bin by `N/2`, so a sinusoid of amplitude
/// `A` centred on the bin reports roughly `A`.
///
/// An empty window has no energy. `sample_rate` must be non-zero.
pub fn goertzel(window: &[i32], sample_rate: u32, freq_hz: u32) -> f64 {
    if window.is_empty() {
        return 0.0;
    }

    let omega = TAU * f64::from(freq_hz) / f64::from(sample_rate);
    let sine = omega.sin();
    let cosine = omega.cos();
    let coeff = 2.0 * cosine;

    let mut q1 = 0.0;
    let mut q2 = 0.0;
    for &sample in window {
        let q0 = coeff * q1 - q2 + f64::from(sample);
        q2 = q1;
        q1 = q0;
    }

    let scale = window.len() as f64 / 2.0;
    let real = (q1 - q2 * cosine) / scale;
    let imag = (q2 * sine) / scale;

    (real * real + imag * imag).sqrt()
}
