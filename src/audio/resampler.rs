// ABOUTME: Band-limited sample rate conversion for mono 16-bit PCM
// ABOUTME: FFT resampling of whole chunks to the fixed output rate

use rustfft::{num_complex::Complex, FftPlanner};
use std::fmt;

/// Number of output samples produced for `input_len` samples at `from_rate`
/// converted to `to_rate`: `round(input_len * to_rate / from_rate)`.
pub fn output_len(input_len: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == 0 {
        return input_len;
    }
    let scaled = input_len as u128 * to_rate as u128;
    let from = from_rate as u128;
    // Round half up, in integers so large chunks never lose precision
    ((scaled + from / 2) / from) as usize
}

/// FFT resampler that keeps its planner, and so its cached plans, between
/// calls. A session feeding chunks of a steady size plans each transform once.
pub struct Resampler {
    planner: FftPlanner<f64>,
}

impl Default for Resampler {
    fn default() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }
}

impl fmt::Debug for Resampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resampler").finish_non_exhaustive()
    }
}

impl Resampler {
    /// Create a resampler with an empty plan cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Resample a block of mono i16 samples from `from_rate` to `to_rate`.
    ///
    /// The block is treated as one period of a band-limited signal: its
    /// spectrum is truncated (downsampling) or zero-padded (upsampling) to the
    /// output length and transformed back. Content above the Nyquist frequency
    /// of the lower rate is discarded, nothing new is folded in.
    ///
    /// Equal rates return the input unchanged. A zero rate is not a valid
    /// negotiation and also returns the input unchanged.
    pub fn process(&mut self, samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
        if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
            return samples.to_vec();
        }

        let n = samples.len();
        let m = output_len(n, from_rate, to_rate);
        if n == 0 || m == 0 {
            return vec![0; m];
        }

        let mut spectrum: Vec<Complex<f64>> = samples
            .iter()
            .map(|&s| Complex::new(s as f64, 0.0))
            .collect();
        self.planner.plan_fft_forward(n).process(&mut spectrum);

        let mut output = reshape_spectrum(&spectrum, m);
        self.planner.plan_fft_inverse(m).process(&mut output);

        // rustfft leaves both transforms unnormalized: 1/n undoes the forward
        // pass and already includes the m/n amplitude correction.
        let scale = 1.0 / n as f64;
        output
            .iter()
            .map(|c| (c.re * scale).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
            .collect()
    }
}

/// One-off form of [`Resampler::process`]
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    Resampler::new().process(samples, from_rate, to_rate)
}

/// Build the length-`m` spectrum of a real signal from the length-`n` one.
fn reshape_spectrum(spectrum: &[Complex<f64>], m: usize) -> Vec<Complex<f64>> {
    let n = spectrum.len();
    let shared = n.min(m);
    let nyquist = shared / 2;

    // Positive-frequency half, as a real FFT would store it
    let mut half = vec![Complex::new(0.0, 0.0); m / 2 + 1];
    half[..=nyquist].copy_from_slice(&spectrum[..=nyquist]);

    if shared % 2 == 0 {
        if m < n {
            // The bins at +/- nyquist fold onto one output bin
            half[nyquist] *= 2.0;
        } else if m > n {
            // The input nyquist bin splits across +/- nyquist in the output
            half[nyquist] *= 0.5;
        }
    }

    // Mirror into a Hermitian full spectrum so the inverse is real
    let mut full = vec![Complex::new(0.0, 0.0); m];
    full[0] = Complex::new(half[0].re, 0.0);
    for k in 1..=(m - 1) / 2 {
        full[k] = half[k];
        full[m - k] = half[k].conj();
    }
    if m % 2 == 0 {
        full[m / 2] = Complex::new(half[m / 2].re, 0.0);
    }
    full
}
