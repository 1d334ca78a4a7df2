//! The multirate stage: Butterworth low-pass, then integer decimation.
//!
//! Dropping samples folds everything above the new Nyquist frequency back
//! into the kept band, so the low-pass must run first, with its cutoff at
//! or below `sample_rate / (2 * factor)`.

use crate::signal::Signal;
use log::debug;
use num_complex::Complex64;
use std::borrow::Cow;
use std::f64::consts::PI;
use std::fmt;

/// Low-pass design parameters, tied to the rate of the signal they will
/// filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    /// Cutoff frequency in Hz. Must sit strictly between 0 and Nyquist.
    pub cutoff_hz: f64,
    /// Butterworth filter order.
    pub order: usize,
    /// Rate of the signal to be filtered, in Hz.
    pub sample_rate: u32,
}

impl FilterSpec {
    /// Checks the design preconditions before any computation proceeds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nyquist = self.sample_rate as f64 / 2.0;
        if !(self.cutoff_hz > 0.0 && self.cutoff_hz < nyquist) {
            return Err(ConfigError::InvalidCutoff {
                cutoff_hz: self.cutoff_hz,
                sample_rate: Some(self.sample_rate),
            });
        }
        if self.order == 0 {
            return Err(ConfigError::InvalidOrder);
        }
        Ok(())
    }

    /// Cutoff as a fraction of the Nyquist frequency, in `(0, 1)`.
    pub fn normalized_cutoff(&self) -> f64 {
        self.cutoff_hz / (self.sample_rate as f64 / 2.0)
    }
}

/// Static precondition violations. These are configuration mistakes and
/// never depend on the captured data.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The cutoff does not sit strictly between 0 and Nyquist. The rate
    /// is absent when the violation was caught before the device had
    /// declared one.
    InvalidCutoff {
        /// The offending cutoff, in Hz.
        cutoff_hz: f64,
        /// The sample rate the cutoff was checked against, if known.
        sample_rate: Option<u32>,
    },
    /// The filter order is zero.
    InvalidOrder,
    /// The decimation factor is zero.
    InvalidDecimation,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConfigError as CE;
        let msg = match self {
            CE::InvalidCutoff {
                cutoff_hz,
                sample_rate: Some(rate),
            } => Cow::from(format!(
                "cutoff {} Hz must sit strictly between 0 and the Nyquist frequency {} Hz",
                cutoff_hz,
                *rate as f64 / 2.0
            )),
            CE::InvalidCutoff {
                cutoff_hz,
                sample_rate: None,
            } => Cow::from(format!("cutoff {} Hz must be positive", cutoff_hz)),
            CE::InvalidOrder => Cow::from("filter order must be at least 1"),
            CE::InvalidDecimation => Cow::from("decimation factor must be at least 1"),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigError {}

/// Checks the rate-independent preconditions. The Nyquist bound needs the
/// device-declared sample rate and is checked by [`FilterSpec::validate`]
/// once the header has arrived.
pub fn validate_static(cutoff_hz: f64, order: usize, factor: usize) -> Result<(), ConfigError> {
    if cutoff_hz <= 0.0 {
        return Err(ConfigError::InvalidCutoff {
            cutoff_hz,
            sample_rate: None,
        });
    }
    if order == 0 {
        return Err(ConfigError::InvalidOrder);
    }
    if factor == 0 {
        return Err(ConfigError::InvalidDecimation);
    }
    Ok(())
}

/// Feedforward (`b`) and feedback (`a`) coefficient sets of a digital IIR
/// filter, `a[0] == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    /// Feedforward taps.
    pub b: Vec<f64>,
    /// Feedback taps.
    pub a: Vec<f64>,
}

/// Designs a digital Butterworth low-pass filter.
///
/// `normalized_cutoff` is the cutoff as a fraction of Nyquist, strictly
/// between 0 and 1. The analog prototype poles sit on the unit circle in
/// the left half-plane; they are scaled to the prewarped cutoff and mapped
/// into the z-plane with the bilinear transform, which also lands `order`
/// zeros at z = -1.
pub fn design_low_pass(order: usize, normalized_cutoff: f64) -> Coefficients {
    debug_assert!(normalized_cutoff > 0.0 && normalized_cutoff < 1.0);
    debug_assert!(order > 0);

    // The prototype is sampled at fs = 2 so that the band edge lands on
    // the requested digital cutoff after warping.
    let fs = 2.0;
    let warped = 2.0 * fs * (PI * normalized_cutoff / fs).tan();

    let n = order as i32;
    let mut poles: Vec<Complex64> = (0..n)
        .map(|k| {
            let theta = PI * (2 * k + 1 - n) as f64 / (2 * n) as f64;
            -(Complex64::i() * theta).exp()
        })
        .collect();

    // Low-pass transform: scale the poles to the warped cutoff.
    let mut gain = warped.powi(n);
    for pole in &mut poles {
        *pole *= warped;
    }

    // Bilinear transform into the z-plane.
    let fs2 = 2.0 * fs;
    let mut denominator = Complex64::new(1.0, 0.0);
    let z_poles: Vec<Complex64> = poles
        .iter()
        .map(|&pole| {
            denominator *= fs2 - pole;
            (fs2 + pole) / (fs2 - pole)
        })
        .collect();
    gain *= (Complex64::new(1.0, 0.0) / denominator).re;

    // The analog zeros at infinity all land at z = -1.
    let z_zeros = vec![Complex64::new(-1.0, 0.0); order];

    let b = expand_roots(&z_zeros)
        .into_iter()
        .map(|coefficient| (coefficient * gain).re)
        .collect();
    let a = expand_roots(&z_poles)
        .into_iter()
        .map(|coefficient| coefficient.re)
        .collect();

    Coefficients { b, a }
}

/// Expands a monic polynomial from its roots, highest power first.
fn expand_roots(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coefficients = vec![Complex64::new(1.0, 0.0)];
    for &root in roots {
        coefficients.push(Complex64::new(0.0, 0.0));
        for i in (1..coefficients.len()).rev() {
            let carry = coefficients[i - 1];
            coefficients[i] -= root * carry;
        }
    }
    coefficients
}

/// Applies the filter causally over the whole input in one pass, direct
/// form II transposed. Output length equals input length, and the numeric
/// trajectory is fully determined by the coefficients and the input.
pub fn lfilter(coefficients: &Coefficients, input: &[f64]) -> Vec<f64> {
    let b = &coefficients.b;
    let a = &coefficients.a;
    let order = b.len().max(a.len()) - 1;
    let a0 = a[0];
    let b_norm: Vec<f64> = (0..=order)
        .map(|i| b.get(i).copied().unwrap_or(0.0) / a0)
        .collect();
    let a_norm: Vec<f64> = (0..=order)
        .map(|i| a.get(i).copied().unwrap_or(0.0) / a0)
        .collect();

    let mut state = vec![0.0f64; order];
    let mut output = Vec::with_capacity(input.len());

    for &x in input {
        let y = b_norm[0] * x + state.first().copied().unwrap_or(0.0);
        for i in 0..order {
            let carried = if i + 1 < order { state[i + 1] } else { 0.0 };
            state[i] = b_norm[i + 1] * x + carried - a_norm[i + 1] * y;
        }
        output.push(y);
    }

    output
}

/// Keeps every `factor`-th element starting from the first. Output length
/// is `ceil(len / factor)`.
pub fn decimate<T: Copy>(input: &[T], factor: usize) -> Vec<T> {
    input.iter().step_by(factor).copied().collect()
}

/// Runs the full multirate stage over `signal`: an anti-alias Butterworth
/// low-pass at `cutoff_hz`, then keep one sample in `factor`.
///
/// The output rate is `signal.sample_rate / factor` by integer division;
/// a fractional remainder is accepted as an approximation.
pub fn downsample(
    signal: &Signal,
    cutoff_hz: f64,
    order: usize,
    factor: usize,
) -> Result<Signal, ConfigError> {
    let spec = FilterSpec {
        cutoff_hz,
        order,
        sample_rate: signal.sample_rate,
    };
    spec.validate()?;
    if factor == 0 {
        return Err(ConfigError::InvalidDecimation);
    }

    let coefficients = design_low_pass(spec.order, spec.normalized_cutoff());
    debug!(
        "order-{} low-pass at {} Hz of {} Hz: b={:?} a={:?}",
        spec.order, spec.cutoff_hz, spec.sample_rate, coefficients.b, coefficients.a
    );

    let wide: Vec<f64> = signal.samples.iter().map(|&s| s as f64).collect();
    let filtered = lfilter(&coefficients, &wide);
    let kept = decimate(&filtered, factor);

    Ok(Signal {
        sample_rate: signal.sample_rate / factor as u32,
        samples: kept.into_iter().map(|s| s as f32).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(got: &[f64], want: &[f64]) {
        assert_eq!(got.len(), want.len());
        for (g, w) in got.iter().zip(want) {
            assert!(
                (g - w).abs() < 1e-12,
                "coefficient mismatch: {} vs {}",
                g,
                w
            );
        }
    }

    #[test]
    fn nyquist_violation_is_a_config_error() {
        let spec = FilterSpec {
            cutoff_hz: 6_000.0,
            order: 4,
            sample_rate: 8_000,
        };
        assert!(matches!(
            spec.validate(),
            Err(ConfigError::InvalidCutoff { .. })
        ));
    }

    #[test]
    fn degenerate_specs_are_rejected() {
        let base = FilterSpec {
            cutoff_hz: 1_000.0,
            order: 4,
            sample_rate: 8_000,
        };

        let zero_cutoff = FilterSpec {
            cutoff_hz: 0.0,
            ..base
        };
        assert!(matches!(
            zero_cutoff.validate(),
            Err(ConfigError::InvalidCutoff { .. })
        ));

        let negative_cutoff = FilterSpec {
            cutoff_hz: -2.5,
            ..base
        };
        assert!(matches!(
            negative_cutoff.validate(),
            Err(ConfigError::InvalidCutoff { .. })
        ));

        let zero_order = FilterSpec { order: 0, ..base };
        assert_eq!(zero_order.validate(), Err(ConfigError::InvalidOrder));

        assert!(base.validate().is_ok());
    }

    // Reference values computed with scipy's butter(N, Wn, btype='low').
    #[test]
    fn second_order_half_band_design() {
        let coefficients = design_low_pass(2, 0.5);
        assert_close(
            &coefficients.b,
            &[0.2928932188134524, 0.5857864376269049, 0.2928932188134524],
        );
        assert_eq!(coefficients.a.len(), 3);
        assert!((coefficients.a[0] - 1.0).abs() < 1e-15);
        assert!(coefficients.a[1].abs() < 1e-15);
        assert!((coefficients.a[2] - 0.1715728752538099).abs() < 1e-12);
    }

    #[test]
    fn fourth_order_quarter_band_design() {
        let coefficients = design_low_pass(4, 0.25);
        assert_close(
            &coefficients.b,
            &[
                0.010209480791203138,
                0.04083792316481255,
                0.061256884747218826,
                0.04083792316481255,
                0.010209480791203138,
            ],
        );
        assert_close(
            &coefficients.a,
            &[
                1.0,
                -1.9684277869385185,
                1.7358607092088867,
                -0.7244708295073626,
                0.12038959989624451,
            ],
        );
    }

    #[test]
    fn impulse_response_matches_reference() {
        let coefficients = design_low_pass(2, 0.5);
        let mut impulse = vec![0.0; 6];
        impulse[0] = 1.0;

        let response = lfilter(&coefficients, &impulse);
        assert_close(
            &response,
            &[
                0.2928932188134524,
                0.5857864376269049,
                0.24264068711928521,
                -0.1005050633883346,
                -0.041630560342615856,
                0.017243942703102984,
            ],
        );
    }

    #[test]
    fn filtering_is_deterministic() {
        let coefficients = design_low_pass(4, 0.25);
        let input: Vec<f64> = (0..512)
            .map(|i| (2.0 * PI * 440.0 * i as f64 / 16_000.0).sin())
            .collect();

        let first = lfilter(&coefficients, &input);
        let second = lfilter(&coefficients, &input);
        assert_eq!(first, second);
    }

    #[test]
    fn passband_survives_and_stopband_dies() {
        let coefficients = design_low_pass(4, 0.25);

        // A tone at 0.9 * Nyquist, well inside the stopband.
        let stop: Vec<f64> = (0..2_000).map(|i| (PI * 0.9 * i as f64).sin()).collect();
        let stop_out = lfilter(&coefficients, &stop);
        let stop_rms = rms(&stop_out[200..]);
        assert!(stop_rms < 1e-3, "stopband rms {}", stop_rms);

        // DC is the heart of the passband; after settling the output
        // follows the input.
        let step = vec![0.5; 200];
        let step_out = lfilter(&coefficients, &step);
        assert!((step_out.last().unwrap() - 0.5).abs() < 1e-3);
    }

    fn rms(samples: &[f64]) -> f64 {
        (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
    }

    #[test]
    fn decimation_length_law() {
        assert_eq!(decimate(&vec![1.0f64; 100], 10).len(), 10);
        assert_eq!(decimate(&vec![1.0f64; 105], 10).len(), 11);
        assert_eq!(decimate(&vec![1.0f64; 9], 10).len(), 1);
        assert_eq!(decimate(&[] as &[f64], 10).len(), 0);
    }

    #[test]
    fn decimation_keeps_every_nth_from_index_zero() {
        let input: Vec<i32> = (0..12).collect();
        assert_eq!(decimate(&input, 3), [0, 3, 6, 9]);
        assert_eq!(decimate(&input, 1), input);
    }

    #[test]
    fn downsample_scales_rate_and_length() {
        let signal = Signal {
            sample_rate: 16_000,
            samples: vec![0.25; 96_000],
        };

        let result = downsample(&signal, 4_000.0, 4, 10).unwrap();
        assert_eq!(result.sample_rate, 1_600);
        assert_eq!(result.samples.len(), 9_600);
    }

    #[test]
    fn downsample_rejects_zero_factor() {
        let signal = Signal {
            sample_rate: 16_000,
            samples: vec![0.0; 16],
        };
        assert_eq!(
            downsample(&signal, 4_000.0, 4, 0),
            Err(ConfigError::InvalidDecimation)
        );
    }

    #[test]
    fn static_validation_catches_what_it_can() {
        assert!(validate_static(4_000.0, 4, 10).is_ok());
        assert!(matches!(
            validate_static(-1.0, 4, 10),
            Err(ConfigError::InvalidCutoff {
                sample_rate: None,
                ..
            })
        ));
        assert_eq!(validate_static(4_000.0, 0, 10), Err(ConfigError::InvalidOrder));
        assert_eq!(
            validate_static(4_000.0, 4, 0),
            Err(ConfigError::InvalidDecimation)
        );
    }
}
