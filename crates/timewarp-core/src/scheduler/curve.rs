use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

/// User-supplied interval function for [`Curve::Custom`] tasks.
///
/// Arguments are `(elapsed, duration, amplitude, scale)` in milliseconds
/// (scale is unitless). The returned raw interval may be any sign or
/// magnitude; the engine clamps it afterward.
pub type CurveFn = Arc<dyn Fn(f64, f64, f64, f64) -> f64 + Send + Sync>;

/// Interval curve shape for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    Linear,
    Sinusoidal,
    Exponential,
    Logarithmic,
    Custom,
}

impl Curve {
    /// Raw (unclamped, undistorted) interval in milliseconds.
    ///
    /// `elapsed` is the time since the task's last execution. The custom
    /// slot is consulted only for [`Curve::Custom`]; evaluating a custom
    /// task without a function is an error surfaced per tick, not a panic.
    pub(crate) fn evaluate(
        self,
        custom: Option<&CurveFn>,
        elapsed: f64,
        duration: f64,
        amplitude: f64,
        scale: f64,
    ) -> Result<f64> {
        let raw = match self {
            Curve::Linear => amplitude * scale,
            // The additive 0.5 base keeps troughs away from zero; without it
            // the interval collapses whenever sin crosses zero.
            Curve::Sinusoidal => {
                amplitude * (0.5 + 0.5 * (PI * elapsed / duration).sin().abs()) * scale
            }
            Curve::Exponential => amplitude * (-elapsed / duration).exp() * scale,
            Curve::Logarithmic => amplitude * (elapsed / duration).ln_1p() * scale,
            Curve::Custom => {
                let f = custom.ok_or(SchedulerError::MissingCustomCurve)?;
                f(elapsed, duration, amplitude, scale)
            }
        };
        Ok(raw)
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Curve::Linear => "linear",
            Curve::Sinusoidal => "sinusoidal",
            Curve::Exponential => "exponential",
            Curve::Logarithmic => "logarithmic",
            Curve::Custom => "custom",
        };
        f.write_str(name)
    }
}

impl FromStr for Curve {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(Curve::Linear),
            "sinusoidal" => Ok(Curve::Sinusoidal),
            "exponential" => Ok(Curve::Exponential),
            "logarithmic" => Ok(Curve::Logarithmic),
            "custom" => Ok(Curve::Custom),
            other => Err(SchedulerError::UnsupportedCurve {
                curve: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_curves() {
        assert_eq!("linear".parse::<Curve>().unwrap(), Curve::Linear);
        assert_eq!("sinusoidal".parse::<Curve>().unwrap(), Curve::Sinusoidal);
        assert_eq!("custom".parse::<Curve>().unwrap(), Curve::Custom);
    }

    #[test]
    fn parse_unknown_curve_names_valid_ones() {
        let err = "triangular".parse::<Curve>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("triangular"));
        assert!(msg.contains("linear, sinusoidal, exponential, logarithmic, or custom"));
    }

    #[test]
    fn linear_ignores_elapsed() {
        let a = Curve::Linear.evaluate(None, 0.0, 1000.0, 100.0, 1.0).unwrap();
        let b = Curve::Linear.evaluate(None, 5000.0, 1000.0, 100.0, 1.0).unwrap();
        assert_eq!(a, 100.0);
        assert_eq!(b, 100.0);
    }

    #[test]
    fn sinusoidal_has_half_amplitude_floor() {
        // At elapsed 0 (and every multiple of duration) sin is zero, leaving
        // the 0.5 base.
        let at_trough = Curve::Sinusoidal
            .evaluate(None, 0.0, 10_000.0, 1000.0, 1.0)
            .unwrap();
        assert!((at_trough - 500.0).abs() < 1e-9);

        // At half the period the curve peaks at the full amplitude.
        let at_peak = Curve::Sinusoidal
            .evaluate(None, 5000.0, 10_000.0, 1000.0, 1.0)
            .unwrap();
        assert!((at_peak - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn exponential_decays_from_amplitude() {
        let start = Curve::Exponential
            .evaluate(None, 0.0, 1000.0, 800.0, 1.0)
            .unwrap();
        let later = Curve::Exponential
            .evaluate(None, 2000.0, 1000.0, 800.0, 1.0)
            .unwrap();
        assert_eq!(start, 800.0);
        assert!(later < start);
        assert!(later > 0.0);
    }

    #[test]
    fn logarithmic_starts_at_zero_and_grows() {
        let start = Curve::Logarithmic
            .evaluate(None, 0.0, 1000.0, 800.0, 1.0)
            .unwrap();
        let later = Curve::Logarithmic
            .evaluate(None, 3000.0, 1000.0, 800.0, 1.0)
            .unwrap();
        assert_eq!(start, 0.0);
        assert!(later > 0.0);
    }

    #[test]
    fn custom_receives_all_arguments() {
        let f: CurveFn = Arc::new(|elapsed, duration, amplitude, scale| {
            elapsed + duration + amplitude + scale
        });
        let raw = Curve::Custom
            .evaluate(Some(&f), 1.0, 2.0, 3.0, 4.0)
            .unwrap();
        assert_eq!(raw, 10.0);
    }

    #[test]
    fn custom_without_function_errors() {
        let err = Curve::Custom
            .evaluate(None, 0.0, 1000.0, 100.0, 1.0)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::MissingCustomCurve));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Curve::Sinusoidal).unwrap(), "\"sinusoidal\"");
        let back: Curve = serde_json::from_str("\"logarithmic\"").unwrap();
        assert_eq!(back, Curve::Logarithmic);
    }
}
