//! Scalar threshold strategy.

use crate::sensing::Measurement;
use crate::signal::SignalSource;

/// Flags movement when the scalar metric exceeds `sensitivity * 0.5`.
///
/// Stateless: every frame is judged on its own.
#[derive(Debug, Clone)]
pub struct ThresholdSignal {
    cutoff: f64,
}

impl ThresholdSignal {
    pub fn new(sensitivity: f64) -> Self {
        Self {
            cutoff: sensitivity * 0.5,
        }
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

impl SignalSource for ThresholdSignal {
    fn sample(&mut self, measurement: &Measurement) -> Option<bool> {
        match measurement {
            Measurement::Scalar { value } => Some(*value > self.cutoff),
            Measurement::NoSubject => Some(false),
            Measurement::Contour { .. } => None,
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "threshold"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_against_half_sensitivity() {
        let mut signal = ThresholdSignal::new(0.6);
        assert_eq!(signal.sample(&Measurement::scalar(0.31)), Some(true));
        assert_eq!(signal.sample(&Measurement::scalar(0.3)), Some(false));
        assert_eq!(signal.sample(&Measurement::scalar(0.0)), Some(false));
    }

    #[test]
    fn test_default_sensitivity_is_out_of_reach() {
        // 6 * 0.5 = 3, above any jaw-openness estimate in [0, 1]
        let mut signal = ThresholdSignal::new(6.0);
        assert_eq!(signal.sample(&Measurement::scalar(1.0)), Some(false));
    }

    #[test]
    fn test_contour_is_not_understood() {
        let mut signal = ThresholdSignal::new(0.5);
        let contour = Measurement::contour([(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        assert_eq!(signal.sample(&contour), None);
    }
}
