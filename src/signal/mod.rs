//! Signal sources: turn one frame's measurement into a "movement" sample.
//!
//! Two strategies exist and are picked once, when the engine is built:
//!
//! - [`ThresholdSignal`] compares a scalar jaw-openness metric against the
//!   configured sensitivity.
//! - [`AreaRatioSignal`] measures the inner-lip contour area each frame and
//!   flags movement when it changes by more than a cutoff relative to the
//!   previous frame.
//!
//! Frames without a tracked face always yield `false`.

pub mod area_ratio;
pub mod threshold;

use crate::config::{Config, SignalKind};
use crate::sensing::Measurement;

pub use area_ratio::{polygon_area, triangle_area, AreaRatioSignal};
pub use threshold::ThresholdSignal;

/// Producer of one boolean movement sample per frame.
pub trait SignalSource: Send {
    /// Fold a frame into the source.
    ///
    /// Returns `None` when the frame produces no sample (the first contour
    /// frame, or a measurement kind this strategy does not understand).
    fn sample(&mut self, measurement: &Measurement) -> Option<bool>;

    /// Forget any previous-frame state.
    fn reset(&mut self);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Build the signal source selected by `config`.
pub fn from_config(config: &Config) -> Box<dyn SignalSource> {
    match config.signal() {
        SignalKind::Threshold => Box::new(ThresholdSignal::new(config.sensitivity())),
        SignalKind::AreaRatio => Box::new(AreaRatioSignal::new(config.area_ratio_cutoff())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_picks_strategy() {
        let mut config = Config::default();
        assert_eq!(from_config(&config).name(), "area_ratio");

        config.set_signal(SignalKind::Threshold);
        assert_eq!(from_config(&config).name(), "threshold");
    }

    #[test]
    fn test_no_subject_is_never_movement() {
        let config = Config::default();
        let mut sources = vec![
            from_config(&config),
            Box::new(ThresholdSignal::new(-10.0)) as Box<dyn SignalSource>,
        ];
        for source in sources.iter_mut() {
            assert_eq!(source.sample(&Measurement::NoSubject), Some(false));
        }
    }
}
