use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::{
    adc::{AdcLines, Hx711, RawSample},
    error::CalibrationError,
};

/// ADC access is exclusive: the sampler and tare requests take turns on it.
pub type SharedEstimator<L> = Arc<Mutex<WeightEstimator<L>>>;

/// Zero point and counts-per-unit for the load cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    offset: RawSample,
    scale: f32,
}

impl Calibration {
    pub fn new(scale: f32) -> Result<Self, CalibrationError> {
        if !scale.is_finite() {
            return Err(CalibrationError::NonFinite(scale));
        }
        if scale == 0.0 {
            return Err(CalibrationError::ZeroScale);
        }
        Ok(Self { offset: 0, scale })
    }

    pub fn offset(&self) -> RawSample {
        self.offset
    }

    pub fn to_units(&self, raw: RawSample) -> f32 {
        (i64::from(raw) - i64::from(self.offset)) as f32 / self.scale
    }
}

pub struct WeightEstimator<L> {
    adc: Hx711<L>,
    calibration: Calibration,
}

impl<L: AdcLines> WeightEstimator<L> {
    pub fn new(adc: Hx711<L>, calibration: Calibration) -> Self {
        Self { adc, calibration }
    }

    pub fn into_shared(self) -> SharedEstimator<L> {
        Arc::new(Mutex::new(self))
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Truncated mean of `times` consecutive reads. Zero is treated as one.
    pub fn read_averaged(&mut self, times: usize) -> RawSample {
        let times = times.max(1);
        let sum: i64 = (0..times).map(|_| i64::from(self.adc.read_raw())).sum();
        let mean = sum / times as i64;
        debug!("Averaged {} reads to {}", times, mean);
        // The mean of i32 values always fits back in an i32
        mean as RawSample
    }

    /// Makes the current load the zero point.
    pub fn tare(&mut self, times: usize) {
        self.calibration.offset = self.read_averaged(times);
        info!("Tared at raw offset {}", self.calibration.offset);
    }

    pub fn to_units(&mut self, times: usize) -> f32 {
        let raw = self.read_averaged(times);
        self.calibration.to_units(raw)
    }

    #[cfg(test)]
    pub(crate) fn adc(&self) -> &Hx711<L> {
        &self.adc
    }

    #[cfg(test)]
    pub(crate) fn set_offset(&mut self, offset: RawSample) {
        self.calibration.offset = offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adc::{testing::SimulatedConverter, Gain};

    fn estimator(codes: impl IntoIterator<Item = u32>, scale: f32) -> WeightEstimator<SimulatedConverter> {
        WeightEstimator::new(
            Hx711::new(SimulatedConverter::new(codes), Gain::A128),
            Calibration::new(scale).unwrap(),
        )
    }

    #[test]
    fn test_zero_scale_rejected() {
        assert_eq!(Calibration::new(0.0), Err(CalibrationError::ZeroScale));
        assert_eq!(Calibration::new(-0.0), Err(CalibrationError::ZeroScale));
        assert!(matches!(
            Calibration::new(f32::NAN),
            Err(CalibrationError::NonFinite(_))
        ));
    }

    #[test]
    fn test_single_read_is_unchanged() {
        let mut scale = estimator([0x00_1234], 1.0);
        assert_eq!(scale.read_averaged(1), 0x1234);
    }

    #[test]
    fn test_average_truncates() {
        let mut scale = estimator([10, 11, 11], 1.0);
        assert_eq!(scale.read_averaged(3), 10);
        assert_eq!(scale.adc().lines().reads(), 3);
    }

    #[test]
    fn test_negative_average_truncates_toward_zero() {
        // -1, -2 -> -1.5
        let mut scale = estimator([0xFF_FFFF, 0xFF_FFFE], 1.0);
        assert_eq!(scale.read_averaged(2), -1);
    }

    #[test]
    fn test_zero_times_reads_once() {
        let mut scale = estimator([7], 1.0);
        assert_eq!(scale.read_averaged(0), 7);
    }

    #[test]
    fn test_tare_then_read_is_near_zero() {
        let mut scale = WeightEstimator::new(
            Hx711::new(SimulatedConverter::steady(8_000_000), Gain::A128),
            Calibration::new(-1100.0).unwrap(),
        );
        scale.tare(10);

        assert_eq!(scale.calibration().offset(), 8_000_000);
        assert!(scale.to_units(1).abs() < 1e-6);
    }

    #[test]
    fn test_to_units_applies_offset_and_scale() {
        let mut scale = estimator([7_999_450], -1100.0);
        scale.set_offset(8_000_000);

        let grams = scale.to_units(1);
        assert!((grams - 0.5).abs() < 1e-6, "got {grams}");
    }
}
