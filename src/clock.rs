//! Sample clocks derived from a fixed timebase by integer division.
//!
//! The digitizer can only run at `reference_hz / n` for a whole number of
//! timebase ticks `n`. Requested rates that are not of that form are coerced
//! to one that is, and the direction of the coercion depends on which
//! release wrote the file.
use log::warn;

use crate::error::WavesurferError;

/// Timebase of the acquisition hardware.
pub const DEFAULT_REFERENCE_HZ: f64 = 100e6;

// relative distance from a whole tick count treated as exact
const TICK_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockConfig {
    pub reference_hz: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            reference_hz: DEFAULT_REFERENCE_HZ,
        }
    }
}

impl ClockConfig {
    /// Timebase ticks per sample at `rate`, not rounded.
    pub fn ticks_per_sample(&self, rate: f64) -> f64 {
        self.reference_hz / rate
    }
}

/// How a fractional tick count is made whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Floor,
    /// Nearest whole tick count, ties to even.
    NearestEven,
}

/// Coerces `nominal` to the closest rate the timebase can produce.
///
/// The result is always `reference_hz / n` for a whole tick count `n`. Rates
/// within rounding error of a whole tick count snap to that count without a
/// warning, so applying this to its own output is a no-op.
pub fn reconcile(
    nominal: f64,
    clock: &ClockConfig,
    rounding: Rounding,
) -> Result<f64, WavesurferError> {
    if !(clock.reference_hz.is_finite() && clock.reference_hz > 0.0) {
        return Err(WavesurferError::InvalidSampleRate(clock.reference_hz));
    }
    if !(nominal.is_finite() && nominal > 0.0) {
        return Err(WavesurferError::InvalidSampleRate(nominal));
    }
    let exact = clock.ticks_per_sample(nominal);
    let nearest = exact.round_ties_even();
    if nearest >= 1.0 && (exact - nearest).abs() <= TICK_TOLERANCE * exact {
        return Ok(clock.reference_hz / nearest);
    }
    let ticks = match rounding {
        Rounding::Floor => exact.floor(),
        Rounding::NearestEven => nearest,
    }
    .max(1.0);
    let rate = clock.reference_hz / ticks;
    warn!("coerced sample rate {nominal} Hz to {rate} Hz ({ticks} ticks, {rounding:?})");
    Ok(rate)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn ticks(rate: f64) -> f64 {
        ClockConfig::default().ticks_per_sample(rate)
    }

    #[test]
    fn test_thirty_khz() -> eyre::Result<()> {
        let clock = ClockConfig::default();
        let acq = reconcile(30000.0, &clock, Rounding::Floor)?;
        let stim = reconcile(30000.0, &clock, Rounding::NearestEven)?;
        assert_eq!(ticks(acq), 3333.0);
        assert_eq!(ticks(stim), 3333.0);
        assert!((acq - 30003.0003).abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn test_rounding_asymmetry() -> eyre::Result<()> {
        let clock = ClockConfig::default();
        let acq = reconcile(29997.0, &clock, Rounding::Floor)?;
        let stim = reconcile(29997.0, &clock, Rounding::NearestEven)?;
        assert_eq!(ticks(acq), 3333.0);
        assert_eq!(ticks(stim), 3334.0);
        Ok(())
    }

    #[test]
    fn test_near_whole_ticks_snap() -> eyre::Result<()> {
        let clock = ClockConfig::default();
        // 3333.000000003333 ticks
        for rounding in [Rounding::Floor, Rounding::NearestEven] {
            let rate = reconcile(30003.0003, &clock, rounding)?;
            assert_eq!(rate, 100e6 / 3333.0);
            assert_eq!(ticks(rate), 3333.0);
            assert_eq!(reconcile(rate, &clock, rounding)?, rate);
        }
        Ok(())
    }

    #[test]
    fn test_exact_rates_untouched() -> eyre::Result<()> {
        let clock = ClockConfig::default();
        assert_eq!(reconcile(20e3, &clock, Rounding::Floor)?, 20e3);
        assert_eq!(reconcile(20e3, &clock, Rounding::NearestEven)?, 20e3);
        Ok(())
    }

    #[test]
    fn test_ties_to_even() -> eyre::Result<()> {
        let clock = ClockConfig { reference_hz: 10.0 };
        // 2.5 ticks
        assert_eq!(reconcile(4.0, &clock, Rounding::NearestEven)?, 5.0);
        // 3.5 ticks
        let clock = ClockConfig { reference_hz: 7.0 };
        assert_eq!(reconcile(2.0, &clock, Rounding::NearestEven)?, 1.75);
        Ok(())
    }

    #[test]
    fn test_faster_than_reference() -> eyre::Result<()> {
        let clock = ClockConfig { reference_hz: 1000.0 };
        assert_eq!(reconcile(2500.0, &clock, Rounding::Floor)?, 1000.0);
        Ok(())
    }

    #[test]
    fn test_invalid_rates() {
        let clock = ClockConfig::default();
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                reconcile(rate, &clock, Rounding::Floor),
                Err(WavesurferError::InvalidSampleRate(_))
            ));
        }
        let broken = ClockConfig { reference_hz: 0.0 };
        assert!(reconcile(1.0, &broken, Rounding::Floor).is_err());
    }

    proptest! {
        #[test]
        fn reconcile_is_idempotent(rate in 1.0f64..1.0e6, floor in any::<bool>()) {
            let clock = ClockConfig::default();
            let rounding = if floor { Rounding::Floor } else { Rounding::NearestEven };
            let once = reconcile(rate, &clock, rounding).unwrap();
            let twice = reconcile(once, &clock, rounding).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn reconciled_rate_is_whole_ticks(rate in 1.0f64..1.0e6) {
            let clock = ClockConfig::default();
            let once = reconcile(rate, &clock, Rounding::NearestEven).unwrap();
            let ticks = clock.ticks_per_sample(once).round();
            prop_assert!(ticks >= 1.0);
            prop_assert_eq!(once, clock.reference_hz / ticks);
        }
    }
}
