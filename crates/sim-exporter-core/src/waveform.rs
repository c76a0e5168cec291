//! Waveform generation: elapsed time to value.
//!
//! Each item repeats its waveform every `interval`, measured from a common
//! start time. `phase` is the position within the current interval, in [0, 1).
//!
//! ```text
//!   asc    /|  /|       desc  |\  |\       sin   /\
//!         / | / |             | \ | \          /  \    /
//!        /  |/  |             |  \|  \              \/
//! ```

use std::f64::consts::TAU;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::error::GenerateError;
use crate::model::{MetricItem, WaveFunc};

/// Time elapsed since `start`, reduced modulo `interval`.
///
/// Always in `[0, interval)`, also when `now` lies before `start`.
pub fn phase_offset(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    interval: Duration,
) -> Result<Duration, GenerateError> {
    let interval_ns = interval.as_nanos() as i128;
    if interval_ns == 0 {
        return Err(GenerateError::InvalidInterval);
    }
    let since = now - start;
    let since_ns = i128::from(since.num_seconds()) * 1_000_000_000 + i128::from(since.subsec_nanos());
    let offset = since_ns.rem_euclid(interval_ns);
    Ok(Duration::from_nanos(offset as u64))
}

/// Fraction of the interval elapsed, in [0, 1).
pub fn phase(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    interval: Duration,
) -> Result<f64, GenerateError> {
    let elapsed = phase_offset(start, now, interval)?;
    Ok(elapsed.as_nanos() as f64 / interval.as_nanos() as f64)
}

/// Current value of `item`, using the thread-local RNG for `rand`.
pub fn generate(
    item: &MetricItem,
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<f64, GenerateError> {
    generate_with_rng(item, start, now, &mut rand::rng())
}

pub fn generate_with_rng<R: Rng>(
    item: &MetricItem,
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<f64, GenerateError> {
    if item.is_constant() {
        return Ok(item.min);
    }

    let phase = phase(start, now, item.interval)?;
    let (min, max) = (item.min, item.max);

    let value = match &item.func {
        WaveFunc::Rand => lerp(min, max, rng.random::<f64>()),
        WaveFunc::Asc => lerp(min, max, phase),
        WaveFunc::Desc => lerp(max, min, phase),
        WaveFunc::Sin => {
            // halves first: max - min overflows for bounds near f64::MAX
            let mid = min / 2.0 + max / 2.0;
            let amp = max / 2.0 - min / 2.0;
            mid + amp * (phase * TAU).sin()
        }
        WaveFunc::Unrecognized(name) => return Err(GenerateError::UnknownFunction(name.clone())),
    };
    Ok(value.max(min).min(max))
}

/// Point at fraction `t` between `from` and `to`, finite for any finite bounds.
fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from * (1.0 - t) + to * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const EPS: f64 = 1e-9;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn item(func: WaveFunc, secs: u64) -> MetricItem {
        MetricItem::new(10.0, 20.0, func, Duration::from_secs(secs))
    }

    fn at(item: &MetricItem, offset: TimeDelta) -> f64 {
        generate(item, start(), start() + offset).unwrap()
    }

    #[test]
    fn test_phase_offset_wraps() {
        let cases = [
            (123_456_789, 100, 89),
            (10, 9, 1),
            (60, 60, 0),
            (60, 100, 60),
        ];
        for (since, interval, want) in cases {
            let got = phase_offset(
                start(),
                start() + TimeDelta::seconds(since),
                Duration::from_secs(interval),
            )
            .unwrap();
            assert_eq!(got, Duration::from_secs(want), "{}s mod {}s", since, interval);
        }
    }

    #[test]
    fn test_phase_offset_before_start() {
        let got = phase_offset(
            start(),
            start() - TimeDelta::seconds(10),
            Duration::from_secs(60),
        )
        .unwrap();
        assert_eq!(got, Duration::from_secs(50));
    }

    #[test]
    fn test_phase_offset_range() {
        let interval = Duration::from_millis(1_337);
        for ms in (0..50_000).step_by(97) {
            let off = phase_offset(start(), start() + TimeDelta::milliseconds(ms), interval).unwrap();
            assert!(off < interval);
        }
    }

    #[test]
    fn test_zero_interval() {
        assert_eq!(
            phase_offset(start(), start(), Duration::ZERO),
            Err(GenerateError::InvalidInterval)
        );
        let bad = MetricItem::new(1.0, 2.0, WaveFunc::Asc, Duration::ZERO);
        assert_eq!(
            generate(&bad, start(), start()),
            Err(GenerateError::InvalidInterval)
        );
    }

    #[test]
    fn test_constant_ignores_func_and_time() {
        for func in [
            WaveFunc::Rand,
            WaveFunc::Asc,
            WaveFunc::Sin,
            WaveFunc::Unrecognized("cos".into()),
        ] {
            let c = MetricItem::new(10.0, 10.0, func, Duration::ZERO);
            for secs in [0, 1, 59, 3600] {
                assert_eq!(at(&c, TimeDelta::seconds(secs)), 10.0);
            }
        }
    }

    #[test]
    fn test_asc_ramp() {
        let asc = item(WaveFunc::Asc, 60);
        assert!((at(&asc, TimeDelta::zero()) - 10.0).abs() < EPS);
        assert!((at(&asc, TimeDelta::seconds(30)) - 15.0).abs() < EPS);
        assert!((at(&asc, TimeDelta::milliseconds(59_999)) - 20.0).abs() < 1e-3);
        // sawtooth reset
        assert!((at(&asc, TimeDelta::seconds(60)) - 10.0).abs() < EPS);
    }

    #[test]
    fn test_desc_mirrors_asc() {
        let asc = item(WaveFunc::Asc, 60);
        let desc = item(WaveFunc::Desc, 60);
        for ms in [0, 15_000, 30_000, 59_999] {
            let offset = TimeDelta::milliseconds(ms);
            assert!((at(&asc, offset) + at(&desc, offset) - 30.0).abs() < EPS);
        }
        assert!((at(&desc, TimeDelta::zero()) - 20.0).abs() < EPS);
    }

    #[test]
    fn test_sin_quarters() {
        let sin = item(WaveFunc::Sin, 100);
        assert!((at(&sin, TimeDelta::zero()) - 15.0).abs() < EPS);
        assert!((at(&sin, TimeDelta::seconds(25)) - 20.0).abs() < EPS);
        assert!((at(&sin, TimeDelta::seconds(50)) - 15.0).abs() < EPS);
        assert!((at(&sin, TimeDelta::seconds(75)) - 10.0).abs() < EPS);
        assert!((at(&sin, TimeDelta::seconds(100)) - 15.0).abs() < EPS);
    }

    #[test]
    fn test_rand_stays_in_range() {
        let r = item(WaveFunc::Rand, 60);
        let mut rng = StdRng::seed_from_u64(7);
        for i in 0..10_000 {
            let v = generate_with_rng(&r, start(), start() + TimeDelta::seconds(i), &mut rng)
                .unwrap();
            assert!((10.0..=20.0).contains(&v), "{} out of range", v);
        }
    }

    #[test]
    fn test_extreme_bounds_stay_finite() {
        let mut rng = StdRng::seed_from_u64(7);
        for func in WaveFunc::ALL {
            let wide = MetricItem::new(-1e308, 1e308, func.clone(), Duration::from_secs(60));
            for secs in [0, 15, 30, 45, 59] {
                let now = start() + TimeDelta::seconds(secs);
                let v = generate_with_rng(&wide, start(), now, &mut rng).unwrap();
                assert!(v.is_finite(), "{} at {}s gave {}", func, secs, v);
                assert!((-1e308..=1e308).contains(&v));
            }
        }

        let top = MetricItem::new(f64::MAX / 2.0, f64::MAX, WaveFunc::Sin, Duration::from_secs(60));
        let v = generate(&top, start(), start() + TimeDelta::seconds(15)).unwrap();
        assert!(v.is_finite());
    }

    #[test]
    fn test_unknown_func_is_internal_error() {
        let bad = item(WaveFunc::Unrecognized("cos".into()), 60);
        let err = generate(&bad, start(), start()).unwrap_err();
        assert!(err.is_internal());
    }
}
