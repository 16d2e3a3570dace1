//! Display-ready classifications derived from a [`SignalBundle`].
//!
//! Everything here is pure: no I/O, no clocks. Randomness used by the approximate sparkline comes
//! from a caller-supplied RNG so the output is reproducible.

use crate::model::{Alert, SatelliteTrend, SignalBundle};
use fnv::FnvHasher;
use itertools::Itertools;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::{
    cmp::Reverse,
    f64::consts::TAU,
    hash::Hasher,
};

/// Divergence score above which a region is [`Severity::Critical`].
pub const SEVERITY_CRITICAL_ABOVE: f64 = 70.0;
/// Divergence score above which a region is [`Severity::Elevated`].
pub const SEVERITY_ELEVATED_ABOVE: f64 = 50.0;
/// Divergence score above which a region is [`Severity::Moderate`].
pub const SEVERITY_MODERATE_ABOVE: f64 = 30.0;

/// Band around zero classified as [`Polarity::Neutral`].
pub const POLARITY_DEADBAND: f64 = 0.05;

/// Number of points in an approximate history series.
pub const HISTORY_POINTS: usize = 7;

/// Severity tier of a divergence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Moderate,
    Elevated,
    Critical,
}

impl Severity {
    /// Total over the real line: out-of-range values classify by the same comparisons and NaN
    /// falls through to [`Severity::Low`].
    pub fn from_divergence(score: f64) -> Self {
        if score > SEVERITY_CRITICAL_ABOVE {
            Severity::Critical
        } else if score > SEVERITY_ELEVATED_ABOVE {
            Severity::Elevated
        } else if score > SEVERITY_MODERATE_ABOVE {
            Severity::Moderate
        } else {
            Severity::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Moderate => "MODERATE",
            Severity::Elevated => "ELEVATED",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Direction of physical activity for display.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub enum TrendDirection {
    Growing,
    Declining,
    #[default]
    Stable,
}

impl TrendDirection {
    /// Map a raw trend label, anything unrecognised is stable.
    pub fn from_label(label: &str) -> Self {
        Self::from(SatelliteTrend::from(label))
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrendDirection::Growing => "GROWING",
            TrendDirection::Declining => "DECLINING",
            TrendDirection::Stable => "STABLE",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            TrendDirection::Growing => "▲",
            TrendDirection::Declining => "▼",
            TrendDirection::Stable => "→",
        }
    }
}

impl From<SatelliteTrend> for TrendDirection {
    fn from(value: SatelliteTrend) -> Self {
        match value {
            SatelliteTrend::Expanding => TrendDirection::Growing,
            SatelliteTrend::Contracting => TrendDirection::Declining,
            SatelliteTrend::Stable => TrendDirection::Stable,
        }
    }
}

/// Sign of a bounded signal, shared by satellite, news, market and proxy-fusion readings.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl Polarity {
    pub fn classify(value: f64) -> Self {
        if value > POLARITY_DEADBAND {
            Polarity::Positive
        } else if value < -POLARITY_DEADBAND {
            Polarity::Negative
        } else {
            Polarity::Neutral
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Polarity::Positive => "BULLISH",
            Polarity::Negative => "BEARISH",
            Polarity::Neutral => "NEUTRAL",
        }
    }
}

/// Map a signal in [-1, 1] onto a [0, 100] bar width.
///
/// Out-of-range input is clamped and NaN renders as an empty bar.
pub fn bar_width_pct(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    (((value + 1.0) / 2.0) * 100.0).clamp(0.0, 100.0)
}

/// Illustrative series derived from a single current value.
///
/// This is NOT historical data: the backend does not serve a time series, so renderers must label
/// it as approximate. Replace [`approximate_history_series`] once real history is available.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproximateSeries {
    /// Oldest first; the last point is the current value.
    pub points: [f64; HISTORY_POINTS],
}

impl ApproximateSeries {
    pub const LABEL: &'static str = "approx.";

    pub fn is_approximate(&self) -> bool {
        true
    }

    pub fn current(&self) -> f64 {
        self.points[HISTORY_POINTS - 1]
    }
}

/// Generate a 7-point illustrative series ending at `current`.
///
/// Each older point is the current value pulled back by a linear decay term, plus a sinusoidal
/// variance and a small jitter whose amplitudes grow with age. All points are clamped to
/// `[min, max]`.
pub fn approximate_history_series<R>(
    current: f64,
    (min, max): (f64, f64),
    rng: &mut R,
) -> ApproximateSeries
where
    R: Rng + ?Sized,
{
    const DECAY: f64 = 0.15;
    const WAVE_AMPLITUDE: f64 = 0.08;
    const JITTER_AMPLITUDE: f64 = 0.03;
    const PHASE_STEP: f64 = 1.3;

    let span = (max - min).abs();
    let current = if current.is_nan() { min } else { current.clamp(min, max) };
    let phase = rng.random_range(0.0..TAU);

    let mut points = [current; HISTORY_POINTS];
    for (index, point) in points.iter_mut().enumerate() {
        let age = (HISTORY_POINTS - 1 - index) as f64 / (HISTORY_POINTS - 1) as f64;
        if age == 0.0 {
            continue;
        }

        let decay = current * DECAY * age;
        let wave = span * WAVE_AMPLITUDE * age * (age * PHASE_STEP * TAU + phase).sin();
        let jitter = span * JITTER_AMPLITUDE * age * rng.random_range(-1.0..=1.0);

        *point = (current - decay + wave + jitter).clamp(min, max);
    }

    ApproximateSeries { points }
}

/// Seed for the approximate series of one bundle, stable for a given region and observation.
pub fn series_seed(bundle: &SignalBundle) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(bundle.region_id.as_str().as_bytes());
    hasher.write(bundle.timestamp.as_bytes());
    hasher.finish()
}

/// One bounded signal prepared for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalReading {
    pub value: f64,
    pub polarity: Polarity,
    pub bar_width_pct: f64,
}

impl SignalReading {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            polarity: Polarity::classify(value),
            bar_width_pct: bar_width_pct(value),
        }
    }
}

/// Fused physical proxy index prepared for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionReading {
    pub signal: SignalReading,
    pub agreement_pct: f64,
}

/// Every derived value a renderer needs for one bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalView {
    pub severity: Severity,
    pub trend: TrendDirection,
    pub satellite: SignalReading,
    pub news: SignalReading,
    pub market: Option<SignalReading>,
    pub fusion: Option<FusionReading>,
    pub divergence_history: ApproximateSeries,
    /// Most severe first.
    pub alerts: Vec<Alert>,
}

impl SignalView {
    pub fn from_bundle(bundle: &SignalBundle) -> Self {
        let mut rng = StdRng::seed_from_u64(series_seed(bundle));

        Self {
            severity: Severity::from_divergence(bundle.divergence_score),
            trend: TrendDirection::from(bundle.satellite_raw.trend),
            satellite: SignalReading::new(bundle.satellite_score),
            news: SignalReading::new(bundle.news_score),
            market: bundle.market_score.map(SignalReading::new),
            fusion: bundle.physical_fusion.as_ref().map(|fusion| FusionReading {
                signal: SignalReading::new(fusion.fused_signal),
                agreement_pct: (fusion.agreement * 100.0).clamp(0.0, 100.0),
            }),
            divergence_history: approximate_history_series(
                bundle.divergence_score,
                (0.0, 100.0),
                &mut rng,
            ),
            alerts: bundle
                .alerts
                .iter()
                .cloned()
                .sorted_by_key(|alert| Reverse(alert.level))
                .collect(),
        }
    }
}
