//! Coordinate axes: origin, extent, resolution and spacing checks.

use serde::{Deserialize, Serialize};

use crate::attribute::{find, get_attribute, Attribute};
use crate::store::ElementType;

/// Value returned where a coordinate or level cannot be determined
pub const FLOAT_MISSING: f64 = 32700.0;

/// Largest spacing difference tolerated between neighbouring samples
pub const MAX_COORDINATE_RESOLUTION_ERROR: f64 = 1e-4;

const MAX_DECIMAL_DIGITS: usize = 8;

/// Units whose coordinate deltas need scaling
const UNIT_FACTORS: &[(&str, f64)] = &[("100  km", 100.0), ("100 km", 100.0)];

/// How values widened from single precision are reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecisionMode {
    /// Return the widened value as is
    #[default]
    Native,
    /// Round to the decimal digits the single precision value shows
    MatchSource,
}

impl PrecisionMode {
    /// Round `value` to its own decimal digit count when it came from a float.
    pub fn same_precision(self, value: f64, source: ElementType) -> f64 {
        self.with_digits(value, number_of_decimal_digits(value), source)
    }

    /// Round `value` to `digits` decimals when it came from a float.
    pub fn with_digits(self, value: f64, digits: usize, source: ElementType) -> f64 {
        match (self, source) {
            (PrecisionMode::MatchSource, ElementType::Float) => to_precision(value, digits),
            _ => value,
        }
    }
}

/// Decimal digits in the six-decimal rendering of `value` once trailing
/// zeros are dropped, capped at eight.
pub fn number_of_decimal_digits(value: f64) -> usize {
    let text = format!("{:.6}", value);
    let trimmed = text.trim_end_matches('0');
    let digits = trimmed
        .find('.')
        .map(|dot| trimmed.len() - dot - 1)
        .unwrap_or(0);
    digits.min(MAX_DECIMAL_DIGITS)
}

/// `value` rounded through its decimal text with `digits` decimals.
pub fn to_precision(value: f64, digits: usize) -> f64 {
    format!("{:.*}", digits, value).parse().unwrap_or(value)
}

/// Largest jump in spacing between neighbouring samples, or 0 when the
/// spacing stays within [`MAX_COORDINATE_RESOLUTION_ERROR`].
///
/// Samples equal to -1 are treated as gaps.
pub fn resolution_drift(samples: &[f64]) -> f64 {
    let Some(&first) = samples.first() else {
        return 0.0;
    };
    let mut previous = first;
    let mut previous_step: Option<f64> = None;

    for &value in &samples[1..] {
        if value == -1.0 || previous == -1.0 {
            previous = value;
            continue;
        }
        let step = value - previous;
        let reference = *previous_step.get_or_insert(step);
        let drift = (step - reference).abs();
        if drift > MAX_COORDINATE_RESOLUTION_ERROR {
            return drift;
        }
        previous_step = Some(step);
        previous = value;
    }
    0.0
}

/// Outcome of a resolution computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Resolution {
    pub value: f64,
    /// Only missing or constant coordinates were found
    pub degenerate: bool,
}

/// One horizontal coordinate variable and its samples
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateAxis {
    pub variable: String,
    pub element: ElementType,
    /// Length of the axis dimension
    pub size: usize,
    pub missing_value: Option<f64>,
    pub units: Option<String>,
    /// All samples in file order
    samples: Vec<f64>,
    flipped: bool,
}

impl CoordinateAxis {
    pub fn new(
        variable: impl Into<String>,
        element: ElementType,
        size: usize,
        samples: Vec<f64>,
        attributes: &[Attribute],
    ) -> Self {
        Self {
            variable: variable.into(),
            element,
            size,
            missing_value: find(attributes, "missing_value").and_then(|v| v.as_f64()),
            units: get_attribute(attributes, "units"),
            samples,
            flipped: false,
        }
    }

    /// Reverse the read order of the samples.
    pub fn with_flip(mut self, flipped: bool) -> Self {
        self.flipped = flipped;
        self
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Samples in file order.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Samples in read order.
    pub fn values(&self) -> Vec<f64> {
        let mut values = self.samples.clone();
        if self.flipped {
            values.reverse();
        }
        values
    }

    /// First sample in read order.
    pub fn origin(&self, mode: PrecisionMode) -> Option<f64> {
        let value = if self.flipped {
            self.samples.last()
        } else {
            self.samples.first()
        };
        value.map(|&v| mode.same_precision(v, self.element))
    }

    /// Last sample in read order.
    pub fn extent(&self, mode: PrecisionMode) -> Option<f64> {
        let value = if self.flipped {
            self.samples.first()
        } else {
            self.samples.last()
        };
        value.map(|&v| mode.same_precision(v, self.element))
    }

    /// Spacing check over the samples in read order.
    pub fn drift(&self) -> f64 {
        if self.samples.len() > 1 {
            resolution_drift(&self.values())
        } else {
            0.0
        }
    }

    fn is_missing(&self, value: f64) -> bool {
        self.missing_value
            .map(|missing| value as f32 == missing as f32)
            .unwrap_or(false)
    }

    /// Uniform spacing between samples.
    ///
    /// Uses the first and last sample of the axis dimension. When either is
    /// the declared missing value, the first valid pair of distinct samples is
    /// used instead.
    pub fn resolution(&self, mode: PrecisionMode) -> Resolution {
        let size = self.size.min(self.samples.len());
        if size < 2 {
            return Resolution {
                value: 0.0,
                degenerate: false,
            };
        }

        let first = self.samples[0];
        let last = self.samples[size - 1];
        let (delta, intervals, digit_sources, degenerate) =
            if self.is_missing(first) || self.is_missing(last) {
                match self.first_valid_pair() {
                    Some((a, b)) => ((b - a).abs(), 1.0, vec![a, b], false),
                    None => (0.0, 1.0, vec![], true),
                }
            } else {
                let second = self.samples[1];
                (
                    (last - first).abs(),
                    (size - 1) as f64,
                    vec![first, second, last],
                    false,
                )
            };

        let factor = self
            .units
            .as_deref()
            .and_then(|units| UNIT_FACTORS.iter().find(|(name, _)| *name == units))
            .map(|&(_, factor)| factor)
            .unwrap_or(1.0);

        let digits = digit_sources
            .iter()
            .map(|&v| number_of_decimal_digits(v))
            .max()
            .unwrap_or(0);

        Resolution {
            value: mode.with_digits(delta * factor / intervals, digits, self.element),
            degenerate,
        }
    }

    fn first_valid_pair(&self) -> Option<(f64, f64)> {
        let start = self.samples.iter().position(|&v| !self.is_missing(v))?;
        let a = self.samples[start];
        let b = self.samples[start + 1..]
            .iter()
            .copied()
            .find(|&v| !self.is_missing(v) && v != a)?;
        Some((a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeValue;

    fn axis(samples: Vec<f64>, attributes: &[Attribute]) -> CoordinateAxis {
        CoordinateAxis::new("x", ElementType::Float, samples.len(), samples, attributes)
    }

    #[test]
    fn test_regular_axis() {
        let axis = axis(vec![10.0, 10.5, 11.0, 11.5], &[]);
        assert_eq!(axis.origin(PrecisionMode::Native), Some(10.0));
        assert_eq!(axis.extent(PrecisionMode::Native), Some(11.5));
        let resolution = axis.resolution(PrecisionMode::Native);
        assert_eq!(resolution.value, 0.5);
        assert!(!resolution.degenerate);
        assert_eq!(axis.drift(), 0.0);
    }

    #[test]
    fn test_resolution_times_intervals_is_span() {
        let samples: Vec<f64> = (0..7).map(|i| -3.25 + i as f64 * 0.125).collect();
        let axis = axis(samples, &[]);
        let span = (axis.extent(PrecisionMode::Native).unwrap()
            - axis.origin(PrecisionMode::Native).unwrap())
        .abs();
        let resolution = axis.resolution(PrecisionMode::Native).value;
        assert!((resolution * 6.0 - span).abs() < 1e-9);
    }

    #[test]
    fn test_missing_sentinels_use_first_valid_pair() {
        let missing = -999.0;
        let axis = axis(
            vec![missing, missing, 5.0, 5.5, 6.0],
            &[Attribute::new(
                "missing_value",
                AttributeValue::Floats(vec![missing as f32]),
            )],
        );
        let resolution = axis.resolution(PrecisionMode::Native);
        assert_eq!(resolution.value, 0.5);
        assert!(!resolution.degenerate);
    }

    #[test]
    fn test_only_missing_is_degenerate() {
        let axis = axis(
            vec![1e20, 1e20, 1e20],
            &[Attribute::new("missing_value", AttributeValue::Doubles(vec![1e20]))],
        );
        let resolution = axis.resolution(PrecisionMode::Native);
        assert!(resolution.degenerate);
        assert_eq!(resolution.value, 0.0);
    }

    #[test]
    fn test_unit_factor() {
        let axis = axis(
            vec![0.0, 0.05, 0.1],
            &[Attribute::new("units", "100  km".into())],
        );
        let value = axis.resolution(PrecisionMode::Native).value;
        assert!((value - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_flip_reverses_and_restores() {
        let unflipped = axis(vec![1.0, 2.0, 3.0], &[]);
        let flipped = unflipped.clone().with_flip(true);
        assert_eq!(flipped.values(), vec![3.0, 2.0, 1.0]);
        assert_eq!(flipped.origin(PrecisionMode::Native), Some(3.0));
        assert_eq!(flipped.with_flip(false).values(), unflipped.values());
    }

    #[test]
    fn test_drift_detection() {
        assert_eq!(resolution_drift(&[0.0, 1.0, 2.0, 3.0]), 0.0);
        assert!((resolution_drift(&[0.0, 1.0, 2.5]) - 0.5).abs() < 1e-12);
        // gaps marked with -1 are skipped
        assert_eq!(resolution_drift(&[0.0, 1.0, -1.0, 3.0, 4.0]), 0.0);
        assert_eq!(resolution_drift(&[]), 0.0);
    }

    #[test]
    fn test_decimal_digits() {
        assert_eq!(number_of_decimal_digits(10.0), 0);
        assert_eq!(number_of_decimal_digits(0.25), 2);
        assert_eq!(number_of_decimal_digits(0.1_f32 as f64), 1);
        assert_eq!(number_of_decimal_digits(1.0 / 3.0), 6);
    }

    #[test]
    fn test_precision_matching_is_opt_in() {
        let widened = 0.1_f32 as f64;
        assert_eq!(
            PrecisionMode::Native.same_precision(widened, ElementType::Float),
            widened
        );
        assert_eq!(
            PrecisionMode::MatchSource.same_precision(widened, ElementType::Float),
            0.1
        );
        assert_eq!(
            PrecisionMode::MatchSource.same_precision(widened, ElementType::Double),
            widened
        );
    }
}
