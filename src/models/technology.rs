use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// A percentage or absolute spread around a value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    /// Spread magnitude; a fraction of the value when `percentage` is set
    pub amount: f64,

    /// Interpret `amount` relative to the value
    #[serde(default)]
    pub percentage: bool,
}

impl Margin {
    pub fn absolute(amount: f64) -> Self {
        Self {
            amount,
            percentage: false,
        }
    }

    pub fn percentage(amount: f64) -> Self {
        Self {
            amount,
            percentage: true,
        }
    }

    /// Magnitude of the spread applied to `value`; never negative
    pub fn applied_to(&self, value: f64) -> f64 {
        if self.percentage {
            (value * self.amount).abs()
        } else {
            self.amount.abs()
        }
    }

    /// `(value - spread, value + spread)`
    pub fn widen(&self, value: f64) -> (f64, f64) {
        let spread = self.applied_to(value);
        (value - spread, value + spread)
    }
}

/// Deviation band valid for raw values in `[from, to]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationRange {
    pub from: f64,
    pub to: f64,
    pub deviation: f64,
}

impl DeviationRange {
    pub fn new(from: f64, to: f64, deviation: f64) -> Self {
        Self {
            from,
            to,
            deviation,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.from <= value && value <= self.to
    }
}

/// Measurement properties of one technology for one marker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_deviation_ranges"))]
pub struct TechnologyProperties {
    /// Deviation bands, mutually non-overlapping
    #[serde(default)]
    pub deviation_ranges: Vec<DeviationRange>,

    /// Whether `deviation` is relative to the raw value
    pub is_percentage: Option<bool>,

    #[validate(range(min = 0.0, max = 1.0))]
    pub sensitivity: Option<f64>,

    #[validate(range(min = 0.0, max = 1.0))]
    pub specificity: Option<f64>,

    /// Technologies whose results are interchangeable with this one
    ///
    /// Catalog metadata only; checked against known technologies on insert
    /// and never consulted by searches.
    #[serde(default)]
    pub comparable_with: Vec<String>,
}

impl TechnologyProperties {
    /// The band containing `value`, if any
    pub fn deviation_range_for(&self, value: f64) -> Option<&DeviationRange> {
        self.deviation_ranges.iter().find(|range| range.contains(value))
    }

    /// Margin to apply to `value`, if a band covers it
    pub fn margin_for(&self, value: f64) -> Option<Margin> {
        self.deviation_range_for(value).map(|range| Margin {
            amount: range.deviation,
            percentage: self.is_percentage.unwrap_or(false),
        })
    }
}

fn validation_error(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Owned(message))
}

fn validate_deviation_ranges(
    properties: &TechnologyProperties,
) -> std::result::Result<(), ValidationError> {
    if properties.deviation_ranges.is_empty() {
        return Ok(());
    }

    if properties.is_percentage.is_none() {
        return Err(validation_error(
            "percentage_flag_required",
            "deviation ranges require is_percentage to be set".to_string(),
        ));
    }

    for range in &properties.deviation_ranges {
        if !range.from.is_finite() || !range.to.is_finite() || !range.deviation.is_finite() {
            return Err(validation_error(
                "non_finite_range",
                format!("deviation range [{}, {}] is not finite", range.from, range.to),
            ));
        }
        if range.from > range.to {
            return Err(validation_error(
                "inverted_range",
                format!("deviation range has from {} above to {}", range.from, range.to),
            ));
        }
        if range.deviation < 0.0 {
            return Err(validation_error(
                "negative_deviation",
                format!("deviation {} is negative", range.deviation),
            ));
        }
    }

    let mut sorted = properties.deviation_ranges.clone();
    sorted.sort_by(|a, b| a.from.total_cmp(&b.from));

    // Bounds are inclusive, so touching endpoints overlap
    for pair in sorted.windows(2) {
        if pair[1].from <= pair[0].to {
            return Err(validation_error(
                "overlapping_ranges",
                format!(
                    "deviation ranges [{}, {}] and [{}, {}] overlap",
                    pair[0].from, pair[0].to, pair[1].from, pair[1].to
                ),
            ));
        }
    }

    Ok(())
}
