use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite identity of a measurement result
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultId {
    pub record_id: String,
    pub marker_name: String,
}

impl ResultId {
    pub fn new(record_id: impl Into<String>, marker_name: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            marker_name: marker_name.into(),
        }
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.record_id, self.marker_name)
    }
}

/// The single value kind a result carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultPayload {
    /// Numeric range; a point measurement has `min == max`
    Range { min: f64, max: f64 },

    /// Free-text value with an optional category
    Text {
        value: String,
        category: Option<String>,
    },

    /// Boolean value
    Flag { value: bool },
}

/// Pre-conversion measurement as reported by the instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub unit: Option<String>,
}

/// One measurement of one marker for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    /// Record the measurement belongs to
    pub record_id: String,

    /// Measured marker
    pub marker_name: String,

    /// Measured value
    pub payload: ResultPayload,

    /// Technology used for the measurement
    pub technology_name: Option<String>,

    /// Instrument value before unit conversion
    pub raw: Option<RawMeasurement>,

    /// Sample label
    pub sample: Option<String>,

    /// Measurement time
    pub timestamp: Option<DateTime<Utc>>,
}

impl MeasurementResult {
    /// Create a numeric range result
    pub fn range(
        record_id: impl Into<String>,
        marker_name: impl Into<String>,
        min: f64,
        max: f64,
    ) -> Self {
        Self::with_payload(record_id, marker_name, ResultPayload::Range { min, max })
    }

    /// Create a single-point numeric result
    pub fn point(record_id: impl Into<String>, marker_name: impl Into<String>, value: f64) -> Self {
        Self::range(record_id, marker_name, value, value)
    }

    pub fn with_payload(
        record_id: impl Into<String>,
        marker_name: impl Into<String>,
        payload: ResultPayload,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            marker_name: marker_name.into(),
            payload,
            technology_name: None,
            raw: None,
            sample: None,
            timestamp: None,
        }
    }

    /// Set the technology used for this measurement
    pub fn with_technology(mut self, technology_name: impl Into<String>) -> Self {
        self.technology_name = Some(technology_name.into());
        self
    }

    pub fn id(&self) -> ResultId {
        ResultId::new(self.record_id.clone(), self.marker_name.clone())
    }

    /// Numeric bounds, if this result carries a range payload
    pub fn numeric_bounds(&self) -> Option<(f64, f64)> {
        match self.payload {
            ResultPayload::Range { min, max } => Some((min, max)),
            _ => None,
        }
    }

    /// Check the result invariants
    pub fn validate(&self) -> Result<()> {
        if self.record_id.is_empty() || self.marker_name.is_empty() {
            return Err(AppError::Validation(
                "Result requires a record id and a marker name".to_string(),
            ));
        }

        if let ResultPayload::Range { min, max } = self.payload {
            if !min.is_finite() || !max.is_finite() {
                return Err(AppError::Validation(format!(
                    "Result {} has a non-finite range [{}, {}]",
                    self.id(),
                    min,
                    max
                )));
            }
            if min > max {
                return Err(AppError::Validation(format!(
                    "Result {} has min {} greater than max {}",
                    self.id(),
                    min,
                    max
                )));
            }
        }

        Ok(())
    }
}
