//! Error types shared by the state engine

use crate::catalog::Section;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("No active chassis selected")]
    NoActiveChassis,

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Item {item} not found in section {section}")]
    UnknownItem { section: Section, item: String },

    #[error("Cannot set {field} before {missing}")]
    OutOfOrder {
        field: &'static str,
        missing: &'static str,
    },

    #[error("Defect type '{defect_type}' is not valid for category {category}")]
    InvalidDefectType {
        category: String,
        defect_type: String,
    },

    #[error("Item '{0}' does not take a measurement value")]
    NotMeasurable(String),

    #[error("Measurement value must be a finite number, got {0}")]
    InvalidMeasurement(f64),

    #[error("Incomplete: {0}")]
    Incomplete(String),
}

/// Result alias
pub type Result<T> = std::result::Result<T, Error>;
