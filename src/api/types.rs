//! Wire types of the PDI backend

use lazy_static::lazy_static;
use pdi_common::{JobCard, ReferenceImage, VehicleInfo};
use pdi_common::rectification::{null_as_default, JobCardSection};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PdiError, Result};

lazy_static! {
    static ref CHASSIS_RE: Regex = Regex::new(r"^[A-Z0-9][A-Z0-9\-]{2,31}$").unwrap();
}

/// Upper-cases and validates a scanned or typed chassis number
pub fn normalize_chassis(input: &str) -> Result<String> {
    let chassis: String = input.trim().to_uppercase().split_whitespace().collect();
    if CHASSIS_RE.is_match(&chassis) {
        Ok(chassis)
    } else {
        Err(PdiError::InvalidChassis(input.trim().to_string()))
    }
}

/// `GET /vehicles/{chassis}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleDetails {
    #[serde(deserialize_with = "null_as_default")]
    pub model_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub variant_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub engine_no: String,
    #[serde(deserialize_with = "null_as_default")]
    pub chassis_no: String,
    #[serde(deserialize_with = "null_as_default")]
    pub colour_code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub entry_date: String,
}

impl From<VehicleDetails> for VehicleInfo {
    fn from(v: VehicleDetails) -> Self {
        VehicleInfo {
            model: v.model_name,
            variant: v.variant_name,
            engine_no: v.engine_no,
            chassis_no: v.chassis_no,
            colour_code: v.colour_code,
            entry_date: v.entry_date,
            start_time: None,
            end_time: None,
        }
    }
}

/// One row of `GET /vehicles/search`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSummary {
    #[serde(alias = "chassis", deserialize_with = "null_as_default")]
    pub chassis_no: String,
    #[serde(alias = "model_name", deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(alias = "variant_name", deserialize_with = "null_as_default")]
    pub variant: String,
}

/// `GET /jobcards/rectify/{chassis}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyJobCard {
    #[serde(deserialize_with = "null_as_default")]
    pub chassis_no: String,
    #[serde(deserialize_with = "null_as_default")]
    pub model_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub variant_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub engine_no: String,
    #[serde(deserialize_with = "null_as_default")]
    pub colour_code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub entry_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sections: Vec<JobCardSection>,
    #[serde(deserialize_with = "null_as_default")]
    pub images: Vec<ReferenceImage>,
}

impl RectifyJobCard {
    pub fn vehicle_info(&self) -> VehicleInfo {
        VehicleInfo {
            model: self.model_name.clone(),
            variant: self.variant_name.clone(),
            engine_no: self.engine_no.clone(),
            chassis_no: self.chassis_no.clone(),
            colour_code: self.colour_code.clone(),
            entry_date: self.entry_date.clone(),
            start_time: None,
            end_time: None,
        }
    }

    pub fn job_card(&self) -> JobCard {
        JobCard {
            chassis_no: self.chassis_no.clone(),
            sections: self.sections.clone(),
            images: self.images.clone(),
        }
    }
}

/// `GET /users` row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub user_type: String,
}

impl User {
    pub fn is_supervisor(&self) -> bool {
        self.user_type == "Supervisor"
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.username
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(default)]
    pub username: Option<String>,
}
