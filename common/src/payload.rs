//! Outbound payloads
//!
//! Request bodies for the job card, rectification and approval endpoints,
//! built from core state. Only the first in-range mark of a defect is sent.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::checklist::{ChecklistItemState, SectionChecklist};
use crate::error::{Error, Result};
use crate::session::VehicleInfo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedMark {
    pub x: f64,
    pub y: f64,
    pub image_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmittedDefect {
    pub category: String,
    #[serde(rename = "type")]
    pub defect_type: String,
    pub severity: String,
    pub location: String,
    pub mark: Option<SubmittedMark>,
    pub remarks: String,
    pub repaired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedItem {
    /// 1-based section position
    pub section: u32,
    pub name: String,
    pub pass: bool,
    pub defect: Vec<SubmittedDefect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// Body of `POST /jobcards`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCardSubmission {
    pub chassis_no: String,
    pub staff_username: String,
    pub supervisor_username: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// 1 when any item carries a defect
    pub defect: u8,
    pub items: Vec<SubmittedItem>,
}

impl JobCardSubmission {
    pub fn defect_count(&self) -> usize {
        self.items.iter().filter(|i| !i.pass).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectifyEntry {
    pub id: i64,
    pub staff_name: String,
    pub staff_no: String,
    pub date: String,
    pub remarks: String,
    pub defect_id: Option<i64>,
}

/// Body of `POST /jobcards/rectify`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectifySubmission {
    pub chassis_no: String,
    pub supervisor_id: i64,
    pub rectify_items: Vec<RectifyEntry>,
}

/// Final inspection decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Approval {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NOK")]
    NotOk,
}

impl FromStr for Approval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OK" => Ok(Approval::Ok),
            "NOK" => Ok(Approval::NotOk),
            _ => Err(format!("Unknown decision: {}. Use ok or nok", s)),
        }
    }
}

impl fmt::Display for Approval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Approval::Ok => write!(f, "OK"),
            Approval::NotOk => write!(f, "NOK"),
        }
    }
}

/// Body of `POST /approvals/{chassis}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub approval: Approval,
}

/// RFC 3339 UTC with millisecond precision
pub fn format_time(t: Option<DateTime<Utc>>) -> Option<String> {
    t.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn submitted_defect(item: &ChecklistItemState) -> SubmittedDefect {
    let Some(details) = item.defect_details.as_ref() else {
        return SubmittedDefect::default();
    };
    SubmittedDefect {
        category: details.category.map(|c| c.to_string()).unwrap_or_default(),
        defect_type: details.defect_type.clone().unwrap_or_default(),
        severity: details.severity.map(|s| s.to_string()).unwrap_or_default(),
        location: details.location.map(|l| l.to_string()).unwrap_or_default(),
        mark: details.first_mark().map(|m| SubmittedMark {
            x: m.nx,
            y: m.ny,
            image_id: m.image.to_string(),
        }),
        remarks: details.remarks.clone(),
        repaired: false,
    }
}

/// Builds the job card body. Every item must be resolved.
pub fn build_job_card(
    checklist: &SectionChecklist,
    vehicle: &VehicleInfo,
    staff_username: &str,
    supervisor_username: &str,
) -> Result<JobCardSubmission> {
    let items: Vec<&ChecklistItemState> = checklist.values().flatten().collect();
    if items.is_empty() {
        return Err(Error::Incomplete("checklist is empty".into()));
    }
    if let Some(open) = items.iter().find(|i| !i.is_resolved()) {
        return Err(Error::Incomplete(format!(
            "{}. {} is not resolved",
            open.section, open.name
        )));
    }
    if supervisor_username.trim().is_empty() {
        return Err(Error::Incomplete("no supervisor selected".into()));
    }

    let items: Vec<SubmittedItem> = items
        .into_iter()
        .map(|item| SubmittedItem {
            section: item.section.number(),
            name: item.name.clone(),
            pass: item.checked,
            defect: if item.defect {
                vec![submitted_defect(item)]
            } else {
                Vec::new()
            },
            value: item.measurement_value.filter(|_| item.checked),
        })
        .collect();

    Ok(JobCardSubmission {
        chassis_no: vehicle.chassis_no.clone(),
        staff_username: staff_username.to_string(),
        supervisor_username: supervisor_username.to_string(),
        start_time: format_time(vehicle.start_time),
        end_time: format_time(vehicle.end_time),
        defect: u8::from(items.iter().any(|i| !i.pass)),
        items,
    })
}
