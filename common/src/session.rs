//! Vehicle session context
//!
//! `InspectionContext` is the application state threaded through the front-end:
//! the active vehicle, every checklist touched this session, and the
//! rectification tracker. It is created at session start and cleared on
//! logout; nothing here is global.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Section;
use crate::checklist::{ChecklistStore, ItemRef};
use crate::defect::DefectForm;
use crate::error::{Error, Result};
use crate::marks::{Mark, MarkCanvas};
use crate::payload::{build_job_card, JobCardSubmission};
use crate::rectification::RectificationTracker;

/// Metadata of the vehicle under inspection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleInfo {
    #[serde(alias = "model_name")]
    pub model: String,
    #[serde(alias = "variant_name")]
    pub variant: String,
    pub engine_no: String,
    pub chassis_no: String,
    pub colour_code: String,
    pub entry_date: String,
    #[serde(rename = "startTime")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(rename = "endTime")]
    pub end_time: Option<DateTime<Utc>>,
}

/// Partial update for `VehicleInfo`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleInfoPatch {
    pub model: Option<String>,
    pub variant: Option<String>,
    pub engine_no: Option<String>,
    pub chassis_no: Option<String>,
    pub colour_code: Option<String>,
    pub entry_date: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl VehicleInfo {
    pub fn merge(&mut self, patch: VehicleInfoPatch) {
        let VehicleInfoPatch {
            model,
            variant,
            engine_no,
            chassis_no,
            colour_code,
            entry_date,
            start_time,
            end_time,
        } = patch;

        if let Some(v) = model {
            self.model = v;
        }
        if let Some(v) = variant {
            self.variant = v;
        }
        if let Some(v) = engine_no {
            self.engine_no = v;
        }
        if let Some(v) = chassis_no {
            self.chassis_no = v;
        }
        if let Some(v) = colour_code {
            self.colour_code = v;
        }
        if let Some(v) = entry_date {
            self.entry_date = v;
        }
        if start_time.is_some() {
            self.start_time = start_time;
        }
        if end_time.is_some() {
            self.end_time = end_time;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InspectionContext {
    vehicle: Option<VehicleInfo>,
    checklist: ChecklistStore,
    rectification: RectificationTracker,
}

impl InspectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the vehicle and selects its checklist in one step.
    /// The start time is kept when resuming the same chassis.
    /// Returns `true` when a new checklist was seeded.
    pub fn begin_inspection(&mut self, mut info: VehicleInfo, started_at: DateTime<Utc>) -> bool {
        let resumed_start = self
            .vehicle
            .as_ref()
            .filter(|v| v.chassis_no == info.chassis_no)
            .and_then(|v| v.start_time);
        info.start_time = info.start_time.or(resumed_start).or(Some(started_at));
        info.end_time = None;

        let seeded = self.checklist.select_chassis(&info.chassis_no, &info.variant);
        tracing::info!(chassis = %info.chassis_no, variant = %info.variant, seeded, "inspection started");
        self.vehicle = Some(info);
        seeded
    }

    /// Merges into the current vehicle info. A patch carrying a chassis
    /// number also selects that chassis's checklist.
    pub fn set_vehicle_info(&mut self, patch: VehicleInfoPatch) {
        let selects_chassis = patch.chassis_no.is_some();
        let info = self.vehicle.get_or_insert_with(VehicleInfo::default);
        info.merge(patch);
        if selects_chassis {
            let (chassis, variant) = (info.chassis_no.clone(), info.variant.clone());
            self.checklist.select_chassis(&chassis, &variant);
        }
    }

    pub fn finish_inspection(&mut self, ended_at: DateTime<Utc>) -> Result<()> {
        let info = self.vehicle.as_mut().ok_or(Error::NoActiveChassis)?;
        info.end_time = Some(ended_at);
        Ok(())
    }

    pub fn vehicle(&self) -> Option<&VehicleInfo> {
        self.vehicle.as_ref()
    }

    pub fn current_chassis(&self) -> Option<&str> {
        self.checklist.current_chassis()
    }

    pub fn checklist(&self) -> &ChecklistStore {
        &self.checklist
    }

    pub fn checklist_mut(&mut self) -> &mut ChecklistStore {
        &mut self.checklist
    }

    pub fn rectification(&self) -> &RectificationTracker {
        &self.rectification
    }

    pub fn rectification_mut(&mut self) -> &mut RectificationTracker {
        &mut self.rectification
    }

    /// Writes a ready defect form back to the item, flagging it as a defect if needed
    pub fn commit_defect(
        &mut self,
        section: Section,
        item: impl Into<ItemRef>,
        form: &DefectForm,
    ) -> Result<()> {
        let item = item.into();
        let patch = form.to_patch()?;
        self.checklist.update_defect_details(section, item.clone(), patch)?;

        let flagged = self
            .checklist
            .item(section, item.clone())
            .map(|i| i.defect)
            .unwrap_or(false);
        if !flagged {
            self.checklist.toggle_defect(section, item)?;
        }
        Ok(())
    }

    /// Places a mark on the item's defect at the canvas's current image
    pub fn place_mark(
        &mut self,
        section: Section,
        item: impl Into<ItemRef>,
        canvas: &MarkCanvas,
        x: f64,
        y: f64,
    ) -> Result<Option<Mark>> {
        let details = self.checklist.defect_details_mut(section, item)?;
        Ok(canvas.place(details, x, y))
    }

    pub fn job_card_submission(
        &self,
        staff_username: &str,
        supervisor_username: &str,
    ) -> Result<JobCardSubmission> {
        let vehicle = self.vehicle.as_ref().ok_or(Error::NoActiveChassis)?;
        let checklist = self
            .checklist
            .checklist_for(&vehicle.chassis_no)
            .ok_or(Error::NoActiveChassis)?;
        build_job_card(checklist, vehicle, staff_username, supervisor_username)
    }

    /// Navigation away / new scan: forgets the vehicle and the rectification
    /// state but keeps every checklist for the rest of the session
    pub fn new_scan(&mut self) {
        self.vehicle = None;
        self.checklist.deselect();
        self.rectification.clear();
    }

    /// Logout
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defect::{DefectCategory, DefectLocation, Severity};
    use chrono::TimeZone;

    fn vehicle(chassis: &str, variant: &str) -> VehicleInfo {
        VehicleInfo {
            model: "Saga".to_string(),
            variant: variant.to_string(),
            chassis_no: chassis.to_string(),
            ..Default::default()
        }
    }

    fn t(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 9, minute, 0).unwrap()
    }

    #[test]
    fn test_begin_inspection_selects_chassis() {
        let mut ctx = InspectionContext::new();
        assert!(ctx.begin_inspection(vehicle("C1", "PLUS"), t(0)));
        assert_eq!(ctx.current_chassis(), Some("C1"));
        assert_eq!(ctx.checklist().progress().1, 124);
        assert_eq!(ctx.vehicle().unwrap().start_time, Some(t(0)));
    }

    #[test]
    fn test_resume_keeps_start_time() {
        let mut ctx = InspectionContext::new();
        ctx.begin_inspection(vehicle("C1", "BASE"), t(0));
        assert!(!ctx.begin_inspection(vehicle("C1", "BASE"), t(30)));
        assert_eq!(ctx.vehicle().unwrap().start_time, Some(t(0)));
    }

    #[test]
    fn test_set_vehicle_info_drives_selection() {
        let mut ctx = InspectionContext::new();
        ctx.set_vehicle_info(VehicleInfoPatch {
            model: Some("Saga".to_string()),
            ..Default::default()
        });
        assert!(ctx.current_chassis().is_none());

        ctx.set_vehicle_info(VehicleInfoPatch {
            variant: Some("plus".to_string()),
            chassis_no: Some("C7".to_string()),
            ..Default::default()
        });
        assert_eq!(ctx.current_chassis(), Some("C7"));
        assert_eq!(ctx.vehicle().unwrap().model, "Saga");
        assert_eq!(ctx.checklist().progress().1, 124);
    }

    #[test]
    fn test_commit_defect_flags_item() {
        let mut ctx = InspectionContext::new();
        ctx.begin_inspection(vehicle("C1", "BASE"), t(0));

        let mut form = DefectForm::new();
        form.select_category(DefectCategory::Painting);
        form.select_type("Dent").unwrap();
        form.select_location(DefectLocation::Exterior).unwrap();
        form.select_severity(Severity::Major).unwrap();

        ctx.commit_defect(Section::B, "Bonnet", &form).unwrap();
        let item = ctx.checklist().item(Section::B, "Bonnet").unwrap();
        assert!(item.defect);
        assert!(item.defect_details.as_ref().unwrap().is_filled());

        // committing again keeps the flag set
        ctx.commit_defect(Section::B, "Bonnet", &form).unwrap();
        assert!(ctx.checklist().item(Section::B, "Bonnet").unwrap().defect);
    }

    #[test]
    fn test_commit_incomplete_form_fails() {
        let mut ctx = InspectionContext::new();
        ctx.begin_inspection(vehicle("C1", "BASE"), t(0));
        let form = DefectForm::new();
        assert!(ctx.commit_defect(Section::B, "Bonnet", &form).is_err());
        assert!(!ctx.checklist().item(Section::B, "Bonnet").unwrap().defect);
    }

    #[test]
    fn test_place_mark() {
        let mut ctx = InspectionContext::new();
        ctx.begin_inspection(vehicle("C1", "BASE"), t(0));
        let mut canvas = MarkCanvas::new();
        assert!(ctx.place_mark(Section::B, "Bonnet", &canvas, 5.0, 5.0).unwrap().is_none());

        canvas.measure(100.0, 50.0);
        let mark = ctx.place_mark(Section::B, "Bonnet", &canvas, 50.0, 25.0).unwrap().unwrap();
        assert_eq!((mark.nx, mark.ny), (0.5, 0.5));
        let details = ctx.checklist().item(Section::B, "Bonnet").unwrap().defect_details.clone().unwrap();
        assert_eq!(details.marks.len(), 1);
    }

    #[test]
    fn test_new_scan_keeps_checklists() {
        let mut ctx = InspectionContext::new();
        ctx.begin_inspection(vehicle("C1", "BASE"), t(0));
        ctx.new_scan();
        assert!(ctx.vehicle().is_none());
        assert!(ctx.current_chassis().is_none());
        assert!(ctx.checklist().checklist_for("C1").is_some());
        assert!(matches!(
            ctx.checklist_mut().toggle_check_all(Section::B, true),
            Err(Error::NoActiveChassis)
        ));

        // resuming the same chassis picks the snapshot back up
        ctx.begin_inspection(vehicle("C1", "BASE"), t(5));
        assert_eq!(ctx.current_chassis(), Some("C1"));

        ctx.reset();
        assert!(ctx.checklist().checklist_for("C1").is_none());
    }

    #[test]
    fn test_finish_needs_vehicle() {
        let mut ctx = InspectionContext::new();
        assert!(ctx.finish_inspection(t(1)).is_err());
        ctx.begin_inspection(vehicle("C1", "BASE"), t(0));
        ctx.finish_inspection(t(45)).unwrap();
        assert_eq!(ctx.vehicle().unwrap().end_time, Some(t(45)));
    }

    #[test]
    fn test_vehicle_info_accepts_api_names() {
        let info: VehicleInfo = serde_json::from_str(
            r#"{"model_name":"Saga","variant_name":"PLUS","chassis_no":"C9","engine_no":"E1"}"#,
        )
        .unwrap();
        assert_eq!(info.model, "Saga");
        assert_eq!(info.variant, "PLUS");
        assert_eq!(info.start_time, None);
    }
}
