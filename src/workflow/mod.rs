//! Inspection flows
//!
//! Sequences the backend calls around the in-memory `InspectionContext`:
//! lookup under a scan lock, the override gate, submissions under a
//! single-flight guard. A failed call never touches local state.

pub mod script;

pub use script::{InspectionScript, ScriptAction, ScriptMark};

use chrono::Utc;
use pdi_common::payload::format_time;
use pdi_common::{
    flatten_job_card, Approval, InspectionContext, JobCardSubmission, RectifySubmission,
    ScanLock, ScanRelease, SingleFlight, VehicleInfo,
};

use crate::api::{normalize_chassis, ApiClient, User};
use crate::error::{PdiError, Result};

/// Result of resolving a scanned or typed chassis number
#[derive(Debug, Clone)]
pub struct VehicleLookup {
    pub info: VehicleInfo,
    pub job_card_exists: bool,
}

pub struct Session {
    api: ApiClient,
    staff: String,
    ctx: InspectionContext,
    scan_lock: ScanLock,
    submit: SingleFlight,
}

impl Session {
    pub fn new(api: ApiClient, staff: impl Into<String>) -> Self {
        Self {
            api,
            staff: staff.into(),
            ctx: InspectionContext::new(),
            scan_lock: ScanLock::new(),
            submit: SingleFlight::new(),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn staff(&self) -> &str {
        &self.staff
    }

    pub fn context(&self) -> &InspectionContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut InspectionContext {
        &mut self.ctx
    }

    pub fn is_scan_locked(&self) -> bool {
        self.scan_lock.is_locked()
    }

    /// Resolves a chassis number. The existence check runs first so an
    /// override decision is never made on vehicle details alone.
    pub async fn lookup(&mut self, raw_chassis: &str) -> Result<VehicleLookup> {
        if !self.scan_lock.try_lock() {
            return Err(PdiError::Busy("Vehicle lookup"));
        }
        let result = self.fetch_vehicle(raw_chassis).await;
        let reason = match &result {
            Ok(_) => ScanRelease::Success,
            Err(PdiError::Cancelled) => ScanRelease::Cancelled,
            Err(_) => ScanRelease::Failed,
        };
        self.scan_lock.release(reason);
        result
    }

    async fn fetch_vehicle(&self, raw_chassis: &str) -> Result<VehicleLookup> {
        let chassis = normalize_chassis(raw_chassis)?;
        let job_card_exists = self.api.job_card_exists(&chassis).await?;
        let details = self.api.vehicle(&chassis).await?;
        tracing::info!(chassis = %chassis, job_card_exists, "vehicle resolved");
        Ok(VehicleLookup {
            info: details.into(),
            job_card_exists,
        })
    }

    /// Returning from background may leave a lookup lock held
    pub fn on_foreground(&mut self) {
        if self.scan_lock.is_locked() {
            tracing::debug!("releasing stale scan lock");
            self.scan_lock.release(ScanRelease::Foreground);
        }
    }

    /// Starts (or resumes) the inspection of a looked-up vehicle.
    /// An existing job card may only be replaced after the staff password is re-verified.
    pub async fn start_inspection(
        &mut self,
        lookup: VehicleLookup,
        override_password: Option<&str>,
    ) -> Result<bool> {
        if lookup.job_card_exists {
            let password = override_password
                .ok_or_else(|| PdiError::JobCardExists(lookup.info.chassis_no.clone()))?;
            self.api.verify_password(&self.staff, password).await?;
            tracing::warn!(chassis = %lookup.info.chassis_no, "overriding existing job card");
        }
        Ok(self.ctx.begin_inspection(lookup.info, Utc::now()))
    }

    pub async fn supervisors(&self) -> Result<Vec<User>> {
        let supervisors = self.api.supervisors().await?;
        if supervisors.is_empty() {
            return Err(PdiError::NoSupervisors);
        }
        Ok(supervisors)
    }

    /// Job card body as it would be submitted now
    pub fn job_card_preview(&self, supervisor_username: &str) -> Result<JobCardSubmission> {
        let mut body = self.ctx.job_card_submission(&self.staff, supervisor_username)?;
        body.end_time = format_time(Some(Utc::now()));
        Ok(body)
    }

    /// Submits the job card; the end time is only recorded once the server accepts it
    pub async fn submit_inspection(&mut self, supervisor_username: &str) -> Result<JobCardSubmission> {
        let ended_at = Utc::now();
        let mut body = self.ctx.job_card_submission(&self.staff, supervisor_username)?;
        body.end_time = format_time(Some(ended_at));

        if !self.submit.try_begin() {
            return Err(PdiError::Busy("Job card submission"));
        }
        let result = self.api.submit_job_card(&body).await;
        self.submit.finish();
        result?;

        self.ctx.finish_inspection(ended_at)?;
        tracing::info!(
            chassis = %body.chassis_no,
            defects = body.defect_count(),
            "job card submitted"
        );
        Ok(body)
    }

    /// Fetches the defective items of a submitted job card
    pub async fn load_rectification(&mut self, raw_chassis: &str) -> Result<()> {
        let chassis = normalize_chassis(raw_chassis)?;
        self.ctx.rectification_mut().begin_loading();
        match self.api.rectify_job_card(&chassis).await {
            Ok(card) => {
                let items = flatten_job_card(&card.job_card());
                let info = card.vehicle_info();
                self.ctx
                    .rectification_mut()
                    .load_from(info, items, card.images);
                Ok(())
            }
            Err(e) => {
                self.ctx.rectification_mut().fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Submits the rectification records and clears the tracker on success
    pub async fn submit_rectification(&mut self, supervisor_id: i64) -> Result<RectifySubmission> {
        let body = self.ctx.rectification().submission(supervisor_id)?;

        if !self.submit.try_begin() {
            return Err(PdiError::Busy("Rectification submission"));
        }
        let result = self.api.submit_rectification(&body).await;
        self.submit.finish();
        result?;

        tracing::info!(
            chassis = %body.chassis_no,
            items = body.rectify_items.len(),
            "rectification submitted"
        );
        self.ctx.rectification_mut().clear();
        Ok(body)
    }

    pub async fn approve(&self, raw_chassis: &str, decision: Approval) -> Result<()> {
        let chassis = normalize_chassis(raw_chassis)?;
        self.api.approve(&chassis, decision).await?;
        tracing::info!(chassis = %chassis, decision = %decision, "approval recorded");
        Ok(())
    }

    /// Leaving the flow: aborts in-flight requests and forgets the vehicle.
    /// Checklists survive for the rest of the process.
    pub fn teardown(&mut self) {
        self.api.scope().cancel();
        if self.scan_lock.is_locked() {
            self.scan_lock.release(ScanRelease::Cancelled);
        }
        self.ctx.new_scan();
        self.api.renew_scope();
    }

    /// Logout
    pub fn reset(&mut self) {
        self.api.scope().cancel();
        self.ctx.reset();
        self.api.renew_scope();
    }
}
