//! PDI Common Library
//!
//! In-memory state engine for pre-delivery inspection, shared by every front-end:
//! checklist catalogs and per-chassis state, defect detail capture and image
//! marks, and rectification tracking.

pub mod catalog;
pub mod checklist;
pub mod defect;
pub mod error;
pub mod flight;
pub mod marks;
pub mod payload;
pub mod rectification;
pub mod session;

pub use catalog::{catalog_for, ItemDefinition, Section, SectionMap, Variant};
pub use checklist::{ChecklistItemState, ChecklistStore, ItemRef, SectionChecklist};
pub use defect::{
    DefectCategory, DefectDetails, DefectDetailsPatch, DefectForm, DefectLocation, Disclosure,
    Field, Severity,
};
pub use error::{Error, Result};
pub use flight::{ScanLock, ScanRelease, SingleFlight};
pub use marks::{ImageKey, LayoutSize, Mark, MarkCanvas};
pub use payload::{Approval, ApprovalRequest, JobCardSubmission, RectifySubmission};
pub use rectification::{
    flatten_job_card, FetchedDefectItem, JobCard, RectificationEntry, RectificationTracker,
    RectifyItem, ReferenceImage,
};
pub use session::{InspectionContext, VehicleInfo, VehicleInfoPatch};
