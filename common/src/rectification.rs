//! Rectification tracking for a previously submitted job card
//!
//! Independent of the fresh-inspection checklist: seeded from the defect list
//! the backend returns, it records who fixed what and gates the rectification
//! submission on every item being rectified.
//!
//! Reference images here are identified by server-assigned numeric ids, a
//! separate namespace from the local `ImageKey`s used during inspection.

use serde::{Deserialize, Serialize};

use crate::catalog::Section;
use crate::error::{Error, Result};
use crate::marks::{denormalize, is_normalized, LayoutSize};
use crate::payload::{RectifyEntry, RectifySubmission};
use crate::session::VehicleInfo;

/// Reads an explicit `null` as the field's default, the same as a missing key
pub fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Mark as the backend returns it: either `{x, y}` or `{nx, ny}`, both normalized
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawMark {
    #[serde(alias = "nx")]
    pub x: f64,
    #[serde(alias = "ny")]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<i64>,
}

/// One defect as recorded on a submitted job card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefectRecord {
    pub id: Option<i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub defect_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub severity: String,
    #[serde(deserialize_with = "null_as_default")]
    pub location: String,
    pub mark: Option<RawMark>,
    #[serde(deserialize_with = "null_as_default")]
    pub marks: Vec<RawMark>,
    pub image_id: Option<i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub remarks: String,
    #[serde(deserialize_with = "null_as_default")]
    pub repaired: bool,
}

impl DefectRecord {
    /// Record-level image id, falling back to the one carried by the mark
    pub fn image_id(&self) -> Option<i64> {
        self.image_id
            .or_else(|| self.mark.and_then(|m| m.image_id))
            .or_else(|| self.marks.iter().find_map(|m| m.image_id))
    }

    /// `mark` and `marks` folded into one list of in-range points
    pub fn normalized_marks(&self) -> Vec<(f64, f64)> {
        self.mark
            .iter()
            .chain(self.marks.iter())
            .filter(|m| is_normalized(m.x) && is_normalized(m.y))
            .map(|m| (m.x, m.y))
            .collect()
    }
}

/// Server reference image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceImage {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
}

/// Job card item as fetched; rectification fields may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchedDefectItem {
    pub id: i64,
    pub section: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub pass: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub defect: Vec<DefectRecord>,
    pub rectified: Option<bool>,
    pub rectifier_name: Option<String>,
    pub rectifier_no: Option<String>,
    pub rectification_date: Option<String>,
    pub closed: Option<bool>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobCardSection {
    pub section: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub items: Vec<FetchedDefectItem>,
}

/// Full job card as returned for rectification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobCard {
    #[serde(deserialize_with = "null_as_default")]
    pub chassis_no: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sections: Vec<JobCardSection>,
    #[serde(deserialize_with = "null_as_default")]
    pub images: Vec<ReferenceImage>,
}

/// Failed items that carry at least one defect, tagged with their section number.
/// Sections without an explicit number take their 1-based position.
pub fn flatten_job_card(job_card: &JobCard) -> Vec<FetchedDefectItem> {
    job_card
        .sections
        .iter()
        .enumerate()
        .flat_map(|(idx, section)| {
            let number = section.section.unwrap_or(idx as u32 + 1);
            section
                .items
                .iter()
                .filter(|item| !item.pass && !item.defect.is_empty())
                .map(move |item| FetchedDefectItem {
                    section: number,
                    ..item.clone()
                })
        })
        .collect()
}

/// Tracked rectification state of one defective item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectifyItem {
    pub id: i64,
    pub section: u32,
    pub name: String,
    pub original_pass: bool,
    pub all_defects: Vec<DefectRecord>,
    pub rectified: bool,
    pub rectifier_name: Option<String>,
    pub rectifier_no: Option<String>,
    pub rectification_date: Option<String>,
    pub closed: bool,
    pub remark: Option<String>,
}

impl From<FetchedDefectItem> for RectifyItem {
    fn from(item: FetchedDefectItem) -> Self {
        Self {
            id: item.id,
            section: item.section,
            name: item.name,
            original_pass: item.pass,
            all_defects: item.defect,
            rectified: item.rectified.unwrap_or(false),
            rectifier_name: item.rectifier_name,
            rectifier_no: item.rectifier_no,
            rectification_date: item.rectification_date,
            closed: item.closed.unwrap_or(false),
            remark: item.remark,
        }
    }
}

impl RectifyItem {
    pub fn display_section(&self) -> Section {
        Section::from_number(self.section)
    }

    pub fn first_defect(&self) -> Option<&DefectRecord> {
        self.all_defects.first()
    }
}

/// Who fixed an item, and when
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RectificationEntry {
    pub name: String,
    pub no: String,
    pub remark: String,
    pub date: String,
    pub closed: bool,
}

/// Items of one display section, sorted by id
#[derive(Debug, Clone)]
pub struct SectionGroup<'a> {
    pub section: Section,
    pub items: Vec<&'a RectifyItem>,
}

impl SectionGroup<'_> {
    /// "A".."F", or "Others" for section 7 and unknown codes
    pub fn label(&self) -> &'static str {
        match self.section {
            Section::Overall => "Others",
            other => other.as_str(),
        }
    }
}

/// A defect mark to draw on a server reference image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlottedMark {
    pub item_id: i64,
    pub nx: f64,
    pub ny: f64,
}

impl PlottedMark {
    pub fn to_pixels(&self, size: LayoutSize) -> (f64, f64) {
        denormalize(self.nx, self.ny, size)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RectificationTracker {
    car_info: Option<VehicleInfo>,
    items: Vec<RectifyItem>,
    images: Vec<ReferenceImage>,
    loading: bool,
    error: Option<String>,
}

impl RectificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_loading(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Records a fetch failure; previously loaded items are kept
    pub fn fail(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }

    /// Replaces the whole state with freshly fetched data
    pub fn load_from(
        &mut self,
        car_info: VehicleInfo,
        items: Vec<FetchedDefectItem>,
        images: Vec<ReferenceImage>,
    ) {
        tracing::debug!(chassis = %car_info.chassis_no, items = items.len(), "loaded rectification items");
        *self = Self {
            car_info: Some(car_info),
            items: items.into_iter().map(RectifyItem::from).collect(),
            images,
            loading: false,
            error: None,
        };
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn car_info(&self) -> Option<&VehicleInfo> {
        self.car_info.as_ref()
    }

    pub fn items(&self) -> &[RectifyItem] {
        &self.items
    }

    pub fn item(&self, item_id: i64) -> Option<&RectifyItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn images(&self) -> &[ReferenceImage] {
        &self.images
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns `false` when no item has this id
    pub fn mark_rectified(&mut self, item_id: i64, entry: RectificationEntry) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == item_id) else {
            tracing::debug!(item_id, "mark_rectified: no such item");
            return false;
        };
        item.rectified = true;
        item.rectifier_name = Some(entry.name);
        item.rectifier_no = Some(entry.no);
        item.rectification_date = Some(entry.date);
        item.remark = Some(entry.remark);
        item.closed = entry.closed;
        true
    }

    /// Returns `false` when no item has this id
    pub fn unmark_rectified(&mut self, item_id: i64) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == item_id) else {
            tracing::debug!(item_id, "unmark_rectified: no such item");
            return false;
        };
        item.rectified = false;
        item.rectifier_name = None;
        item.rectifier_no = None;
        item.rectification_date = None;
        item.remark = None;
        item.closed = false;
        true
    }

    /// Vacuously true for an empty list
    pub fn all_rectified(&self) -> bool {
        self.items.iter().all(|i| i.rectified)
    }

    /// (rectified, total)
    pub fn progress(&self) -> (usize, usize) {
        let done = self.items.iter().filter(|i| i.rectified).count();
        (done, self.items.len())
    }

    /// Non-empty groups ordered A..F then Others, items by ascending id
    pub fn grouped(&self) -> Vec<SectionGroup<'_>> {
        Section::ALL
            .iter()
            .filter_map(|section| {
                let mut items: Vec<&RectifyItem> = self
                    .items
                    .iter()
                    .filter(|i| i.display_section() == *section)
                    .collect();
                if items.is_empty() {
                    return None;
                }
                items.sort_by_key(|i| i.id);
                Some(SectionGroup {
                    section: *section,
                    items,
                })
            })
            .collect()
    }

    /// Display numbers of the form "1.2", section position then item position
    pub fn numbered(&self) -> Vec<(String, &RectifyItem)> {
        self.grouped()
            .into_iter()
            .flat_map(|group| {
                let section_no = group.section.number();
                group
                    .items
                    .into_iter()
                    .enumerate()
                    .map(move |(idx, item)| (format!("{}.{}", section_no, idx + 1), item))
            })
            .collect()
    }

    /// Marks of each item's first defect that belong to server image `image_id`
    pub fn marks_for_image(&self, image_id: i64) -> Vec<PlottedMark> {
        self.items
            .iter()
            .filter_map(|item| item.first_defect().map(|d| (item.id, d)))
            .filter(|(_, defect)| defect.image_id() == Some(image_id))
            .flat_map(|(item_id, defect)| {
                defect
                    .normalized_marks()
                    .into_iter()
                    .map(move |(nx, ny)| PlottedMark { item_id, nx, ny })
            })
            .collect()
    }

    /// Builds the rectification payload; every item must be rectified
    pub fn submission(&self, supervisor_id: i64) -> Result<RectifySubmission> {
        let car_info = self
            .car_info
            .as_ref()
            .ok_or_else(|| Error::Incomplete("no rectification job card loaded".into()))?;
        if let Some(open) = self.items.iter().find(|i| !i.rectified) {
            return Err(Error::Incomplete(format!("'{}' is not rectified", open.name)));
        }

        let rectify_items = self
            .items
            .iter()
            .map(|item| RectifyEntry {
                id: item.id,
                staff_name: item.rectifier_name.clone().unwrap_or_default(),
                staff_no: item.rectifier_no.clone().unwrap_or_default(),
                date: item.rectification_date.clone().unwrap_or_default(),
                remarks: item.remark.clone().unwrap_or_default(),
                defect_id: item.first_defect().and_then(|d| d.id),
            })
            .collect();

        Ok(RectifySubmission {
            chassis_no: car_info.chassis_no.clone(),
            supervisor_id,
            rectify_items,
        })
    }
}
