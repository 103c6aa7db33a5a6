//! Per-chassis checklist state
//!
//! Each chassis gets its own copy of the catalog the first time it is
//! selected. Snapshots are never dropped during a session, so switching
//! between vehicles resumes where the inspector left off.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::catalog::{catalog_for, ItemDefinition, Section};
use crate::defect::{DefectDetails, DefectDetailsPatch};
use crate::error::{Error, Result};

/// Mutable state of one checklist item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItemState {
    pub id: u32,
    pub section: Section,
    pub name: String,
    pub checked: bool,
    pub defect: bool,
    pub measurement_value: Option<f64>,
    pub defect_details: Option<DefectDetails>,
}

impl From<ItemDefinition> for ChecklistItemState {
    fn from(def: ItemDefinition) -> Self {
        Self {
            id: def.id,
            section: def.section,
            name: def.name,
            checked: false,
            defect: false,
            measurement_value: None,
            defect_details: None,
        }
    }
}

impl ChecklistItemState {
    pub fn requires_measurement(&self) -> bool {
        crate::catalog::is_measurement_item(self.section, &self.name)
    }

    /// Exactly one of checked/defect, and a finite reading when the item needs one
    pub fn is_resolved(&self) -> bool {
        if self.checked == self.defect {
            return false;
        }
        if self.checked && self.requires_measurement() {
            return self.measurement_value.is_some_and(f64::is_finite);
        }
        true
    }
}

/// Section-grouped checklist of one vehicle
pub type SectionChecklist = BTreeMap<Section, Vec<ChecklistItemState>>;

/// Lookup key for an item inside a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    Id(u32),
    Name(String),
}

impl ItemRef {
    fn matches(&self, item: &ChecklistItemState) -> bool {
        match self {
            ItemRef::Id(id) => item.id == *id,
            ItemRef::Name(name) => item.name == *name,
        }
    }

    fn describe(&self) -> String {
        match self {
            ItemRef::Id(id) => id.to_string(),
            ItemRef::Name(name) => name.clone(),
        }
    }
}

impl From<u32> for ItemRef {
    fn from(id: u32) -> Self {
        ItemRef::Id(id)
    }
}

impl From<&str> for ItemRef {
    fn from(name: &str) -> Self {
        ItemRef::Name(name.to_string())
    }
}

impl From<String> for ItemRef {
    fn from(name: String) -> Self {
        ItemRef::Name(name)
    }
}

/// Checklist snapshots keyed by chassis number, plus the active chassis
#[derive(Debug, Clone, Default)]
pub struct ChecklistStore {
    snapshots: HashMap<String, SectionChecklist>,
    current_chassis: Option<String>,
}

impl ChecklistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `chassis_no` the active chassis, seeding its checklist from the
    /// variant's catalog if it has none yet. Existing state is kept as-is.
    /// Returns `true` when a new snapshot was seeded.
    pub fn select_chassis(&mut self, chassis_no: &str, variant: &str) -> bool {
        self.current_chassis = Some(chassis_no.to_string());
        if self.snapshots.contains_key(chassis_no) {
            tracing::debug!(chassis = chassis_no, "resuming existing checklist");
            return false;
        }

        let checklist: SectionChecklist = catalog_for(variant)
            .into_iter()
            .map(|(section, items)| (section, items.into_iter().map(ChecklistItemState::from).collect()))
            .collect();
        tracing::debug!(chassis = chassis_no, variant, "seeded checklist");
        self.snapshots.insert(chassis_no.to_string(), checklist);
        true
    }

    pub fn current_chassis(&self) -> Option<&str> {
        self.current_chassis.as_deref()
    }

    /// Checklist of the active chassis
    pub fn checklist(&self) -> Option<&SectionChecklist> {
        self.current_chassis
            .as_ref()
            .and_then(|chassis| self.snapshots.get(chassis))
    }

    pub fn checklist_for(&self, chassis_no: &str) -> Option<&SectionChecklist> {
        self.snapshots.get(chassis_no)
    }

    pub fn chassis_numbers(&self) -> impl Iterator<Item = &str> {
        self.snapshots.keys().map(|s| s.as_str())
    }

    pub fn item(&self, section: Section, item: impl Into<ItemRef>) -> Option<&ChecklistItemState> {
        let item = item.into();
        self.checklist()?
            .get(&section)?
            .iter()
            .find(|i| item.matches(i))
    }

    /// Flips `checked` and always clears `defect`.
    /// Unchecking the measurement item also drops its reading.
    pub fn toggle_check(&mut self, section: Section, item: impl Into<ItemRef>) -> Result<()> {
        let item = self.item_mut(section, item.into())?;
        item.checked = !item.checked;
        item.defect = false;
        if !item.checked {
            item.measurement_value = None;
        }
        Ok(())
    }

    /// Sets `checked = value` and clears `defect` for every item in the section
    pub fn toggle_check_all(&mut self, section: Section, value: bool) -> Result<()> {
        let checklist = self.checklist_mut()?;
        let Some(items) = checklist.get_mut(&section) else {
            return Ok(());
        };
        for item in items.iter_mut() {
            item.checked = value;
            item.defect = false;
            if !value {
                item.measurement_value = None;
            }
        }
        Ok(())
    }

    /// Flips `defect` and always clears `checked`. Existing defect details are
    /// kept so re-flagging an item resumes the earlier input.
    pub fn toggle_defect(&mut self, section: Section, item: impl Into<ItemRef>) -> Result<()> {
        let item = self.item_mut(section, item.into())?;
        item.defect = !item.defect;
        item.checked = false;
        Ok(())
    }

    /// Stores a reading on the measurement item and marks it checked
    pub fn set_item_value_and_check(
        &mut self,
        section: Section,
        item: impl Into<ItemRef>,
        value: f64,
    ) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::InvalidMeasurement(value));
        }
        let item = self.item_mut(section, item.into())?;
        if !item.requires_measurement() {
            return Err(Error::NotMeasurable(item.name.clone()));
        }
        item.measurement_value = Some(value);
        item.checked = true;
        item.defect = false;
        Ok(())
    }

    /// Merges `patch` into the item's defect details, creating them if absent.
    /// Field ordering is the caller's concern (see `DefectForm`).
    pub fn update_defect_details(
        &mut self,
        section: Section,
        item: impl Into<ItemRef>,
        patch: DefectDetailsPatch,
    ) -> Result<()> {
        let item = self.item_mut(section, item.into())?;
        item.defect_details.get_or_insert_with(DefectDetails::default).merge(patch);
        Ok(())
    }

    /// Mutable access to an item's defect details, created on demand
    pub fn defect_details_mut(
        &mut self,
        section: Section,
        item: impl Into<ItemRef>,
    ) -> Result<&mut DefectDetails> {
        let item = self.item_mut(section, item.into())?;
        Ok(item.defect_details.get_or_insert_with(DefectDetails::default))
    }

    /// Every item resolved; an empty or missing checklist is never complete
    pub fn is_complete(&self) -> bool {
        let Some(checklist) = self.checklist() else {
            return false;
        };
        let mut items = checklist.values().flatten().peekable();
        items.peek().is_some() && items.all(ChecklistItemState::is_resolved)
    }

    /// (resolved, total) for the active checklist
    pub fn progress(&self) -> (usize, usize) {
        self.checklist()
            .map(|checklist| {
                let items = checklist.values().flatten();
                let total = items.clone().count();
                let resolved = items.filter(|i| i.is_resolved()).count();
                (resolved, total)
            })
            .unwrap_or((0, 0))
    }

    /// Unresolved items of the active checklist in section order
    pub fn pending_items(&self) -> Vec<&ChecklistItemState> {
        self.checklist()
            .map(|checklist| checklist.values().flatten().filter(|i| !i.is_resolved()).collect())
            .unwrap_or_default()
    }

    /// Leaves no chassis active; snapshots are kept for a later `select_chassis`
    pub fn deselect(&mut self) {
        self.current_chassis = None;
    }

    /// Drops every snapshot (logout / explicit reset)
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.current_chassis = None;
    }

    fn checklist_mut(&mut self) -> Result<&mut SectionChecklist> {
        let chassis = self.current_chassis.as_ref().ok_or(Error::NoActiveChassis)?;
        self.snapshots.get_mut(chassis).ok_or(Error::NoActiveChassis)
    }

    fn item_mut(&mut self, section: Section, item: ItemRef) -> Result<&mut ChecklistItemState> {
        let checklist = self.checklist_mut()?;
        checklist
            .get_mut(&section)
            .and_then(|items| items.iter_mut().find(|i| item.matches(i)))
            .ok_or_else(|| Error::UnknownItem {
                section,
                item: item.describe(),
            })
    }
}
