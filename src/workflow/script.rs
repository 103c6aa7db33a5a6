//! Non-interactive checklist input
//!
//! A JSON file of actions replayed against the active checklist, in order.
//! Replay stops at the first action that fails.
//!
//! ```json
//! { "actions": [
//!     { "action": "check_all", "section": "B" },
//!     { "action": "value", "section": "C", "item": "Battery Terminal", "value": 12.6 },
//!     { "action": "defect", "section": "A", "item": 3, "category": "PAINTING",
//!       "type": "Scratch", "location": "Exterior", "severity": "Minor",
//!       "marks": [{ "image": "vehicle2", "x": 120, "y": 80, "width": 400, "height": 300 }] }
//! ] }
//! ```

use pdi_common::{
    DefectCategory, DefectForm, DefectLocation, ImageKey, InspectionContext, ItemRef,
    MarkCanvas, Section, Severity,
};
use serde::Deserialize;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScriptItem {
    Id(u32),
    Name(String),
}

impl From<ScriptItem> for ItemRef {
    fn from(item: ScriptItem) -> Self {
        match item {
            ScriptItem::Id(id) => ItemRef::Id(id),
            ScriptItem::Name(name) => ItemRef::Name(name),
        }
    }
}

/// A tap on a reference image of the given rendered size
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptMark {
    #[serde(default)]
    pub image: ImageKey,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    Check {
        section: Section,
        item: ScriptItem,
    },
    CheckAll {
        section: Section,
    },
    Value {
        section: Section,
        item: ScriptItem,
        value: f64,
    },
    Defect {
        section: Section,
        item: ScriptItem,
        category: DefectCategory,
        #[serde(rename = "type")]
        defect_type: String,
        location: DefectLocation,
        severity: Severity,
        #[serde(default)]
        remarks: String,
        #[serde(default)]
        marks: Vec<ScriptMark>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InspectionScript {
    pub actions: Vec<ScriptAction>,
}

impl InspectionScript {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Replays every action against the active checklist
    pub fn apply(&self, ctx: &mut InspectionContext) -> Result<usize> {
        for (index, action) in self.actions.iter().enumerate() {
            tracing::debug!(step = index + 1, ?action, "script action");
            apply_action(ctx, action.clone())?;
        }
        Ok(self.actions.len())
    }
}

fn apply_action(ctx: &mut InspectionContext, action: ScriptAction) -> Result<()> {
    match action {
        ScriptAction::Check { section, item } => {
            let item: ItemRef = item.into();
            let already = ctx
                .checklist()
                .item(section, item.clone())
                .map(|i| i.checked)
                .unwrap_or(false);
            if !already {
                ctx.checklist_mut().toggle_check(section, item)?;
            }
        }
        ScriptAction::CheckAll { section } => {
            ctx.checklist_mut().toggle_check_all(section, true)?;
        }
        ScriptAction::Value {
            section,
            item,
            value,
        } => {
            ctx.checklist_mut()
                .set_item_value_and_check(section, ItemRef::from(item), value)?;
        }
        ScriptAction::Defect {
            section,
            item,
            category,
            defect_type,
            location,
            severity,
            remarks,
            marks,
        } => {
            let item: ItemRef = item.into();
            let mut form = DefectForm::new();
            form.select_category(category);
            form.select_type(&defect_type)?;
            form.select_location(location)?;
            form.select_severity(severity)?;
            if !remarks.is_empty() {
                form.set_remarks(remarks)?;
            }
            ctx.commit_defect(section, item.clone(), &form)?;

            let mut canvas = MarkCanvas::new();
            for mark in marks {
                canvas.show(mark.image);
                canvas.measure(mark.width, mark.height);
                if ctx
                    .place_mark(section, item.clone(), &canvas, mark.x, mark.y)?
                    .is_none()
                {
                    tracing::warn!(x = mark.x, y = mark.y, image = %mark.image, "tap outside image, ignored");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pdi_common::VehicleInfo;

    fn context() -> InspectionContext {
        let mut ctx = InspectionContext::new();
        ctx.begin_inspection(
            VehicleInfo {
                chassis_no: "PM2TEST01".into(),
                variant: "BASE".into(),
                ..Default::default()
            },
            Utc::now(),
        );
        ctx
    }

    #[test]
    fn test_parse_actions() {
        let script: InspectionScript = serde_json::from_str(
            r#"{"actions":[
                {"action":"check_all","section":"A"},
                {"action":"check","section":"B","item":"Bonnet"},
                {"action":"value","section":"C","item":"Battery Terminal","value":12.4},
                {"action":"defect","section":"D","item":4,"category":"MECHANICAL","type":"noise",
                 "location":"Interior","severity":"Major"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(script.actions.len(), 4);
        assert!(matches!(script.actions[1], ScriptAction::Check { item: ScriptItem::Name(_), .. }));
        assert!(matches!(script.actions[3], ScriptAction::Defect { item: ScriptItem::Id(4), .. }));
    }

    #[test]
    fn test_check_all_then_measure_completes_section() {
        let mut ctx = context();
        let script = InspectionScript {
            actions: vec![
                ScriptAction::CheckAll { section: Section::C },
                ScriptAction::Value {
                    section: Section::C,
                    item: ScriptItem::Name("Battery Terminal".into()),
                    value: 12.6,
                },
            ],
        };
        script.apply(&mut ctx).unwrap();

        let checklist = ctx.checklist().checklist().unwrap();
        assert!(checklist[&Section::C].iter().all(|i| i.is_resolved()));
    }

    #[test]
    fn test_defect_with_marks() {
        let mut ctx = context();
        let first = ctx.checklist().checklist().unwrap()[&Section::B][0].id;
        let script = InspectionScript {
            actions: vec![ScriptAction::Defect {
                section: Section::B,
                item: ScriptItem::Id(first),
                category: DefectCategory::Painting,
                defect_type: "scratch".into(),
                location: DefectLocation::Exterior,
                severity: Severity::Minor,
                remarks: "near badge".into(),
                marks: vec![
                    ScriptMark { image: ImageKey::Vehicle2, x: 100.0, y: 75.0, width: 400.0, height: 300.0 },
                    ScriptMark { image: ImageKey::Vehicle2, x: 900.0, y: 75.0, width: 400.0, height: 300.0 },
                ],
            }],
        };
        script.apply(&mut ctx).unwrap();

        let item = ctx.checklist().item(Section::B, first).unwrap();
        assert!(item.defect);
        assert!(!item.checked);
        let details = item.defect_details.as_ref().unwrap();
        assert_eq!(details.defect_type.as_deref(), Some("Scratch"));
        assert_eq!(details.remarks, "near badge");
        // the second tap misses the image
        assert_eq!(details.marks.len(), 1);
        assert_eq!(details.marks[0].nx, 0.25);
        assert_eq!(details.selected_image, Some(ImageKey::Vehicle2));
    }

    #[test]
    fn test_invalid_type_stops_replay() {
        let mut ctx = context();
        let script = InspectionScript {
            actions: vec![
                ScriptAction::Defect {
                    section: Section::A,
                    item: ScriptItem::Id(1),
                    category: DefectCategory::Electrical,
                    defect_type: "Scratch".into(),
                    location: DefectLocation::Interior,
                    severity: Severity::Minor,
                    remarks: String::new(),
                    marks: vec![],
                },
                ScriptAction::CheckAll { section: Section::B },
            ],
        };
        assert!(script.apply(&mut ctx).is_err());
        let checklist = ctx.checklist().checklist().unwrap();
        assert!(checklist[&Section::B].iter().all(|i| !i.checked));
    }
}
