//! Defect detail capture
//!
//! Details are captured in a fixed order: category → type → location →
//! severity → remarks. `DefectForm` walks that order as a finite-state
//! machine; choosing an earlier field throws away everything after it and
//! moves focus to the next unfilled field. Remarks are optional; a form is
//! committable once severity is chosen.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::marks::{ImageKey, Mark};

/// Defect category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DefectCategory {
    Painting,
    Mechanical,
    Electrical,
}

const PAINTING_TYPES: &[&str] = &[
    "Scratch",
    "Dent",
    "Paint Run",
    "Orange Peel",
    "Overspray",
    "Colour Mismatch",
    "Chip",
    "Bubble",
];

const MECHANICAL_TYPES: &[&str] = &[
    "Noise",
    "Leak",
    "Loose Fitting",
    "Misalignment",
    "Missing Part",
    "Vibration",
    "Hard Operation",
];

const ELECTRICAL_TYPES: &[&str] = &[
    "Not Working",
    "Intermittent",
    "Wrong Indication",
    "Loose Connector",
    "Blown Fuse",
    "Short Circuit",
];

impl DefectCategory {
    pub const ALL: [DefectCategory; 3] = [
        DefectCategory::Painting,
        DefectCategory::Mechanical,
        DefectCategory::Electrical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DefectCategory::Painting => "PAINTING",
            DefectCategory::Mechanical => "MECHANICAL",
            DefectCategory::Electrical => "ELECTRICAL",
        }
    }

    /// Defect types offered once this category is chosen
    pub fn defect_types(&self) -> &'static [&'static str] {
        match self {
            DefectCategory::Painting => PAINTING_TYPES,
            DefectCategory::Mechanical => MECHANICAL_TYPES,
            DefectCategory::Electrical => ELECTRICAL_TYPES,
        }
    }

    /// Returns the vocabulary spelling of `defect_type` (case-insensitive match)
    pub fn canonical_type(&self, defect_type: &str) -> Option<&'static str> {
        let wanted = defect_type.trim();
        self.defect_types()
            .iter()
            .copied()
            .find(|t| t.eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for DefectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DefectCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PAINTING" => Ok(DefectCategory::Painting),
            "MECHANICAL" => Ok(DefectCategory::Mechanical),
            "ELECTRICAL" => Ok(DefectCategory::Electrical),
            _ => Err(format!("Unknown category: {}. Use painting, mechanical, or electrical", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefectLocation {
    Interior,
    Exterior,
}

impl DefectLocation {
    pub const ALL: [DefectLocation; 2] = [DefectLocation::Interior, DefectLocation::Exterior];

    pub fn as_str(&self) -> &'static str {
        match self {
            DefectLocation::Interior => "Interior",
            DefectLocation::Exterior => "Exterior",
        }
    }
}

impl fmt::Display for DefectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DefectLocation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "interior" => Ok(DefectLocation::Interior),
            "exterior" => Ok(DefectLocation::Exterior),
            _ => Err(format!("Unknown location: {}. Use interior or exterior", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Major,
    Minor,
}

impl Severity {
    pub const ALL: [Severity; 2] = [Severity::Major, Severity::Minor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Major => "Major",
            Severity::Minor => "Minor",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "major" => Ok(Severity::Major),
            "minor" => Ok(Severity::Minor),
            _ => Err(format!("Unknown severity: {}. Use major or minor", s)),
        }
    }
}

/// Defect payload attached to a checklist item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefectDetails {
    pub category: Option<DefectCategory>,
    #[serde(rename = "type")]
    pub defect_type: Option<String>,
    pub location: Option<DefectLocation>,
    pub severity: Option<Severity>,
    pub remarks: String,
    pub marks: Vec<Mark>,
    pub selected_image: Option<ImageKey>,
}

impl DefectDetails {
    /// Category, type, location and severity are all present
    pub fn is_filled(&self) -> bool {
        self.category.is_some()
            && self.defect_type.as_deref().is_some_and(|t| !t.is_empty())
            && self.location.is_some()
            && self.severity.is_some()
    }

    /// First in-range mark; this is the one sent to the backend
    pub fn first_mark(&self) -> Option<&Mark> {
        self.marks.iter().find(|m| m.is_valid())
    }

    pub fn marks_on(&self, image: ImageKey) -> impl Iterator<Item = &Mark> {
        self.marks.iter().filter(move |m| m.image == image)
    }

    /// Merges every `Some` field of `patch` into these details
    pub fn merge(&mut self, patch: DefectDetailsPatch) {
        if let Some(category) = patch.category {
            self.category = Some(category);
        }
        if let Some(defect_type) = patch.defect_type {
            self.defect_type = Some(defect_type);
        }
        if let Some(location) = patch.location {
            self.location = Some(location);
        }
        if let Some(severity) = patch.severity {
            self.severity = Some(severity);
        }
        if let Some(remarks) = patch.remarks {
            self.remarks = remarks;
        }
        if let Some(marks) = patch.marks {
            self.marks = marks;
        }
        if let Some(image) = patch.selected_image {
            self.selected_image = Some(image);
        }
    }
}

/// Partial update for `DefectDetails`; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefectDetailsPatch {
    pub category: Option<DefectCategory>,
    pub defect_type: Option<String>,
    pub location: Option<DefectLocation>,
    pub severity: Option<Severity>,
    pub remarks: Option<String>,
    pub marks: Option<Vec<Mark>>,
    pub selected_image: Option<ImageKey>,
}

/// Fields in disclosure order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Category,
    Type,
    Location,
    Severity,
    Remarks,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Category => "category",
            Field::Type => "type",
            Field::Location => "location",
            Field::Severity => "severity",
            Field::Remarks => "remarks",
        }
    }
}

/// Disclosure state. Each variant carries exactly the fields filled so far.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Disclosure {
    #[default]
    AwaitingCategory,
    AwaitingType {
        category: DefectCategory,
    },
    AwaitingLocation {
        category: DefectCategory,
        defect_type: &'static str,
    },
    AwaitingSeverity {
        category: DefectCategory,
        defect_type: &'static str,
        location: DefectLocation,
    },
    AwaitingRemarks {
        category: DefectCategory,
        defect_type: &'static str,
        location: DefectLocation,
        severity: Severity,
    },
    Ready {
        category: DefectCategory,
        defect_type: &'static str,
        location: DefectLocation,
        severity: Severity,
        remarks: String,
    },
}

/// Sequential-disclosure editor for one defect
#[derive(Debug, Clone, Default)]
pub struct DefectForm {
    state: Disclosure,
}

impl DefectForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes from previously stored details, stopping at the first gap.
    /// Stored values outside the vocabulary end the replay.
    pub fn from_details(details: &DefectDetails) -> Self {
        let mut form = Self::new();
        let Some(category) = details.category else {
            return form;
        };
        form.select_category(category);

        let replay = |form: &mut Self| -> Result<()> {
            let Some(defect_type) = details.defect_type.as_deref() else {
                return Ok(());
            };
            form.select_type(defect_type)?;
            let Some(location) = details.location else {
                return Ok(());
            };
            form.select_location(location)?;
            let Some(severity) = details.severity else {
                return Ok(());
            };
            form.select_severity(severity)?;
            if !details.remarks.is_empty() {
                form.set_remarks(details.remarks.clone())?;
            }
            Ok(())
        };
        if let Err(e) = replay(&mut form) {
            tracing::debug!("stopped resuming defect details: {}", e);
        }
        form
    }

    pub fn state(&self) -> &Disclosure {
        &self.state
    }

    pub fn category(&self) -> Option<DefectCategory> {
        match &self.state {
            Disclosure::AwaitingCategory => None,
            Disclosure::AwaitingType { category }
            | Disclosure::AwaitingLocation { category, .. }
            | Disclosure::AwaitingSeverity { category, .. }
            | Disclosure::AwaitingRemarks { category, .. }
            | Disclosure::Ready { category, .. } => Some(*category),
        }
    }

    /// Options for the type field; empty until a category is chosen
    pub fn type_options(&self) -> &'static [&'static str] {
        self.category().map(|c| c.defect_types()).unwrap_or(&[])
    }

    /// The field whose control should be open next.
    /// `Remarks` while committable but without remarks, `None` once remarks are entered.
    pub fn focus(&self) -> Option<Field> {
        match &self.state {
            Disclosure::AwaitingCategory => Some(Field::Category),
            Disclosure::AwaitingType { .. } => Some(Field::Type),
            Disclosure::AwaitingLocation { .. } => Some(Field::Location),
            Disclosure::AwaitingSeverity { .. } => Some(Field::Severity),
            Disclosure::AwaitingRemarks { .. } => Some(Field::Remarks),
            Disclosure::Ready { .. } => None,
        }
    }

    /// Category, type, location and severity are set; marking and committing are enabled
    pub fn is_ready(&self) -> bool {
        matches!(
            self.state,
            Disclosure::AwaitingRemarks { .. } | Disclosure::Ready { .. }
        )
    }

    /// Always allowed; clears type, location, severity and remarks
    pub fn select_category(&mut self, category: DefectCategory) {
        self.state = Disclosure::AwaitingType { category };
    }

    /// Clears location, severity and remarks
    pub fn select_type(&mut self, defect_type: &str) -> Result<()> {
        let category = self.category().ok_or(Error::OutOfOrder {
            field: "type",
            missing: "category",
        })?;
        let defect_type = category
            .canonical_type(defect_type)
            .ok_or_else(|| Error::InvalidDefectType {
                category: category.to_string(),
                defect_type: defect_type.to_string(),
            })?;
        self.state = Disclosure::AwaitingLocation {
            category,
            defect_type,
        };
        Ok(())
    }

    /// Clears severity and remarks
    pub fn select_location(&mut self, location: DefectLocation) -> Result<()> {
        let (category, defect_type) = match &self.state {
            Disclosure::AwaitingLocation {
                category,
                defect_type,
            }
            | Disclosure::AwaitingSeverity {
                category,
                defect_type,
                ..
            }
            | Disclosure::AwaitingRemarks {
                category,
                defect_type,
                ..
            }
            | Disclosure::Ready {
                category,
                defect_type,
                ..
            } => (*category, *defect_type),
            _ => {
                return Err(Error::OutOfOrder {
                    field: "location",
                    missing: "type",
                })
            }
        };
        self.state = Disclosure::AwaitingSeverity {
            category,
            defect_type,
            location,
        };
        Ok(())
    }

    /// Clears remarks
    pub fn select_severity(&mut self, severity: Severity) -> Result<()> {
        let (category, defect_type, location) = match &self.state {
            Disclosure::AwaitingSeverity {
                category,
                defect_type,
                location,
            }
            | Disclosure::AwaitingRemarks {
                category,
                defect_type,
                location,
                ..
            }
            | Disclosure::Ready {
                category,
                defect_type,
                location,
                ..
            } => (*category, *defect_type, *location),
            _ => {
                return Err(Error::OutOfOrder {
                    field: "severity",
                    missing: "location",
                })
            }
        };
        self.state = Disclosure::AwaitingRemarks {
            category,
            defect_type,
            location,
            severity,
        };
        Ok(())
    }

    /// Blank remarks return the form to `AwaitingRemarks`
    pub fn set_remarks(&mut self, remarks: impl Into<String>) -> Result<()> {
        let remarks = remarks.into();
        let (category, defect_type, location, severity) = match &self.state {
            Disclosure::AwaitingRemarks {
                category,
                defect_type,
                location,
                severity,
            }
            | Disclosure::Ready {
                category,
                defect_type,
                location,
                severity,
                ..
            } => (*category, *defect_type, *location, *severity),
            _ => {
                return Err(Error::OutOfOrder {
                    field: "remarks",
                    missing: "severity",
                })
            }
        };
        self.state = if remarks.trim().is_empty() {
            Disclosure::AwaitingRemarks {
                category,
                defect_type,
                location,
                severity,
            }
        } else {
            Disclosure::Ready {
                category,
                defect_type,
                location,
                severity,
                remarks,
            }
        };
        Ok(())
    }

    /// Patch carrying every disclosure field; fails until the form is ready.
    /// Marks and the selected image are left to the mark canvas.
    pub fn to_patch(&self) -> Result<DefectDetailsPatch> {
        let (category, defect_type, location, severity, remarks) = match &self.state {
            Disclosure::AwaitingRemarks {
                category,
                defect_type,
                location,
                severity,
            } => (*category, *defect_type, *location, *severity, String::new()),
            Disclosure::Ready {
                category,
                defect_type,
                location,
                severity,
                remarks,
            } => (*category, *defect_type, *location, *severity, remarks.clone()),
            _ => {
                let missing = self.focus().map(|f| f.as_str()).unwrap_or("remarks");
                return Err(Error::Incomplete(format!("defect details are missing {}", missing)));
            }
        };
        Ok(DefectDetailsPatch {
            category: Some(category),
            defect_type: Some(defect_type.to_string()),
            location: Some(location),
            severity: Some(severity),
            remarks: Some(remarks),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ready_form() -> DefectForm {
        let mut form = DefectForm::new();
        form.select_category(DefectCategory::Painting);
        form.select_type("Scratch").unwrap();
        form.select_location(DefectLocation::Exterior).unwrap();
        form.select_severity(Severity::Minor).unwrap();
        form
    }

    #[test]
    fn test_new_form_awaits_category() {
        let form = DefectForm::new();
        assert_eq!(form.focus(), Some(Field::Category));
        assert!(!form.is_ready());
        assert!(form.type_options().is_empty());
    }

    #[test]
    fn test_type_before_category_is_rejected() {
        let mut form = DefectForm::new();
        let err = form.select_type("Scratch").unwrap_err();
        assert!(matches!(err, Error::OutOfOrder { field: "type", .. }));
        assert_eq!(form.state(), &Disclosure::AwaitingCategory);
    }

    #[test]
    fn test_later_fields_rejected_out_of_order() {
        let mut form = DefectForm::new();
        assert!(form.select_location(DefectLocation::Interior).is_err());
        assert!(form.select_severity(Severity::Major).is_err());
        assert!(form.set_remarks("note").is_err());

        form.select_category(DefectCategory::Mechanical);
        assert!(form.select_severity(Severity::Major).is_err());
    }

    #[test]
    fn test_type_must_belong_to_category() {
        let mut form = DefectForm::new();
        form.select_category(DefectCategory::Electrical);
        let err = form.select_type("Scratch").unwrap_err();
        assert!(matches!(err, Error::InvalidDefectType { .. }));
        assert_eq!(form.focus(), Some(Field::Type));
    }

    #[test]
    fn test_type_match_is_case_insensitive() {
        let mut form = DefectForm::new();
        form.select_category(DefectCategory::Painting);
        form.select_type("paint run").unwrap();
        let patch = {
            form.select_location(DefectLocation::Exterior).unwrap();
            form.select_severity(Severity::Major).unwrap();
            form.to_patch().unwrap()
        };
        assert_eq!(patch.defect_type.as_deref(), Some("Paint Run"));
    }

    #[test]
    fn test_sequence_reaches_ready() {
        let mut form = ready_form();
        assert!(form.is_ready());
        assert_eq!(form.focus(), Some(Field::Remarks));

        form.set_remarks("near fuel lid").unwrap();
        assert!(form.is_ready());
        assert_eq!(form.focus(), None);
    }

    #[test]
    fn test_changing_category_clears_later_fields() {
        let mut form = ready_form();
        form.set_remarks("note").unwrap();

        form.select_category(DefectCategory::Mechanical);
        assert_eq!(
            form.state(),
            &Disclosure::AwaitingType {
                category: DefectCategory::Mechanical
            }
        );
        assert!(form.to_patch().is_err());
    }

    #[test]
    fn test_changing_location_clears_severity() {
        let mut form = ready_form();
        form.select_location(DefectLocation::Interior).unwrap();
        assert_eq!(form.focus(), Some(Field::Severity));
        assert!(!form.is_ready());
    }

    #[test]
    fn test_blank_remarks_stay_optional() {
        let mut form = ready_form();
        form.set_remarks("something").unwrap();
        form.set_remarks("   ").unwrap();
        assert_eq!(form.focus(), Some(Field::Remarks));
        assert!(form.is_ready());
    }

    #[test]
    fn test_patch_requires_ready() {
        let mut form = DefectForm::new();
        form.select_category(DefectCategory::Painting);
        let err = form.to_patch().unwrap_err();
        assert!(format!("{}", err).contains("type"));
    }

    #[test]
    fn test_patch_contents() {
        let mut form = ready_form();
        form.set_remarks("left rear").unwrap();
        let patch = form.to_patch().unwrap();
        assert_eq!(patch.category, Some(DefectCategory::Painting));
        assert_eq!(patch.defect_type.as_deref(), Some("Scratch"));
        assert_eq!(patch.location, Some(DefectLocation::Exterior));
        assert_eq!(patch.severity, Some(Severity::Minor));
        assert_eq!(patch.remarks.as_deref(), Some("left rear"));
        assert!(patch.marks.is_none());
    }

    #[test]
    fn test_resume_from_details() {
        let details = DefectDetails {
            category: Some(DefectCategory::Electrical),
            defect_type: Some("Blown Fuse".to_string()),
            location: None,
            ..Default::default()
        };
        let form = DefectForm::from_details(&details);
        assert_eq!(form.focus(), Some(Field::Location));
        assert_eq!(form.category(), Some(DefectCategory::Electrical));
    }

    #[test]
    fn test_resume_stops_at_invalid_type() {
        let details = DefectDetails {
            category: Some(DefectCategory::Electrical),
            defect_type: Some("Scratch".to_string()),
            location: Some(DefectLocation::Interior),
            ..Default::default()
        };
        let form = DefectForm::from_details(&details);
        assert_eq!(form.focus(), Some(Field::Type));
    }

    #[test]
    fn test_merge_keeps_unpatched_fields() {
        let mut details = DefectDetails {
            remarks: "keep".to_string(),
            selected_image: Some(ImageKey::Vehicle3),
            ..Default::default()
        };
        details.merge(DefectDetailsPatch {
            category: Some(DefectCategory::Painting),
            ..Default::default()
        });
        assert_eq!(details.category, Some(DefectCategory::Painting));
        assert_eq!(details.remarks, "keep");
        assert_eq!(details.selected_image, Some(ImageKey::Vehicle3));
    }

    #[test]
    fn test_first_mark_skips_invalid() {
        let details = DefectDetails {
            marks: vec![
                Mark { nx: 1.5, ny: 0.2, image: ImageKey::Vehicle1 },
                Mark { nx: 0.3, ny: 0.4, image: ImageKey::Vehicle2 },
            ],
            ..Default::default()
        };
        let first = details.first_mark().unwrap();
        assert_eq!(first.image, ImageKey::Vehicle2);
    }

    #[test]
    fn test_details_serde_uses_type_key() {
        let details = DefectDetails {
            category: Some(DefectCategory::Painting),
            defect_type: Some("Dent".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&details).unwrap();
        assert!(json.contains("\"category\":\"PAINTING\""));
        assert!(json.contains("\"type\":\"Dent\""));
        assert!(json.contains("\"selectedImage\":null"));
    }
}
