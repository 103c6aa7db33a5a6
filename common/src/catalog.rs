//! Checklist item catalogs
//!
//! Two fixed catalogs, one per vehicle variant:
//! - BASE: 111 items
//! - PLUS: 124 items (BASE plus trim-specific equipment)
//!
//! Item ids are unique across both catalogs (BASE starts at 1, PLUS at 1001).
//! Catalogs are templates: `catalog_for` always returns a fresh copy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Lettered checklist section, ordered A..F then Overall
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Section {
    A,
    B,
    C,
    D,
    E,
    F,
    Overall,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::A,
        Section::B,
        Section::C,
        Section::D,
        Section::E,
        Section::F,
        Section::Overall,
    ];

    /// 1-based position, used as the numeric section code on the wire
    pub fn number(&self) -> u32 {
        match self {
            Section::A => 1,
            Section::B => 2,
            Section::C => 3,
            Section::D => 4,
            Section::E => 5,
            Section::F => 6,
            Section::Overall => 7,
        }
    }

    /// Maps the rectification API's numeric code back to a section.
    /// 7 and anything unknown land in `Overall` (shown as "Others").
    pub fn from_number(number: u32) -> Section {
        match number {
            1 => Section::A,
            2 => Section::B,
            3 => Section::C,
            4 => Section::D,
            5 => Section::E,
            6 => Section::F,
            _ => Section::Overall,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::A => "A",
            Section::B => "B",
            Section::C => "C",
            Section::D => "D",
            Section::E => "E",
            Section::F => "F",
            Section::Overall => "Overall",
        }
    }

    /// Heading shown above the section's items
    pub fn title(&self) -> &'static str {
        match self {
            Section::A => "Documents & Accessories",
            Section::B => "Exterior",
            Section::C => "Electrical",
            Section::D => "Interior",
            Section::E => "Engine Bay",
            Section::F => "Underbody & Road Test",
            Section::Overall => "Overall",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Section {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(Section::A),
            "B" => Ok(Section::B),
            "C" => Ok(Section::C),
            "D" => Ok(Section::D),
            "E" => Ok(Section::E),
            "F" => Ok(Section::F),
            "OVERALL" => Ok(Section::Overall),
            _ => Err(Error::UnknownSection(s.to_string())),
        }
    }
}

/// Vehicle trim level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Variant {
    #[default]
    Base,
    Plus,
}

impl Variant {
    /// Case-insensitive; anything that isn't PLUS is BASE
    pub fn parse(s: &str) -> Variant {
        if s.trim().eq_ignore_ascii_case("plus") {
            Variant::Plus
        } else {
            Variant::Base
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Base => "BASE",
            Variant::Plus => "PLUS",
        }
    }

    fn first_id(&self) -> u32 {
        match self {
            Variant::Base => 1,
            Variant::Plus => 1001,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Catalog-sourced item definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: u32,
    pub section: Section,
    pub name: String,
}

impl ItemDefinition {
    /// The battery terminal item needs a voltage reading before it counts as checked
    pub fn requires_measurement(&self) -> bool {
        is_measurement_item(self.section, &self.name)
    }
}

/// Section-grouped catalog
pub type SectionMap = BTreeMap<Section, Vec<ItemDefinition>>;

pub const MEASUREMENT_ITEM_SECTION: Section = Section::C;
pub const MEASUREMENT_ITEM_NAME: &str = "Battery Terminal";

pub fn is_measurement_item(section: Section, name: &str) -> bool {
    section == MEASUREMENT_ITEM_SECTION && name == MEASUREMENT_ITEM_NAME
}

const BASE_ITEMS: &[(Section, &str)] = &[
    // A
    (Section::A, "Chassis Number Matches Documents"),
    (Section::A, "Engine Number Matches Documents"),
    (Section::A, "Owner's Manual"),
    (Section::A, "Service Booklet"),
    (Section::A, "Warranty Card"),
    (Section::A, "Spare Key"),
    (Section::A, "Tool Kit"),
    (Section::A, "Jack & Handle"),
    (Section::A, "Spare Tyre"),
    (Section::A, "Warning Triangle"),
    (Section::A, "First Aid Kit"),
    (Section::A, "Floor Mats"),
    // B
    (Section::B, "Front Bumper"),
    (Section::B, "Rear Bumper"),
    (Section::B, "Bonnet"),
    (Section::B, "Boot Lid"),
    (Section::B, "Roof Panel"),
    (Section::B, "Front Left Fender"),
    (Section::B, "Front Right Fender"),
    (Section::B, "Rear Left Quarter Panel"),
    (Section::B, "Rear Right Quarter Panel"),
    (Section::B, "Front Left Door"),
    (Section::B, "Front Right Door"),
    (Section::B, "Rear Left Door"),
    (Section::B, "Rear Right Door"),
    (Section::B, "Windscreen"),
    (Section::B, "Rear Windscreen"),
    (Section::B, "Side Mirrors"),
    (Section::B, "Door Handles"),
    (Section::B, "Wheel Rims"),
    (Section::B, "Tyre Condition"),
    (Section::B, "Tyre Pressure"),
    (Section::B, "Wiper Blades"),
    (Section::B, "Fuel Filler Cap"),
    // C
    (Section::C, MEASUREMENT_ITEM_NAME),
    (Section::C, "Headlamps Low Beam"),
    (Section::C, "Headlamps High Beam"),
    (Section::C, "Front Fog Lamps"),
    (Section::C, "Tail Lamps"),
    (Section::C, "Brake Lamps"),
    (Section::C, "Reverse Lamps"),
    (Section::C, "Turn Signals"),
    (Section::C, "Hazard Lamps"),
    (Section::C, "Number Plate Lamp"),
    (Section::C, "Horn"),
    (Section::C, "Front Wiper Operation"),
    (Section::C, "Rear Wiper Operation"),
    (Section::C, "Washer Spray"),
    (Section::C, "Power Windows"),
    (Section::C, "Central Locking"),
    (Section::C, "Remote Key Function"),
    (Section::C, "Instrument Cluster Warning Lamps"),
    (Section::C, "Audio System"),
    (Section::C, "Charging Ports"),
    // D
    (Section::D, "Dashboard Panel"),
    (Section::D, "Steering Wheel"),
    (Section::D, "Horn Pad"),
    (Section::D, "Driver Seat"),
    (Section::D, "Front Passenger Seat"),
    (Section::D, "Rear Seats"),
    (Section::D, "Seat Belts Front"),
    (Section::D, "Seat Belts Rear"),
    (Section::D, "Seat Adjustment"),
    (Section::D, "Headliner"),
    (Section::D, "Sun Visors"),
    (Section::D, "Interior Lamps"),
    (Section::D, "Interior Mirror"),
    (Section::D, "Door Trims"),
    (Section::D, "Carpet"),
    (Section::D, "Glove Box"),
    (Section::D, "Centre Console"),
    (Section::D, "Air Conditioning Cooling"),
    (Section::D, "Blower Speeds"),
    (Section::D, "Air Vents"),
    (Section::D, "Child Lock"),
    (Section::D, "Boot Trim"),
    // E
    (Section::E, "Engine Oil Level"),
    (Section::E, "Coolant Level"),
    (Section::E, "Brake Fluid Level"),
    (Section::E, "Power Steering Fluid"),
    (Section::E, "Washer Fluid Level"),
    (Section::E, "Drive Belt"),
    (Section::E, "Radiator Hoses"),
    (Section::E, "Air Filter Housing"),
    (Section::E, "Engine Mounting"),
    (Section::E, "Oil Leaks"),
    (Section::E, "Coolant Leaks"),
    (Section::E, "Battery Hold-Down"),
    (Section::E, "Wiring Harness"),
    (Section::E, "Bonnet Latch"),
    (Section::E, "Engine Idle"),
    (Section::E, "Engine Noise"),
    // F
    (Section::F, "Brake Pedal Feel"),
    (Section::F, "Parking Brake"),
    (Section::F, "Clutch Operation"),
    (Section::F, "Gear Shift"),
    (Section::F, "Steering Alignment"),
    (Section::F, "Suspension Noise"),
    (Section::F, "Exhaust System"),
    (Section::F, "Fuel Lines"),
    (Section::F, "Brake Lines"),
    (Section::F, "Underbody Coating"),
    (Section::F, "Drive Shafts"),
    (Section::F, "ABS Function"),
    (Section::F, "Speedometer"),
    (Section::F, "Road Test Noise"),
    // Overall
    (Section::Overall, "Overall Cleanliness"),
    (Section::Overall, "Paint Finish"),
    (Section::Overall, "Panel Gaps"),
    (Section::Overall, "Water Leak Test"),
    (Section::Overall, "Final Road Readiness"),
];

/// Equipment only fitted on the PLUS trim
const PLUS_EXTRA_ITEMS: &[(Section, &str)] = &[
    (Section::B, "Sunroof Glass"),
    (Section::B, "Roof Rails"),
    (Section::B, "Alloy Wheel Finish"),
    (Section::C, "Reverse Camera"),
    (Section::C, "Rear Parking Sensors"),
    (Section::C, "Push Start Button"),
    (Section::C, "Touchscreen Infotainment"),
    (Section::D, "Leather Upholstery"),
    (Section::D, "Rear Air Vents"),
    (Section::D, "Cruise Control Switches"),
    (Section::D, "Wireless Charger"),
    (Section::E, "Turbo Intake Hoses"),
    (Section::Overall, "Feature Demonstration"),
];

/// Returns a fresh copy of the catalog for `variant` (unknown variants get BASE)
pub fn catalog_for(variant: &str) -> SectionMap {
    build_catalog(Variant::parse(variant))
}

pub fn build_catalog(variant: Variant) -> SectionMap {
    let mut map: SectionMap = Section::ALL.iter().map(|s| (*s, Vec::new())).collect();

    let extras: &[(Section, &str)] = match variant {
        Variant::Base => &[],
        Variant::Plus => PLUS_EXTRA_ITEMS,
    };

    // extras follow the base items of their own section
    let mut next_id = variant.first_id();
    for section in Section::ALL {
        let names = BASE_ITEMS
            .iter()
            .chain(extras.iter())
            .filter(|(s, _)| *s == section)
            .map(|(_, name)| *name);

        let items = map.entry(section).or_default();
        for name in names {
            items.push(ItemDefinition {
                id: next_id,
                section,
                name: name.to_string(),
            });
            next_id += 1;
        }
    }

    map
}

/// Total item count across all sections
pub fn item_count<T>(map: &BTreeMap<Section, Vec<T>>) -> usize {
    map.values().map(|items| items.len()).sum()
}
