// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw printer status as exposed by the printer client.
//!
//! Printers report different subsets of these fields depending on model
//! and firmware (AMS units, dual extruders, chamber sensors), so every field
//! is optional. When parsed from JSON, a field with an unexpected type is
//! dropped on its own instead of failing the whole report.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// An enum-like value reported by the printer.
///
/// Most enum-like fields arrive as symbolic names (`"X1C"`, `"HEATING"`),
/// but some firmware sends bare codes. Both are kept so the serializer can
/// prefer the name and fall back to the code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValue {
    /// A symbolic name.
    Name(String),
    /// Any other representation (number, null, ...).
    Other(serde_json::Value),
}

impl EnumValue {
    /// Creates a named value.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Returns the symbolic name, or the string form of the raw value.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Name(name) => name.clone(),
            Self::Other(serde_json::Value::String(s)) => s.clone(),
            Self::Other(value) => value.to_string(),
        }
    }
}

impl From<&str> for EnumValue {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Configuration-side information the client learned from the printer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterInfo {
    #[serde(deserialize_with = "lenient")]
    pub printer_model: Option<EnumValue>,
    #[serde(deserialize_with = "lenient")]
    pub firmware_version: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub auto_recovery: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub filament_tangle_detect: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub sound_enable: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub auto_switch_filament: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub buildplate_marker_detector: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub startup_read_option: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub tray_read_option: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub calibrate_remain_flag: Option<bool>,
}

/// Live status of a printer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterStatus {
    // Print job
    #[serde(deserialize_with = "lenient")]
    pub gcode_state: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub current_stage_id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub current_stage_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub subtask_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub print_percentage: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub remaining_minutes: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub elapsed_minutes: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub current_layer: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub total_layers: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub print_error: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub print_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub current_3mf_file: Option<String>,
    #[serde(deserialize_with = "lenient_vec")]
    pub skipped_objects: Vec<i64>,

    // Active tool
    #[serde(deserialize_with = "lenient")]
    pub active_tool: Option<EnumValue>,
    #[serde(deserialize_with = "lenient")]
    pub is_external_spool_active: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub target_tray_id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub active_nozzle_temp: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub active_nozzle_temp_target: Option<f64>,

    #[serde(deserialize_with = "lenient")]
    pub climate: Option<Climate>,
    #[serde(deserialize_with = "lenient")]
    pub capabilities: Option<Capabilities>,

    // Nozzle and controls
    #[serde(deserialize_with = "lenient")]
    pub nozzle_diameter: Option<EnumValue>,
    #[serde(deserialize_with = "lenient")]
    pub nozzle_type: Option<EnumValue>,
    #[serde(deserialize_with = "lenient")]
    pub speed_level: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub light_state: Option<bool>,

    // AMS
    #[serde(deserialize_with = "lenient")]
    pub active_ams_id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub active_tray_id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub active_tray_state: Option<EnumValue>,
    #[serde(deserialize_with = "lenient")]
    pub ams_status_text: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub ams_connected_count: Option<i64>,
    #[serde(deserialize_with = "lenient_vec")]
    pub ams_units: Vec<AmsUnit>,

    #[serde(deserialize_with = "lenient_vec")]
    pub extruders: Vec<Extruder>,
    #[serde(deserialize_with = "lenient_vec")]
    pub spools: Vec<Option<Spool>>,
    #[serde(deserialize_with = "lenient_vec")]
    pub hms_errors: Vec<serde_json::Value>,
    #[serde(deserialize_with = "lenient")]
    pub wifi_signal: Option<String>,
}

impl PrinterStatus {
    /// Parses a status report from JSON, keeping every field that has the
    /// expected shape.
    ///
    /// Returns the default (empty) status if the value is not an object.
    ///
    /// # Examples
    ///
    /// ```
    /// use bambu_fleet::client::PrinterStatus;
    ///
    /// let json = serde_json::json!({"gcode_state": "RUNNING", "print_percentage": "oops"});
    /// let status = PrinterStatus::from_json(json);
    ///
    /// assert_eq!(status.gcode_state.as_deref(), Some("RUNNING"));
    /// assert_eq!(status.print_percentage, None);
    /// ```
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// Temperatures, fans and air management.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Climate {
    #[serde(deserialize_with = "lenient")]
    pub bed_temp: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub bed_temp_target: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub chamber_temp: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub chamber_temp_target: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub part_cooling_fan_speed_percent: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub aux_fan_speed_percent: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub exhaust_fan_speed_percent: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub heatbreak_fan_speed_percent: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub airduct_mode: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub airduct_sub_mode: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub air_conditioning_mode: Option<EnumValue>,
    #[serde(deserialize_with = "lenient")]
    pub zone_intake_open: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub zone_part_fan_percent: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub zone_aux_percent: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub zone_exhaust_percent: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub zone_top_vent_open: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub is_chamber_door_open: Option<bool>,
}

/// Hardware features the printer reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    #[serde(deserialize_with = "lenient")]
    pub has_ams: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub has_camera: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub has_chamber_temp: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub has_dual_extruder: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub has_air_filtration: Option<bool>,
}

/// One AMS (automatic material system) unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmsUnit {
    #[serde(deserialize_with = "lenient")]
    pub ams_id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub chip_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub model: Option<EnumValue>,
    #[serde(deserialize_with = "lenient")]
    pub temp_actual: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub temp_target: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub humidity_index: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub humidity_raw: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub heater_state: Option<EnumValue>,
    #[serde(deserialize_with = "lenient")]
    pub dry_time: Option<i64>,
    #[serde(deserialize_with = "lenient_vec")]
    pub tray_exists: Vec<bool>,
    #[serde(deserialize_with = "lenient")]
    pub assigned_to_extruder: Option<EnumValue>,
}

/// One extruder (H2D-class printers have two).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Extruder {
    #[serde(deserialize_with = "lenient")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub temp: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub temp_target: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub info_bits: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub state: Option<EnumValue>,
    #[serde(deserialize_with = "lenient")]
    pub status: Option<EnumValue>,
    #[serde(deserialize_with = "lenient")]
    pub active_tray_id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub target_tray_id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub tray_state: Option<EnumValue>,
    #[serde(deserialize_with = "lenient")]
    pub assigned_to_ams_id: Option<i64>,
}

/// A filament spool loaded in an AMS slot or the external holder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spool {
    #[serde(deserialize_with = "lenient")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub ams_id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub slot_id: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub tray_info_idx: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub filament_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub color: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub sub_brands: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub nozzle_temp_min: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub nozzle_temp_max: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub remaining_percent: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub k: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub bed_temp: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub drying_temp: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub drying_time: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    pub tray_weight: Option<i64>,
}

/// Deserializes an optional field, turning a value of the wrong shape into `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Deserializes a list, skipping elements of the wrong shape.
///
/// Anything other than an array yields an empty list.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}
