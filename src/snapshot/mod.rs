// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Flat, display-ready printer state.
//!
//! [`serialize_state`] maps a client [`StatusReport`] into a [`StateSnapshot`]
//! with a fixed shape. Absent fields take neutral defaults (`0`, `""`, empty
//! lists; `-1` for spool identifiers), so consumers never have to handle a
//! missing key.
//!
//! # Examples
//!
//! ```
//! use bambu_fleet::client::StatusReport;
//! use bambu_fleet::snapshot::serialize_state;
//!
//! let snapshot = serialize_state(&StatusReport::default());
//!
//! assert_eq!(snapshot.service_state, "no_service");
//! assert_eq!(snapshot.bed_temp, 0.0);
//! assert!(snapshot.ams_units.is_empty());
//! ```

use serde::Serialize;

use crate::client::{
    AmsUnit, Capabilities, Climate, EnumValue, Extruder, PrinterStatus, Spool, StatusReport,
};

/// Immutable snapshot of one printer's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct StateSnapshot {
    // Connection
    pub service_state: String,
    pub printer_model: String,
    pub firmware_version: String,

    // Print job
    pub gcode_state: String,
    pub current_stage_id: i64,
    pub current_stage_name: String,
    pub subtask_name: String,
    pub print_percentage: i64,
    pub remaining_minutes: i64,
    pub elapsed_minutes: i64,
    pub current_layer: i64,
    pub total_layers: i64,
    pub print_error: i64,
    pub print_type: String,
    pub current_3mf_file: String,
    pub skipped_objects: Vec<i64>,

    // Active tool
    pub active_tool: String,
    pub is_external_spool_active: bool,
    pub target_tray_id: i64,

    // Temperatures
    pub bed_temp: f64,
    pub bed_temp_target: f64,
    pub nozzle_temp: f64,
    pub nozzle_temp_target: f64,
    pub chamber_temp: f64,
    pub chamber_temp_target: f64,

    // Fans
    pub part_fan_speed: i64,
    pub aux_fan_speed: i64,
    pub exhaust_fan_speed: i64,
    pub heatbreak_fan_speed: i64,

    // Air management
    pub airduct_mode: i64,
    pub airduct_sub_mode: i64,
    pub air_conditioning_mode: String,
    pub zone_intake_open: bool,
    pub zone_part_fan_percent: i64,
    pub zone_aux_percent: i64,
    pub zone_exhaust_percent: i64,
    pub zone_top_vent_open: bool,
    pub is_chamber_door_open: bool,

    pub nozzle_diameter: String,
    pub nozzle_type: String,
    pub speed_level: i64,
    pub light_state: bool,

    // AMS
    pub active_ams_id: i64,
    pub active_tray_id: i64,
    pub active_tray_state: String,
    pub ams_status_text: String,
    pub ams_connected_count: i64,
    pub ams_units: Vec<AmsUnitSnapshot>,

    pub extruders: Vec<ExtruderSnapshot>,
    /// One entry per spool position; `None` for an empty slot.
    pub spools: Vec<Option<SpoolSnapshot>>,
    pub hms_errors: Vec<serde_json::Value>,

    // Capabilities
    pub has_ams: bool,
    pub has_camera: bool,
    pub has_chamber_temp: bool,
    pub has_dual_extruder: bool,
    pub has_air_filtration: bool,

    // Print options
    pub auto_recovery: bool,
    pub filament_tangle_detect: bool,
    pub sound_enable: bool,
    pub auto_switch_filament: bool,

    // AMS settings
    pub buildplate_marker_detector: bool,
    pub startup_read_option: bool,
    pub tray_read_option: bool,
    pub calibrate_remain_flag: bool,

    pub wifi_signal: String,
}

/// One AMS unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AmsUnitSnapshot {
    pub ams_id: i64,
    pub chip_id: String,
    pub model: String,
    pub temp_actual: f64,
    pub temp_target: f64,
    pub humidity_index: i64,
    pub humidity_raw: i64,
    pub heater_state: String,
    pub dry_time: i64,
    pub tray_exists: Vec<bool>,
    pub assigned_to_extruder: String,
}

/// One extruder.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtruderSnapshot {
    pub id: i64,
    pub temp: f64,
    pub temp_target: f64,
    pub info_bits: i64,
    pub state: String,
    pub status: String,
    pub active_tray_id: i64,
    pub target_tray_id: i64,
    pub tray_state: String,
    pub assigned_to_ams_id: i64,
}

/// One loaded spool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpoolSnapshot {
    pub id: i64,
    pub tray_id: i64,
    pub ams_id: i64,
    pub slot_id: i64,
    pub tray_info_idx: String,
    pub tray_type: String,
    pub tray_color: String,
    pub tray_id_name: String,
    pub sub_brands: String,
    pub nozzle_temp_min: i64,
    pub nozzle_temp_max: i64,
    pub remain_percent: i64,
    pub k: f64,
    pub bed_temp: i64,
    pub drying_temp: i64,
    pub drying_time: i64,
    pub tray_weight: i64,
}

/// Maps a client status report into a [`StateSnapshot`].
///
/// Never fails: every absent field is replaced by its neutral default.
#[must_use]
pub fn serialize_state(report: &StatusReport) -> StateSnapshot {
    let info = &report.info;
    let status = &report.status;
    let default_climate = Climate::default();
    let climate = status.climate.as_ref().unwrap_or(&default_climate);
    let default_caps = Capabilities::default();
    let caps = status.capabilities.as_ref().unwrap_or(&default_caps);

    StateSnapshot {
        service_state: report.service_state.to_string(),
        printer_model: name_of(info.printer_model.as_ref()),
        firmware_version: text(info.firmware_version.as_ref()),

        gcode_state: text(status.gcode_state.as_ref()),
        current_stage_id: status.current_stage_id.unwrap_or_default(),
        current_stage_name: text(status.current_stage_name.as_ref()),
        subtask_name: text(status.subtask_name.as_ref()),
        print_percentage: status.print_percentage.unwrap_or_default(),
        remaining_minutes: status.remaining_minutes.unwrap_or_default(),
        elapsed_minutes: status.elapsed_minutes.unwrap_or_default(),
        current_layer: status.current_layer.unwrap_or_default(),
        total_layers: status.total_layers.unwrap_or_default(),
        print_error: status.print_error.unwrap_or_default(),
        print_type: text(status.print_type.as_ref()),
        current_3mf_file: text(status.current_3mf_file.as_ref()),
        skipped_objects: status.skipped_objects.clone(),

        active_tool: name_of(status.active_tool.as_ref()),
        is_external_spool_active: status.is_external_spool_active.unwrap_or_default(),
        target_tray_id: status.target_tray_id.unwrap_or_default(),

        bed_temp: climate.bed_temp.unwrap_or_default(),
        bed_temp_target: climate.bed_temp_target.unwrap_or_default(),
        nozzle_temp: status.active_nozzle_temp.unwrap_or_default(),
        nozzle_temp_target: status.active_nozzle_temp_target.unwrap_or_default(),
        chamber_temp: climate.chamber_temp.unwrap_or_default(),
        chamber_temp_target: climate.chamber_temp_target.unwrap_or_default(),

        part_fan_speed: climate.part_cooling_fan_speed_percent.unwrap_or_default(),
        aux_fan_speed: climate.aux_fan_speed_percent.unwrap_or_default(),
        exhaust_fan_speed: climate.exhaust_fan_speed_percent.unwrap_or_default(),
        heatbreak_fan_speed: climate.heatbreak_fan_speed_percent.unwrap_or_default(),

        airduct_mode: climate.airduct_mode.unwrap_or_default(),
        airduct_sub_mode: climate.airduct_sub_mode.unwrap_or_default(),
        air_conditioning_mode: name_of(climate.air_conditioning_mode.as_ref()),
        zone_intake_open: climate.zone_intake_open.unwrap_or_default(),
        zone_part_fan_percent: climate.zone_part_fan_percent.unwrap_or_default(),
        zone_aux_percent: climate.zone_aux_percent.unwrap_or_default(),
        zone_exhaust_percent: climate.zone_exhaust_percent.unwrap_or_default(),
        zone_top_vent_open: climate.zone_top_vent_open.unwrap_or_default(),
        is_chamber_door_open: climate.is_chamber_door_open.unwrap_or_default(),

        nozzle_diameter: name_of(status.nozzle_diameter.as_ref()),
        nozzle_type: name_of(status.nozzle_type.as_ref()),
        speed_level: status.speed_level.unwrap_or_default(),
        light_state: status.light_state.unwrap_or_default(),

        active_ams_id: status.active_ams_id.unwrap_or_default(),
        active_tray_id: status.active_tray_id.unwrap_or_default(),
        active_tray_state: name_of(status.active_tray_state.as_ref()),
        ams_status_text: text(status.ams_status_text.as_ref()),
        ams_connected_count: status.ams_connected_count.unwrap_or_default(),
        ams_units: status.ams_units.iter().map(ams_unit).collect(),

        extruders: status.extruders.iter().map(extruder).collect(),
        spools: spools(status),
        hms_errors: status.hms_errors.clone(),

        has_ams: caps.has_ams.unwrap_or_default(),
        has_camera: caps.has_camera.unwrap_or_default(),
        has_chamber_temp: caps.has_chamber_temp.unwrap_or_default(),
        has_dual_extruder: caps.has_dual_extruder.unwrap_or_default(),
        has_air_filtration: caps.has_air_filtration.unwrap_or_default(),

        auto_recovery: info.auto_recovery.unwrap_or_default(),
        filament_tangle_detect: info.filament_tangle_detect.unwrap_or_default(),
        sound_enable: info.sound_enable.unwrap_or_default(),
        auto_switch_filament: info.auto_switch_filament.unwrap_or_default(),

        buildplate_marker_detector: info.buildplate_marker_detector.unwrap_or_default(),
        startup_read_option: info.startup_read_option.unwrap_or_default(),
        tray_read_option: info.tray_read_option.unwrap_or_default(),
        calibrate_remain_flag: info.calibrate_remain_flag.unwrap_or_default(),

        wifi_signal: text(status.wifi_signal.as_ref()),
    }
}

fn ams_unit(unit: &AmsUnit) -> AmsUnitSnapshot {
    AmsUnitSnapshot {
        ams_id: unit.ams_id.unwrap_or_default(),
        chip_id: text(unit.chip_id.as_ref()),
        model: name_of(unit.model.as_ref()),
        temp_actual: unit.temp_actual.unwrap_or_default(),
        temp_target: unit.temp_target.unwrap_or_default(),
        humidity_index: unit.humidity_index.unwrap_or_default(),
        humidity_raw: unit.humidity_raw.unwrap_or_default(),
        heater_state: name_of(unit.heater_state.as_ref()),
        dry_time: unit.dry_time.unwrap_or_default(),
        tray_exists: unit.tray_exists.clone(),
        assigned_to_extruder: name_of(unit.assigned_to_extruder.as_ref()),
    }
}

fn extruder(extruder: &Extruder) -> ExtruderSnapshot {
    ExtruderSnapshot {
        id: extruder.id.unwrap_or_default(),
        temp: extruder.temp.unwrap_or_default(),
        temp_target: extruder.temp_target.unwrap_or_default(),
        info_bits: extruder.info_bits.unwrap_or_default(),
        state: name_of(extruder.state.as_ref()),
        status: name_of(extruder.status.as_ref()),
        active_tray_id: extruder.active_tray_id.unwrap_or_default(),
        target_tray_id: extruder.target_tray_id.unwrap_or_default(),
        tray_state: name_of(extruder.tray_state.as_ref()),
        assigned_to_ams_id: extruder.assigned_to_ams_id.unwrap_or_default(),
    }
}

fn spools(status: &PrinterStatus) -> Vec<Option<SpoolSnapshot>> {
    status
        .spools
        .iter()
        .map(|slot| slot.as_ref().map(spool))
        .collect()
}

fn spool(spool: &Spool) -> SpoolSnapshot {
    let id = spool.id.unwrap_or(-1);
    SpoolSnapshot {
        id,
        tray_id: id,
        ams_id: spool.ams_id.unwrap_or(-1),
        slot_id: spool.slot_id.unwrap_or(-1),
        tray_info_idx: text(spool.tray_info_idx.as_ref()),
        tray_type: text(spool.filament_type.as_ref()),
        tray_color: text(spool.color.as_ref()),
        tray_id_name: text(spool.name.as_ref()),
        sub_brands: text(spool.sub_brands.as_ref()),
        nozzle_temp_min: spool.nozzle_temp_min.unwrap_or_default(),
        nozzle_temp_max: spool.nozzle_temp_max.unwrap_or_default(),
        remain_percent: spool.remaining_percent.unwrap_or(-1),
        k: spool.k.unwrap_or_default(),
        bed_temp: spool.bed_temp.unwrap_or_default(),
        drying_temp: spool.drying_temp.unwrap_or_default(),
        drying_time: spool.drying_time.unwrap_or_default(),
        tray_weight: spool.tray_weight.unwrap_or_default(),
    }
}

fn text(value: Option<&String>) -> String {
    value.cloned().unwrap_or_default()
}

fn name_of(value: Option<&EnumValue>) -> String {
    value.map(EnumValue::display_name).unwrap_or_default()
}
