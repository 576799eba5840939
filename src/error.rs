// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `bambu_fleet` library.
//!
//! Failures are split by how the caller is expected to react:
//! configuration problems are rejected up front, client failures come from
//! the printer connection, and camera failures only ever disable the camera
//! feature for one printer.

use std::time::Duration;

use thiserror::Error;

use crate::event::DeviceId;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A printer configuration is incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The printer client failed to connect or rejected a command.
    #[error("printer client error: {0}")]
    Client(#[from] ClientError),

    /// The camera feature is unavailable for this printer.
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),

    /// A command argument failed validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// No managed session exists for the device.
    #[error("printer {0} not found")]
    DeviceNotFound(DeviceId),

    /// The device has a session but it is not connected.
    #[error("printer {0} is not connected")]
    NotConnected(DeviceId),
}

/// Errors in a printer configuration record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field holds a value that cannot be used.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },
}

/// Errors reported by the underlying printer client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The connection to the printer could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The printer did not answer in time.
    #[error("timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// The printer refused or failed to execute a command.
    #[error("command rejected: {0}")]
    CommandRejected(String),

    /// The client has no open session.
    #[error("client is not connected")]
    NotConnected,
}

/// Errors from the camera stream proxy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Camera support is compiled out or no frame is available yet.
    #[error("camera unavailable")]
    Unavailable,

    /// No stream address could be derived for the printer.
    #[error("no camera address for printer {0}")]
    NoStreamUrl(DeviceId),

    /// The stream source could not be opened.
    #[error("failed to open stream: {0}")]
    OpenFailed(String),

    /// Reading a frame from an open source failed.
    #[error("failed to read frame: {0}")]
    ReadFailed(String),

    /// The frame could not be encoded.
    #[error("failed to encode frame: {0}")]
    EncodeFailed(String),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u16,
        /// Maximum allowed value.
        max: u16,
        /// The actual value that was provided.
        actual: u16,
    },

    /// A symbolic name did not match any known variant.
    #[error("unknown {kind}: {value}")]
    UnknownName {
        /// What was being parsed.
        kind: &'static str,
        /// The unrecognised input.
        value: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
