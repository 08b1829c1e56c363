// Copyright (c) 2024 Huawei Technologies Co.,Ltd. All rights reserved.
//
// StratoVirt is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan
// PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//         http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY
// KIND, EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO
// NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use thiserror::Error;

use crate::status::MigrationStatus;
use machine_manager::config::TlsEndpoint;
use machine_manager::machine::RunState;

/// Coarse category of a migration failure, as reported to the caller of a
/// save, load or connect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Incompatible mode, missing credentials or hostname.
    Configuration,
    /// File or socket could not be opened, read or written.
    Resource,
    /// Bad magic, version or record in a checkpoint image.
    Format,
    /// TLS handshake, endpoint role or authorization failure.
    Protocol,
    /// Illegal run-state or session transition.
    State,
}

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Json")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("cpr-save does not support {0}")]
    UnsupportedMode(String),
    #[error("Memory region {0} is volatile")]
    VolatileMemory(String),
    #[error("No TLS credentials with id '{0}'")]
    CredsNotFound(String),
    #[error("No authorization policy with id '{0}'")]
    AuthzNotFound(String),
    #[error("Object with id '{0}' is not {1}")]
    WrongType(String, String),
    #[error("Invalid migration address {0}")]
    InvalidUri(String),
    #[error("No hostname available for TLS")]
    NoHostname,
    #[error("TLS credentials are not configured for migration")]
    NoCreds,
    #[error("Invalid TLS credentials {0}: {1}")]
    InvalidCreds(String, String),
    #[error("Failed to open {path}")]
    ResourceUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error on channel {name}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Unexpected end of channel {0}")]
    Eof(String),
    #[error("Channel {0} is closed")]
    ChannelClosed(String),
    #[error("{0} for snapshot file / migration stream is not fit")]
    HeaderItemNotFit(String),
    #[error("Version {1} of section {0} is newer than current version {2}")]
    VersionNotFit(String, u32, u32),
    #[error("Version {1} of section {0} is older than compat version {2}")]
    VersionTooOld(String, u32, u32),
    #[error("Image {0} is truncated")]
    Truncated(String),
    #[error("Section name {0} is longer than 255 bytes")]
    SectionNameTooLong(String),
    #[error("Section {0} appears more than once")]
    DuplicateSection(String),
    #[error("Unknown section {0}")]
    UnknownSection(String),
    #[error("Invalid section marker {0:#x}")]
    InvalidSection(u8),
    #[error("Section {0} with {1} bytes exceeds the size limit")]
    SectionTooLarge(String, u32),
    #[error("Section {0} is missing")]
    MissingSection(String),
    #[error("Unexpected data after the end of the image")]
    TrailingData,
    #[error("Expected TLS credentials for a {0} endpoint")]
    EndpointMismatch(TlsEndpoint),
    #[error("TLS handshake failed on {0}: {1}")]
    Handshake(String, String),
    #[error("Peer {0} is not authorized by {1}")]
    AuthzDenied(String, String),
    #[error("Failed to transfer run state from {0} to {1}.")]
    InvalidStateTransfer(RunState, RunState),
    #[error("{0} is invalid while the VM is running")]
    VmRunning(String),
    #[error("Failed to transfer migration status from {0} to {1}.")]
    InvalidStatusTransfer(MigrationStatus, MigrationStatus),
    #[error("Another save or load is in progress, status {0}")]
    InProgress(MigrationStatus),
}

impl MigrationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            MigrationError::UnsupportedMode(_)
            | MigrationError::VolatileMemory(_)
            | MigrationError::CredsNotFound(_)
            | MigrationError::AuthzNotFound(_)
            | MigrationError::WrongType(_, _)
            | MigrationError::InvalidUri(_)
            | MigrationError::NoHostname
            | MigrationError::NoCreds
            | MigrationError::InvalidCreds(_, _) => ErrorClass::Configuration,
            MigrationError::ResourceUnavailable { .. }
            | MigrationError::Io { .. }
            | MigrationError::Eof(_)
            | MigrationError::ChannelClosed(_) => ErrorClass::Resource,
            MigrationError::Json { .. }
            | MigrationError::HeaderItemNotFit(_)
            | MigrationError::VersionNotFit(_, _, _)
            | MigrationError::VersionTooOld(_, _, _)
            | MigrationError::Truncated(_)
            | MigrationError::SectionNameTooLong(_)
            | MigrationError::DuplicateSection(_)
            | MigrationError::UnknownSection(_)
            | MigrationError::InvalidSection(_)
            | MigrationError::SectionTooLarge(_, _)
            | MigrationError::MissingSection(_)
            | MigrationError::TrailingData => ErrorClass::Format,
            MigrationError::EndpointMismatch(_)
            | MigrationError::Handshake(_, _)
            | MigrationError::AuthzDenied(_, _) => ErrorClass::Protocol,
            MigrationError::InvalidStateTransfer(_, _)
            | MigrationError::VmRunning(_)
            | MigrationError::InvalidStatusTransfer(_, _)
            | MigrationError::InProgress(_) => ErrorClass::State,
        }
    }
}

/// Class of the first `MigrationError` found in the context chain of `err`.
pub fn error_class(err: &anyhow::Error) -> Option<ErrorClass> {
    err.chain()
        .find_map(|e| e.downcast_ref::<MigrationError>())
        .map(|e| e.class())
}

/// The `MigrationError` that caused `err`, if any.
pub fn migration_error(err: &anyhow::Error) -> Option<&MigrationError> {
    err.chain().find_map(|e| e.downcast_ref::<MigrationError>())
}
