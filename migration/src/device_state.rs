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

use std::cmp::Ordering;

use anyhow::{bail, Result};

use crate::error::MigrationError;
use crate::protocol::CprMode;

/// Version check result enum.
#[derive(PartialEq, Eq, Debug)]
pub enum VersionCheck {
    /// Version is completely same.
    Same,
    /// Version is older but still supported.
    Compat,
    /// Version is not compatible.
    Mismatch,
}

/// Trait to acquire the state of a component as bytes and recover the
/// component from those bytes.
///
/// # Notes
///
/// The bytes are opaque to the migration core. A component decides its own
/// encoding and must be able to decode every version between its
/// `compat_version` and `current_version`.
pub trait StateTransfer {
    /// Get the component state as bytes vector.
    ///
    /// # Arguments
    ///
    /// * `mode` - Checkpoint mode of the running save.
    fn get_state_vec(&self, mode: CprMode) -> Result<Vec<u8>>;

    /// Set the component state from bytes slice.
    ///
    /// # Arguments
    ///
    /// * `state` - Payload of the section.
    /// * `version` - Version the payload was written with.
    /// * `mode` - Checkpoint mode of the running load.
    fn set_state(&self, _state: &[u8], _version: u32, _mode: CprMode) -> Result<()> {
        Ok(())
    }

    /// Set the state of a mutable component from bytes slice.
    fn set_state_mut(&mut self, _state: &[u8], _version: u32, _mode: CprMode) -> Result<()> {
        Ok(())
    }
}

/// The structure to describe the state of a component type with version
/// message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStateDesc {
    /// Component type identify.
    pub name: String,
    /// Version written by this build.
    pub current_version: u32,
    /// The minimum version this build can still read.
    pub compat_version: u32,
    /// Optional components are written as skippable sections.
    pub optional: bool,
}

impl DeviceStateDesc {
    pub fn new(name: &str, current_version: u32, compat_version: u32) -> Self {
        DeviceStateDesc {
            name: name.to_string(),
            current_version,
            compat_version,
            optional: false,
        }
    }

    /// Mark the component as optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Check a version read from a section against this descriptor.
    /// If version is same, return enum `Same`.
    /// If version is older but not below `compat_version`, return enum `Compat`.
    /// Otherwise return enum `Mismatch`.
    pub fn check_version(&self, version: u32) -> VersionCheck {
        match self.current_version.cmp(&version) {
            Ordering::Equal => VersionCheck::Same,
            Ordering::Greater if version >= self.compat_version => VersionCheck::Compat,
            _ => VersionCheck::Mismatch,
        }
    }

    /// Same as `check_version`, but a mismatch becomes an error.
    pub fn validate_version(&self, id: &str, version: u32) -> Result<VersionCheck> {
        match self.check_version(version) {
            VersionCheck::Mismatch if version > self.current_version => bail!(
                MigrationError::VersionNotFit(id.to_string(), version, self.current_version)
            ),
            VersionCheck::Mismatch => bail!(MigrationError::VersionTooOld(
                id.to_string(),
                version,
                self.compat_version
            )),
            check => Ok(check),
        }
    }
}
