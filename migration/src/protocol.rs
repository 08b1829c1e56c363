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

//! Layout of a checkpoint image.
//!
//! ```text
//! +-------------+---------------+-----------+-----+-----------+-----+
//! | magic(be32) | version(be32) | section 0 | ... | section n | end |
//! +-------------+---------------+-----------+-----+-----------+-----+
//!
//! section: marker(u8) name_len(u8) name version(be32) size(be32) payload
//! end:     marker(u8) = 0x1f
//! ```

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::channel::MigrationChannel;
use crate::error::{migration_error, MigrationError};

/// Magic number of a checkpoint image, "CPRV".
pub const CPR_MAGIC: u32 = 0x4350_5256;
/// Version of the checkpoint image layout.
pub const CPR_VERSION: u32 = 1;
/// Section carrying the state of a component.
pub const SECTION_STATE: u8 = 0x01;
/// Section carrying the state of an optional component, which the receiver
/// may skip.
pub const SECTION_SKIPPABLE: u8 = 0x02;
/// End of image.
pub const SECTION_END: u8 = 0x1f;
/// Upper bound of a section payload.
pub const MAX_SECTION_SIZE: u32 = 16 << 20;

/// Checkpoint mode, consumed by components which save different state for a
/// reboot-style or an exec-style checkpoint.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CprMode {
    /// No checkpoint in progress.
    #[default]
    None,
    /// The VM is restored by a fresh process after a host reboot.
    Reboot,
    /// The VM is restored by the same process image after exec.
    Restart,
}

impl fmt::Display for CprMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CprMode::None => "none",
                CprMode::Reboot => "reboot",
                CprMode::Restart => "restart",
            }
        )
    }
}

impl FromStr for CprMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(CprMode::None),
            "reboot" => Ok(CprMode::Reboot),
            "restart" => Ok(CprMode::Restart),
            _ => bail!("Unknown cpr mode {}", s),
        }
    }
}

/// Kind of a state section.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SectionKind {
    State,
    Skippable,
}

impl SectionKind {
    fn marker(self) -> u8 {
        match self {
            SectionKind::State => SECTION_STATE,
            SectionKind::Skippable => SECTION_SKIPPABLE,
        }
    }
}

/// Header of one state section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionHeader {
    pub kind: SectionKind,
    /// Instance id of the component, `<name>:<index>`.
    pub name: String,
    pub version: u32,
    pub size: u32,
}

pub fn save_header(channel: &mut MigrationChannel) -> Result<()> {
    channel.put_be32(CPR_MAGIC)?;
    channel.put_be32(CPR_VERSION)?;
    Ok(())
}

/// An image which ends before its end marker is malformed, not unreadable.
fn truncated<T>(name: &str, ret: Result<T>) -> Result<T> {
    ret.map_err(|e| match migration_error(&e) {
        Some(MigrationError::Eof(_)) => anyhow!(MigrationError::Truncated(name.to_string())),
        _ => e,
    })
}

/// Read and check magic and version. Nothing after the header is read when
/// either of them does not match.
pub fn restore_header(channel: &mut MigrationChannel) -> Result<()> {
    let name = channel.name().to_string();
    truncated(&name, check_header(channel))
        .with_context(|| format!("{} is not a vmstate file", name))
}

fn check_header(channel: &mut MigrationChannel) -> Result<()> {
    if channel.get_be32()? != CPR_MAGIC {
        bail!(MigrationError::HeaderItemNotFit("Magic number".to_string()));
    }
    let version = channel.get_be32()?;
    if version != CPR_VERSION {
        bail!(MigrationError::HeaderItemNotFit(format!(
            "Version {}",
            version
        )));
    }
    Ok(())
}

/// Write one section with `payload` as its content.
pub fn write_section(
    channel: &mut MigrationChannel,
    kind: SectionKind,
    name: &str,
    version: u32,
    payload: &[u8],
) -> Result<()> {
    let name_len = u8::try_from(name.len())
        .map_err(|_| anyhow!(MigrationError::SectionNameTooLong(name.to_string())))?;
    let size = match u32::try_from(payload.len()) {
        Ok(size) if size <= MAX_SECTION_SIZE => size,
        _ => bail!(MigrationError::SectionTooLarge(
            name.to_string(),
            payload.len() as u32
        )),
    };
    debug!("Write section {} version {} size {}", name, version, size);
    channel.put_u8(kind.marker())?;
    channel.put_u8(name_len)?;
    channel.put_buffer(name.as_bytes())?;
    channel.put_be32(version)?;
    channel.put_be32(size)?;
    channel.put_buffer(payload)?;
    Ok(())
}

pub fn write_end(channel: &mut MigrationChannel) -> Result<()> {
    channel.put_u8(SECTION_END)
}

/// Read the next section header. Returns `None` at the end marker; the
/// payload of a returned section must be consumed before the next call.
pub fn read_section_header(channel: &mut MigrationChannel) -> Result<Option<SectionHeader>> {
    let name = channel.name().to_string();
    truncated(&name, next_section_header(channel))
}

/// Read the payload of the section `header` was just read for.
pub fn read_section_payload(
    channel: &mut MigrationChannel,
    header: &SectionHeader,
) -> Result<Vec<u8>> {
    let name = channel.name().to_string();
    truncated(&name, channel.get_vec(header.size as usize))
        .with_context(|| format!("Failed to read section {}", header.name))
}

fn next_section_header(channel: &mut MigrationChannel) -> Result<Option<SectionHeader>> {
    let kind = match channel.get_u8()? {
        SECTION_END => return Ok(None),
        SECTION_STATE => SectionKind::State,
        SECTION_SKIPPABLE => SectionKind::Skippable,
        marker => bail!(MigrationError::InvalidSection(marker)),
    };
    let name_len = channel.get_u8()?;
    let name = String::from_utf8(channel.get_vec(name_len as usize)?)
        .map_err(|_| anyhow!(MigrationError::HeaderItemNotFit("Section name".to_string())))?;
    let version = channel.get_be32()?;
    let size = channel.get_be32()?;
    if size > MAX_SECTION_SIZE {
        bail!(MigrationError::SectionTooLarge(name, size));
    }
    debug!("Read section {} version {} size {}", name, version, size);
    Ok(Some(SectionHeader {
        kind,
        name,
        version,
        size,
    }))
}
