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

use std::env;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::io::{FromRawFd, IntoRawFd, RawFd};

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::MigrationError;
use crate::protocol::CprMode;
use util::unix::{clear_cloexec, is_cloexec, memfd_create};

/// Environment variable holding the descriptor of the saved `CprState`.
pub const CPR_STATE_ENV: &str = "CPRVIRT_CPR_STATE";

/// A descriptor kept open across a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CprFd {
    pub name: String,
    pub id: i32,
    pub fd: RawFd,
}

/// State preserved for the next process image: the checkpoint mode and the
/// descriptors it inherits.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CprState {
    mode: CprMode,
    fds: Vec<CprFd>,
}

impl CprState {
    pub fn mode(&self) -> CprMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CprMode) {
        self.mode = mode;
    }

    /// Record `fd` as `(name, id)`, replacing a previous record of the pair.
    pub fn save_fd(&mut self, name: &str, id: i32, fd: RawFd) {
        debug!("cpr save fd {} id {} fd {}", name, id, fd);
        match self.fds.iter_mut().find(|e| e.name == name && e.id == id) {
            Some(elem) => elem.fd = fd,
            None => self.fds.push(CprFd {
                name: name.to_string(),
                id,
                fd,
            }),
        }
    }

    pub fn delete_fd(&mut self, name: &str, id: i32) {
        if let Some(pos) = self.fds.iter().position(|e| e.name == name && e.id == id) {
            debug!("cpr delete fd {} id {}", name, id);
            self.fds.remove(pos);
        }
    }

    pub fn find_fd(&self, name: &str, id: i32) -> Option<RawFd> {
        self.fds
            .iter()
            .find(|e| e.name == name && e.id == id)
            .map(|e| e.fd)
    }

    /// Call `f` on every record until it returns true. Returns whether `f`
    /// stopped the walk.
    pub fn walk_fd<F>(&self, f: F) -> bool
    where
        F: FnMut(&CprFd) -> bool,
    {
        self.fds.iter().any(f)
    }

    /// Write the state to a memfd and publish it in `CPR_STATE_ENV`. The
    /// memfd and every recorded descriptor stay open across exec.
    ///
    /// Returns the descriptor of the memfd.
    pub fn save(&self) -> Result<RawFd> {
        for elem in &self.fds {
            clear_cloexec(elem.fd)
                .with_context(|| format!("Failed to keep fd {} of {} open", elem.fd, elem.name))?;
        }

        let data = serde_json::to_vec(self).map_err(MigrationError::from)?;
        let mut file = memfd_create("cpr_state")?;
        file.write_all(&data)
            .with_context(|| "Failed to write cpr state")?;
        file.seek(SeekFrom::Start(0))
            .with_context(|| "Failed to rewind cpr state")?;

        let fd = file.into_raw_fd();
        env::set_var(CPR_STATE_ENV, fd.to_string());
        info!("cpr state saved to fd {}, {} fds", fd, self.fds.len());
        Ok(fd)
    }

    /// Read the state published by `save` and remove `CPR_STATE_ENV`.
    /// Returns `None` when no state was published.
    pub fn load() -> Result<Option<CprState>> {
        let value = match env::var(CPR_STATE_ENV) {
            Ok(value) => value,
            Err(_) => return Ok(None),
        };
        env::remove_var(CPR_STATE_ENV);

        let fd: RawFd = value
            .parse()
            .map_err(|_| anyhow!("Invalid {} value {}", CPR_STATE_ENV, value))?;
        // Rejects a descriptor which is not open.
        is_cloexec(fd).with_context(|| format!("Invalid cpr state fd {}", fd))?;
        // SAFETY: fd is open and was handed over to this process by save().
        let mut file = unsafe { File::from_raw_fd(fd) };
        file.seek(SeekFrom::Start(0))
            .with_context(|| "Failed to rewind cpr state")?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .with_context(|| "Failed to read cpr state")?;
        let state: CprState = serde_json::from_slice(&data).map_err(MigrationError::from)?;
        info!("cpr state loaded from fd {}, {} fds", fd, state.fds.len());
        Ok(Some(state))
    }
}
