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

use std::cmp;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::channel::MigrationChannel;
use crate::device_state::{DeviceStateDesc, StateTransfer};
use crate::error::MigrationError;
use crate::protocol::{
    read_section_header, read_section_payload, write_end, write_section, CprMode, SectionKind,
};
use machine_manager::machine::RunState;

/// A entry to every stateful component to call on migration interface.
pub enum MigrationEntry {
    /// Component with interior mutability.
    Safe(Arc<dyn StateTransfer + Send + Sync>),
    /// Component guarded by a mutex.
    Mutex(Arc<Mutex<dyn StateTransfer + Send + Sync>>),
}

impl MigrationEntry {
    fn get_state_vec(&self, mode: CprMode) -> Result<Vec<u8>> {
        match self {
            MigrationEntry::Safe(entry) => entry.get_state_vec(mode),
            MigrationEntry::Mutex(entry) => entry.lock().unwrap().get_state_vec(mode),
        }
    }

    fn set_state(&self, state: &[u8], version: u32, mode: CprMode) -> Result<()> {
        match self {
            MigrationEntry::Safe(entry) => entry.set_state(state, version, mode),
            MigrationEntry::Mutex(entry) => {
                entry.lock().unwrap().set_state_mut(state, version, mode)
            }
        }
    }
}

struct RegisteredEntry {
    id: String,
    desc: DeviceStateDesc,
    entry: MigrationEntry,
}

/// Ordered registry of stateful components.
///
/// Components are captured and restored in registration order.
#[derive(Default)]
pub struct StateRegistry {
    entries: Vec<RegisteredEntry>,
}

impl StateRegistry {
    /// Register a component with interior mutability. Returns the instance
    /// id, formatted as `{name}:{index}`.
    ///
    /// # Arguments
    ///
    /// * `desc` - The `DeviceStateDesc` of the component.
    /// * `entry` - Component instance with migratable interface.
    pub fn register<T>(&mut self, desc: DeviceStateDesc, entry: Arc<T>) -> String
    where
        T: StateTransfer + Send + Sync + 'static,
    {
        self.insert_entry(desc, MigrationEntry::Safe(entry))
    }

    /// Register a mutex guarded component. Returns the instance id.
    pub fn register_mutex<T>(&mut self, desc: DeviceStateDesc, entry: Arc<Mutex<T>>) -> String
    where
        T: StateTransfer + Send + Sync + 'static,
    {
        self.insert_entry(desc, MigrationEntry::Mutex(entry))
    }

    fn insert_entry(&mut self, desc: DeviceStateDesc, entry: MigrationEntry) -> String {
        let mut index = 0;
        for registered in &self.entries {
            if let Some((name, num)) = registered.id.rsplit_once(':') {
                if name == desc.name {
                    if let Ok(num) = num.parse::<u32>() {
                        index = cmp::max(index, num + 1);
                    }
                }
            }
        }
        // ID is format as "{name}:{instance_id}"
        let id = format!("{}:{}", desc.name, index);
        info!("Register state instance: id {}", id);
        self.entries.push(RegisteredEntry {
            id: id.clone(),
            desc,
            entry,
        });
        id
    }

    /// Remove the component registered as `id`.
    pub fn unregister(&mut self, id: &str) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(pos) => {
                info!("Unregister state instance: id {}", id);
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Instance ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write one section per component followed by the end marker.
    pub fn capture_all(&self, channel: &mut MigrationChannel, mode: CprMode) -> Result<()> {
        for registered in &self.entries {
            let state = registered
                .entry
                .get_state_vec(mode)
                .with_context(|| format!("Failed to capture state of {}", registered.id))?;
            let kind = if registered.desc.optional {
                SectionKind::Skippable
            } else {
                SectionKind::State
            };
            write_section(
                channel,
                kind,
                &registered.id,
                registered.desc.current_version,
                &state,
            )?;
        }
        write_end(channel)?;
        debug!("Captured {} sections", self.entries.len());
        Ok(())
    }

    /// Read sections up to the end marker and hand each payload to the
    /// component registered with the same id. Returns the ids restored.
    pub fn restore_all(
        &self,
        channel: &mut MigrationChannel,
        mode: CprMode,
    ) -> Result<Vec<String>> {
        let mut restored = Vec::new();
        let mut skipped = Vec::new();
        while let Some(header) = read_section_header(channel)? {
            if restored.contains(&header.name) || skipped.contains(&header.name) {
                bail!(MigrationError::DuplicateSection(header.name));
            }
            let registered = match self.entries.iter().find(|e| e.id == header.name) {
                Some(registered) => registered,
                None if header.kind == SectionKind::Skippable => {
                    warn!("Skip section {} with no receiver", header.name);
                    read_section_payload(channel, &header)?;
                    skipped.push(header.name);
                    continue;
                }
                None => bail!(MigrationError::UnknownSection(header.name)),
            };
            registered.desc.validate_version(&header.name, header.version)?;
            let state = read_section_payload(channel, &header)?;
            registered
                .entry
                .set_state(&state, header.version, mode)
                .with_context(|| format!("Failed to restore state of {}", header.name))?;
            restored.push(header.name);
        }

        for registered in &self.entries {
            if !restored.contains(&registered.id) {
                warn!("No state for {} in the image", registered.id);
            }
        }
        Ok(restored)
    }
}

/// VM wide state saved with every checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStateData {
    /// Run state the VM enters once loaded.
    pub runstate: RunState,
    /// Mode of the checkpoint.
    pub mode: CprMode,
}

impl Default for GlobalStateData {
    fn default() -> Self {
        GlobalStateData {
            runstate: RunState::Stopped,
            mode: CprMode::None,
        }
    }
}

/// Built-in component carrying the target run state of the image.
#[derive(Default)]
pub struct GlobalState {
    data: Mutex<GlobalStateData>,
}

impl GlobalState {
    pub const NAME: &'static str = "globalstate";

    pub fn descriptor() -> DeviceStateDesc {
        DeviceStateDesc::new(Self::NAME, 1, 1)
    }

    /// Record the run state to restore for an image taken from a VM in
    /// `prior` state. A reboot-style image of a running VM is restored
    /// stopped.
    pub fn store(&self, prior: RunState, mode: CprMode) {
        let runstate = match (mode, prior) {
            (CprMode::Reboot, RunState::Running) => RunState::Stopped,
            _ => prior,
        };
        *self.data.lock().unwrap() = GlobalStateData { runstate, mode };
    }

    pub fn get(&self) -> GlobalStateData {
        *self.data.lock().unwrap()
    }

    pub fn runstate(&self) -> RunState {
        self.data.lock().unwrap().runstate
    }
}

impl StateTransfer for GlobalState {
    fn get_state_vec(&self, _mode: CprMode) -> Result<Vec<u8>> {
        let state = serde_json::to_vec(&*self.data.lock().unwrap()).map_err(MigrationError::from)?;
        Ok(state)
    }

    fn set_state(&self, state: &[u8], _version: u32, _mode: CprMode) -> Result<()> {
        let data: GlobalStateData = serde_json::from_slice(state).map_err(MigrationError::from)?;
        *self.data.lock().unwrap() = data;
        Ok(())
    }
}
