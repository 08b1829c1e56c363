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

use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Run state of the VM.
///
/// # Notes
///
/// `Saving` and `Restoring` only exist while a checkpoint is written or read,
/// the VM always leaves them for `Running`, `Stopped` or `Suspended`.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Serialize, Deserialize)]
pub enum RunState {
    /// vCPUs are executing guest code.
    Running,
    /// vCPUs are paused.
    Stopped,
    /// The guest entered a sleep state and waits for a wakeup request.
    Suspended,
    /// The VM is paused while its state is saved.
    Saving,
    /// The VM is paused while its state is restored.
    Restoring,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RunState::Running => "running",
                RunState::Stopped => "stopped",
                RunState::Suspended => "suspended",
                RunState::Saving => "saving",
                RunState::Restoring => "restoring",
            }
        )
    }
}

impl FromStr for RunState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(RunState::Running),
            "stopped" => Ok(RunState::Stopped),
            "suspended" => Ok(RunState::Suspended),
            "saving" => Ok(RunState::Saving),
            "restoring" => Ok(RunState::Restoring),
            _ => bail!("Unknown run state {}", s),
        }
    }
}

/// Record/replay mode of the execution engine.
#[derive(Default, PartialEq, Eq, Copy, Clone, Debug)]
pub enum ReplayMode {
    #[default]
    None,
    Record,
    Play,
}

/// Trait for the execution engine that runs the guest.
///
/// # Notes
///
/// The checkpoint core never looks inside the engine, it only needs to stop
/// and restart guest execution around a save or a load.
pub trait MachineLifecycle: Send + Sync {
    /// Stop executing guest code. Returns once every vCPU is paused.
    fn pause(&self) -> Result<()>;

    /// Continue executing guest code.
    fn resume(&self) -> Result<()>;

    /// Whether vCPUs are currently executing.
    fn is_running(&self) -> bool;

    /// Stop the guest clock from advancing. Called before a suspended VM is
    /// saved.
    fn disable_ticks(&self) {}

    /// Record/replay mode of the engine.
    fn replay_mode(&self) -> ReplayMode {
        ReplayMode::None
    }

    /// Names of guest memory regions whose content would be lost by a
    /// checkpoint, e.g. private anonymous memory.
    fn volatile_ram(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_name() {
        for state in [
            RunState::Running,
            RunState::Stopped,
            RunState::Suspended,
            RunState::Saving,
            RunState::Restoring,
        ] {
            assert_eq!(RunState::from_str(&state.to_string()).unwrap(), state);
        }
        assert!(RunState::from_str("paused").is_err());
    }
}
