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

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};

use crate::error::MigrationError;
use machine_manager::machine::{MachineLifecycle, ReplayMode, RunState};

/// This status for a save or load session.
///
/// # Notes
///
/// State transfer:
/// None -----------> Setup: set up save or load resource.
/// Setup ----------> Active: start to transfer state.
/// Active ---------> Completed: transfer completed successfully.
/// Completed ------> Setup: start a new session after a successful one.
/// Failed ---------> Setup: start a new session after a failed one.
/// Setup, Active --> Failed: Something wrong in the session.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MigrationStatus {
    /// No session has run yet.
    None = 0,
    /// Session resource is being set up.
    Setup = 1,
    /// State is being saved or restored.
    Active = 2,
    /// Session finished.
    Completed = 3,
    /// Session failed.
    Failed = 4,
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                MigrationStatus::None => "none",
                MigrationStatus::Setup => "setup",
                MigrationStatus::Active => "active",
                MigrationStatus::Completed => "completed",
                MigrationStatus::Failed => "failed",
            }
        )
    }
}

impl MigrationStatus {
    pub fn transfer(self, new_status: MigrationStatus) -> Result<MigrationStatus> {
        match self {
            MigrationStatus::None | MigrationStatus::Completed | MigrationStatus::Failed => {
                match new_status {
                    MigrationStatus::Setup => Ok(new_status),
                    _ => Err(anyhow!(MigrationError::InvalidStatusTransfer(
                        self, new_status
                    ))),
                }
            }
            MigrationStatus::Setup => match new_status {
                MigrationStatus::Active | MigrationStatus::Failed => Ok(new_status),
                _ => Err(anyhow!(MigrationError::InvalidStatusTransfer(
                    self, new_status
                ))),
            },
            MigrationStatus::Active => match new_status {
                MigrationStatus::Completed | MigrationStatus::Failed => Ok(new_status),
                _ => Err(anyhow!(MigrationError::InvalidStatusTransfer(
                    self, new_status
                ))),
            },
        }
    }

    /// Whether a session holding this status is still running.
    pub fn is_in_progress(self) -> bool {
        matches!(self, MigrationStatus::Setup | MigrationStatus::Active)
    }
}

struct ControllerState {
    run_state: RunState,
    start_on_wakeup: bool,
}

/// Owner of the VM run state.
///
/// Every transition first checks that it is legal, then drives the execution
/// engine and finally records the new state, all under one lock.
pub struct RunStateController {
    machine: Arc<dyn MachineLifecycle>,
    state: Mutex<ControllerState>,
}

impl RunStateController {
    pub fn new(machine: Arc<dyn MachineLifecycle>) -> Self {
        let run_state = if machine.is_running() {
            RunState::Running
        } else {
            RunState::Stopped
        };
        RunStateController {
            machine,
            state: Mutex::new(ControllerState {
                run_state,
                start_on_wakeup: false,
            }),
        }
    }

    pub fn state(&self) -> RunState {
        self.state.lock().unwrap().run_state
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Whether a wakeup request will start the VM.
    pub fn start_on_wakeup(&self) -> bool {
        self.state.lock().unwrap().start_on_wakeup
    }

    /// Check, without changing anything, that the VM can be checkpointed.
    ///
    /// # Arguments
    ///
    /// * `colo` - Whether COarse-grained LOck-stepping is enabled.
    pub fn check_migratable(&self, colo: bool) -> Result<()> {
        if let Some(region) = self.machine.volatile_ram().into_iter().next() {
            bail!(MigrationError::VolatileMemory(region));
        }
        if colo {
            bail!(MigrationError::UnsupportedMode("x-colo".to_string()));
        }
        if self.machine.replay_mode() != ReplayMode::None {
            bail!(MigrationError::UnsupportedMode("replay".to_string()));
        }
        Ok(())
    }

    /// Running -> Stopped.
    pub fn stop(&self) -> Result<()> {
        let mut locked_state = self.state.lock().unwrap();
        if locked_state.run_state != RunState::Running {
            bail!(MigrationError::InvalidStateTransfer(
                locked_state.run_state,
                RunState::Stopped
            ));
        }
        self.machine.pause().with_context(|| "Failed to pause VM")?;
        locked_state.run_state = RunState::Stopped;
        Ok(())
    }

    /// Stopped -> Running.
    pub fn start(&self) -> Result<()> {
        let mut locked_state = self.state.lock().unwrap();
        if locked_state.run_state != RunState::Stopped {
            bail!(MigrationError::InvalidStateTransfer(
                locked_state.run_state,
                RunState::Running
            ));
        }
        self.machine.resume().with_context(|| "Failed to resume VM")?;
        locked_state.run_state = RunState::Running;
        Ok(())
    }

    /// Running -> Suspended, the guest went to sleep.
    pub fn suspend(&self) -> Result<()> {
        let mut locked_state = self.state.lock().unwrap();
        if locked_state.run_state != RunState::Running {
            bail!(MigrationError::InvalidStateTransfer(
                locked_state.run_state,
                RunState::Suspended
            ));
        }
        self.machine.pause().with_context(|| "Failed to pause VM")?;
        locked_state.run_state = RunState::Suspended;
        Ok(())
    }

    /// Suspended -> Running on an external wake request.
    pub fn wakeup(&self) -> Result<()> {
        let mut locked_state = self.state.lock().unwrap();
        if locked_state.run_state != RunState::Suspended {
            bail!(MigrationError::InvalidStateTransfer(
                locked_state.run_state,
                RunState::Running
            ));
        }
        self.machine.resume().with_context(|| "Failed to resume VM")?;
        if locked_state.start_on_wakeup {
            info!("VM started on wakeup");
        }
        locked_state.start_on_wakeup = false;
        locked_state.run_state = RunState::Running;
        Ok(())
    }

    /// Running, Suspended or Stopped -> Saving. Returns the state before the
    /// transition.
    pub fn pause_for_save(&self) -> Result<RunState> {
        let mut locked_state = self.state.lock().unwrap();
        let prior = locked_state.run_state;
        match prior {
            RunState::Running => self.machine.pause().with_context(|| "Failed to pause VM")?,
            RunState::Suspended => self.machine.disable_ticks(),
            RunState::Stopped => {}
            _ => bail!(MigrationError::InvalidStateTransfer(prior, RunState::Saving)),
        }
        locked_state.run_state = RunState::Saving;
        Ok(prior)
    }

    /// Saving -> Running if `prior` was Running, else Stopped. Used to roll
    /// back a failed save.
    pub fn resume_after_save(&self, prior: RunState) -> Result<()> {
        let mut locked_state = self.state.lock().unwrap();
        if locked_state.run_state != RunState::Saving {
            bail!(MigrationError::InvalidStateTransfer(
                locked_state.run_state,
                prior
            ));
        }
        locked_state.run_state = RunState::Stopped;
        if prior == RunState::Running {
            self.machine.resume().with_context(|| "Failed to resume VM")?;
            locked_state.run_state = RunState::Running;
        }
        Ok(())
    }

    /// Saving -> Stopped after a successful save.
    pub fn finish_save(&self) -> Result<()> {
        let mut locked_state = self.state.lock().unwrap();
        if locked_state.run_state != RunState::Saving {
            bail!(MigrationError::InvalidStateTransfer(
                locked_state.run_state,
                RunState::Stopped
            ));
        }
        locked_state.run_state = RunState::Stopped;
        Ok(())
    }

    /// Stopped or Suspended -> Restoring. Fails without any change while
    /// the VM is running.
    pub fn enter_for_load(&self) -> Result<RunState> {
        let mut locked_state = self.state.lock().unwrap();
        let prior = locked_state.run_state;
        match prior {
            RunState::Running => bail!(MigrationError::VmRunning("cpr-load".to_string())),
            RunState::Stopped | RunState::Suspended => {}
            _ => bail!(MigrationError::InvalidStateTransfer(
                prior,
                RunState::Restoring
            )),
        }
        locked_state.run_state = RunState::Restoring;
        locked_state.start_on_wakeup = false;
        Ok(prior)
    }

    /// Restoring -> `target`, the run state recorded in the image. A
    /// suspended VM starts on the next wakeup request.
    pub fn resume_after_load(&self, target: RunState) -> Result<()> {
        let mut locked_state = self.state.lock().unwrap();
        if locked_state.run_state != RunState::Restoring {
            bail!(MigrationError::InvalidStateTransfer(
                locked_state.run_state,
                target
            ));
        }
        locked_state.run_state = RunState::Stopped;
        match target {
            RunState::Running => {
                self.machine.resume().with_context(|| "Failed to resume VM")?;
                locked_state.run_state = RunState::Running;
            }
            RunState::Suspended => {
                locked_state.run_state = RunState::Suspended;
                locked_state.start_on_wakeup = true;
            }
            RunState::Stopped => {}
            _ => warn!("Unexpected target run state {}, keep VM stopped", target),
        }
        Ok(())
    }

    /// Restoring -> Stopped after a failed load.
    pub fn abort_load(&self) {
        let mut locked_state = self.state.lock().unwrap();
        if locked_state.run_state == RunState::Restoring {
            locked_state.run_state = RunState::Stopped;
        }
    }
}
