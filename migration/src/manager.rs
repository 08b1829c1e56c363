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

use std::os::unix::io::AsFd;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use anyhow::{anyhow, bail, Context, Result};
use log::{error, info};

use crate::channel::{ChannelMode, ChannelStream, MigrationChannel};
use crate::cpr_state::CprState;
use crate::device_state::{DeviceStateDesc, StateTransfer};
use crate::error::MigrationError;
use crate::protocol::{restore_header, save_header, CprMode};
use crate::snapshot::{GlobalState, StateRegistry};
use crate::status::{MigrationStatus, RunStateController};
use crate::tls::{wrap_client, wrap_server, ObjectRegistry, PendingHandshake, TlsChannel};
use machine_manager::config::{MigrateConfig, TlsEndpoint, VmConfig};
use machine_manager::machine::MachineLifecycle;

const INCOMING_CHANNEL: &str = "migration-tls-incoming";
const OUTGOING_CHANNEL: &str = "migration-tls-outgoing";

fn secure_channel(name: &str, tls: TlsChannel, mode: ChannelMode) -> MigrationChannel {
    match tls.peer_fingerprint() {
        Some(fingerprint) => info!("{}: peer certificate {}", name, fingerprint),
        None => info!("{}: peer sent no certificate", name),
    }
    MigrationChannel::from_stream(name, Box::new(tls), mode)
}

/// Sets the checkpoint mode for the lifetime of the guard and resets it to
/// `CprMode::None` on drop.
struct CprModeGuard<'a> {
    cpr_state: &'a Mutex<CprState>,
}

impl<'a> CprModeGuard<'a> {
    fn new(cpr_state: &'a Mutex<CprState>, mode: CprMode) -> Self {
        cpr_state.lock().unwrap().set_mode(mode);
        CprModeGuard { cpr_state }
    }
}

impl Drop for CprModeGuard<'_> {
    fn drop(&mut self) {
        self.cpr_state.lock().unwrap().set_mode(CprMode::None);
    }
}

/// This structure drives checkpoint save and load of one VM.
///
/// # Notes
///
/// At most one save or load runs at a time. A request arriving while another
/// one is in progress fails with `MigrationError::InProgress`.
pub struct MigrationManager {
    controller: RunStateController,
    registry: RwLock<StateRegistry>,
    global_state: Arc<GlobalState>,
    cpr_state: Mutex<CprState>,
    status: Mutex<MigrationStatus>,
    objects: Arc<ObjectRegistry>,
    config: MigrateConfig,
}

impl MigrationManager {
    /// Create the manager of a VM. The `globalstate` component is always the
    /// first one registered.
    ///
    /// # Arguments
    ///
    /// * `machine` - Execution engine of the VM.
    /// * `vm_config` - Objects and migration parameters of the VM.
    pub fn new(machine: Arc<dyn MachineLifecycle>, vm_config: &VmConfig) -> Self {
        let global_state = Arc::new(GlobalState::default());
        let mut registry = StateRegistry::default();
        registry.register(GlobalState::descriptor(), global_state.clone());

        MigrationManager {
            controller: RunStateController::new(machine),
            registry: RwLock::new(registry),
            global_state,
            cpr_state: Mutex::new(CprState::default()),
            status: Mutex::new(MigrationStatus::None),
            objects: Arc::new(ObjectRegistry::from_config(&vm_config.object)),
            config: vm_config.migrate.clone(),
        }
    }

    /// Register a component with interior mutability. Returns its instance id.
    pub fn register_device_instance<T>(&self, desc: DeviceStateDesc, entry: Arc<T>) -> String
    where
        T: StateTransfer + Send + Sync + 'static,
    {
        self.registry.write().unwrap().register(desc, entry)
    }

    /// Register a mutex guarded component. Returns its instance id.
    pub fn register_device_instance_mutex<T>(
        &self,
        desc: DeviceStateDesc,
        entry: Arc<Mutex<T>>,
    ) -> String
    where
        T: StateTransfer + Send + Sync + 'static,
    {
        self.registry.write().unwrap().register_mutex(desc, entry)
    }

    pub fn unregister_device_instance(&self, id: &str) -> bool {
        self.registry.write().unwrap().unregister(id)
    }

    /// Instance ids of every registered component, in save order.
    pub fn device_ids(&self) -> Vec<String> {
        self.registry.read().unwrap().ids()
    }

    pub fn run_state(&self) -> &RunStateController {
        &self.controller
    }

    /// Status of the last save or load session.
    pub fn status(&self) -> MigrationStatus {
        *self.status.lock().unwrap()
    }

    /// Checkpoint mode of the running session, `CprMode::None` outside one.
    pub fn cpr_mode(&self) -> CprMode {
        self.cpr_state.lock().unwrap().mode()
    }

    /// Descriptors kept open across a restart.
    pub fn cpr_state(&self) -> MutexGuard<CprState> {
        self.cpr_state.lock().unwrap()
    }

    /// Wake up a suspended VM.
    pub fn wakeup(&self) -> Result<()> {
        self.controller.wakeup()
    }

    fn set_status(&self, new_status: MigrationStatus) -> Result<()> {
        let mut status = self.status.lock().unwrap();
        *status = status.transfer(new_status)?;
        Ok(())
    }

    fn run_session<F>(&self, op: &str, session: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        {
            let mut status = self.status.lock().unwrap();
            if status.is_in_progress() {
                bail!(MigrationError::InProgress(*status));
            }
            *status = status.transfer(MigrationStatus::Setup)?;
        }

        info!("{} started", op);
        match session() {
            Ok(()) => {
                self.set_status(MigrationStatus::Completed)?;
                info!("{} completed", op);
                Ok(())
            }
            Err(e) => {
                self.set_status(MigrationStatus::Failed)?;
                error!("{} failed: {:?}", op, e);
                Err(e)
            }
        }
    }

    /// Save the VM to the checkpoint image at `path`.
    ///
    /// The VM is left stopped after a successful save. A failed save resumes
    /// a VM which was running.
    ///
    /// # Arguments
    ///
    /// * `path` - Image to create, truncated if it exists.
    /// * `mode` - Checkpoint mode.
    pub fn save<P: AsRef<Path>>(&self, path: P, mode: CprMode) -> Result<()> {
        self.run_session("cpr-save", || {
            self.check_save(mode)?;
            let mut channel = MigrationChannel::open(path.as_ref(), ChannelMode::Write)?;
            self.save_state(&mut channel, mode)
        })
    }

    /// Save the VM to an already connected channel.
    pub fn save_to_channel(&self, channel: &mut MigrationChannel, mode: CprMode) -> Result<()> {
        self.run_session("cpr-save", || {
            self.check_save(mode)?;
            self.save_state(channel, mode)
        })
    }

    fn check_save(&self, mode: CprMode) -> Result<()> {
        if mode == CprMode::None {
            bail!(MigrationError::UnsupportedMode(format!("mode {}", mode)));
        }
        self.controller.check_migratable(self.config.colo)
    }

    fn save_state(&self, channel: &mut MigrationChannel, mode: CprMode) -> Result<()> {
        self.set_status(MigrationStatus::Active)?;
        let prior = self.controller.pause_for_save()?;
        self.global_state.store(prior, mode);

        let result = {
            let _mode_guard = CprModeGuard::new(&self.cpr_state, mode);
            self.capture(channel, mode)
        };
        match result {
            Ok(()) => self.controller.finish_save(),
            Err(e) => {
                if let Err(resume_err) = self.controller.resume_after_save(prior) {
                    error!("Failed to roll back VM to {}: {:?}", prior, resume_err);
                }
                Err(e)
            }
        }
    }

    fn capture(&self, channel: &mut MigrationChannel, mode: CprMode) -> Result<()> {
        save_header(channel)?;
        self.registry.read().unwrap().capture_all(channel, mode)?;
        channel.close()
    }

    /// Load the VM from the checkpoint image at `path`. The VM must not be
    /// running.
    ///
    /// On success the VM enters the run state recorded in the image, a failed
    /// load leaves it stopped.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.check_load()?;
        self.run_session("cpr-load", || {
            let mut channel = MigrationChannel::open(path.as_ref(), ChannelMode::Read)?;
            restore_header(&mut channel)?;
            self.load_state(&mut channel)
        })
    }

    /// Load the VM from an already connected channel.
    pub fn load_from_channel(&self, channel: &mut MigrationChannel) -> Result<()> {
        self.check_load()?;
        self.run_session("cpr-load", || {
            restore_header(channel)?;
            self.load_state(channel)
        })
    }

    fn check_load(&self) -> Result<()> {
        if self.controller.is_running() {
            bail!(MigrationError::VmRunning("cpr-load".to_string()));
        }
        Ok(())
    }

    fn load_state(&self, channel: &mut MigrationChannel) -> Result<()> {
        self.set_status(MigrationStatus::Active)?;
        self.controller.enter_for_load()?;

        let result = {
            let _mode_guard = CprModeGuard::new(&self.cpr_state, CprMode::Reboot);
            self.restore(channel, CprMode::Reboot)
        };
        match result {
            Ok(()) => {
                let target = self.global_state.runstate();
                info!("Restored VM, target run state {}", target);
                self.controller.resume_after_load(target)
            }
            Err(e) => {
                self.controller.abort_load();
                Err(e)
            }
        }
    }

    fn restore(&self, channel: &mut MigrationChannel, mode: CprMode) -> Result<()> {
        let restored = self.registry.read().unwrap().restore_all(channel, mode)?;
        let global_id = format!("{}:0", GlobalState::NAME);
        if !restored.contains(&global_id) {
            bail!(MigrationError::MissingSection(global_id));
        }
        if channel.is_file() && !channel.is_at_eof()? {
            bail!(MigrationError::TrailingData);
        }
        channel.close()
    }

    /// Whether migration streams are secured with TLS.
    pub fn tls_enabled(&self) -> bool {
        self.tls_creds_id().is_ok()
    }

    fn tls_creds_id(&self) -> Result<&str> {
        self.config
            .tls_creds
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!(MigrationError::NoCreds))
    }

    /// Secure an incoming migration stream with TLS. `consumer` receives a
    /// read channel over the secure stream, or the handshake error, when the
    /// returned handshake is completed.
    ///
    /// # Arguments
    ///
    /// * `stream` - Connected raw stream, released if the handshake fails.
    /// * `consumer` - Migration stream consumer.
    pub fn connect_incoming<S, F>(&self, stream: S, consumer: F) -> Result<PendingHandshake>
    where
        S: ChannelStream + AsFd + 'static,
        F: FnOnce(Result<MigrationChannel>) + 'static,
    {
        let creds = self
            .objects
            .resolve_creds(self.tls_creds_id()?, TlsEndpoint::Server)?;
        let authz = match self.config.tls_authz.as_deref() {
            Some(id) if !id.is_empty() => Some(self.objects.resolve_authz(id)?),
            _ => None,
        };

        wrap_server(
            INCOMING_CHANNEL,
            stream,
            &creds,
            authz,
            Box::new(move |result| {
                consumer(result.map(|tls| secure_channel(INCOMING_CHANNEL, tls, ChannelMode::Read)))
            }),
        )
    }

    /// Secure an outgoing migration stream with TLS. The `tls-hostname`
    /// parameter, when set, takes precedence over `hostname`.
    pub fn connect_outgoing<S, F>(
        &self,
        stream: S,
        hostname: Option<&str>,
        consumer: F,
    ) -> Result<PendingHandshake>
    where
        S: ChannelStream + AsFd + 'static,
        F: FnOnce(Result<MigrationChannel>) + 'static,
    {
        let creds = self
            .objects
            .resolve_creds(self.tls_creds_id()?, TlsEndpoint::Client)?;
        let hostname = self
            .config
            .hostname()
            .or_else(|| hostname.filter(|h| !h.is_empty()))
            .ok_or_else(|| anyhow!(MigrationError::NoHostname))?;

        wrap_client(
            OUTGOING_CHANNEL,
            stream,
            &creds,
            hostname,
            Box::new(move |result| {
                let channel = result.map(|tls| {
                    secure_channel(OUTGOING_CHANNEL, tls, ChannelMode::Write)
                });
                consumer(channel)
            }),
        )
        .with_context(|| format!("Failed to connect {}", OUTGOING_CHANNEL))
    }
}
