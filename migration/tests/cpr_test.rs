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

use std::cell::RefCell;
use std::io::Read;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use vmm_sys_util::tempdir::TempDir;
use vmm_sys_util::tempfile::TempFile;

use machine_manager::config::VmConfig;
use machine_manager::machine::{MachineLifecycle, RunState};
use migration::{
    error_class, CprMode, DeviceStateDesc, ErrorClass, MigrationChannel, MigrationError,
    MigrationListener, MigrationManager, MigrationStatus, StateTransfer,
};

const CLIENT_FINGERPRINT: &str = "da38aac5d59b1dc9d6dd72abe18f7694750d734f155d3af41bf3eeaa608e13a7";

#[derive(Default)]
struct TestMachine {
    running: AtomicBool,
    ticks_disabled: AtomicBool,
    pauses: AtomicU32,
    resumes: AtomicU32,
}

impl TestMachine {
    fn new(running: bool) -> Arc<Self> {
        let machine = Arc::new(TestMachine::default());
        machine.running.store(running, Ordering::SeqCst);
        machine
    }
}

impl MachineLifecycle for TestMachine {
    fn pause(&self) -> Result<()> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn disable_ticks(&self) {
        self.ticks_disabled.store(true, Ordering::SeqCst);
    }
}

/// A register file with interior mutability.
#[derive(Default)]
struct Counter {
    value: Mutex<u64>,
    fail_capture: AtomicBool,
}

impl Counter {
    fn with_value(value: u64) -> Arc<Self> {
        let counter = Arc::new(Counter::default());
        *counter.value.lock().unwrap() = value;
        counter
    }

    fn value(&self) -> u64 {
        *self.value.lock().unwrap()
    }
}

impl StateTransfer for Counter {
    fn get_state_vec(&self, _mode: CprMode) -> Result<Vec<u8>> {
        if self.fail_capture.load(Ordering::SeqCst) {
            bail!("counter is busy");
        }
        Ok(self.value().to_be_bytes().to_vec())
    }

    fn set_state(&self, state: &[u8], _version: u32, _mode: CprMode) -> Result<()> {
        let bytes: [u8; 8] = match state.try_into() {
            Ok(bytes) => bytes,
            Err(_) => bail!("Invalid counter state length {}", state.len()),
        };
        *self.value.lock().unwrap() = u64::from_be_bytes(bytes);
        Ok(())
    }
}

/// A mutex guarded device which saves something different for each mode.
#[derive(Default)]
struct Blob {
    data: Vec<u8>,
    restored_mode: Option<CprMode>,
}

impl StateTransfer for Blob {
    fn get_state_vec(&self, mode: CprMode) -> Result<Vec<u8>> {
        let mut state = vec![mode as u8];
        state.extend_from_slice(&self.data);
        Ok(state)
    }

    fn set_state_mut(&mut self, state: &[u8], _version: u32, mode: CprMode) -> Result<()> {
        self.data = state[1..].to_vec();
        self.restored_mode = Some(mode);
        Ok(())
    }
}

/// Starts another save and load from inside a running save.
struct Reentrant {
    manager: Mutex<Weak<MigrationManager>>,
    path: PathBuf,
    errors: Mutex<Vec<String>>,
}

impl StateTransfer for Reentrant {
    fn get_state_vec(&self, _mode: CprMode) -> Result<Vec<u8>> {
        if let Some(manager) = self.manager.lock().unwrap().upgrade() {
            let mut errors = self.errors.lock().unwrap();
            if let Err(e) = manager.save(&self.path, CprMode::Reboot) {
                errors.push(e.to_string());
            }
            if let Err(e) = manager.load(&self.path) {
                errors.push(e.to_string());
            }
        }
        Ok(Vec::new())
    }
}

struct TestVm {
    machine: Arc<TestMachine>,
    manager: Arc<MigrationManager>,
    counter: Arc<Counter>,
    blob: Arc<Mutex<Blob>>,
}

fn create_vm(running: bool, counter: u64, blob: &[u8], vm_config: &VmConfig) -> TestVm {
    let machine = TestMachine::new(running);
    let manager = Arc::new(MigrationManager::new(machine.clone(), vm_config));
    let counter = Counter::with_value(counter);
    let blob = Arc::new(Mutex::new(Blob {
        data: blob.to_vec(),
        restored_mode: None,
    }));
    manager.register_device_instance(DeviceStateDesc::new("counter", 1, 1), counter.clone());
    manager.register_device_instance_mutex(DeviceStateDesc::new("blob", 2, 1), blob.clone());
    TestVm {
        machine,
        manager,
        counter,
        blob,
    }
}

#[test]
fn test_reboot_save_load() {
    let src = create_vm(true, 0x1234_5678, b"virtio-blk", &VmConfig::default());
    let file = TempFile::new().unwrap();

    src.manager.save(file.as_path(), CprMode::Reboot).unwrap();
    assert_eq!(src.manager.run_state().state(), RunState::Stopped);
    assert!(!src.machine.is_running());
    assert_eq!(src.manager.cpr_mode(), CprMode::None);
    assert_eq!(src.manager.status(), MigrationStatus::Completed);
    let bytes = std::fs::read(file.as_path()).unwrap();
    assert_eq!(&bytes[0..8], &[0x43, 0x50, 0x52, 0x56, 0, 0, 0, 1]);

    let dst = create_vm(false, 0, b"", &VmConfig::default());
    dst.manager.load(file.as_path()).unwrap();
    assert_eq!(dst.counter.value(), 0x1234_5678);
    let blob = dst.blob.lock().unwrap();
    assert_eq!(blob.data, b"virtio-blk".to_vec());
    assert_eq!(blob.restored_mode, Some(CprMode::Reboot));
    // A reboot-style image is not resumed.
    assert_eq!(dst.manager.run_state().state(), RunState::Stopped);
    assert_eq!(dst.machine.resumes.load(Ordering::SeqCst), 0);
    assert_eq!(dst.manager.cpr_mode(), CprMode::None);
    assert_eq!(dst.manager.status(), MigrationStatus::Completed);
}

#[test]
fn test_restart_save_load_resumes() {
    let src = create_vm(true, 7, b"ram", &VmConfig::default());
    let file = TempFile::new().unwrap();
    src.manager.save(file.as_path(), CprMode::Restart).unwrap();
    assert_eq!(src.manager.run_state().state(), RunState::Stopped);

    let dst = create_vm(false, 0, b"", &VmConfig::default());
    dst.manager.load(file.as_path()).unwrap();
    assert_eq!(dst.manager.run_state().state(), RunState::Running);
    assert!(dst.machine.is_running());
    assert_eq!(dst.counter.value(), 7);
}

#[test]
fn test_suspended_vm_starts_on_wakeup() {
    let src = create_vm(true, 1, b"", &VmConfig::default());
    src.manager.run_state().suspend().unwrap();
    let file = TempFile::new().unwrap();
    src.manager.save(file.as_path(), CprMode::Reboot).unwrap();
    assert!(src.machine.ticks_disabled.load(Ordering::SeqCst));

    let dst = create_vm(false, 0, b"", &VmConfig::default());
    dst.manager.load(file.as_path()).unwrap();
    assert_eq!(dst.manager.run_state().state(), RunState::Suspended);
    assert!(dst.manager.run_state().start_on_wakeup());
    assert!(!dst.machine.is_running());

    dst.manager.wakeup().unwrap();
    assert_eq!(dst.manager.run_state().state(), RunState::Running);
    assert!(dst.machine.is_running());
}

#[test]
fn test_load_rejects_bad_header() {
    let src = create_vm(false, 5, b"", &VmConfig::default());
    let file = TempFile::new().unwrap();
    src.manager.save(file.as_path(), CprMode::Reboot).unwrap();

    for offset in [0, 7] {
        let mut bytes = std::fs::read(file.as_path()).unwrap();
        bytes[offset] ^= 0xff;
        let bad = TempFile::new().unwrap();
        std::fs::write(bad.as_path(), bytes).unwrap();

        let dst = create_vm(false, 9, b"old", &VmConfig::default());
        let err = dst.manager.load(bad.as_path()).unwrap_err();
        assert_eq!(error_class(&err), Some(ErrorClass::Format));
        assert!(format!("{:#}", err).contains("is not a vmstate file"));
        assert_eq!(dst.counter.value(), 9);
        assert_eq!(dst.blob.lock().unwrap().data, b"old".to_vec());
        assert_eq!(dst.manager.run_state().state(), RunState::Stopped);
        assert_eq!(dst.manager.status(), MigrationStatus::Failed);
    }
}

#[test]
fn test_load_truncated_image() {
    let src = create_vm(false, 5, b"blob", &VmConfig::default());
    let file = TempFile::new().unwrap();
    src.manager.save(file.as_path(), CprMode::Reboot).unwrap();
    let image = std::fs::read(file.as_path()).unwrap();

    for len in [0, 4, 8, 12, image.len() - 1] {
        let cut = TempFile::new().unwrap();
        std::fs::write(cut.as_path(), &image[..len]).unwrap();
        let dst = create_vm(false, 9, b"", &VmConfig::default());
        let err = dst.manager.load(cut.as_path()).unwrap_err();
        assert_eq!(error_class(&err), Some(ErrorClass::Format), "image cut at {}", len);
        assert!(format!("{:#}", err).contains("is truncated"));
        assert_eq!(dst.manager.run_state().state(), RunState::Stopped);
        assert_eq!(dst.manager.status(), MigrationStatus::Failed);
    }
}

#[test]
fn test_load_while_running() {
    let src = create_vm(false, 5, b"", &VmConfig::default());
    let file = TempFile::new().unwrap();
    src.manager.save(file.as_path(), CprMode::Reboot).unwrap();

    let dst = create_vm(true, 9, b"", &VmConfig::default());
    let err = dst.manager.load(file.as_path()).unwrap_err();
    assert_eq!(error_class(&err), Some(ErrorClass::State));
    assert_eq!(dst.counter.value(), 9);
    assert_eq!(dst.manager.run_state().state(), RunState::Running);
    assert_eq!(dst.manager.status(), MigrationStatus::None);
    assert_eq!(dst.machine.pauses.load(Ordering::SeqCst), 0);
}

#[test]
fn test_load_newer_version() {
    let src = create_vm(false, 5, b"", &VmConfig::default());
    src.manager.unregister_device_instance("blob:0");
    src.manager.register_device_instance_mutex(
        DeviceStateDesc::new("blob", 3, 1),
        Arc::new(Mutex::new(Blob::default())),
    );
    let file = TempFile::new().unwrap();
    src.manager.save(file.as_path(), CprMode::Reboot).unwrap();

    let dst = create_vm(false, 0, b"", &VmConfig::default());
    let err = dst.manager.load(file.as_path()).unwrap_err();
    assert_eq!(error_class(&err), Some(ErrorClass::Format));
    assert_eq!(dst.manager.run_state().state(), RunState::Stopped);
}

#[test]
fn test_save_rollback() {
    let src = create_vm(true, 5, b"", &VmConfig::default());
    src.counter.fail_capture.store(true, Ordering::SeqCst);
    let file = TempFile::new().unwrap();

    let err = src.manager.save(file.as_path(), CprMode::Reboot).unwrap_err();
    assert!(format!("{:#}", err).contains("counter is busy"));
    assert_eq!(src.manager.run_state().state(), RunState::Running);
    assert!(src.machine.is_running());
    assert_eq!(src.machine.pauses.load(Ordering::SeqCst), 1);
    assert_eq!(src.machine.resumes.load(Ordering::SeqCst), 1);
    assert_eq!(src.manager.cpr_mode(), CprMode::None);
    assert_eq!(src.manager.status(), MigrationStatus::Failed);

    // The next save succeeds.
    src.counter.fail_capture.store(false, Ordering::SeqCst);
    src.manager.save(file.as_path(), CprMode::Reboot).unwrap();
    assert_eq!(src.manager.status(), MigrationStatus::Completed);
}

#[test]
fn test_save_open_failure() {
    let src = create_vm(true, 5, b"", &VmConfig::default());
    let err = src
        .manager
        .save("/path/not/exist/cprvirt.img", CprMode::Reboot)
        .unwrap_err();
    assert_eq!(error_class(&err), Some(ErrorClass::Resource));
    assert_eq!(src.manager.run_state().state(), RunState::Running);
    assert_eq!(src.machine.pauses.load(Ordering::SeqCst), 0);
}

#[test]
fn test_save_colo_rejected() {
    let mut vm_config = VmConfig::default();
    vm_config.add_migrate_params("x-colo=on").unwrap();
    let src = create_vm(true, 5, b"", &vm_config);
    let file = TempFile::new().unwrap();
    let err = src.manager.save(file.as_path(), CprMode::Reboot).unwrap_err();
    assert_eq!(error_class(&err), Some(ErrorClass::Configuration));
    assert_eq!(src.machine.pauses.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::metadata(file.as_path()).unwrap().len(), 0);
}

#[test]
fn test_concurrent_request_rejected() {
    let src = create_vm(false, 5, b"", &VmConfig::default());
    let file = TempFile::new().unwrap();
    let other = TempFile::new().unwrap();
    let reentrant = Arc::new(Reentrant {
        manager: Mutex::new(Arc::downgrade(&src.manager)),
        path: other.as_path().to_path_buf(),
        errors: Mutex::new(Vec::new()),
    });
    src.manager
        .register_device_instance(DeviceStateDesc::new("reentrant", 1, 1), reentrant.clone());

    src.manager.save(file.as_path(), CprMode::Reboot).unwrap();
    let errors = reentrant.errors.lock().unwrap();
    assert_eq!(errors.len(), 2);
    for e in errors.iter() {
        assert_eq!(e, "Another save or load is in progress, status active");
    }
    assert_eq!(std::fs::metadata(other.as_path()).unwrap().len(), 0);
}

fn pki_dir(endpoint: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("pki")
        .join(endpoint)
        .display()
        .to_string()
}

fn tls_config(endpoint: &str, migrate_params: &str) -> VmConfig {
    let mut vm_config = VmConfig::default();
    vm_config
        .add_object(&format!(
            "tls-creds-x509,id=tls0,dir={},endpoint={}",
            pki_dir(endpoint),
            endpoint
        ))
        .unwrap();
    vm_config
        .add_object(&format!("authz-simple,id=authz0,identity={}", CLIENT_FINGERPRINT))
        .unwrap();
    vm_config
        .add_object("authz-simple,id=authz1,identity=0123")
        .unwrap();
    vm_config.add_migrate_params(migrate_params).unwrap();
    vm_config
}

type Slot = Rc<RefCell<Option<Result<MigrationChannel>>>>;

fn slot() -> Slot {
    Rc::new(RefCell::new(None))
}

fn take(slot: &Slot) -> Result<MigrationChannel> {
    slot.borrow_mut().take().unwrap()
}

#[test]
fn test_tls_migration() {
    let src_config = tls_config("client", "tls-creds=tls0,tls-hostname=localhost");
    let dst_config = tls_config("server", "tls-creds=tls0,tls-authz=authz0");
    let src = create_vm(true, 0xfeed, b"tls", &src_config);
    let dst = create_vm(false, 0, b"", &dst_config);
    let (src_sock, dst_sock) = UnixStream::pair().unwrap();

    let incoming = slot();
    let outgoing = slot();
    let incoming_clone = incoming.clone();
    let outgoing_clone = outgoing.clone();
    let pending_in = dst
        .manager
        .connect_incoming(dst_sock, move |r| *incoming_clone.borrow_mut() = Some(r))
        .unwrap();
    // tls-hostname takes precedence over the hostname of the URI.
    let pending_out = src
        .manager
        .connect_outgoing(src_sock, Some("dst.example"), move |r| {
            *outgoing_clone.borrow_mut() = Some(r)
        })
        .unwrap();
    assert_eq!(pending_in.name(), "migration-tls-incoming");
    assert!(incoming.borrow().is_none());

    pending_out.complete();
    pending_in.complete();
    let mut out_channel = take(&outgoing).unwrap();
    let mut in_channel = take(&incoming).unwrap();
    assert_eq!(in_channel.name(), "migration-tls-incoming");
    assert_eq!(out_channel.name(), "migration-tls-outgoing");

    let src_manager = src.manager.clone();
    let sender =
        thread::spawn(move || src_manager.save_to_channel(&mut out_channel, CprMode::Restart));
    dst.manager.load_from_channel(&mut in_channel).unwrap();
    sender.join().unwrap().unwrap();

    assert_eq!(src.manager.run_state().state(), RunState::Stopped);
    assert_eq!(dst.counter.value(), 0xfeed);
    assert_eq!(dst.blob.lock().unwrap().data, b"tls".to_vec());
    assert_eq!(dst.manager.run_state().state(), RunState::Running);
}

#[test]
fn test_tls_authz_denied() {
    let src = create_vm(true, 1, b"", &tls_config("client", "tls-creds=tls0"));
    let dst_config = tls_config("server", "tls-creds=tls0,tls-authz=authz1");
    let dst = create_vm(false, 0, b"", &dst_config);
    let (src_sock, dst_sock) = UnixStream::pair().unwrap();

    let incoming = slot();
    let outgoing = slot();
    let incoming_clone = incoming.clone();
    let outgoing_clone = outgoing.clone();
    let mut pending_in = dst
        .manager
        .connect_incoming(dst_sock, move |r| *incoming_clone.borrow_mut() = Some(r))
        .unwrap();
    let pending_out = src
        .manager
        .connect_outgoing(src_sock, Some("localhost"), move |r| {
            *outgoing_clone.borrow_mut() = Some(r)
        })
        .unwrap();

    pending_out.complete();
    while !pending_in.try_complete() {
        thread::yield_now();
    }
    let err = take(&incoming).err().unwrap();
    assert_eq!(error_class(&err), Some(ErrorClass::Protocol));
    assert!(matches!(
        err.downcast_ref::<MigrationError>(),
        Some(MigrationError::AuthzDenied(_, _))
    ));

    // The rejected connection is closed, the source sees the end of the stream.
    let mut out_channel = take(&outgoing).unwrap();
    assert!(out_channel.get_u8().is_err());
}

fn assert_released(peer: &mut UnixStream) {
    peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut buf = [0_u8; 1];
    assert_eq!(peer.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_tls_cancelled_handshake() {
    let dst_config = tls_config("server", "tls-creds=tls0,tls-authz=authz0");
    let dst = create_vm(false, 0, b"", &dst_config);
    let (sock, mut peer) = UnixStream::pair().unwrap();
    let consumed = Rc::new(RefCell::new(false));
    let consumed_clone = consumed.clone();
    let pending = dst
        .manager
        .connect_incoming(sock, move |_| *consumed_clone.borrow_mut() = true)
        .unwrap();

    drop(pending);
    assert_released(&mut peer);
    assert!(!*consumed.borrow());
}

#[test]
fn test_tls_configuration_errors() {
    // Client credentials used for the incoming side.
    let dst = create_vm(false, 0, b"", &tls_config("client", "tls-creds=tls0"));
    let (sock, mut peer) = UnixStream::pair().unwrap();
    let err = dst.manager.connect_incoming(sock, |_| {}).err().unwrap();
    assert_eq!(error_class(&err), Some(ErrorClass::Protocol));
    assert_eq!(
        err.to_string(),
        "Expected TLS credentials for a server endpoint"
    );
    assert_released(&mut peer);

    // No hostname at all.
    let src = create_vm(true, 0, b"", &tls_config("client", "tls-creds=tls0"));
    let (sock, mut peer) = UnixStream::pair().unwrap();
    let err = src
        .manager
        .connect_outgoing(sock, None, |_| {})
        .err()
        .unwrap();
    assert_eq!(error_class(&err), Some(ErrorClass::Configuration));
    assert_eq!(err.to_string(), "No hostname available for TLS");
    assert_released(&mut peer);

    // Unknown credentials and no credentials.
    let src = create_vm(true, 0, b"", &tls_config("client", "tls-creds=tls9"));
    let (sock, _peer) = UnixStream::pair().unwrap();
    let err = src
        .manager
        .connect_outgoing(sock, Some("localhost"), |_| {})
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "No TLS credentials with id 'tls9'");
    let src = create_vm(true, 0, b"", &VmConfig::default());
    let (sock, _peer) = UnixStream::pair().unwrap();
    let err = src
        .manager
        .connect_outgoing(sock, Some("localhost"), |_| {})
        .err()
        .unwrap();
    assert_eq!(error_class(&err), Some(ErrorClass::Configuration));
}

/// Migrate over a listening socket bound at `uri`. The source dials a tcp
/// listener through `port_host`.
fn socket_migration(src_config: VmConfig, dst_config: VmConfig, uri: &str, port_host: &str) {
    let src = create_vm(true, 0xbeef, b"socket", &src_config);
    let dst = create_vm(false, 0, b"", &dst_config);
    let listener = MigrationListener::bind(uri).unwrap();
    let bound = listener.local_uri().unwrap();
    let connect_uri = match bound.rsplit_once(':') {
        Some((_, port)) if bound.starts_with("tcp:") => format!("tcp:{}:{}", port_host, port),
        _ => bound,
    };

    let src_manager = src.manager.clone();
    let sender = thread::spawn(move || -> Result<()> {
        let outgoing = slot();
        let outgoing_clone = outgoing.clone();
        let pending = src_manager.start_outgoing(&connect_uri, None, move |r| {
            *outgoing_clone.borrow_mut() = Some(r)
        })?;
        if let Some(pending) = pending {
            pending.complete();
        }
        let mut channel = take(&outgoing)?;
        src_manager.save_to_channel(&mut channel, CprMode::Restart)
    });

    let incoming = slot();
    let incoming_clone = incoming.clone();
    let pending = dst
        .manager
        .accept_incoming(&listener, move |r| *incoming_clone.borrow_mut() = Some(r))
        .unwrap();
    if let Some(pending) = pending {
        pending.complete();
    }
    let mut channel = take(&incoming).unwrap();
    dst.manager.load_from_channel(&mut channel).unwrap();
    sender.join().unwrap().unwrap();

    assert_eq!(dst.counter.value(), 0xbeef);
    assert_eq!(dst.blob.lock().unwrap().data, b"socket".to_vec());
    assert_eq!(dst.manager.run_state().state(), RunState::Running);
}

#[test]
fn test_unix_socket_tls_migration() {
    let dir = TempDir::new().unwrap();
    let uri = format!("unix:{}/cprvirt.sock", dir.as_path().display());
    // A unix address carries no host name, tls-hostname provides it.
    socket_migration(
        tls_config("client", "tls-creds=tls0,tls-hostname=localhost"),
        tls_config("server", "tls-creds=tls0,tls-authz=authz0"),
        &uri,
        "",
    );
}

#[test]
fn test_tcp_tls_migration() {
    // The server certificate is checked against the host of the address.
    socket_migration(
        tls_config("client", "tls-creds=tls0"),
        tls_config("server", "tls-creds=tls0,tls-authz=authz0"),
        "tcp:127.0.0.1:0",
        "localhost",
    );
}

#[test]
fn test_plain_socket_migration() {
    let dir = TempDir::new().unwrap();
    let uri = format!("unix:{}/cprvirt.sock", dir.as_path().display());
    socket_migration(VmConfig::default(), VmConfig::default(), &uri, "");
}
