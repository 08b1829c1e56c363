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

use std::collections::HashMap;
use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::os::unix::io::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use log::{error, info, warn};
use rustls::{
    cipher_suite::{
        TLS13_AES_128_GCM_SHA256, TLS13_AES_256_GCM_SHA384, TLS13_CHACHA20_POLY1305_SHA256,
        TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256, TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
    },
    kx_group::{SECP256R1, SECP384R1, X25519},
    server::{AllowAnyAuthenticatedClient, NoClientAuth},
    version::{TLS12, TLS13},
    Certificate, ClientConfig, ClientConnection, ConnectionCommon, PrivateKey, RootCertStore,
    ServerConfig, ServerConnection, ServerName, StreamOwned, SupportedCipherSuite,
    SupportedKxGroup, SupportedProtocolVersion,
};
use sha2::{Digest, Sha256};
use vmm_sys_util::eventfd::EventFd;

use crate::channel::ChannelStream;
use crate::error::MigrationError;
use machine_manager::config::{AuthzSimpleConfig, ObjectConfig, TlsCredObjConfig, TlsEndpoint};

const TLS_CREDS_CACERT: &str = "cacert.pem";
const TLS_CREDS_SERVERCERT: &str = "servercert.pem";
const TLS_CREDS_SERVERKEY: &str = "serverkey.pem";
const TLS_CREDS_CLIENTCERT: &str = "clientcert.pem";
const TLS_CREDS_CLIENTKEY: &str = "clientkey.pem";

/// Cipher suites supported by both endpoints.
static TLS_CIPHER_SUITES: &[SupportedCipherSuite] = &[
    TLS13_AES_128_GCM_SHA256,
    TLS13_AES_256_GCM_SHA384,
    TLS13_CHACHA20_POLY1305_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
];
/// Tls version supported.
static TLS_VERSIONS: &[&SupportedProtocolVersion] = &[&TLS13, &TLS12];
/// Key exchange groups supported.
static TLS_KX_GROUPS: [&SupportedKxGroup; 3] = [&X25519, &SECP256R1, &SECP384R1];

/// An object resolved from the registry by id.
#[derive(Debug, Clone)]
pub enum TlsObject {
    Creds(Arc<TlsCredObjConfig>),
    Authz(Arc<AuthzSimpleConfig>),
}

/// Read-only lookup of credential and authorization objects by id.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: HashMap<String, TlsObject>,
}

impl ObjectRegistry {
    pub fn from_config(config: &ObjectConfig) -> Self {
        let mut objects = HashMap::new();
        for (id, creds) in &config.tls_object {
            objects.insert(id.clone(), TlsObject::Creds(Arc::new(creds.clone())));
        }
        for (id, authz) in &config.authz_object {
            objects.insert(id.clone(), TlsObject::Authz(Arc::new(authz.clone())));
        }
        ObjectRegistry { objects }
    }

    pub fn get(&self, id: &str) -> Option<&TlsObject> {
        self.objects.get(id)
    }

    /// Find the TLS credentials `id` for an `endpoint`.
    pub fn resolve_creds(
        &self,
        id: &str,
        endpoint: TlsEndpoint,
    ) -> Result<Arc<TlsCredObjConfig>> {
        match self.get(id) {
            Some(TlsObject::Creds(creds)) if creds.endpoint == endpoint => Ok(creds.clone()),
            Some(TlsObject::Creds(_)) => Err(anyhow!(MigrationError::EndpointMismatch(endpoint))),
            Some(_) => Err(anyhow!(MigrationError::WrongType(
                id.to_string(),
                "TLS credentials".to_string()
            ))),
            None => Err(anyhow!(MigrationError::CredsNotFound(id.to_string()))),
        }
    }

    pub fn resolve_authz(&self, id: &str) -> Result<Arc<AuthzSimpleConfig>> {
        match self.get(id) {
            Some(TlsObject::Authz(authz)) => Ok(authz.clone()),
            Some(_) => Err(anyhow!(MigrationError::WrongType(
                id.to_string(),
                "an authorization policy".to_string()
            ))),
            None => Err(anyhow!(MigrationError::AuthzNotFound(id.to_string()))),
        }
    }
}

fn invalid_creds<E: Display>(creds: &TlsCredObjConfig, e: E) -> anyhow::Error {
    anyhow!(MigrationError::InvalidCreds(creds.id.clone(), e.to_string()))
}

fn handshake_error<E: Display>(name: &str, e: E) -> anyhow::Error {
    anyhow!(MigrationError::Handshake(name.to_string(), e.to_string()))
}

/// Load private key
///
/// # Arguments
///
/// * `filepath` - the path private key.
fn load_private_key(filepath: &Path) -> Result<PrivateKey> {
    let file = File::open(filepath)
        .with_context(|| format!("Failed to open {}", filepath.display()))?;
    let mut reader = BufReader::new(file);
    loop {
        match rustls_pemfile::read_one(&mut reader)? {
            Some(rustls_pemfile::Item::RSAKey(rsa)) => return Ok(PrivateKey(rsa)),
            Some(rustls_pemfile::Item::PKCS8Key(pkcs8)) => return Ok(PrivateKey(pkcs8)),
            Some(rustls_pemfile::Item::ECKey(ec)) => return Ok(PrivateKey(ec)),
            None => break,
            _ => {}
        }
    }
    bail!("No private key in {}", filepath.display())
}

/// Load certificate.
///
/// # Arguments
///
/// * `filepath` - the file path of certificate.
fn load_certs(filepath: &Path) -> Result<Vec<Certificate>> {
    let certfile = File::open(filepath)
        .with_context(|| format!("Failed to open {}", filepath.display()))?;
    let mut reader = BufReader::new(certfile);
    let certs: Vec<Certificate> = rustls_pemfile::certs(&mut reader)?
        .into_iter()
        .map(Certificate)
        .collect();
    if certs.is_empty() {
        bail!("No certificate in {}", filepath.display());
    }
    Ok(certs)
}

fn load_roots(creds: &TlsCredObjConfig) -> Result<RootCertStore> {
    let roots = load_certs(&Path::new(&creds.dir).join(TLS_CREDS_CACERT))
        .map_err(|e| invalid_creds(creds, format!("{:#}", e)))?;
    let mut store = RootCertStore::empty();
    for root in roots {
        store.add(&root).map_err(|e| invalid_creds(creds, e))?;
    }
    Ok(store)
}

/// Build the rustls configuration of a server endpoint. With `verify-peer`
/// every client must present a certificate chained to `cacert.pem`.
pub fn make_server_config(creds: &TlsCredObjConfig) -> Result<Arc<ServerConfig>> {
    let dir = Path::new(&creds.dir);
    let client_auth = if creds.verify_peer {
        AllowAnyAuthenticatedClient::new(load_roots(creds)?).boxed()
    } else {
        NoClientAuth::boxed()
    };
    let certs = load_certs(&dir.join(TLS_CREDS_SERVERCERT))
        .map_err(|e| invalid_creds(creds, format!("{:#}", e)))?;
    let privkey = load_private_key(&dir.join(TLS_CREDS_SERVERKEY))
        .map_err(|e| invalid_creds(creds, format!("{:#}", e)))?;

    let config = ServerConfig::builder()
        .with_cipher_suites(TLS_CIPHER_SUITES)
        .with_kx_groups(&TLS_KX_GROUPS)
        .with_protocol_versions(TLS_VERSIONS)
        .map_err(|e| invalid_creds(creds, e))?
        .with_client_cert_verifier(client_auth)
        .with_single_cert(certs, privkey)
        .map_err(|e| invalid_creds(creds, e))?;
    Ok(Arc::new(config))
}

/// Build the rustls configuration of a client endpoint. The client
/// certificate is offered when both `clientcert.pem` and `clientkey.pem`
/// exist.
pub fn make_client_config(creds: &TlsCredObjConfig) -> Result<Arc<ClientConfig>> {
    let dir = Path::new(&creds.dir);
    let builder = ClientConfig::builder()
        .with_cipher_suites(TLS_CIPHER_SUITES)
        .with_kx_groups(&TLS_KX_GROUPS)
        .with_protocol_versions(TLS_VERSIONS)
        .map_err(|e| invalid_creds(creds, e))?
        .with_root_certificates(load_roots(creds)?);

    let cert_path = dir.join(TLS_CREDS_CLIENTCERT);
    let key_path = dir.join(TLS_CREDS_CLIENTKEY);
    let config = if cert_path.exists() && key_path.exists() {
        let certs =
            load_certs(&cert_path).map_err(|e| invalid_creds(creds, format!("{:#}", e)))?;
        let privkey =
            load_private_key(&key_path).map_err(|e| invalid_creds(creds, format!("{:#}", e)))?;
        builder
            .with_client_auth_cert(certs, privkey)
            .map_err(|e| invalid_creds(creds, e))?
    } else {
        builder.with_no_client_auth()
    };
    Ok(Arc::new(config))
}

/// Lower-case hex SHA-256 digest of a DER certificate, the identity an
/// `authz-simple` policy matches against.
pub fn cert_fingerprint(cert: &Certificate) -> String {
    hex::encode(Sha256::digest(&cert.0))
}

fn check_authz(
    name: &str,
    peer_certs: Option<&[Certificate]>,
    authz: &AuthzSimpleConfig,
) -> Result<()> {
    let identity = match peer_certs.and_then(|certs| certs.first()) {
        Some(cert) => cert_fingerprint(cert),
        None => bail!(MigrationError::AuthzDenied(
            "without certificate".to_string(),
            authz.id.clone()
        )),
    };
    if !identity.eq_ignore_ascii_case(&authz.identity) {
        bail!(MigrationError::AuthzDenied(identity, authz.id.clone()));
    }
    info!("{}: peer {} authorized by {}", name, identity, authz.id);
    Ok(())
}

fn complete_handshake<Data, T: Read + Write>(
    conn: &mut ConnectionCommon<Data>,
    stream: &mut T,
) -> io::Result<()> {
    while conn.is_handshaking() {
        conn.complete_io(stream)?;
    }
    while conn.wants_write() {
        conn.write_tls(stream)?;
    }
    stream.flush()
}

/// A stream after a successful TLS handshake. All I/O is encrypted.
pub enum TlsChannel {
    Server(StreamOwned<ServerConnection, Box<dyn ChannelStream>>),
    Client(StreamOwned<ClientConnection, Box<dyn ChannelStream>>),
}

impl TlsChannel {
    /// Fingerprint of the peer's leaf certificate, if it sent one.
    pub fn peer_fingerprint(&self) -> Option<String> {
        let certs = match self {
            TlsChannel::Server(stream) => stream.conn.peer_certificates(),
            TlsChannel::Client(stream) => stream.conn.peer_certificates(),
        };
        certs.and_then(|c| c.first()).map(cert_fingerprint)
    }
}

impl Read for TlsChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            TlsChannel::Server(stream) => stream.read(buf),
            TlsChannel::Client(stream) => stream.read(buf),
        }
    }
}

impl Write for TlsChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TlsChannel::Server(stream) => stream.write(buf),
            TlsChannel::Client(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TlsChannel::Server(stream) => stream.flush(),
            TlsChannel::Client(stream) => stream.flush(),
        }
    }
}

fn clone_socket<S: AsFd>(name: &str, stream: &S) -> Result<OwnedFd> {
    stream
        .as_fd()
        .try_clone_to_owned()
        .with_context(|| format!("{}: failed to duplicate socket", name))
}

/// Called with the handshake result on the thread collecting it.
pub type HandshakeCallback = Box<dyn FnOnce(Result<TlsChannel>)>;

/// A handshake running on a worker thread.
///
/// # Notes
///
/// `event_fd` becomes readable once the worker is done. The callback runs
/// inside `complete` or `try_complete`, never on the worker, and always
/// before the secure channel is used. Dropping the handle without completing
/// it drops the callback and shuts the raw socket down, which also ends a
/// worker still waiting for the peer.
pub struct PendingHandshake {
    name: String,
    event: EventFd,
    receiver: Receiver<Result<TlsChannel>>,
    callback: Option<HandshakeCallback>,
    /// Duplicate of the raw socket, held until the callback ran.
    socket: Option<OwnedFd>,
}

impl PendingHandshake {
    fn spawn<F>(
        name: &str,
        socket: OwnedFd,
        handshake: F,
        callback: HandshakeCallback,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<TlsChannel> + Send + 'static,
    {
        let event =
            EventFd::new(libc::EFD_NONBLOCK).with_context(|| "Failed to create eventfd")?;
        let notifier = event
            .try_clone()
            .with_context(|| "Failed to clone eventfd")?;
        let (sender, receiver) = mpsc::channel();
        let thread_name = name.to_string();
        thread::Builder::new()
            .name("tls-handshake".to_string())
            .spawn(move || {
                let result = handshake();
                if let Err(e) = &result {
                    error!("{}: {:?}", thread_name, e);
                }
                // Receiver is gone when the pending handshake was dropped.
                let _ = sender.send(result);
                if let Err(e) = notifier.write(1) {
                    error!("{}: failed to notify handshake completion: {}", thread_name, e);
                }
            })
            .with_context(|| "Failed to spawn TLS handshake thread")?;

        Ok(PendingHandshake {
            name: name.to_string(),
            event,
            receiver,
            callback: Some(callback),
            socket: Some(socket),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptor signalled when the handshake finished.
    pub fn event_fd(&self) -> RawFd {
        self.event.as_raw_fd()
    }

    fn finish(&mut self, result: Result<TlsChannel>) {
        // EAGAIN when the worker has not signalled yet.
        let _ = self.event.read();
        self.socket = None;
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }

    fn worker_lost(&self) -> anyhow::Error {
        handshake_error(&self.name, "handshake worker exited")
    }

    /// Wait for the handshake and run the callback.
    pub fn complete(mut self) {
        let result = self
            .receiver
            .recv()
            .unwrap_or_else(|_| Err(self.worker_lost()));
        self.finish(result);
    }

    /// Run the callback if the handshake finished. Returns whether it did.
    pub fn try_complete(&mut self) -> bool {
        if self.callback.is_none() {
            return true;
        }
        let result = match self.receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => Err(self.worker_lost()),
        };
        self.finish(result);
        true
    }
}

impl Drop for PendingHandshake {
    fn drop(&mut self) {
        if let Some(socket) = self.socket.take() {
            // SAFETY: socket is a valid descriptor owned by this handle.
            let ret = unsafe { libc::shutdown(socket.as_raw_fd(), libc::SHUT_RDWR) };
            if ret < 0 {
                let err = io::Error::last_os_error();
                // Files and pipes can not be shut down, closing them is enough.
                if err.raw_os_error() != Some(libc::ENOTSOCK) {
                    warn!("{}: failed to shut down socket: {}", self.name, err);
                }
            }
            info!("{}: TLS handshake cancelled", self.name);
        }
    }
}

/// Start the server side handshake on `stream`.
///
/// # Arguments
///
/// * `name` - Channel name used in logs and errors.
/// * `stream` - Connected raw stream, released on failure.
/// * `creds` - Server endpoint credentials.
/// * `authz` - Policy checked against the client certificate.
/// * `callback` - Receives the secure channel or the handshake error.
pub fn wrap_server<S>(
    name: &str,
    stream: S,
    creds: &TlsCredObjConfig,
    authz: Option<Arc<AuthzSimpleConfig>>,
    callback: HandshakeCallback,
) -> Result<PendingHandshake>
where
    S: ChannelStream + AsFd + 'static,
{
    if creds.endpoint != TlsEndpoint::Server {
        bail!(MigrationError::EndpointMismatch(TlsEndpoint::Server));
    }
    let config = make_server_config(creds)?;
    let socket = clone_socket(name, &stream)?;
    let conn_name = name.to_string();
    let handshake = move || {
        let mut stream: Box<dyn ChannelStream> = Box::new(stream);
        let mut conn =
            ServerConnection::new(config).map_err(|e| handshake_error(&conn_name, e))?;
        complete_handshake(&mut *conn, &mut stream)
            .map_err(|e| handshake_error(&conn_name, e))?;
        if let Some(authz) = authz {
            check_authz(&conn_name, conn.peer_certificates(), &authz)?;
        }
        info!("{}: TLS handshake completed", conn_name);
        Ok(TlsChannel::Server(StreamOwned::new(conn, stream)))
    };
    PendingHandshake::spawn(name, socket, handshake, callback)
}

/// Start the client side handshake on `stream`, verifying the server
/// certificate against `hostname`.
pub fn wrap_client<S>(
    name: &str,
    stream: S,
    creds: &TlsCredObjConfig,
    hostname: &str,
    callback: HandshakeCallback,
) -> Result<PendingHandshake>
where
    S: ChannelStream + AsFd + 'static,
{
    if creds.endpoint != TlsEndpoint::Client {
        bail!(MigrationError::EndpointMismatch(TlsEndpoint::Client));
    }
    let config = make_client_config(creds)?;
    let server_name = ServerName::try_from(hostname)
        .map_err(|e| anyhow!("Invalid TLS hostname {}: {}", hostname, e))?;
    let socket = clone_socket(name, &stream)?;
    let conn_name = name.to_string();
    let handshake = move || {
        let mut stream: Box<dyn ChannelStream> = Box::new(stream);
        let mut conn = ClientConnection::new(config, server_name)
            .map_err(|e| handshake_error(&conn_name, e))?;
        complete_handshake(&mut *conn, &mut stream)
            .map_err(|e| handshake_error(&conn_name, e))?;
        info!("{}: TLS handshake completed", conn_name);
        Ok(TlsChannel::Client(StreamOwned::new(conn, stream)))
    };
    PendingHandshake::spawn(name, socket, handshake, callback)
}
