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

use std::fs;
use std::net::{Ipv6Addr, TcpListener, TcpStream};
use std::os::unix::io::AsFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use log::{info, warn};

use crate::channel::{ChannelMode, ChannelStream, MigrationChannel};
use crate::error::MigrationError;
use crate::manager::MigrationManager;
use crate::tls::PendingHandshake;

const SOCKET_INCOMING: &str = "migration-socket-incoming";
const SOCKET_OUTGOING: &str = "migration-socket-outgoing";

/// Address of a migration peer: `tcp:<host>:<port>` or `unix:<path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrateUri {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl MigrateUri {
    /// Host name the server certificate is checked against, for inet
    /// addresses only.
    pub fn hostname(&self) -> Option<&str> {
        match self {
            MigrateUri::Tcp { host, .. } => Some(host),
            MigrateUri::Unix(_) => None,
        }
    }
}

/// Parse a migration address. An IPv6 host is written in brackets,
/// e.g. `tcp:[::1]:4444`.
pub fn parse_migrate_uri(uri: &str) -> Result<MigrateUri> {
    let invalid = || anyhow!(MigrationError::InvalidUri(uri.to_string()));
    let (scheme, addr) = uri.split_once(':').ok_or_else(invalid)?;
    match scheme {
        "tcp" => {
            let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
            let port = port.parse::<u16>().map_err(|_| invalid())?;
            let host = match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
                Some(v6) if v6.parse::<Ipv6Addr>().is_ok() => v6,
                Some(_) => return Err(invalid()),
                None if host.is_empty() || host.contains(':') => return Err(invalid()),
                None => host,
            };
            Ok(MigrateUri::Tcp {
                host: host.to_string(),
                port,
            })
        }
        "unix" if !addr.is_empty() => Ok(MigrateUri::Unix(PathBuf::from(addr))),
        _ => Err(invalid()),
    }
}

fn socket_error(uri: &str, e: std::io::Error) -> anyhow::Error {
    anyhow!(MigrationError::ResourceUnavailable {
        path: uri.to_string(),
        source: e,
    })
}

/// Listening socket of the destination side. A unix socket file is removed
/// when the listener is dropped.
pub enum MigrationListener {
    Tcp(TcpListener),
    Unix { listener: UnixListener, path: PathBuf },
}

impl MigrationListener {
    pub fn bind(uri: &str) -> Result<Self> {
        let listener = match parse_migrate_uri(uri)? {
            MigrateUri::Tcp { host, port } => MigrationListener::Tcp(
                TcpListener::bind((host.as_str(), port)).map_err(|e| socket_error(uri, e))?,
            ),
            MigrateUri::Unix(path) => MigrationListener::Unix {
                listener: UnixListener::bind(&path).map_err(|e| socket_error(uri, e))?,
                path,
            },
        };
        info!("Listening for incoming migration on {}", uri);
        Ok(listener)
    }

    /// Address the listener is bound to, with the port picked by the kernel
    /// when bound to port 0.
    pub fn local_uri(&self) -> Result<String> {
        match self {
            MigrationListener::Tcp(listener) => {
                let addr = listener
                    .local_addr()
                    .map_err(|e| socket_error(SOCKET_INCOMING, e))?;
                Ok(format!("tcp:{}", addr))
            }
            MigrationListener::Unix { path, .. } => Ok(format!("unix:{}", path.display())),
        }
    }
}

impl Drop for MigrationListener {
    fn drop(&mut self) {
        if let MigrationListener::Unix { path, .. } = self {
            if let Err(e) = fs::remove_file(path.as_path()) {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

impl MigrationManager {
    /// Connect to the destination at `uri` and hand a write channel to
    /// `consumer`. With TLS configured the channel is secured first and the
    /// returned handshake must be completed; without TLS `consumer` has
    /// already run when this returns `None`.
    ///
    /// # Arguments
    ///
    /// * `uri` - Destination address.
    /// * `hostname` - TLS host name, the host of a tcp address by default.
    /// * `consumer` - Migration stream consumer.
    pub fn start_outgoing<F>(
        &self,
        uri: &str,
        hostname: Option<&str>,
        consumer: F,
    ) -> Result<Option<PendingHandshake>>
    where
        F: FnOnce(Result<MigrationChannel>) + 'static,
    {
        let addr = parse_migrate_uri(uri)?;
        let hostname = hostname.or_else(|| addr.hostname());
        match &addr {
            MigrateUri::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port))
                    .map_err(|e| socket_error(uri, e))?;
                self.outgoing_stream(stream, hostname, consumer)
            }
            MigrateUri::Unix(path) => {
                let stream = UnixStream::connect(path).map_err(|e| socket_error(uri, e))?;
                self.outgoing_stream(stream, hostname, consumer)
            }
        }
    }

    /// Listen on `uri` and accept one incoming migration.
    pub fn start_incoming<F>(&self, uri: &str, consumer: F) -> Result<Option<PendingHandshake>>
    where
        F: FnOnce(Result<MigrationChannel>) + 'static,
    {
        let listener = MigrationListener::bind(uri)?;
        self.accept_incoming(&listener, consumer)
    }

    /// Accept one connection on `listener` and hand a read channel to
    /// `consumer`, secured with TLS when configured.
    pub fn accept_incoming<F>(
        &self,
        listener: &MigrationListener,
        consumer: F,
    ) -> Result<Option<PendingHandshake>>
    where
        F: FnOnce(Result<MigrationChannel>) + 'static,
    {
        match listener {
            MigrationListener::Tcp(listener) => {
                let (stream, peer) = listener
                    .accept()
                    .map_err(|e| socket_error(SOCKET_INCOMING, e))?;
                info!("Accepted incoming migration from {}", peer);
                self.incoming_stream(stream, consumer)
            }
            MigrationListener::Unix { listener, path } => {
                let (stream, _) = listener
                    .accept()
                    .map_err(|e| socket_error(SOCKET_INCOMING, e))?;
                info!("Accepted incoming migration on {}", path.display());
                self.incoming_stream(stream, consumer)
            }
        }
    }

    fn outgoing_stream<S, F>(
        &self,
        stream: S,
        hostname: Option<&str>,
        consumer: F,
    ) -> Result<Option<PendingHandshake>>
    where
        S: ChannelStream + AsFd + 'static,
        F: FnOnce(Result<MigrationChannel>) + 'static,
    {
        if self.tls_enabled() {
            return self.connect_outgoing(stream, hostname, consumer).map(Some);
        }
        consumer(Ok(MigrationChannel::from_stream(
            SOCKET_OUTGOING,
            Box::new(stream),
            ChannelMode::Write,
        )));
        Ok(None)
    }

    fn incoming_stream<S, F>(&self, stream: S, consumer: F) -> Result<Option<PendingHandshake>>
    where
        S: ChannelStream + AsFd + 'static,
        F: FnOnce(Result<MigrationChannel>) + 'static,
    {
        if self.tls_enabled() {
            return self.connect_incoming(stream, consumer).map(Some);
        }
        consumer(Ok(MigrationChannel::from_stream(
            SOCKET_INCOMING,
            Box::new(stream),
            ChannelMode::Read,
        )));
        Ok(None)
    }
}
