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

//! # Migration
//!
//! Checkpoint/restart of a VM and its secure migration transport.
//!
//! The [`MigrationManager`] pauses the VM through a [`RunStateController`],
//! walks every registered component in registration order and streams their
//! versioned state records over a [`MigrationChannel`]. Remote channels can be
//! wrapped in TLS with [`MigrationManager::connect_incoming`] and
//! [`MigrationManager::connect_outgoing`], or opened from a `tcp:`/`unix:`
//! address with [`MigrationManager::start_outgoing`] and
//! [`MigrationManager::start_incoming`].

pub mod channel;
pub mod cpr_state;
pub mod device_state;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod snapshot;
pub mod socket;
pub mod status;
pub mod tls;

pub use channel::{ChannelMode, ChannelStream, MigrationChannel};
pub use cpr_state::{CprFd, CprState, CPR_STATE_ENV};
pub use device_state::{DeviceStateDesc, StateTransfer, VersionCheck};
pub use error::{error_class, ErrorClass, MigrationError};
pub use manager::MigrationManager;
pub use protocol::{CprMode, SectionHeader, SectionKind};
pub use snapshot::{GlobalState, MigrationEntry, StateRegistry};
pub use socket::{parse_migrate_uri, MigrateUri, MigrationListener};
pub use status::{MigrationStatus, RunStateController};
pub use tls::{ObjectRegistry, PendingHandshake, TlsChannel, TlsObject};
