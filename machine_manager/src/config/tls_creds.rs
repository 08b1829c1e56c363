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

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};

use super::{parse_bool, str_slip_to_clap, valid_dir, valid_id, ConfigError, VmConfig};

/// Which side of a TLS session a credential object may be used for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsEndpoint {
    Server,
    #[default]
    Client,
}

impl fmt::Display for TlsEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TlsEndpoint::Server => write!(f, "server"),
            TlsEndpoint::Client => write!(f, "client"),
        }
    }
}

impl FromStr for TlsEndpoint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "server" => Ok(TlsEndpoint::Server),
            "client" => Ok(TlsEndpoint::Client),
            _ => Err(anyhow!(ConfigError::InvalidParam(
                s.to_string(),
                "endpoint".to_string()
            ))),
        }
    }
}

/// `-object tls-creds-x509,id=<id>,dir=<dir>[,endpoint=server|client][,verify-peer=on|off]`
///
/// `dir` holds `cacert.pem` plus `servercert.pem`/`serverkey.pem` for a
/// server endpoint or `clientcert.pem`/`clientkey.pem` for a client one.
#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
#[command(no_binary_name(true))]
pub struct TlsCredObjConfig {
    #[arg(long, value_parser = ["tls-creds-x509"])]
    pub classtype: String,
    #[arg(long, value_parser = valid_id)]
    pub id: String,
    #[arg(long, value_parser = valid_dir)]
    pub dir: String,
    #[arg(long, default_value = "client", value_parser = TlsEndpoint::from_str)]
    pub endpoint: TlsEndpoint,
    #[arg(long, default_value = "on", value_parser = parse_bool, action = ArgAction::Append)]
    pub verify_peer: bool,
}

impl VmConfig {
    pub fn add_tlscred(&mut self, tlscred_config: &str) -> Result<()> {
        let tlscred = TlsCredObjConfig::try_parse_from(str_slip_to_clap(tlscred_config, true))?;
        let id = tlscred.id.clone();
        if self.object_exists(&id) {
            bail!(ConfigError::IdRepeat(id, "tls-creds-x509".to_string()));
        }
        self.object.tls_object.insert(id, tlscred);
        Ok(())
    }
}
