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

use anyhow::{bail, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use super::{str_slip_to_clap, valid_id, ConfigError, VmConfig};

/// `-object authz-simple,id=<id>,identity=<identity>`
///
/// A peer is allowed when its identity equals `identity`. For TLS the
/// identity of a peer is the hex SHA-256 digest of its leaf certificate.
#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
#[command(no_binary_name(true))]
pub struct AuthzSimpleConfig {
    #[arg(long, value_parser = ["authz-simple"])]
    pub classtype: String,
    #[arg(long, value_parser = valid_id)]
    pub id: String,
    #[arg(long)]
    pub identity: String,
}

impl VmConfig {
    pub fn add_authz(&mut self, authz_config: &str) -> Result<()> {
        let authz = AuthzSimpleConfig::try_parse_from(str_slip_to_clap(authz_config, true))?;
        if authz.identity.is_empty() {
            bail!(ConfigError::FieldIsMissing(
                "identity".to_string(),
                "authz-simple".to_string()
            ));
        }
        let id = authz.id.clone();
        if self.object_exists(&id) {
            bail!(ConfigError::IdRepeat(id, "authz-simple".to_string()));
        }
        self.object.authz_object.insert(id, authz);
        Ok(())
    }
}
