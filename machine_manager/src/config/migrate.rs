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

use anyhow::Result;
use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};

use super::{parse_bool, str_slip_to_clap, VmConfig};

/// Migration parameters and capabilities:
/// `-migrate-params [tls-creds=<id>][,tls-authz=<id>][,tls-hostname=<name>][,x-colo=on|off]`
#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
#[command(no_binary_name(true))]
pub struct MigrateConfig {
    #[arg(long)]
    pub tls_creds: Option<String>,
    #[arg(long)]
    pub tls_authz: Option<String>,
    #[arg(long)]
    pub tls_hostname: Option<String>,
    #[arg(long = "x-colo", default_value = "off", value_parser = parse_bool, action = ArgAction::Append)]
    pub colo: bool,
}

impl MigrateConfig {
    /// Hostname override for the outgoing TLS session, empty means unset.
    pub fn hostname(&self) -> Option<&str> {
        self.tls_hostname.as_deref().filter(|h| !h.is_empty())
    }
}

impl VmConfig {
    pub fn add_migrate_params(&mut self, migrate_config: &str) -> Result<()> {
        self.migrate = MigrateConfig::try_parse_from(str_slip_to_clap(migrate_config, false))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_migrate_params() {
        let mut vm_config = VmConfig::default();
        assert!(vm_config
            .add_migrate_params("tls-creds=tls0,tls-authz=authz0,tls-hostname=dst.example")
            .is_ok());
        assert_eq!(vm_config.migrate.tls_creds.as_deref(), Some("tls0"));
        assert_eq!(vm_config.migrate.tls_authz.as_deref(), Some("authz0"));
        assert_eq!(vm_config.migrate.hostname(), Some("dst.example"));
        assert!(!vm_config.migrate.colo);

        assert!(vm_config.add_migrate_params("x-colo=on").is_ok());
        assert!(vm_config.migrate.colo);
        assert!(vm_config.migrate.tls_creds.is_none());

        assert!(vm_config.add_migrate_params("tls-hostname=").is_ok());
        assert_eq!(vm_config.migrate.hostname(), None);

        assert!(vm_config.add_migrate_params("tls-port=1").is_err());
    }
}
