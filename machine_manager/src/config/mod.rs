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

pub mod error;

mod authz;
mod migrate;
mod tls_creds;

pub use authz::*;
pub use error::ConfigError;
pub use migrate::*;
pub use tls_creds::*;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const MAX_STRING_LENGTH: usize = 255;
pub const MAX_PATH_LENGTH: usize = 4096;

/// Objects created by `-object`, keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub tls_object: HashMap<String, TlsCredObjConfig>,
    pub authz_object: HashMap<String, AuthzSimpleConfig>,
}

/// This main config structure for the VM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmConfig {
    pub object: ObjectConfig,
    pub migrate: MigrateConfig,
}

impl VmConfig {
    /// Add an object (`-object <classtype>,id=...`) to `VmConfig`.
    ///
    /// # Arguments
    ///
    /// * `object_args` - The args of object.
    pub fn add_object(&mut self, object_args: &str) -> Result<()> {
        let object_type =
            get_class_type(object_args).with_context(|| "Object type not specified")?;
        match object_type.as_str() {
            "tls-creds-x509" => self.add_tlscred(object_args),
            "authz-simple" => self.add_authz(object_args),
            _ => Err(anyhow!(ConfigError::InvalidParam(
                object_type,
                "object".to_string()
            ))),
        }
    }

    /// Whether `id` is already used by any object.
    pub fn object_exists(&self, id: &str) -> bool {
        self.object.tls_object.contains_key(id) || self.object.authz_object.contains_key(id)
    }
}

/// Get the class type of an object or device from its cmdline, which is the
/// first item without `=`.
pub fn get_class_type(args: &str) -> Option<String> {
    let first = args.split(',').next()?;
    if first.is_empty() || first.contains('=') {
        return None;
    }
    Some(first.to_string())
}

/// Convert `key=value,...` cmdline to clap style args. `key=value` becomes
/// `--key value` and `key` becomes `--key`.
///
/// # Arguments
///
/// * `args` - The cmdline string.
/// * `first_pos_is_type` - The first item is the class type, passed as `--classtype`.
pub fn str_slip_to_clap(args: &str, first_pos_is_type: bool) -> Vec<String> {
    let args_vecs = args.split(',').collect::<Vec<&str>>();
    let mut itr: Vec<String> = Vec::with_capacity(args_vecs.len() * 2);
    for (idx, params) in args_vecs.iter().enumerate() {
        if idx == 0 && first_pos_is_type && !params.contains('=') {
            itr.push("--classtype".to_string());
            itr.push(params.to_string());
            continue;
        }
        let mut key_value = params.splitn(2, '=');
        if let Some(key) = key_value.next() {
            itr.push(format!("--{}", key));
        }
        if let Some(value) = key_value.next() {
            itr.push(value.to_string());
        }
    }
    itr
}

pub fn check_arg_too_long(arg: &str, name: &str) -> Result<()> {
    if arg.len() > MAX_STRING_LENGTH {
        bail!(ConfigError::StringLengthTooLong(
            name.to_string(),
            MAX_STRING_LENGTH
        ));
    }
    Ok(())
}

pub fn valid_id(id: &str) -> Result<String> {
    if id.is_empty() {
        bail!(ConfigError::FieldIsMissing("id".to_string(), "object".to_string()));
    }
    check_arg_too_long(id, "id")?;
    Ok(id.to_string())
}

pub fn valid_dir(dir: &str) -> Result<String> {
    if dir.len() > MAX_PATH_LENGTH {
        bail!(ConfigError::StringLengthTooLong(
            "dir".to_string(),
            MAX_PATH_LENGTH
        ));
    }
    if !Path::new(dir).is_dir() {
        bail!(ConfigError::DirNotExist(dir.to_string()));
    }
    Ok(dir.to_string())
}

pub fn parse_bool(s: &str) -> Result<bool> {
    match s {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(anyhow!(ConfigError::ConvertValueFailed(
            s.to_string(),
            "bool".to_string()
        ))),
    }
}
