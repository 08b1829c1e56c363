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

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{crate_description, Args, Parser, Subcommand};
use log::{debug, info};

use migration::protocol::{
    read_section_header, read_section_payload, restore_header, CPR_VERSION,
};
use migration::{ChannelMode, MigrationChannel, MigrationError, SectionHeader};

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path of log file, logs go to stderr when empty.
    #[arg(short = 'D', long, default_value = "")]
    log: String,
}

/// List the records of a checkpoint image.
#[derive(Args, Debug)]
struct Inspect {
    /// Path of the checkpoint image.
    image: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    Inspect(Inspect),
}

#[derive(Parser, Debug)]
#[command(version, author, about = crate_description!())]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,
    #[command(subcommand)]
    cmd: Command,
}

/// Validate the image header and walk every section up to the end marker.
fn inspect_image(path: &Path) -> Result<Vec<SectionHeader>> {
    let mut channel = MigrationChannel::open(path, ChannelMode::Read)?;
    restore_header(&mut channel)?;

    let mut sections = Vec::new();
    while let Some(header) = read_section_header(&mut channel)? {
        debug!("Skip {} bytes of section {}", header.size, header.name);
        read_section_payload(&mut channel, &header)?;
        sections.push(header);
    }
    if !channel.is_at_eof()? {
        bail!(MigrationError::TrailingData);
    }
    channel.close()?;
    Ok(sections)
}

impl Inspect {
    fn run(&self) -> Result<()> {
        info!("Inspect image {}", self.image.display());
        let sections = inspect_image(&self.image)?;
        println!("{}: version {}", self.image.display(), CPR_VERSION);
        for header in sections.iter() {
            println!(
                "{:<10} {:<32} version {:<4} {} bytes",
                format!("{:?}", header.kind).to_lowercase(),
                header.name,
                header.version,
                header.size
            );
        }
        println!("{} sections", sections.len());
        Ok(())
    }
}

fn real_main() -> Result<()> {
    let cli = Cli::parse();

    util::logger::init_log(&cli.global.log).with_context(|| "Failed to init logger")?;
    match cli.cmd {
        Command::Inspect(inspect) => inspect.run(),
    }
}

fn main() -> ExitCode {
    match real_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use vmm_sys_util::tempfile::TempFile;

    use super::*;
    use migration::protocol::{save_header, write_end, write_section};
    use migration::{error_class, ErrorClass, SectionKind};

    fn write_image(path: &Path, trailing: &[u8]) {
        let mut channel = MigrationChannel::open(path, ChannelMode::Write).unwrap();
        save_header(&mut channel).unwrap();
        write_section(&mut channel, SectionKind::State, "globalstate:0", 1, b"{}").unwrap();
        write_section(&mut channel, SectionKind::Skippable, "balloon:0", 2, &[0; 16]).unwrap();
        write_end(&mut channel).unwrap();
        channel.put_buffer(trailing).unwrap();
        channel.close().unwrap();
    }

    #[test]
    fn test_inspect_image() {
        let file = TempFile::new().unwrap();
        write_image(file.as_path(), &[]);

        let sections = inspect_image(file.as_path()).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].kind, SectionKind::State);
        assert_eq!(sections[0].name, "globalstate:0");
        assert_eq!(sections[0].size, 2);
        assert_eq!(sections[1].kind, SectionKind::Skippable);
        assert_eq!(sections[1].version, 2);
        assert_eq!(sections[1].size, 16);
    }

    #[test]
    fn test_inspect_invalid_image() {
        let file = TempFile::new().unwrap();
        write_image(file.as_path(), &[0x1f]);
        assert!(inspect_image(file.as_path()).is_err());

        fs::write(file.as_path(), b"QEVM\0\0\0\x03").unwrap();
        let err = inspect_image(file.as_path()).unwrap_err();
        assert!(format!("{:?}", err).contains("is not a vmstate file"));

        let mut image = fs::read(file.as_path()).unwrap();
        image.truncate(4);
        fs::write(file.as_path(), image).unwrap();
        let err = inspect_image(file.as_path()).unwrap_err();
        assert_eq!(error_class(&err), Some(ErrorClass::Format));
    }
}
