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

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};

use crate::error::MigrationError;

/// Byte stream a channel can run on: a file, a socket or a TLS session.
pub trait ChannelStream: Read + Write + Send {}

impl<T: Read + Write + Send> ChannelStream for T {}

/// Direction of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Read,
    Write,
}

enum ChannelIo {
    Reader(BufReader<Box<dyn ChannelStream>>),
    Writer(BufWriter<Box<dyn ChannelStream>>),
}

/// Buffered sink or source of the migration stream with big-endian
/// primitive encoders and decoders.
///
/// # Notes
///
/// The underlying stream is released once, by the first `close` or by drop.
pub struct MigrationChannel {
    name: String,
    io: Option<ChannelIo>,
    file_backed: bool,
}

impl std::fmt::Debug for MigrationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationChannel")
            .field("name", &self.name)
            .field("file_backed", &self.file_backed)
            .finish_non_exhaustive()
    }
}

fn io_error(name: &str, e: io::Error) -> anyhow::Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        anyhow!(MigrationError::Eof(name.to_string()))
    } else {
        anyhow!(MigrationError::Io {
            name: name.to_string(),
            source: e,
        })
    }
}

impl MigrationChannel {
    /// Open a file backed channel. A file opened for writing is created with
    /// permission `0600` and truncated.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the checkpoint image.
    /// * `mode` - Read or write.
    pub fn open<P: AsRef<Path>>(path: P, mode: ChannelMode) -> Result<Self> {
        let path = path.as_ref();
        let file = match mode {
            ChannelMode::Write => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path),
            ChannelMode::Read => File::open(path),
        }
        .map_err(|e| {
            anyhow!(MigrationError::ResourceUnavailable {
                path: path.display().to_string(),
                source: e,
            })
        })?;

        let mut channel = Self::from_stream(&path.display().to_string(), Box::new(file), mode);
        channel.file_backed = true;
        Ok(channel)
    }

    /// Build a channel on top of an already connected stream.
    pub fn from_stream(name: &str, stream: Box<dyn ChannelStream>, mode: ChannelMode) -> Self {
        let io = match mode {
            ChannelMode::Read => ChannelIo::Reader(BufReader::new(stream)),
            ChannelMode::Write => ChannelIo::Writer(BufWriter::new(stream)),
        };
        debug!("Channel {} opened for {:?}", name, mode);
        MigrationChannel {
            name: name.to_string(),
            io: Some(io),
            file_backed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_file(&self) -> bool {
        self.file_backed
    }

    pub fn is_closed(&self) -> bool {
        self.io.is_none()
    }

    fn writer(&mut self) -> Result<&mut BufWriter<Box<dyn ChannelStream>>> {
        match self.io.as_mut() {
            Some(ChannelIo::Writer(writer)) => Ok(writer),
            Some(ChannelIo::Reader(_)) => bail!("Channel {} is not writable", self.name),
            None => Err(anyhow!(MigrationError::ChannelClosed(self.name.clone()))),
        }
    }

    fn reader(&mut self) -> Result<&mut BufReader<Box<dyn ChannelStream>>> {
        match self.io.as_mut() {
            Some(ChannelIo::Reader(reader)) => Ok(reader),
            Some(ChannelIo::Writer(_)) => bail!("Channel {} is not readable", self.name),
            None => Err(anyhow!(MigrationError::ChannelClosed(self.name.clone()))),
        }
    }

    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        let ret = self.writer()?.write_u8(v);
        ret.map_err(|e| io_error(&self.name, e))
    }

    pub fn put_be16(&mut self, v: u16) -> Result<()> {
        let ret = self.writer()?.write_u16::<BigEndian>(v);
        ret.map_err(|e| io_error(&self.name, e))
    }

    pub fn put_be32(&mut self, v: u32) -> Result<()> {
        let ret = self.writer()?.write_u32::<BigEndian>(v);
        ret.map_err(|e| io_error(&self.name, e))
    }

    pub fn put_be64(&mut self, v: u64) -> Result<()> {
        let ret = self.writer()?.write_u64::<BigEndian>(v);
        ret.map_err(|e| io_error(&self.name, e))
    }

    pub fn put_buffer(&mut self, buf: &[u8]) -> Result<()> {
        let ret = self.writer()?.write_all(buf);
        ret.map_err(|e| io_error(&self.name, e))
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        let ret = self.reader()?.read_u8();
        ret.map_err(|e| io_error(&self.name, e))
    }

    pub fn get_be16(&mut self) -> Result<u16> {
        let ret = self.reader()?.read_u16::<BigEndian>();
        ret.map_err(|e| io_error(&self.name, e))
    }

    pub fn get_be32(&mut self) -> Result<u32> {
        let ret = self.reader()?.read_u32::<BigEndian>();
        ret.map_err(|e| io_error(&self.name, e))
    }

    pub fn get_be64(&mut self) -> Result<u64> {
        let ret = self.reader()?.read_u64::<BigEndian>();
        ret.map_err(|e| io_error(&self.name, e))
    }

    /// Fill `buf` completely from the channel.
    pub fn get_buffer(&mut self, buf: &mut [u8]) -> Result<()> {
        let ret = self.reader()?.read_exact(buf);
        ret.map_err(|e| io_error(&self.name, e))
    }

    /// Read exactly `len` bytes into a new vector.
    pub fn get_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0_u8; len];
        self.get_buffer(&mut buf)?;
        Ok(buf)
    }

    /// Whether a read channel has no more data. Blocks on a stream until data
    /// arrives or the peer closes it.
    pub fn is_at_eof(&mut self) -> Result<bool> {
        let ret = self.reader()?.fill_buf().map(|buf| buf.is_empty());
        ret.map_err(|e| io_error(&self.name, e))
    }

    /// Flush pending writes and release the underlying stream. Closing an
    /// already closed channel does nothing.
    pub fn close(&mut self) -> Result<()> {
        let io = match self.io.take() {
            Some(io) => io,
            None => return Ok(()),
        };
        if let ChannelIo::Writer(mut writer) = io {
            writer.flush().map_err(|e| io_error(&self.name, e))?;
        }
        debug!("Channel {} closed", self.name);
        Ok(())
    }
}

impl Drop for MigrationChannel {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close channel {}: {:?}", self.name, e);
        }
    }
}
