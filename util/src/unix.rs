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

use std::ffi::CString;
use std::fs::File;
use std::os::unix::io::{FromRawFd, RawFd};

use anyhow::{anyhow, Result};

use crate::UtilError;

/// This function returns the caller's thread ID(TID).
pub fn gettid() -> u64 {
    // SAFETY: gettid has no arguments and can not fail.
    unsafe { libc::syscall(libc::SYS_gettid) as u64 }
}

/// Create an anonymous memory backed file which is inherited across exec.
///
/// # Arguments
///
/// * `name` - The name shown in /proc/self/fd for this memfd.
pub fn memfd_create(name: &str) -> Result<File> {
    let cname = CString::new(name).map_err(UtilError::from)?;
    // SAFETY: cname is a valid nul terminated string. No MFD_CLOEXEC, the
    // fd must survive exec.
    let fd = unsafe { libc::memfd_create(cname.as_ptr(), 0) };
    if fd < 0 {
        return Err(anyhow!(UtilError::BadSyscall(std::io::Error::last_os_error())));
    }
    // SAFETY: fd was just created and is exclusively owned here.
    Ok(unsafe { File::from_raw_fd(fd) })
}

/// Clear FD_CLOEXEC on `fd` so that it is kept open across exec.
pub fn clear_cloexec(fd: RawFd) -> Result<()> {
    // SAFETY: fcntl only inspects the descriptor.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(anyhow!(UtilError::BadSyscall(std::io::Error::last_os_error())));
    }
    // SAFETY: fcntl only updates descriptor flags.
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) };
    if ret < 0 {
        return Err(anyhow!(UtilError::BadSyscall(std::io::Error::last_os_error())));
    }
    Ok(())
}

/// Check whether FD_CLOEXEC is set on `fd`.
pub fn is_cloexec(fd: RawFd) -> Result<bool> {
    // SAFETY: fcntl only inspects the descriptor.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(anyhow!(UtilError::BadSyscall(std::io::Error::last_os_error())));
    }
    Ok(flags & libc::FD_CLOEXEC != 0)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::os::unix::io::AsRawFd;

    use super::*;

    #[test]
    fn test_memfd_create() {
        let mut file = memfd_create("util-memfd-test").unwrap();
        assert!(!is_cloexec(file.as_raw_fd()).unwrap());

        file.write_all(b"memfd").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = String::new();
        file.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "memfd");

        assert!(memfd_create("bad\0name").is_err());
    }

    #[test]
    fn test_clear_cloexec() {
        let file = File::open("/dev/null").unwrap();
        // std opens every file with O_CLOEXEC.
        assert!(is_cloexec(file.as_raw_fd()).unwrap());
        clear_cloexec(file.as_raw_fd()).unwrap();
        assert!(!is_cloexec(file.as_raw_fd()).unwrap());

        assert!(clear_cloexec(-1).is_err());
    }
}
