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

use anyhow::{anyhow, Result};
use nix::time::{clock_gettime, ClockId};

use crate::UtilError;

pub const NANOSECONDS_PER_SECOND: u64 = 1_000_000_000;

/// Get the realtime clock as (seconds, nanoseconds).
pub fn gettime() -> Result<(i64, i64)> {
    let ts = clock_gettime(ClockId::CLOCK_REALTIME)?;
    Ok((ts.tv_sec() as i64, ts.tv_nsec() as i64))
}

/// Split seconds since the epoch into local [year, month, day, hour, minute, second].
pub fn get_format_time(sec: i64) -> Result<[i32; 6]> {
    let time = sec as libc::time_t;
    // SAFETY: an all-zero tm is a valid value for localtime_r to overwrite.
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    // SAFETY: both pointers reference valid stack variables.
    let ret = unsafe { libc::localtime_r(&time, &mut tm) };
    if ret.is_null() {
        return Err(anyhow!(UtilError::LocalTime(sec)));
    }

    Ok([
        tm.tm_year + 1900,
        tm.tm_mon + 1,
        tm.tm_mday,
        tm.tm_hour,
        tm.tm_min,
        tm.tm_sec,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_format_time() {
        let (sec, nsec) = gettime().unwrap();
        assert!(sec > 0);
        assert!((nsec as u64) < NANOSECONDS_PER_SECOND);

        let fmt = get_format_time(sec).unwrap();
        assert!(fmt[0] >= 1970);
        assert!((1..=12).contains(&fmt[1]));
        assert!((1..=31).contains(&fmt[2]));
        assert!((0..24).contains(&fmt[3]));
    }
}
