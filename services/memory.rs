/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Memory limit offered to the web application.

use sysinfo::System;

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Half of total system memory, in MiB.
pub fn maximum_memory_mb() -> u64 {
    let mut system = System::new();
    system.refresh_memory();
    half_in_mib(system.total_memory())
}

/// Record the memory limit chosen by the user.
pub fn set_maximum_memory(max_memory_mb: u64) {
    log::info!("memory: setting application maximum memory to {max_memory_mb} MB");
}

fn half_in_mib(total_bytes: u64) -> u64 {
    total_bytes / 2 / BYTES_PER_MIB
}
