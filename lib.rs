/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Host-process shell for the OpenSphere web application.
//!
//! The shell decides what happens to every navigation a window attempts, maps
//! sub-application names to their on-disk locations, and owns the user's
//! settings override list. Windowing itself is delegated to a host runtime
//! reached through [`shell::desktop::host::window::WindowHost`].

pub mod prefs;
pub mod services;
pub mod shell;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use tracing_subscriber::EnvFilter;

pub const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// Environment variable consulted for the log filter when none is passed on
/// the command line.
pub const LOG_FILTER_ENV: &str = "OPENSPHERE_SHELL_LOG";

/// Install the global subscriber. `log` records are bridged into it, so the
/// rest of the crate only uses the `log` macros.
pub fn init_tracing(filter: Option<&str>) {
    let filter = filter
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_env(LOG_FILTER_ENV).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        log::debug!("tracing subscriber already installed");
    }
}
