/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Command line options and the shell configuration file.
//!
//! The configuration is read and validated once at startup. Every optional
//! key is resolved to its default here, so the rest of the shell never
//! re-checks whether a key was present.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use bpaf::Bpaf;
use regex::Regex;
use serde::Deserialize;

use crate::services::app_path::{AppDescriptor, AppTable};
use crate::services::settings::types::DisabledEntryPolicy;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "OPENSPHERE_SHELL_CONFIG";

/// Configuration file name searched for under the resources directory.
pub const CONFIG_FILE_NAME: &str = "shell.toml";

pub const DEFAULT_APP_NAME: &str = "OpenSphere";
pub const DEFAULT_BASE_APP: &str = "opensphere";

/// Command line options.
#[derive(Clone, Debug, Default, Bpaf)]
#[bpaf(options, version)]
pub struct ShellOptions {
    /// Shell configuration file (TOML)
    #[bpaf(long, env(CONFIG_PATH_ENV), argument("PATH"))]
    pub config: Option<PathBuf>,

    /// Run from a development checkout
    #[bpaf(long)]
    pub dev: bool,

    /// Load the uncompiled debug applications (implies --dev)
    #[bpaf(long)]
    pub debug: bool,

    /// Root directory containing the applications
    #[bpaf(long, argument("PATH"))]
    pub base_path: Option<PathBuf>,

    /// Directory containing bundled resources and configuration
    #[bpaf(long, argument("PATH"))]
    pub resources_path: Option<PathBuf>,

    /// Per-user data directory
    #[bpaf(long, argument("PATH"))]
    pub user_data_dir: Option<PathBuf>,

    /// Treat this installation as a portable executable
    #[bpaf(long)]
    pub portable: bool,

    /// Log filter, e.g. `info,opensphere_shell=debug`
    #[bpaf(long, argument("FILTER"))]
    pub tracing_filter: Option<String>,
}

pub enum ArgumentParsingResult {
    Run(ShellOptions),
    Exit,
    ErrorParsing,
}

pub fn parse_command_line_arguments(args: &[String]) -> ArgumentParsingResult {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match shell_options().run_inner(&args[..]) {
        Ok(mut options) => {
            options.dev |= options.debug;
            ArgumentParsingResult::Run(options)
        },
        Err(failure) => {
            failure.print_message(100);
            if failure.exit_code() == 0 {
                ArgumentParsingResult::Exit
            } else {
                ArgumentParsingResult::ErrorParsing
            }
        },
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    InvalidPattern { pattern: String, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config IO error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "invalid internal link pattern '{pattern}': {reason}")
            },
        }
    }
}

impl std::error::Error for ConfigError {}

/// On-disk shape of the configuration file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawShellConfig {
    app_name: Option<String>,
    base_app: Option<String>,
    apps: BTreeMap<String, AppDescriptor>,
    internal_links: Vec<String>,
    release_url: Option<String>,
    enable_user_settings: bool,
    disabled_entries: DisabledEntryPolicy,
    web_preferences: BTreeMap<String, serde_json::Value>,
    request_headers: BTreeMap<String, String>,
    icon: Option<PathBuf>,
    icon_dev: Option<PathBuf>,
}

/// URL patterns always treated as part of the running application.
#[derive(Clone, Debug, Default)]
pub struct InternalLinks {
    patterns: Vec<Regex>,
}

impl InternalLinks {
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern.as_ref()).map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.as_ref().to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_internal(&self, url: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(url))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Validated shell configuration.
#[derive(Clone, Debug)]
pub struct ShellConfig {
    pub app_name: String,
    pub base_app: String,
    pub apps: AppTable,
    pub internal_links: InternalLinks,
    pub release_url: Option<String>,
    pub enable_user_settings: bool,
    pub disabled_entries: DisabledEntryPolicy,
    /// Web preference overrides merged over the shell defaults.
    pub web_preferences: BTreeMap<String, serde_json::Value>,
    /// Headers added to every outgoing request.
    pub request_headers: BTreeMap<String, String>,
    pub icon: Option<PathBuf>,
    pub icon_dev: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            base_app: DEFAULT_BASE_APP.to_string(),
            apps: AppTable::default(),
            internal_links: InternalLinks::default(),
            release_url: None,
            enable_user_settings: false,
            disabled_entries: DisabledEntryPolicy::default(),
            web_preferences: BTreeMap::new(),
            request_headers: BTreeMap::new(),
            icon: None,
            icon_dev: None,
        }
    }
}

impl ShellConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawShellConfig = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_raw(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Load `path` when given, else the first existing candidate, else defaults.
    pub fn load_or_default(path: Option<&Path>, candidates: &[PathBuf]) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match candidates.iter().find(|candidate| candidate.is_file()) {
            Some(candidate) => Self::load(candidate),
            None => {
                log::info!("prefs: no configuration file found; using defaults");
                Ok(Self::default())
            },
        }
    }

    fn from_raw(raw: RawShellConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            app_name: non_empty(raw.app_name).unwrap_or(defaults.app_name),
            base_app: non_empty(raw.base_app).unwrap_or(defaults.base_app),
            apps: AppTable::new(raw.apps),
            internal_links: InternalLinks::compile(&raw.internal_links)?,
            release_url: non_empty(raw.release_url),
            enable_user_settings: raw.enable_user_settings,
            disabled_entries: raw.disabled_entries,
            web_preferences: raw.web_preferences,
            request_headers: raw.request_headers,
            icon: raw.icon.filter(|path| !path.as_os_str().is_empty()),
            icon_dev: raw.icon_dev.filter(|path| !path.as_os_str().is_empty()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
