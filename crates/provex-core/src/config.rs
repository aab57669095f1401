//! Run configuration
//!
//! A `RunConfig` is built once from the command line, validated once, and
//! then owned by the pipeline controller for the lifetime of the run. Stages
//! receive a shared reference and never mutate it.

use crate::error::ConfigError;
use crate::property::Property;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Points-to precision mode handed to the external slicer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointsToMode {
    /// Flow-sensitive analysis
    FlowSensitive,
    /// Flow-insensitive analysis
    FlowInsensitive,
    /// Legacy flow-insensitive analysis
    Legacy,
}

impl PointsToMode {
    /// Flag value understood by the slicer
    pub fn as_flag(&self) -> &'static str {
        match self {
            PointsToMode::FlowSensitive => "fs",
            PointsToMode::FlowInsensitive => "fi",
            PointsToMode::Legacy => "old",
        }
    }
}

impl FromStr for PointsToMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fs" => Ok(PointsToMode::FlowSensitive),
            "fi" => Ok(PointsToMode::FlowInsensitive),
            "old" => Ok(PointsToMode::Legacy),
            other => Err(ConfigError::MalformedFlag {
                flag: "pta".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Overrides for the external tools the pipeline spawns.
///
/// `None` means the tool is looked up on `PATH` under its default name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolPaths {
    /// Program slicer (default `llvm-slicer`)
    pub slicer: Option<PathBuf>,
    /// Property instrumenter (default `llvm-instr`)
    pub instrumenter: Option<PathBuf>,
    /// Bitcode linker (default `llvm-link`)
    pub linker: Option<PathBuf>,
    /// Bitcode optimizer (default `opt`)
    pub optimizer: Option<PathBuf>,
    /// Uninitialized-memory symbolization pass driver (default `opt`)
    pub symbolizer: Option<PathBuf>,
    /// Verification back-end binary override
    pub backend: Option<PathBuf>,
}

/// Immutable configuration for one verification run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// C source files making up the verified unit
    pub sources: Vec<PathBuf>,

    /// Parsed property set
    pub properties: Vec<Property>,

    /// Name of the verification back end (`klee`, `cpachecker`, ...)
    pub backend: String,

    /// Global timeout in seconds; 0 means unbounded
    pub timeout_secs: u64,

    /// How many times to re-run slicing on its own output
    pub repeat_slicing: u32,

    /// Points-to precision for the slicer
    pub pta: PointsToMode,

    /// Program points the slicer preserves behavior with respect to
    pub slicing_criterion: String,

    /// Whether the slicing stage runs at all
    pub slicing_enabled: bool,

    /// Abort the run if the slicer fails instead of falling back
    pub require_slicer: bool,

    /// Whether bitcode optimization runs before linking
    pub optimization_enabled: bool,

    /// Whether uninitialized variables are made symbolic before linking
    pub symbolize_enabled: bool,

    /// Whether a witness is written for conclusive verdicts
    pub witness_enabled: bool,

    /// Whether the back end runs at all (false stops after the link stage)
    pub verification_enabled: bool,

    /// Retain the working directory after the run
    pub save_files: bool,

    /// Use this directory as the working directory instead of a fresh
    /// temporary one; implies retention
    pub work_dir: Option<PathBuf>,

    /// Where the witness file is written
    pub witness_path: PathBuf,

    /// Directory for monitor definition files used by the instrumenter
    pub monitor_dir: PathBuf,

    /// Pass-through flags for the slicer
    pub slicer_args: Vec<String>,

    /// Pass-through flags for the instrumenter
    pub instrumenter_args: Vec<String>,

    /// Pass-through flags for the symbolization pass driver (plugin loads)
    pub symbolizer_args: Vec<String>,

    /// Pass-through flags for the back end
    pub backend_args: Vec<String>,

    /// External tool path overrides
    pub tools: ToolPaths,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            sources: Vec::new(),
            properties: Vec::new(),
            backend: "klee".to_string(),
            timeout_secs: 0,
            repeat_slicing: 1,
            pta: PointsToMode::FlowInsensitive,
            slicing_criterion: "__assert_fail".to_string(),
            slicing_enabled: true,
            require_slicer: false,
            optimization_enabled: true,
            symbolize_enabled: true,
            witness_enabled: true,
            verification_enabled: true,
            save_files: false,
            work_dir: None,
            witness_path: PathBuf::from("witness.graphml"),
            monitor_dir: PathBuf::from("monitors"),
            slicer_args: Vec::new(),
            instrumenter_args: Vec::new(),
            symbolizer_args: Vec::new(),
            backend_args: Vec::new(),
            tools: ToolPaths::default(),
        }
    }
}

impl RunConfig {
    /// Remaining global deadline, or `None` when the run is unbounded
    pub fn deadline(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }

    /// Validate the configuration. Called once before the pipeline starts;
    /// any error here aborts the run before a single stage executes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        for source in &self.sources {
            if !source.exists() {
                return Err(ConfigError::MissingSource(source.clone()));
            }
        }
        if self.properties.is_empty() {
            return Err(ConfigError::EmptyPropertySpec);
        }
        if self.require_slicer && !self.slicing_enabled {
            return Err(ConfigError::ConflictingFlags(
                "require-slicer set while slicing is disabled".to_string(),
            ));
        }
        Ok(())
    }
}
