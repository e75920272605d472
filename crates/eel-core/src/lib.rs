//! Runtime services for the EEL2 expression language.
//!
//! Three leaf services sit behind the script-facing natives:
//!
//! - [`ram`]: segmented, lazily allocated script memory of `f64` cells with
//!   a single failure cell in place of errors.
//! - The string engine: numbered string storage ([`strings`]), a printf
//!   formatter ([`format`]), a backtracking pattern matcher ([`matcher`]) and
//!   typed byte access ([`typed`]).
//! - The block transform: MDCT/IMDCT plans ([`mdct`]) and their script entry
//!   points ([`transform`]).
//!
//! No I/O happens here except through host-supplied sinks ([`host`]).

pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod host;
pub mod lexical;
pub mod matcher;
pub mod mdct;
pub mod natives;
pub mod ram;
pub mod strings;
pub mod transform;
pub mod typed;

pub use config::{MatcherConfig, RamConfig, RuntimeConfig, StringConfig};
pub use constants::{MDCT_MAX_LEN, MDCT_MIN_LEN, RAM_PAGE_SIZE, RAM_PAGES};
pub use error::{ConfigError, Result};
pub use format::{FormatArgs, FormatError, format_into};
pub use host::{NoVariables, OutputSink, Variables};
pub use matcher::{MatchCapture, MatchLimits, PatternError, is_match, match_pattern};
pub use mdct::MdctPlan;
pub use ram::{MemoryBudget, RamCell, RamRegistry, RamStats, RamTable};
pub use strings::{EelString, SharedStrings, StringContext, StringCounts};
pub use transform::TransformCache;
pub use typed::{ByteType, read_typed, write_typed};
