//! Tuning console shared by the emulator and any future serial front-end.
//!
//! The grammar lives in [`grammar`] and is implemented with a token/parse
//! pipeline that stays compatible with `no_std`. [`commands`] applies parsed
//! commands to a [`commands::ConsoleHost`].

pub mod catalog;
pub mod commands;
pub mod grammar;
pub mod params;
pub mod status;

pub use commands::{CommandError, CommandOutcome, ConsoleExecutor, ConsoleHost, HelpTopic};
pub use params::{ALL_PARAMS, Param, ParamKind, Value};
pub use status::CourseStatus;
