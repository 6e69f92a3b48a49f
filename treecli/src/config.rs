//! Process-wide run options carried by the global flags.

use clap::{Arg, ArgAction, ArgMatches};
use serde::Serialize;

pub const PROFILE: &str = "profile";
pub const COUNT_TIME: &str = "count-time";
pub const PROFILE_FORMAT: &str = "profile-format";
pub const VERBOSE: &str = "verbose";

/// Ids of [`global_args`]; commands never see these.
pub const GLOBAL_IDS: &[&str] = &[PROFILE, COUNT_TIME, PROFILE_FORMAT, VERBOSE];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// Options consumed by the runner; the command tree never sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub profile: bool,
    pub count_time: bool,
    pub profile_format: OutputFormat,
    pub verbosity: u8,
}

impl RunOptions {
    /// Read the options from matches produced by an app carrying [`global_args`].
    #[must_use]
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            profile: matches.get_flag(PROFILE),
            count_time: matches.get_flag(COUNT_TIME),
            profile_format: matches
                .get_one::<OutputFormat>(PROFILE_FORMAT)
                .copied()
                .unwrap_or_default(),
            verbosity: matches.get_count(VERBOSE),
        }
    }
}

/// The flags every generated CLI accepts ahead of its sub-commands.
#[must_use]
pub fn global_args() -> Vec<Arg> {
    vec![
        Arg::new(PROFILE)
            .long(PROFILE)
            .help("Run the command with profiling and print stats")
            .action(ArgAction::SetTrue),
        Arg::new(COUNT_TIME)
            .long(COUNT_TIME)
            .help("Print the amount of time it took to execute the command")
            .action(ArgAction::SetTrue),
        Arg::new(PROFILE_FORMAT)
            .long(PROFILE_FORMAT)
            .help("Format of the profiling stats")
            .value_parser(clap::value_parser!(OutputFormat))
            .default_value("human")
            .num_args(1),
        Arg::new(VERBOSE)
            .long(VERBOSE)
            .short('v')
            .help("Increase log verbosity (repeatable)")
            .action(ArgAction::Count),
    ]
}
