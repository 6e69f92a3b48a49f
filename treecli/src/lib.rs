//! Build a sub-command CLI from a tree of named commands.
//!
//! Leaves implement [`Command`]; groups are [`CommandTree`]s. The [`Runner`]
//! wraps the top-level commands in a root tree, adds the global flags
//! (`--profile`, `--count-time`), parses with clap and dispatches to the
//! selected leaf.
//!
//! ```no_run
//! use treecli::{leaf, Runner};
//!
//! let mut runner = Runner::new("tool", "Project tooling");
//! let db = runner.group("db", "Database tasks", vec![
//!     leaf("migrate", "Apply migrations", |_| Ok(())),
//! ])?;
//! let code = runner.run(vec![
//!     leaf("build", "Build the project", |_| Ok(())),
//!     Box::new(db),
//! ])?;
//! std::process::exit(code);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod bag;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod profile;
pub mod timing;
pub mod tree;

pub use bag::ArgumentBag;
pub use cli::Runner;
pub use command::{leaf, Command, FnCommand};
pub use config::{OutputFormat, RunOptions};
pub use error::{Error, Result};
pub use tree::{CommandTree, DispatchKey, DispatchKeys};

// =====================
// Public API
// =====================

/// Run a CLI over the process arguments and return its exit code.
///
/// Errors other than usage errors are printed to stderr and mapped to 1.
pub fn run(title: &str, description: &str, commands: Vec<Box<dyn Command>>) -> i32 {
    match Runner::new(title, description).run(commands) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            1
        }
    }
}
