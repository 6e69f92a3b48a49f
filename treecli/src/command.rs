//! The capability every node of a command tree provides.

use clap::ArgMatches;

use crate::bag::ArgumentBag;
use crate::error::Result;

/// A named unit of CLI behavior.
///
/// Leaves implement [`Command::run`]; the remaining methods have defaults
/// suitable for a leaf without extra arguments.
pub trait Command {
    /// Name used to select this command; unique among its siblings.
    fn name(&self) -> &str;

    /// One-line description shown in help output.
    fn help(&self) -> &str;

    /// Declare the flags and positionals this command accepts.
    fn configure(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Check the parsed arguments before [`Command::run`] is called.
    ///
    /// An error here aborts the dispatch and is reported as a usage error.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first unmet precondition.
    fn validate(&self, _args: &ArgumentBag) -> anyhow::Result<()> {
        Ok(())
    }

    /// Execute the command.
    ///
    /// # Errors
    ///
    /// Whatever the command itself fails with.
    fn run(&self, args: &ArgumentBag) -> anyhow::Result<()>;

    /// Copy this level's parsed matches into the bag.
    ///
    /// # Errors
    ///
    /// Implementations that record selections may fail on a key collision.
    fn bind(&self, matches: &ArgMatches, bag: &mut ArgumentBag) -> Result<()> {
        bag.push_level(matches.clone());
        Ok(())
    }
}

type ConfigureFn = dyn Fn(clap::Command) -> clap::Command;
type ArgsFn = dyn Fn(&ArgumentBag) -> anyhow::Result<()>;

/// A leaf command backed by closures.
pub struct FnCommand {
    name: String,
    help: String,
    configure: Option<Box<ConfigureFn>>,
    validate: Option<Box<ArgsFn>>,
    run: Box<ArgsFn>,
}

impl FnCommand {
    pub fn new<F>(name: impl Into<String>, help: impl Into<String>, run: F) -> Self
    where
        F: Fn(&ArgumentBag) -> anyhow::Result<()> + 'static,
    {
        Self {
            name: name.into(),
            help: help.into(),
            configure: None,
            validate: None,
            run: Box::new(run),
        }
    }

    #[must_use]
    pub fn with_args<F>(mut self, configure: F) -> Self
    where
        F: Fn(clap::Command) -> clap::Command + 'static,
    {
        self.configure = Some(Box::new(configure));
        self
    }

    #[must_use]
    pub fn with_validation<F>(mut self, validate: F) -> Self
    where
        F: Fn(&ArgumentBag) -> anyhow::Result<()> + 'static,
    {
        self.validate = Some(Box::new(validate));
        self
    }
}

impl Command for FnCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn help(&self) -> &str {
        &self.help
    }

    fn configure(&self, cmd: clap::Command) -> clap::Command {
        match &self.configure {
            Some(f) => f(cmd),
            None => cmd,
        }
    }

    fn validate(&self, args: &ArgumentBag) -> anyhow::Result<()> {
        match &self.validate {
            Some(f) => f(args),
            None => Ok(()),
        }
    }

    fn run(&self, args: &ArgumentBag) -> anyhow::Result<()> {
        (self.run)(args)
    }
}

impl std::fmt::Debug for FnCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCommand")
            .field("name", &self.name)
            .field("help", &self.help)
            .finish_non_exhaustive()
    }
}

/// Box a closure-backed leaf, ready to be placed in a tree.
pub fn leaf<F>(name: impl Into<String>, help: impl Into<String>, run: F) -> Box<dyn Command>
where
    F: Fn(&ArgumentBag) -> anyhow::Result<()> + 'static,
{
    Box::new(FnCommand::new(name, help, run))
}
