use std::collections::HashSet;
use std::fmt;

use clap::ArgMatches;
use tracing::{debug, info_span};

use crate::bag::ArgumentBag;
use crate::command::Command;
use crate::error::{Error, Result};

/// Identifies the bag entry where a tree records the user's selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchKey(usize);

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command_{}", self.0)
    }
}

/// Allocates dispatch keys. Every tree that ends up in the same CLI must be
/// built from the same allocator.
#[derive(Debug, Default)]
pub struct DispatchKeys {
    next: usize,
}

impl DispatchKeys {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&mut self) -> DispatchKey {
        let key = DispatchKey(self.next);
        self.next += 1;
        key
    }
}

/// Sub-command names clap generates itself at every level.
const RESERVED_NAMES: &[&str] = &["help"];

/// An internal node: a named group of child commands behind one selector.
pub struct CommandTree {
    name: String,
    help: String,
    children: Vec<Box<dyn Command>>,
    key: DispatchKey,
}

impl CommandTree {
    /// Build a tree, taking its dispatch key from `keys`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a child name is empty, reserved by clap,
    /// or used twice.
    pub fn new(
        keys: &mut DispatchKeys,
        name: impl Into<String>,
        help: impl Into<String>,
        children: Vec<Box<dyn Command>>,
    ) -> Result<Self> {
        let name = name.into();
        let mut seen: HashSet<&str> = HashSet::new();
        for child in &children {
            if child.name().is_empty() {
                return Err(Error::Config(format!(
                    "'{}' has a sub-command with an empty name",
                    name
                )));
            }
            if RESERVED_NAMES.iter().any(|reserved| *reserved == child.name()) {
                return Err(Error::Config(format!(
                    "'{}' has a sub-command named '{}', which is reserved",
                    name,
                    child.name()
                )));
            }
            if !seen.insert(child.name()) {
                return Err(Error::Config(format!(
                    "'{}' has more than one sub-command named '{}'",
                    name,
                    child.name()
                )));
            }
        }
        Ok(Self {
            name,
            help: help.into(),
            children,
            key: keys.next_key(),
        })
    }

    pub fn key(&self) -> DispatchKey {
        self.key
    }

    pub fn children(&self) -> &[Box<dyn Command>] {
        &self.children
    }

    fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.name()).collect()
    }
}

impl Command for CommandTree {
    fn name(&self) -> &str {
        &self.name
    }

    fn help(&self) -> &str {
        &self.help
    }

    fn configure(&self, mut cmd: clap::Command) -> clap::Command {
        debug!(tree = %self.name, key = %self.key, "configuring sub-commands");
        // Left optional so a missing selection reaches run() as invalid usage.
        cmd = cmd.subcommand_required(false);
        for child in &self.children {
            let sub = clap::Command::new(child.name().to_string()).about(child.help().to_string());
            cmd = cmd.subcommand(child.configure(sub));
        }
        cmd
    }

    fn run(&self, args: &ArgumentBag) -> anyhow::Result<()> {
        let Some(selected) = args.selection(self.key) else {
            return Err(Error::InvalidUsage(format!(
                "'{}' needs a sub-command, expected one of: {}",
                self.name,
                self.child_names().join(", ")
            ))
            .into());
        };

        let child = self
            .children
            .iter()
            .find(|c| c.name() == selected)
            .ok_or_else(|| Error::UnknownCommand {
                tree: self.name.clone(),
                name: selected.to_string(),
            })?;

        let _span = info_span!("command", name = %child.name()).entered();
        debug!(tree = %self.name, command = %child.name(), "dispatching");
        child.validate(args).map_err(|err| Error::Validation {
            command: child.name().to_string(),
            message: format!("{:#}", err),
        })?;
        child.run(args)
    }

    fn bind(&self, matches: &ArgMatches, bag: &mut ArgumentBag) -> Result<()> {
        bag.push_level(matches.clone());
        let Some((name, sub_matches)) = matches.subcommand() else {
            return Ok(());
        };
        bag.select(self.key, name)?;
        match self.children.iter().find(|c| c.name() == name) {
            Some(child) => child.bind(sub_matches, bag),
            None => Err(Error::UnknownCommand {
                tree: self.name.clone(),
                name: name.to_string(),
            }),
        }
    }
}

impl fmt::Debug for CommandTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTree")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("children", &self.child_names())
            .finish()
    }
}
