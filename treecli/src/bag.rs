//! The flat view of one invocation's parsed arguments.

use std::any::Any;
use std::collections::HashMap;

use clap::parser::ValuesRef;
use clap::ArgMatches;

use crate::error::{Error, Result};
use crate::tree::DispatchKey;

/// Parsed input for a single run, shared read-only by every command on the
/// selected path.
///
/// Sub-command selections are stored under the [`DispatchKey`] of the tree
/// that owns them. Argument values are kept per nesting level (root first);
/// lookups search from the deepest level outward so that callers can treat
/// the bag as one flat namespace. Hidden ids never resolve, which keeps
/// runner-level flags out of reach of the commands.
#[derive(Debug, Default, Clone)]
pub struct ArgumentBag {
    selections: HashMap<DispatchKey, String>,
    levels: Vec<ArgMatches>,
    hidden: Vec<&'static str>,
}

impl ArgumentBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty bag whose lookups ignore `ids`.
    #[must_use]
    pub fn hiding(ids: &[&'static str]) -> Self {
        Self {
            hidden: ids.to_vec(),
            ..Self::default()
        }
    }

    fn is_hidden(&self, id: &str) -> bool {
        self.hidden.iter().any(|hidden| *hidden == id)
    }

    /// Record which child was selected under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `key` already holds a selection, which
    /// means two trees on the same path share a dispatch key.
    pub fn select(&mut self, key: DispatchKey, name: impl Into<String>) -> Result<()> {
        if self.selections.contains_key(&key) {
            return Err(Error::Config(format!(
                "dispatch key {} is used by more than one command tree",
                key
            )));
        }
        self.selections.insert(key, name.into());
        Ok(())
    }

    pub fn selection(&self, key: DispatchKey) -> Option<&str> {
        self.selections.get(&key).map(String::as_str)
    }

    pub fn push_level(&mut self, matches: ArgMatches) {
        self.levels.push(matches);
    }

    /// Number of nesting levels recorded, the root included.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Matches of the deepest level, i.e. the command being run.
    pub fn leaf_matches(&self) -> Option<&ArgMatches> {
        self.levels.last()
    }

    pub fn get_one<T>(&self, id: &str) -> Option<&T>
    where
        T: Any + Clone + Send + Sync + 'static,
    {
        if self.is_hidden(id) {
            return None;
        }
        self.levels
            .iter()
            .rev()
            .find_map(|m| m.try_get_one::<T>(id).ok().flatten())
    }

    pub fn get_many<T>(&self, id: &str) -> Option<ValuesRef<'_, T>>
    where
        T: Any + Clone + Send + Sync + 'static,
    {
        if self.is_hidden(id) {
            return None;
        }
        self.levels
            .iter()
            .rev()
            .find_map(|m| m.try_get_many::<T>(id).ok().flatten())
    }

    /// Value of a `SetTrue` flag; unknown ids read as unset.
    pub fn get_flag(&self, id: &str) -> bool {
        self.get_one::<bool>(id).copied().unwrap_or(false)
    }
}
