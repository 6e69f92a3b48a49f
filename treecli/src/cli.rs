use std::ffi::OsString;
use std::io::{self, Write};

use clap::ArgMatches;
use tracing::debug;

use crate::bag::ArgumentBag;
use crate::command::Command;
use crate::config::{global_args, RunOptions, GLOBAL_IDS};
use crate::error::{Error, Result};
use crate::logging;
use crate::profile::Profiler;
use crate::timing::{format_elapsed, Stopwatch};
use crate::tree::{CommandTree, DispatchKeys};

/// Name of the tree the runner builds around the user's commands.
pub const ROOT_NAME: &str = "main";
/// Outcome code for missing sub-commands and failed validation.
pub const USAGE_EXIT_CODE: i32 = 2;

/// Composition root: owns the dispatch key allocator, builds the clap app,
/// parses input and dispatches into the command tree.
#[derive(Debug)]
pub struct Runner {
    title: String,
    description: String,
    version: Option<String>,
    keys: DispatchKeys,
}

impl Runner {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            version: None,
            keys: DispatchKeys::new(),
        }
    }

    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Build a nested group whose key comes from this runner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on empty or duplicate child names.
    pub fn group(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        children: Vec<Box<dyn Command>>,
    ) -> Result<CommandTree> {
        CommandTree::new(&mut self.keys, name, help, children)
    }

    /// Build the app and the root tree, with every level configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the top-level commands are malformed.
    pub fn build_cli(
        &mut self,
        commands: Vec<Box<dyn Command>>,
    ) -> Result<(clap::Command, CommandTree)> {
        let root = CommandTree::new(&mut self.keys, ROOT_NAME, self.description.clone(), commands)?;
        let mut app = clap::Command::new(self.title.clone())
            .about(self.description.clone())
            .args(global_args());
        if let Some(version) = &self.version {
            app = app.version(version.clone());
        }
        let app = root.configure(app);
        Ok((app, root))
    }

    /// Run against the process arguments, writing to stdout.
    ///
    /// # Errors
    ///
    /// See [`Runner::run_from`].
    pub fn run(self, commands: Vec<Box<dyn Command>>) -> anyhow::Result<i32> {
        // Unlocked: commands may print from worker threads while we wait on them.
        self.run_from(std::env::args_os(), commands, &mut io::stdout())
    }

    /// Parse `args`, dispatch, and report. Returns the process outcome code.
    ///
    /// Usage errors are printed with the full help text and mapped to
    /// [`USAGE_EXIT_CODE`]; parse errors are rendered by clap and return its
    /// exit code. Profiling stats and elapsed time are reported in every case.
    ///
    /// # Errors
    ///
    /// Configuration errors, output failures, and any error returned by the
    /// selected command.
    pub fn run_from<I, T, W>(
        mut self,
        args: I,
        commands: Vec<Box<dyn Command>>,
        out: &mut W,
    ) -> anyhow::Result<i32>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
        W: Write,
    {
        let (mut app, root) = self.build_cli(commands)?;
        let matches = match app.try_get_matches_from_mut(args) {
            Ok(matches) => matches,
            Err(err) => return report_parse_error(&err, out),
        };

        let options = RunOptions::from_matches(&matches);
        logging::setup_logging(options.verbosity);

        let mut bag = ArgumentBag::hiding(GLOBAL_IDS);
        root.bind(&matches, &mut bag)?;
        debug!(path = ?selected_path(&matches), ?options, "arguments bound");

        let mut profiler = options.profile.then(Profiler::new);
        let stopwatch = options.count_time.then(Stopwatch::start);

        let outcome = match profiler.as_mut() {
            Some(profiler) => profiler.scope(options.verbosity, || root.run(&bag)),
            None => root.run(&bag),
        };

        let code = match outcome {
            Ok(()) => Ok(0),
            Err(err) => {
                let usage = err
                    .downcast_ref::<Error>()
                    .filter(|e| e.is_usage())
                    .map(ToString::to_string);
                match usage {
                    Some(message) => {
                        writeln!(out, "{}", message)?;
                        writeln!(out)?;
                        write!(out, "{}", app.render_help())?;
                        Ok(USAGE_EXIT_CODE)
                    }
                    None => Err(err),
                }
            }
        };

        if let Some(profiler) = &profiler {
            write!(out, "{}", profiler.report().render(options.profile_format)?)?;
        }
        if let Some(stopwatch) = stopwatch {
            writeln!(out, "{}", format_elapsed(stopwatch.elapsed()))?;
        }
        code
    }
}

fn report_parse_error<W: Write>(err: &clap::Error, out: &mut W) -> anyhow::Result<i32> {
    // --help and --version arrive here too and belong on the regular output.
    if err.use_stderr() {
        err.print()?;
    } else {
        write!(out, "{}", err.render())?;
    }
    Ok(err.exit_code())
}

/// Names of the sub-commands selected below the top level, outermost first.
pub fn selected_path(matches: &ArgMatches) -> Vec<String> {
    let mut path: Vec<String> = Vec::new();
    let mut current = matches;
    while let Some((name, sub_m)) = current.subcommand() {
        path.push(name.to_string());
        current = sub_m;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::leaf;

    fn commands() -> Vec<Box<dyn Command>> {
        vec![
            leaf("build", "Build the project", |_| Ok(())),
            leaf("clean", "Remove build output", |_| Ok(())),
        ]
    }

    // ==================== build_cli tests ====================

    #[test]
    fn test_build_cli_adds_global_args() {
        let mut runner = Runner::new("tool", "A tool");
        let (app, _) = runner.build_cli(commands()).unwrap();
        let arg_names: Vec<_> = app.get_arguments().map(|a| a.get_id().as_str()).collect();
        assert!(arg_names.contains(&"profile"));
        assert!(arg_names.contains(&"count-time"));
        assert!(arg_names.contains(&"profile-format"));
        assert!(arg_names.contains(&"verbose"));
    }

    #[test]
    fn test_build_cli_root_tree_is_main() {
        let mut runner = Runner::new("tool", "A tool");
        let (app, root) = runner.build_cli(commands()).unwrap();
        assert_eq!(root.name(), ROOT_NAME);
        assert_eq!(root.help(), "A tool");
        assert_eq!(app.get_name(), "tool");
        let names: Vec<&str> = app.get_subcommands().map(clap::Command::get_name).collect();
        assert_eq!(names, vec!["build", "clean"]);
    }

    #[test]
    fn test_build_cli_rejects_duplicate_top_level_names() {
        let mut runner = Runner::new("tool", "A tool");
        let err = runner
            .build_cli(vec![leaf("x", "", |_| Ok(())), leaf("x", "", |_| Ok(()))])
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_groups_and_root_share_allocator() {
        let mut runner = Runner::new("tool", "A tool");
        let db = runner.group("db", "Database", vec![leaf("migrate", "", |_| Ok(()))]).unwrap();
        let db_key = db.key();
        let (_, root) = runner.build_cli(vec![Box::new(db)]).unwrap();
        assert_ne!(db_key, root.key());
    }

    #[test]
    fn test_version_is_applied() {
        let mut runner = Runner::new("tool", "A tool").version("1.2.3");
        let (app, _) = runner.build_cli(commands()).unwrap();
        assert_eq!(app.get_version(), Some("1.2.3"));
    }

    // ==================== run_from tests ====================

    #[test]
    fn test_run_from_help_goes_to_output() {
        let mut out = Vec::new();
        let code = Runner::new("tool", "A tool")
            .run_from(["tool", "--help"], commands(), &mut out)
            .unwrap();
        assert_eq!(code, 0);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("build"));
        assert!(text.contains("--count-time"));
    }

    #[test]
    fn test_run_from_unknown_command_returns_parse_error_code() {
        let mut out = Vec::new();
        let code = Runner::new("tool", "A tool")
            .run_from(["tool", "deploy"], commands(), &mut out)
            .unwrap();
        assert_eq!(code, 2);
    }

    #[test]
    fn test_run_from_propagates_command_failure() {
        let mut out = Vec::new();
        let err = Runner::new("tool", "A tool")
            .run_from(
                ["tool", "fail"],
                vec![leaf("fail", "", |_| anyhow::bail!("disk full"))],
                &mut out,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn test_run_from_stdout_with_threaded_command() {
        let worker = leaf("build", "", |_| {
            std::thread::spawn(|| println!("worker output"))
                .join()
                .map_err(|_| anyhow::anyhow!("worker panicked"))?;
            Ok(())
        });
        let code = Runner::new("tool", "A tool")
            .run_from(["tool", "build"], vec![worker], &mut io::stdout())
            .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn test_run_from_rejects_command_named_help() {
        let mut out = Vec::new();
        let err = Runner::new("tool", "A tool")
            .run_from(["tool", "help"], vec![leaf("help", "custom", |_| Ok(()))], &mut out)
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));
        assert!(out.is_empty());
    }

    // ==================== selected_path tests ====================

    #[test]
    fn test_selected_path_walks_nested_subcommands() {
        let app = clap::Command::new("tool").subcommand(
            clap::Command::new("db").subcommand(clap::Command::new("migrate")),
        );
        let matches = app.try_get_matches_from(["tool", "db", "migrate"]).unwrap();
        assert_eq!(selected_path(&matches), vec!["db", "migrate"]);
    }

    #[test]
    fn test_selected_path_empty_without_subcommand() {
        let matches = clap::Command::new("tool").try_get_matches_from(["tool"]).unwrap();
        assert!(selected_path(&matches).is_empty());
    }
}
