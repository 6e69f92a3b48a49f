use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, FromArgMatches};
use treecli::{leaf, ArgumentBag, Command, Runner};

const APP_NAME: &str = "treecli-demo";

// Leaf commands read their own arguments back through clap's derive API;
// the tree only handles selection.

fn main() {
    if let Err(err) = real_main() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let mut runner = Runner::new(APP_NAME, "Project tooling demo built with treecli")
        .version(env!("CARGO_PKG_VERSION"));

    let db = runner.group(
        "db",
        "Database maintenance",
        vec![
            Box::new(Migrate),
            leaf("seed", "Load fixture data", |_| {
                let _span = tracing::info_span!("seed").entered();
                simulate_step("loading fixtures", 15);
                println!("Seeded 3 fixture sets");
                Ok(())
            }),
            leaf("status", "Show schema version as JSON", |_| {
                let status = serde_json::json!({
                    "schema_version": 7,
                    "pending": 0,
                    "checked_at": chrono::Local::now().to_rfc3339(),
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
                Ok(())
            }),
        ],
    )?;

    let code = runner.run(vec![Box::new(Build), Box::new(db)])?;
    std::process::exit(code);
}

fn simulate_step(what: &str, millis: u64) {
    let _span = tracing::info_span!("step", name = what).entered();
    tracing::debug!("{}", what);
    thread::sleep(Duration::from_millis(millis));
}

fn leaf_args<T: FromArgMatches>(args: &ArgumentBag) -> Result<T> {
    let matches = args.leaf_matches().context("no arguments were bound")?;
    Ok(T::from_arg_matches(matches)?)
}

#[derive(Debug, Args)]
struct BuildArgs {
    /// Build with optimizations
    #[arg(long)]
    release: bool,
    /// Target triple to build for
    #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
    target: String,
}

struct Build;

impl Command for Build {
    fn name(&self) -> &str {
        "build"
    }

    fn help(&self) -> &str {
        "Compile the project"
    }

    fn configure(&self, cmd: clap::Command) -> clap::Command {
        BuildArgs::augment_args(cmd)
    }

    fn run(&self, args: &ArgumentBag) -> Result<()> {
        let build: BuildArgs = leaf_args(args)?;
        let profile = if build.release { "release" } else { "debug" };
        tracing::info!(profile, target = %build.target, "building");
        simulate_step("resolving dependencies", 10);
        simulate_step("compiling", 30);
        println!("Finished {} build for {}", profile, build.target);
        Ok(())
    }
}

#[derive(Debug, Args)]
struct MigrateArgs {
    /// Number of migrations to apply
    #[arg(long, default_value_t = 1)]
    steps: u32,
    /// Print the plan without applying it
    #[arg(long)]
    dry_run: bool,
}

struct Migrate;

impl Command for Migrate {
    fn name(&self) -> &str {
        "migrate"
    }

    fn help(&self) -> &str {
        "Apply pending migrations"
    }

    fn configure(&self, cmd: clap::Command) -> clap::Command {
        MigrateArgs::augment_args(cmd)
    }

    fn validate(&self, args: &ArgumentBag) -> Result<()> {
        let migrate: MigrateArgs = leaf_args(args)?;
        if migrate.steps == 0 {
            bail!("--steps must be at least 1");
        }
        Ok(())
    }

    fn run(&self, args: &ArgumentBag) -> Result<()> {
        let migrate: MigrateArgs = leaf_args(args)?;
        for step in 1..=migrate.steps {
            if migrate.dry_run {
                println!("Would apply migration {}/{}", step, migrate.steps);
            } else {
                simulate_step("applying migration", 5);
                println!("Applied migration {}/{}", step, migrate.steps);
            }
        }
        Ok(())
    }
}
