#![allow(clippy::cognitive_complexity)]
#![allow(clippy::write_with_newline)]

mod assets;
mod cmd;
mod ctx;
mod error;
mod pbx;
mod plist;
mod share;

use clap::{Arg, App, SubCommand};
use semver::Version;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() {
  // Initialize.
  let commands = cmd::init();

  // Parse the environment variables.
  let env: ctx::Env = envy::prefixed("SHAREEXT_").from_env()
    .check(|| "Failed to parse environment variables");

  // Parse the command line.
  let args = App::new(env!("CARGO_PKG_NAME"))
    .version(env!("CARGO_PKG_VERSION"))
    .author(env!("CARGO_PKG_AUTHORS"))
    .about(env!("CARGO_PKG_DESCRIPTION"))
    .arg(Arg::with_name("FOLDER")
         .help("iOS platform folder containing the Xcode project")
         .required(true))
    .arg(Arg::with_name("config")
         .short("c")
         .long("config")
         .value_name("FILE")
         .help("Name of the configuration file")
         .takes_value(true))
    .arg(Arg::with_name("v")
         .short("v")
         .multiple(true)
         .help("Verbosity level"))
    .subcommands(commands.iter().map(|(name, cmd)| {
      cmd.init(SubCommand::with_name(name))
    }))
    .get_matches();

  init_logging(args.occurrences_of("v"));

  let dir = PathBuf::from(args.value_of("FOLDER").unwrap_or("."));
  let dir = dir.canonicalize()
    .check(|| format!("Failed to open the platform folder ({:?})", dir));

  // Load the plugin's configuration file.
  let config_path = dir.join(args.value_of("config").unwrap_or(ctx::CONFIG_FILE));
  let config = ctx::Config::load(&config_path)
    .check(|| "Failed to load the configuration");

  is_supported(&config.min_version, &config_path).check(|| "Min version check failed");

  let project = ctx::Project::discover(&dir)
    .check(|| "Failed to find the Xcode project");

  // Execute the requested command.
  let ctx = ctx::Context {
    commands,
    project,
    env:    &env,
    args:   &args,
    config: &config
  };

  let cmd_name = ctx.args.subcommand_name().unwrap_or("check");
  ctx.commands[cmd_name].run(&ctx)
    .check(|| format!("Failed to run command ({})", cmd_name));
}

fn init_logging(verbosity: u64) {
  let level = match verbosity {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace"
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();
}

fn is_supported(min_version: &str, path: &Path) -> error::Result<()> {
  if !min_version.is_empty() {
    let expected = Version::parse(min_version).map_err(|e| error::Error::config(path, e))?;
    let current  = Version::parse(env!("CARGO_PKG_VERSION")).map_err(|e| error::Error::config(path, e))?;
    if expected > current {
      return Err(error::Error::Version { expected, current })
    }
  }
  Ok(())
}

trait Check {
  type R;
  fn check<F, S>(self, msg: F) -> Self::R where F: FnOnce() -> S, S: Display;
}

impl<T, E> Check for Result<T, E> where E: Display {
  type R = T;
  fn check<F, S>(self, msg: F) -> Self::R where F: FnOnce() -> S, S: Display {
    match self {
      Ok (v) => v,
      Err(e) => fatal(format!("{}: {}", msg(), e))
    }
  }
}

fn fatal<S: Display>(msg: S) -> ! {
  eprintln!("\"{}\": {}", ctx::PLUGIN_ID, msg);
  std::process::exit(1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn version_gate() {
    let path = Path::new(ctx::CONFIG_FILE);
    assert!(is_supported("", path).is_ok());
    assert!(is_supported("0.0.1", path).is_ok());

    match is_supported("99.0.0", path) {
      Err(error::Error::Version { expected, .. }) => assert_eq!(expected.major, 99),
      other => panic!("expected a version error, got {:?}", other)
    }
    match is_supported("not a version", path) {
      Err(error::Error::Config { .. }) => {},
      other => panic!("expected a config error, got {:?}", other)
    }
  }
}
