use clap::{App, Arg};
use std::fs;
use tracing::info;

use crate::ctx::{Command, Context, RunResult};
use crate::error::AtPath;
use crate::share;

pub struct Remove;

impl Command for Remove {
  fn init<'a, 'b>(&self, cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.about("Removes the share extension from the Xcode project")
      .arg(Arg::with_name("keep-files")
           .long("keep-files")
           .help("Leave the extension's folder on disk"))
  }

  fn run(&self, ctx: &Context) -> RunResult {
    let settings   = &ctx.config.extension;
    let keep_files = ctx.sub_args().map(|x| x.is_present("keep-files")).unwrap_or(false);

    let dir = ctx.project.dir.join(&settings.group);
    if !keep_files && dir.is_dir() {
      fs::remove_dir_all(&dir).at(&dir)?;
      info!("Deleted {:?}", dir);
    }

    match share::remove(&ctx.project.pbxproj(), settings)? {
      true  => info!("Removed {} from {}", settings.target, ctx.project.name),
      false => info!("{} has no {} to remove", ctx.project.name, settings.target)
    }
    Ok(())
  }
}
