use clap::{App};
use tracing::warn;

use crate::ctx::{Command, Context, RunResult};
use crate::error::Error;
use crate::pbx::ProjectGraph;
use crate::share::{group, target};

pub struct Check;

impl Command for Check {
  fn init<'a, 'b>(&self, cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.about("Lists the project's targets and checks its references")
  }

  fn run(&self, ctx: &Context) -> RunResult {
    let s     = &ctx.config.extension;
    let graph = ProjectGraph::load(&ctx.project.pbxproj())?;

    println!("{} ({} records)", ctx.project.name, graph.len());
    for (id, record) in graph.records().filter(|(_, r)| r.kind.is_target()) {
      println!("  {} {}", id, record.display_name().unwrap_or_default());
    }

    let found = |x: Option<_>| match x {
      Some(_) => "present",
      None    => "missing"
    };
    println!("{} target: {}", s.target, found(target::find_target(&graph, &s.target, s.quoting)));
    println!("{} group: {}",  s.group,  found(group::find_group(&graph, &s.group, s.quoting)));

    let dangling = graph.dangling_refs();
    for x in &dangling {
      warn!("{} {} points to missing record {}", x.owner, x.property, x.target);
    }

    match dangling.is_empty() {
      true  => Ok(()),
      false => Err(Error::Integrity(dangling.len()))
    }
  }
}
