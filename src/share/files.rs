use std::path::Path;
use tracing::debug;

use super::target;
use crate::error::{Error, Result};
use crate::pbx::{Id, Kind, Phase, ProjectGraph, Record, Value};

/// How a file takes part in the extension's build.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FileKind {
  /// Property lists: referenced by the group, never built.
  Descriptor,
  Source,
  Resource
}

impl FileKind {
  pub fn phase(self) -> Option<Phase> {
    match self {
      FileKind::Descriptor => None,
      FileKind::Source     => Some(Phase::Sources),
      FileKind::Resource   => Some(Phase::Resources)
    }
  }
}

fn extension(name: &str) -> &str {
  Path::new(name).extension().and_then(|x| x.to_str()).unwrap_or("")
}

pub fn classify(name: &str) -> FileKind {
  match extension(name) {
    "plist"   => FileKind::Descriptor,
    "h" | "m" => FileKind::Source,
    _         => FileKind::Resource
  }
}

fn get_file_type(name: &str) -> &'static str {
  match extension(name) {
    "h"            => "sourcecode.c.h",
    "hpp"          => "sourcecode.cpp.h",
    "c"            => "sourcecode.c.c",
    "cc" | "cpp"   => "sourcecode.cpp.cpp",
    "m"            => "sourcecode.c.objc",
    "mm"           => "sourcecode.cpp.objcpp",
    "swift"        => "sourcecode.swift",
    "plist"        => "text.plist.xml",
    "entitlements" => "text.plist.entitlements",
    "strings"      => "text.plist.strings",
    "storyboard"   => "file.storyboard",
    "xib"          => "file.xib",
    "xcassets"     => "folder.assetcatalog",
    "json"         => "text.json",
    "xml"          => "text.xml",
    "png"          => "image.png",
    "jpg" | "jpeg" => "image.jpeg",
    "framework"    => "wrapper.framework",
    &_             => "text"
  }
}

fn file_reference(name: &str) -> Record {
  let file_type = get_file_type(name);
  let mut record = Record::new(Kind::FileReference);
  if file_type.starts_with("sourcecode") || file_type.starts_with("text") {
    record.set("fileEncoding", Value::token("4"));
  }
  record
    .with("lastKnownFileType", Value::text(file_type))
    .with("path",              Value::text(name))
    .with("sourceTree",        Value::text("<group>"))
}

/// File reference named `name` among the group's children.
fn find_file(graph: &ProjectGraph, group: &str, name: &str) -> Option<Id> {
  graph.get(group)?.refs("children").into_iter().find(|id| {
    graph.get(id.as_str())
      .map(|r| r.kind == Kind::FileReference && r.display_name().as_deref() == Some(name))
      .unwrap_or(false)
  })
}

/// Build files of a phase pointing at `file`.
fn build_files(graph: &ProjectGraph, phase: &str, file: &str) -> Vec<Id> {
  match graph.get(phase) {
    None    => Vec::new(),
    Some(p) => p.refs("files").into_iter()
      .filter(|b| graph.get(b.as_str()).and_then(|r| r.token("fileRef")) == Some(file))
      .collect()
  }
}

/// Adds the files to the group and, depending on their kind, to the target's
/// Sources or Resources phase. Returns how many records were linked.
pub fn add_files<S: AsRef<str>>(graph: &mut ProjectGraph, group: &Id, target: &Id,
                                files: &[S]) -> Result<usize>
{
  if !graph.contains(group.as_str()) {
    return Err(Error::NotFound(format!("group {}", group)));
  }
  if !graph.contains(target.as_str()) {
    return Err(Error::NotFound(format!("target {}", target)));
  }

  let mut linked = 0;
  for name in files {
    let name = name.as_ref();
    let kind = classify(name);

    // The reference joins the group before any build file points at it.
    let file = match find_file(graph, group.as_str(), name) {
      Some(id) => id,
      None     => {
        let id = graph.insert(file_reference(name));
        if let Some(g) = graph.get_mut(group.as_str()) {
          g.push_ref("children", &id);
        }
        linked += 1;
        id
      }
    };

    if let Some(phase) = kind.phase() {
      let phase = target::ensure_phase(graph, target, phase);
      if build_files(graph, phase.as_str(), file.as_str()).is_empty() {
        let build = graph.insert(Record::new(Kind::BuildFile).with("fileRef", Value::from(&file)));
        if let Some(p) = graph.get_mut(phase.as_str()) {
          p.push_ref("files", &build);
        }
        linked += 1;
      }
    }

    debug!(?kind, %file, "Linked {}", name);
  }
  Ok(linked)
}

/// Inverse of `add_files`. Files missing from the group are skipped.
pub fn remove_files<S: AsRef<str>>(graph: &mut ProjectGraph, group: &Id, target: Option<&Id>,
                                   files: &[S]) -> usize
{
  let mut removed = 0;
  for name in files {
    let name = name.as_ref();
    let file = match find_file(graph, group.as_str(), name) {
      Some(id) => id,
      None     => continue
    };

    if let (Some(target), Some(phase)) = (target, classify(name).phase()) {
      if let Some(phase) = target::find_phase(graph, target.as_str(), phase) {
        for build in build_files(graph, phase.as_str(), file.as_str()) {
          graph.purge(build.as_str());
        }
      }
    }

    // Build files elsewhere would be left pointing at nothing.
    for build in graph.filter(|r| r.kind == Kind::BuildFile && r.token("fileRef") == Some(file.as_str())) {
      graph.purge(build.as_str());
    }

    graph.purge(file.as_str());
    removed += 1;
    debug!(%file, "Unlinked {}", name);
  }
  removed
}

/// Names of the file references directly inside a group.
pub fn group_files(graph: &ProjectGraph, group: &Id) -> Vec<String> {
  match graph.get(group.as_str()) {
    None    => Vec::new(),
    Some(g) => g.refs("children").iter()
      .filter_map(|id| graph.get(id.as_str()))
      .filter(|r| r.kind == Kind::FileReference)
      .filter_map(|r| r.display_name().map(|x| x.into_owned()))
      .collect()
  }
}
