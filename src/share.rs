//! Adds the share extension target to an Xcode project, or takes it out.
//!
//! Both directions load the project, change it in memory and write it back
//! once at the end. Records are always found again by target name and group
//! path, so nothing needs to be remembered between runs.

pub mod files;
pub mod group;
pub mod settings;
pub mod target;

use std::path::{Path, PathBuf};
use tracing::info;

use crate::ctx::{BuildOptions, ExtensionSettings};
use crate::error::{Error, Result};
use crate::pbx::{Id, ProjectGraph};

/// A target or group either found in the project or just created.
#[derive(Debug)]
pub struct Located {
  pub id:      Id,
  pub created: bool
}

pub struct Request<'a> {
  pub settings: &'a ExtensionSettings,
  pub options:  &'a BuildOptions,

  /// Folder holding the ".xcodeproj", which project paths are relative to.
  pub project_dir: &'a Path
}

impl<'a> Request<'a> {
  fn info_plist(&self, files: &[PathBuf]) -> Option<PathBuf> {
    let file = files.iter().find(|x| {
      x.file_name().and_then(|n| n.to_str()).map(|n| n.ends_with("Info.plist")).unwrap_or(false)
    })?;
    let full = match file.is_relative() {
      true  => self.project_dir.join(file),
      false => file.clone()
    };
    pathdiff::diff_paths(&full, self.project_dir)
  }
}

fn file_names(files: &[PathBuf]) -> Vec<&str> {
  files.iter()
    .filter_map(|x| x.file_name())
    .filter_map(|x| x.to_str())
    .collect()
}

/// Loads the project, runs `stage` to put the extension's files in place,
/// then links them and writes the project back. `stage` only runs once the
/// project has parsed and the extension can be attached to it.
pub fn add<F>(path: &Path, request: &Request, stage: F) -> Result<Id>
  where F: FnOnce() -> Result<Vec<PathBuf>>
{
  let mut graph = ProjectGraph::load(path)?;
  preflight(&graph, request.settings)?;

  let files  = stage()?;
  let target = link(&mut graph, request, &files)?;
  graph.save(path)?;
  info!(%target, "Added {} to {:?}", request.settings.target, path);
  Ok(target)
}

/// Fails when `link` could not complete on this project.
fn preflight(graph: &ProjectGraph, s: &ExtensionSettings) -> Result<()> {
  if graph.first_target().is_none() {
    return Err(Error::NotFound("the application target".to_string()));
  }
  if group::find_group(graph, &s.group, s.quoting).is_none()
    && group::find_group_by_name(graph, &s.parent_group).is_none()
  {
    return Err(Error::MissingParentGroup(s.parent_group.clone()));
  }
  Ok(())
}

/// Finds or creates the target and group, links the files and propagates
/// the host's settings. Returns the extension target.
pub fn link(graph: &mut ProjectGraph, request: &Request, files: &[PathBuf]) -> Result<Id> {
  let s    = request.settings;
  let host = graph.first_target()
    .ok_or_else(|| Error::NotFound("the application target".to_string()))?;

  let target = target::ensure_target(graph, &s.target, &s.product_type, s.quoting);
  if target.created {
    target::embed_in_host(graph, &host, &target.id);
  }

  let group  = group::ensure_group(graph, &s.group, &s.parent_group, s.quoting)?;
  let linked = files::add_files(graph, &group.id, &target.id, &file_names(files))?;
  info!("Linked {} new records for {} files", linked, files.len());

  propagate(graph, &host, &target.id, request, files);
  Ok(target.id)
}

fn propagate(graph: &mut ProjectGraph, host: &Id, target: &Id, request: &Request, files: &[PathBuf]) {
  let s = request.settings;
  let o = request.options;

  settings::copy_target_attributes(graph, host, target);
  settings::copy_build_settings(graph, host, target, &s.copy_settings);
  settings::set_bundle_identifier(graph, host, target, &s.bundle_suffix);

  if let Some(path) = request.info_plist(files) {
    let path = path.to_string_lossy().replace('\\', "/");
    settings::set_build_setting(graph, target, "INFOPLIST_FILE", &path);
  }

  if let Some(team) = &o.development_team {
    settings::set_build_setting(graph, target, "DEVELOPMENT_TEAM", team);
  }
  if let Some(identity) = &o.code_sign_identity {
    settings::set_build_setting(graph, target, "CODE_SIGN_IDENTITY", identity);
  }

  settings::set_code_signing_style(graph, target, o.signing_style());
}

/// Returns whether the extension was found. The project is written back
/// either way.
pub fn remove(path: &Path, settings: &ExtensionSettings) -> Result<bool> {
  let mut graph = ProjectGraph::load(path)?;
  let removed = unlink(&mut graph, settings);
  graph.save(path)?;
  Ok(removed)
}

pub fn unlink(graph: &mut ProjectGraph, s: &ExtensionSettings) -> bool {
  let group = match group::find_group(graph, &s.group, s.quoting) {
    Some(id) => id,
    None     => {
      info!("No {} group in the project, nothing to remove", s.group);
      return false;
    }
  };

  group::detach_group(graph, &group);

  let target = target::find_target(graph, &s.target, s.quoting);
  let names  = files::group_files(graph, &group);
  let count  = files::remove_files(graph, &group, target.as_ref(), &names);
  info!("Unlinked {} files", count);

  graph.purge(group.as_str());
  if let Some(target) = target {
    target::remove_target(graph, &target);
  }
  true
}
