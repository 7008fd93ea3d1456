//! Extension template files: listing, placeholder substitution and copy.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::debug;

use crate::ctx::Config;
use crate::error::{AtPath, Error, Result};
use crate::plist::BundleInfo;

pub type Substitutions = Vec<(&'static str, String)>;

/// Placeholder values for the extension of the given bundle.
pub fn substitutions(info: &BundleInfo, config: &Config, suffix: &str) -> Result<Substitutions> {
  let bundle_id = format!("{}{}", info.identifier, suffix);
  Ok(vec![
    ("__BUNDLE_IDENTIFIER__",            bundle_id.clone()),
    ("__URL_SCHEME__",                   config.variable("IOS_URL_SCHEME")?.to_string()),
    ("__BUNDLE_VERSION__",               info.version.clone()),
    ("__DISPLAY_NAME__",                 info.display_name.clone()),
    ("__GROUP_IDENTIFIER__",             format!("group.{}", bundle_id)),
    ("__UNIFORM_TYPE_IDENTIFIER__",      config.variable("IOS_UNIFORM_TYPE_IDENTIFIER")?.to_string()),
    ("__BUNDLE_SHORT_VERSION_STRING__",  info.short_version.clone())
  ])
}

pub fn substitute(text: &str, subs: &[(&str, String)]) -> String {
  subs.iter().fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Regular files directly inside `dir`, skipping dot files, sorted by name.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
  if !dir.is_dir() {
    return Err(Error::NotFound(format!("the extension folder {:?}", dir)));
  }

  let pattern = format!("{}/*", glob::Pattern::escape(&dir.to_string_lossy()));
  let options = glob::MatchOptions { require_literal_leading_dot: true, ..Default::default() };

  let mut files = Vec::new();
  for m in glob::glob_with(&pattern, options).map_err(|e| Error::config(dir, e))? {
    let path = m.map_err(|e| Error::Io { path: e.path().to_path_buf(), source: e.into() })?;
    if path.is_file() {
      files.push(path);
    }
  }
  files.sort();
  Ok(files)
}

/// Copies every template into `dest`, one thread per file. Text files get
/// their placeholders replaced, other files are copied as is.
pub fn copy_templates(src: &Path, dest: &Path, subs: &[(&str, String)]) -> Result<Vec<PathBuf>> {
  let files = list_files(src)?;
  fs::create_dir_all(dest).at(dest)?;

  let results = thread::scope(|s| {
    let handles = files.iter()
      .map(|file| s.spawn(move || copy_template(file, dest, subs)))
      .collect::<Vec<_>>();

    handles.into_iter()
      .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
      .collect::<Vec<Result<PathBuf>>>()
  });

  results.into_iter().collect()
}

fn copy_template(file: &Path, dest: &Path, subs: &[(&str, String)]) -> Result<PathBuf> {
  let name = file.file_name()
    .ok_or_else(|| Error::NotFound(format!("a file name in {:?}", file)))?;
  let target = dest.join(name);

  let bytes = fs::read(file).at(file)?;
  match String::from_utf8(bytes) {
    Ok (text) => fs::write(&target, substitute(&text, subs)),
    Err(e)    => fs::write(&target, e.into_bytes())
  }.at(&target)?;

  debug!("Copied {:?} to {:?}", file, target);
  Ok(target)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn info() -> BundleInfo {
    BundleInfo {
      identifier:    "io.cordova.hellocordova".to_string(),
      display_name:  "Hello".to_string(),
      version:       "120".to_string(),
      short_version: "1.2.0".to_string()
    }
  }

  fn config() -> Config {
    let mut config = Config::default();
    config.variables.insert("IOS_URL_SCHEME".to_string(), "hello".to_string());
    config.variables.insert("IOS_UNIFORM_TYPE_IDENTIFIER".to_string(), "public.image".to_string());
    config
  }

  #[test]
  fn replaces_every_placeholder() {
    let subs = substitutions(&info(), &config(), ".ShareExtension").unwrap();
    let text = substitute(concat!("__BUNDLE_IDENTIFIER__ __URL_SCHEME__ __BUNDLE_VERSION__ ",
                                  "__DISPLAY_NAME__ __GROUP_IDENTIFIER__ __UNIFORM_TYPE_IDENTIFIER__ ",
                                  "__BUNDLE_SHORT_VERSION_STRING__ __BUNDLE_IDENTIFIER__"), &subs);
    assert_eq!(text, concat!("io.cordova.hellocordova.ShareExtension hello 120 Hello ",
                             "group.io.cordova.hellocordova.ShareExtension public.image 1.2.0 ",
                             "io.cordova.hellocordova.ShareExtension"));
  }

  #[test]
  fn variables_are_required() {
    match substitutions(&info(), &Config::default(), ".ShareExtension") {
      Err(Error::NotFound(x)) => assert!(x.contains("IOS_URL_SCHEME")),
      other => panic!("expected not found, got {:?}", other)
    }
  }

  #[test]
  fn copies_templates_concurrently() {
    let src  = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    let dest = dest.path().join("ShareExtension");

    fs::write(src.path().join("ShareViewController.m"), "id = @\"__BUNDLE_IDENTIFIER__\";").unwrap();
    fs::write(src.path().join("ShareExtension-Info.plist"), "<string>__DISPLAY_NAME__</string>").unwrap();
    fs::write(src.path().join("icon.png"), [0x89u8, 0x50, 0xff, 0xfe, b'_']).unwrap();
    fs::write(src.path().join(".DS_Store"), "junk").unwrap();
    fs::create_dir(src.path().join("nested")).unwrap();

    let subs   = substitutions(&info(), &config(), ".ShareExtension").unwrap();
    let copied = copy_templates(src.path(), &dest, &subs).unwrap();

    let names = copied.iter()
      .map(|x| x.file_name().unwrap().to_str().unwrap())
      .collect::<Vec<&str>>();
    assert_eq!(names, ["ShareExtension-Info.plist", "ShareViewController.m", "icon.png"]);

    assert_eq!(fs::read_to_string(dest.join("ShareViewController.m")).unwrap(),
               "id = @\"io.cordova.hellocordova.ShareExtension\";");
    assert_eq!(fs::read_to_string(dest.join("ShareExtension-Info.plist")).unwrap(),
               "<string>Hello</string>");
    assert_eq!(fs::read(dest.join("icon.png")).unwrap(), [0x89u8, 0x50, 0xff, 0xfe, b'_']);
    assert!(!dest.join(".DS_Store").exists());
  }

  #[test]
  fn missing_folder_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    match list_files(&dir.path().join("ShareExtension")) {
      Err(Error::NotFound(_)) => {},
      other => panic!("expected not found, got {:?}", other)
    }
  }
}
