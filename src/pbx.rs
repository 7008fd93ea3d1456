//! In-memory model of Xcode project files.
//!
//! Xcode uses the NeXTSTEP property list format. The entire project is stored
//! in a single file named "project.pbxproj", short for Project Builder XCode
//! Project. This file lives in a folder named after the project with the
//! "xcodeproj" extension.
//!
//! This property list format provides the following data types:
//! - String:     contents, "quoted contents"
//! - Data:       <0fbd777f>
//! - Array:      ( element, ... )
//! - Dictionary: { key = value; ... }
//!
//! Numbers are plain strings. Comments have the form /* contents */ or
//! // contents. They are optional; Xcode regenerates them whenever it writes
//! the file, and so does this module.
//!
//! The root dictionary holds a few header entries and the "objects"
//! dictionary of every record describing the project. Every record is
//! identified by a unique 96-bit hexadecimal string and has an "isa" property
//! determining its type. Records reference each other by identifier only, so
//! the project is loaded into an arena (`ProjectGraph`) keyed by identifier and
//! references are resolved through it at use-time.
//!
//! String tokens are kept exactly as read, quotes and escapes included. Xcode
//! only quotes what needs quoting, but other tools wrap every name they write;
//! keeping tokens verbatim means re-serializing a record nobody touched yields
//! the same text. Use `quote` and `unquote` to cross between tokens and text.
//!
//! References:
//! - https://en.wikipedia.org/wiki/Property_list
//! - http://monoobjc.net/xcode-project-file-format.html

mod graph;
mod parse;
mod write;

use indexmap::IndexMap;
use serde::Deserialize;
use std::borrow::{Borrow, Cow};
use std::fmt;

pub use graph::{ProjectGraph, Record};
pub use parse::SyntaxError;

#[cfg(test)]
pub const FIXTURE: &str = include_str!("../tests/fixtures/project.pbxproj");

pub type Dict = IndexMap<String, Value>;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  /// A string token exactly as it appears in the file.
  String(String),
  Array(Vec<Value>),
  Dict(Dict)
}

impl Value {
  /// Creates a string token from unquoted text.
  pub fn text(s: &str) -> Self {
    Value::String(quote(s).into_owned())
  }

  pub fn token<S: Into<String>>(s: S) -> Self {
    Value::String(s.into())
  }

  pub fn array() -> Self {
    Value::Array(Vec::new())
  }

  pub fn dict() -> Self {
    Value::Dict(Dict::new())
  }

  pub fn as_token(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _                => None
    }
  }

  pub fn as_text(&self) -> Option<Cow<'_, str>> {
    self.as_token().map(unquote)
  }

  pub fn as_array(&self) -> Option<&Vec<Value>> {
    match self {
      Value::Array(v) => Some(v),
      _               => None
    }
  }

  pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
    match self {
      Value::Array(v) => Some(v),
      _               => None
    }
  }

  pub fn as_dict(&self) -> Option<&Dict> {
    match self {
      Value::Dict(d) => Some(d),
      _              => None
    }
  }

  pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
    match self {
      Value::Dict(d) => Some(d),
      _              => None
    }
  }
}

impl From<&Id> for Value {
  fn from(id: &Id) -> Self {
    Value::String(id.0.clone())
  }
}

/// Opaque record identifier, unique within one project.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(String);

impl Id {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for Id {
  fn from(s: &str) -> Self {
    Id(s.to_string())
  }
}

impl Borrow<str> for Id {
  fn borrow(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Id {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
  Sources,
  Resources,
  Frameworks,
  Headers,
  CopyFiles,
  ShellScript
}

const PHASES: &[Phase] = &[
  Phase::Sources,
  Phase::Resources,
  Phase::Frameworks,
  Phase::Headers,
  Phase::CopyFiles,
  Phase::ShellScript
];

impl Phase {
  pub fn isa(self) -> &'static str {
    match self {
      Phase::Sources     => "PBXSourcesBuildPhase",
      Phase::Resources   => "PBXResourcesBuildPhase",
      Phase::Frameworks  => "PBXFrameworksBuildPhase",
      Phase::Headers     => "PBXHeadersBuildPhase",
      Phase::CopyFiles   => "PBXCopyFilesBuildPhase",
      Phase::ShellScript => "PBXShellScriptBuildPhase"
    }
  }

  /// Name Xcode shows for a phase without an explicit "name" property.
  pub fn default_name(self) -> &'static str {
    match self {
      Phase::Sources     => "Sources",
      Phase::Resources   => "Resources",
      Phase::Frameworks  => "Frameworks",
      Phase::Headers     => "Headers",
      Phase::CopyFiles   => "CopyFiles",
      Phase::ShellScript => "ShellScript"
    }
  }
}

/// Record type, decoded from the "isa" property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Kind {
  Project,
  NativeTarget,
  Group,
  BuildPhase(Phase),
  BuildConfiguration,
  ConfigurationList,
  FileReference,
  BuildFile,
  TargetDependency,
  ContainerItemProxy,
  Other(String)
}

impl Kind {
  pub fn from_isa(isa: &str) -> Self {
    match isa {
      "PBXProject"            => Kind::Project,
      "PBXNativeTarget"       => Kind::NativeTarget,
      "PBXGroup"              => Kind::Group,
      "XCBuildConfiguration"  => Kind::BuildConfiguration,
      "XCConfigurationList"   => Kind::ConfigurationList,
      "PBXFileReference"      => Kind::FileReference,
      "PBXBuildFile"          => Kind::BuildFile,
      "PBXTargetDependency"   => Kind::TargetDependency,
      "PBXContainerItemProxy" => Kind::ContainerItemProxy,
      _ => match PHASES.iter().find(|p| p.isa() == isa) {
        Some(&p) => Kind::BuildPhase(p),
        None     => Kind::Other(isa.to_string())
      }
    }
  }

  pub fn isa(&self) -> &str {
    match self {
      Kind::Project            => "PBXProject",
      Kind::NativeTarget       => "PBXNativeTarget",
      Kind::Group              => "PBXGroup",
      Kind::BuildPhase(p)      => p.isa(),
      Kind::BuildConfiguration => "XCBuildConfiguration",
      Kind::ConfigurationList  => "XCConfigurationList",
      Kind::FileReference      => "PBXFileReference",
      Kind::BuildFile          => "PBXBuildFile",
      Kind::TargetDependency   => "PBXTargetDependency",
      Kind::ContainerItemProxy => "PBXContainerItemProxy",
      Kind::Other(isa)         => isa
    }
  }

  pub fn is_target(&self) -> bool {
    match self {
      Kind::NativeTarget => true,
      Kind::Other(isa)   => isa == "PBXAggregateTarget" || isa == "PBXLegacyTarget",
      _                  => false
    }
  }
}

/// How names and paths written into the project get quoted.
///
/// Locators compare raw tokens against this same formatting, so a name
/// written as `"ShareExtension"` is only found again when looked up with
/// `Always`. Xcode itself writes `AsNeeded`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum Quoting {
  Always,
  AsNeeded
}

impl Default for Quoting {
  fn default() -> Self { Quoting::Always }
}

impl Quoting {
  pub fn format(self, s: &str) -> Cow<'_, str> {
    match self {
      Quoting::Always   => Cow::Owned(wrap(s)),
      Quoting::AsNeeded => quote(s)
    }
  }
}

fn is_bare_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '/' || c == ':' || c == '.'
}

/// Turns text into a token, adding quotes only when the text needs them.
pub fn quote(s: &str) -> Cow<'_, str> {
  match s.is_empty() || !s.chars().all(is_bare_char) || s.contains("//") || s.contains("/*") {
    true  => Cow::Owned(wrap(s)),
    false => Cow::Borrowed(s)
  }
}

fn wrap(s: &str) -> String {
  let mut out = String::with_capacity(s.len() + 2);
  out.push('"');
  for c in s.chars() {
    match c {
      '"'  => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      '\t' => out.push_str("\\t"),
      _    => out.push(c)
    }
  }
  out.push('"');
  out
}

/// Turns a token back into its text.
pub fn unquote(token: &str) -> Cow<'_, str> {
  let quoted = token.len() >= 2 &&
    ((token.starts_with('"')  && token.ends_with('"')) ||
     (token.starts_with('\'') && token.ends_with('\'')));

  if !quoted {
    return Cow::Borrowed(token);
  }

  let inner = &token[1 .. token.len() - 1];
  if !inner.contains('\\') {
    return Cow::Borrowed(inner);
  }

  let mut out   = String::with_capacity(inner.len());
  let mut chars = inner.chars();
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    match chars.next() {
      Some('n') => out.push('\n'),
      Some('t') => out.push('\t'),
      Some('r') => out.push('\r'),
      Some(x)   => out.push(x),
      None      => out.push('\\')
    }
  }
  Cow::Owned(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn quote_only_when_needed() {
    assert_eq!(quote("HelloCordova.app"), "HelloCordova.app");
    assert_eq!(quote("$(inherited)"), "\"$(inherited)\"");
    assert_eq!(quote("<group>"), "\"<group>\"");
    assert_eq!(quote("com.apple.product-type.app-extension"),
               "\"com.apple.product-type.app-extension\"");
    assert_eq!(quote(""), "\"\"");
    assert_eq!(quote("a//b"), "\"a//b\"");
  }

  #[test]
  fn unquote_reverses_escapes() {
    assert_eq!(unquote("plain"), "plain");
    assert_eq!(unquote("\"My Team\""), "My Team");
    assert_eq!(unquote("\"say \\\"hi\\\"\\n\""), "say \"hi\"\n");
    assert_eq!(unquote(&quote("tab\there \\ \"q\"")), "tab\there \\ \"q\"");
  }

  #[test]
  fn quoting_modes() {
    assert_eq!(Quoting::Always.format("ShareExtension"), "\"ShareExtension\"");
    assert_eq!(Quoting::AsNeeded.format("ShareExtension"), "ShareExtension");
    assert_eq!(Quoting::AsNeeded.format("Share Extension"), "\"Share Extension\"");
  }

  #[test]
  fn kinds_round_trip_isa() {
    for isa in &["PBXNativeTarget", "PBXSourcesBuildPhase", "PBXCopyFilesBuildPhase",
                 "XCConfigurationList", "PBXVariantGroup"] {
      assert_eq!(Kind::from_isa(isa).isa(), *isa);
    }
    assert_eq!(Kind::from_isa("PBXResourcesBuildPhase"), Kind::BuildPhase(Phase::Resources));
    assert!(Kind::from_isa("PBXAggregateTarget").is_target());
  }
}
