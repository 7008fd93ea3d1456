use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

use super::{Dict, Kind, ProjectGraph, Record, Value};

/// Records Xcode writes on a single line.
const INLINE: &[&str] = &["PBXBuildFile", "PBXFileReference"];

/// Properties whose identifier values Xcode leaves without a comment.
const NO_COMMENT: &[&str] = &["remoteGlobalIDString", "TestTargetID"];

/// Serializes the project the way Xcode does: records grouped by type into
/// sections, with a comment describing every referenced record.
pub fn write(graph: &ProjectGraph) -> String {
  let comments = comments(graph);
  let mut w = Writer {
    out:      String::with_capacity(64 * 1024),
    comments: &comments
  };

  w.out.push_str("// !$*UTF8*$!\n{\n");
  for (key, value) in graph.header() {
    match key.as_str() {
      "objects" => w.objects(graph),
      _         => w.entry(key, value, 1)
    }
  }
  w.out.push_str("}\n");
  w.out
}

struct Writer<'a> {
  out:      String,
  comments: &'a HashMap<&'a str, String>
}

impl<'a> Writer<'a> {
  fn tabs(&mut self, depth: usize) {
    for _ in 0..depth {
      self.out.push('\t');
    }
  }

  fn objects(&mut self, graph: &ProjectGraph) {
    let sections = graph.records()
      .map(|(_, r)| r.kind.isa())
      .collect::<BTreeSet<&str>>();

    self.out.push_str("\tobjects = {\n");
    for isa in sections {
      self.out.push_str("\n/* Begin ");
      self.out.push_str(isa);
      self.out.push_str(" section */\n");

      let inline = INLINE.contains(&isa);
      for (id, record) in graph.records().filter(|(_, r)| r.kind.isa() == isa) {
        self.tabs(2);
        self.reference(id.as_str());
        self.out.push_str(" = ");
        match inline {
          true  => self.inline_dict(&record.fields),
          false => self.dict(&record.fields, 2)
        }
        self.out.push_str(";\n");
      }

      self.out.push_str("/* End ");
      self.out.push_str(isa);
      self.out.push_str(" section */\n");
    }
    self.out.push_str("\t};\n");
  }

  fn reference(&mut self, token: &str) {
    self.out.push_str(token);
    if let Some(c) = self.comments.get(token) {
      self.out.push_str(" /* ");
      self.out.push_str(c);
      self.out.push_str(" */");
    }
  }

  fn entry(&mut self, key: &str, value: &Value, depth: usize) {
    self.tabs(depth);
    self.out.push_str(key);
    self.out.push_str(" = ");
    self.value(key, value, depth);
    self.out.push_str(";\n");
  }

  fn value(&mut self, key: &str, value: &Value, depth: usize) {
    match value {
      Value::String(s) if NO_COMMENT.contains(&key) => self.out.push_str(s),
      Value::String(s) => self.reference(s),
      Value::Dict(d)   => self.dict(d, depth),
      Value::Array(v)  => {
        self.out.push_str("(\n");
        for item in v {
          self.tabs(depth + 1);
          self.value(key, item, depth + 1);
          self.out.push_str(",\n");
        }
        self.tabs(depth);
        self.out.push(')');
      }
    }
  }

  fn dict(&mut self, d: &Dict, depth: usize) {
    self.out.push_str("{\n");
    for (key, value) in d {
      self.entry(key, value, depth + 1);
    }
    self.tabs(depth);
    self.out.push('}');
  }

  fn inline_value(&mut self, key: &str, value: &Value) {
    match value {
      Value::String(s) if NO_COMMENT.contains(&key) => self.out.push_str(s),
      Value::String(s) => self.reference(s),
      Value::Dict(d)   => self.inline_dict(d),
      Value::Array(v)  => {
        self.out.push('(');
        for item in v {
          self.inline_value(key, item);
          self.out.push_str(", ");
        }
        self.out.push(')');
      }
    }
  }

  fn inline_dict(&mut self, d: &Dict) {
    self.out.push('{');
    for (key, value) in d {
      self.out.push_str(key);
      self.out.push_str(" = ");
      self.inline_value(key, value);
      self.out.push_str("; ");
    }
    self.out.push('}');
  }
}

/// Computes the comment Xcode writes after each reference to a record.
fn comments(graph: &ProjectGraph) -> HashMap<&str, String> {
  let mut phase_of = HashMap::new();
  let mut owner_of = HashMap::new();

  for (_, record) in graph.records() {
    if let Some(phase) = phase_name(record) {
      for file in record.tokens("files") {
        phase_of.insert(file, phase.clone());
      }
    }

    if let Some(list) = record.token("buildConfigurationList") {
      let name = match record.kind {
        Kind::Project => Cow::Borrowed(graph.name.as_str()),
        _             => record.text("name").unwrap_or_default()
      };
      owner_of.insert(list, format!("Build configuration list for {} \"{}\"",
                                    record.kind.isa(), name));
    }
  }

  let mut comments = HashMap::with_capacity(graph.len());
  for (id, record) in graph.records() {
    let comment = match record.kind {
      Kind::BuildFile => {
        let file = record.token("fileRef")
          .or_else(|| record.token("productRef"))
          .and_then(|x| graph.get(x))
          .and_then(describe)
          .unwrap_or(Cow::Borrowed("(null)"));

        match phase_of.get(id.as_str()) {
          Some(phase) => Some(format!("{} in {}", file, phase)),
          None        => Some(file.into_owned())
        }
      },
      Kind::ConfigurationList => owner_of.remove(id.as_str()),
      _ => describe(record).map(Cow::into_owned)
    };

    if let Some(c) = comment {
      comments.insert(id.as_str(), c);
    }
  }
  comments
}

fn phase_name(record: &Record) -> Option<Cow<'_, str>> {
  let isa = record.kind.isa();
  match isa.starts_with("PBX") && isa.ends_with("BuildPhase") {
    true  => Some(record.text("name")
                  .unwrap_or(Cow::Borrowed(&isa[3 .. isa.len() - "BuildPhase".len()]))),
    false => None
  }
}

fn describe(record: &Record) -> Option<Cow<'_, str>> {
  match &record.kind {
    Kind::Project            => Some(Cow::Borrowed("Project object")),
    Kind::BuildPhase(p)      => Some(record.text("name").unwrap_or(Cow::Borrowed(p.default_name()))),
    Kind::TargetDependency   |
    Kind::ContainerItemProxy => Some(Cow::Borrowed(record.kind.isa())),
    Kind::Other(isa) if isa == "XCSwiftPackageProductDependency" => record.text("productName"),
    Kind::Other(isa) if isa == "XCRemoteSwiftPackageReference" => {
      let url  = record.text("repositoryURL").unwrap_or_default();
      let name = url.trim_end_matches('/').rsplit('/').next().unwrap_or("");
      Some(Cow::Owned(format!("{} \"{}\"", isa, name.trim_end_matches(".git"))))
    },
    Kind::Other(isa) if isa.ends_with("BuildPhase") => phase_name(record),
    _ => record.display_name()
  }
}

#[cfg(test)]
mod tests {
  use super::super::FIXTURE;
  use super::*;

  fn fixture() -> ProjectGraph {
    ProjectGraph::parse("HelloCordova", FIXTURE).unwrap()
  }

  #[test]
  fn output_is_stable() {
    let once  = fixture().serialize();
    let twice = ProjectGraph::parse("HelloCordova", &once).unwrap().serialize();
    assert_eq!(once, twice);
    assert_eq!(ProjectGraph::parse("HelloCordova", &once).unwrap(), fixture());
  }

  #[test]
  fn writes_xcode_layout() {
    let out = fixture().serialize();
    assert!(out.starts_with("// !$*UTF8*$!\n{\n\tarchiveVersion = 1;\n\tclasses = {\n\t};\n"));
    assert!(out.ends_with("\trootObject = 29B97313FDCFA39411CA2CEA /* Project object */;\n}\n"));
    assert!(out.contains("\n/* Begin PBXBuildFile section */\n"));
    assert!(out.contains(concat!(
      "\t\t1D3623260D0F684500981E51 /* AppDelegate.m in Sources */ = ",
      "{isa = PBXBuildFile; fileRef = 1D3623250D0F684500981E51 /* AppDelegate.m */; };\n")));
    assert!(out.contains("\t\t\tbuildConfigurationList = C01FCF4E08A954540054247B /* Build configuration list for PBXProject \"HelloCordova\" */;\n"));
    assert!(out.contains("\t\t\tbuildConfigurationList = 1D6058960D05DD3E006BFB54 /* Build configuration list for PBXNativeTarget \"HelloCordova\" */;\n"));
    assert!(out.contains("\t\t\t\t1D60588D0D05DD3D006BFB54 /* Resources */,\n"));
    assert!(out.contains("\t\t\tbuildRules = (\n\t\t\t);\n"));
  }

  #[test]
  fn sections_are_sorted_by_type() {
    let out = fixture().serialize();
    let begins = out.lines()
      .filter(|l| l.starts_with("/* Begin "))
      .collect::<Vec<&str>>();
    let mut sorted = begins.clone();
    sorted.sort();
    assert_eq!(begins, sorted);
    assert!(begins.contains(&"/* Begin XCConfigurationList section */"));
  }
}
