use indexmap::IndexMap;
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use super::parse::{parse, SyntaxError};
use super::{write, Dict, Id, Kind, Value};
use crate::error::{AtPath, Error, Result};

/// Array properties listing references to other records.
const REF_LISTS: &[&str] = &[
  "buildConfigurations",
  "buildPhases",
  "children",
  "dependencies",
  "files",
  "packageProductDependencies",
  "packageReferences",
  "targets"
];

/// Scalar properties referencing another record.
/// `remoteGlobalIDString` is left out since it may point into another project.
const REF_FIELDS: &[&str] = &[
  "buildConfigurationList",
  "containerPortal",
  "fileRef",
  "mainGroup",
  "productRef",
  "productRefGroup",
  "productReference",
  "target",
  "targetProxy"
];

/// A node of the project graph: its decoded type and its properties, in file
/// order. The "isa" property stays in `fields` so it is written back in place.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
  pub kind:   Kind,
  pub fields: Dict
}

impl Record {
  pub fn new(kind: Kind) -> Self {
    let mut fields = Dict::new();
    fields.insert("isa".to_string(), Value::token(kind.isa()));
    Record { kind, fields }
  }

  pub fn with(mut self, key: &str, value: Value) -> Self {
    self.set(key, value);
    self
  }

  pub fn set(&mut self, key: &str, value: Value) {
    self.fields.insert(key.to_string(), value);
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.fields.get(key)
  }

  pub fn token(&self, key: &str) -> Option<&str> {
    self.fields.get(key).and_then(Value::as_token)
  }

  pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
    self.fields.get(key).and_then(Value::as_text)
  }

  /// String tokens of an array property, usually references.
  pub fn tokens(&self, key: &str) -> Vec<&str> {
    match self.fields.get(key).and_then(Value::as_array) {
      None    => Vec::new(),
      Some(v) => v.iter().filter_map(Value::as_token).collect()
    }
  }

  pub fn refs(&self, key: &str) -> Vec<Id> {
    self.tokens(key).into_iter().map(Id::from).collect()
  }

  pub fn has_ref(&self, key: &str, id: &str) -> bool {
    self.tokens(key).contains(&id)
  }

  pub fn push_ref(&mut self, key: &str, id: &Id) {
    let list = self.fields.entry(key.to_string()).or_insert_with(Value::array);
    if let Some(v) = list.as_array_mut() {
      v.push(Value::from(id));
    }
  }

  pub fn remove_ref(&mut self, key: &str, id: &str) -> bool {
    match self.fields.get_mut(key).and_then(Value::as_array_mut) {
      None    => false,
      Some(v) => {
        let len = v.len();
        v.retain(|x| x.as_token() != Some(id));
        v.len() != len
      }
    }
  }

  /// Dictionary property, created empty when missing.
  pub fn dict_mut(&mut self, key: &str) -> Option<&mut Dict> {
    self.fields.entry(key.to_string()).or_insert_with(Value::dict).as_dict_mut()
  }

  /// Name shown for the record: its name, or its path when it has no name.
  pub fn display_name(&self) -> Option<Cow<'_, str>> {
    self.text("name").or_else(|| self.text("path"))
  }
}

#[derive(Debug, PartialEq)]
pub struct DanglingRef {
  pub owner:    Id,
  pub property: String,
  pub target:   String
}

/// Arena holding every record of a project, keyed by identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectGraph {
  /// Project name, taken from the enclosing ".xcodeproj" folder.
  pub name: String,

  /// Root entries in file order. "objects" is kept as an empty placeholder
  /// marking where the records get written.
  header: Dict,

  objects: IndexMap<Id, Record>
}

impl ProjectGraph {
  pub fn load(path: &Path) -> Result<Self> {
    let text = fs::read_to_string(path).at(path)?;
    let name = path.parent()
      .and_then(|p| p.file_stem())
      .and_then(|s| s.to_str())
      .unwrap_or("Project");

    Self::parse(name, &text).map_err(|source| Error::Parse {
      path: path.to_path_buf(),
      source
    })
  }

  pub fn parse(name: &str, text: &str) -> std::result::Result<Self, SyntaxError> {
    let mut header = parse(text)?;
    let invalid = |message: &str| SyntaxError { line: 0, message: message.to_string() };

    let objects = match header.get_mut("objects") {
      Some(Value::Dict(d)) => std::mem::replace(d, Dict::new()),
      _                    => return Err(invalid("Missing the objects dictionary"))
    };

    let mut graph = ProjectGraph {
      header,
      name:    name.to_string(),
      objects: IndexMap::with_capacity(objects.len())
    };

    for (id, value) in objects {
      let fields = match value {
        Value::Dict(d) => d,
        _              => return Err(invalid(&format!("Object {} is not a dictionary", id)))
      };
      let kind = match fields.get("isa").and_then(Value::as_text) {
        Some(isa) => Kind::from_isa(&isa),
        None      => return Err(invalid(&format!("Object {} has no isa", id)))
      };
      graph.objects.insert(Id::from(id.as_str()), Record { kind, fields });
    }

    Ok(graph)
  }

  pub fn serialize(&self) -> String {
    write::write(self)
  }

  pub fn save(&self, path: &Path) -> Result<()> {
    fs::write(path, self.serialize()).at(path)
  }

  pub fn header(&self) -> &Dict {
    &self.header
  }

  pub fn records(&self) -> indexmap::map::Iter<'_, Id, Record> {
    self.objects.iter()
  }

  pub fn len(&self) -> usize {
    self.objects.len()
  }

  pub fn contains(&self, id: &str) -> bool {
    self.objects.contains_key(id)
  }

  pub fn get(&self, id: &str) -> Option<&Record> {
    self.objects.get(id)
  }

  pub fn get_mut(&mut self, id: &str) -> Option<&mut Record> {
    self.objects.get_mut(id)
  }

  /// First record matching the predicate, in file order. Duplicates are
  /// silently ignored.
  pub fn find_record<F>(&self, pred: F) -> Option<Id> where F: Fn(&Record) -> bool {
    self.objects.iter().find(|(_, r)| pred(r)).map(|(id, _)| id.clone())
  }

  pub fn filter<F>(&self, pred: F) -> Vec<Id> where F: Fn(&Record) -> bool {
    self.objects.iter().filter(|(_, r)| pred(r)).map(|(id, _)| id.clone()).collect()
  }

  /// Adds a record under a fresh identifier.
  pub fn insert(&mut self, record: Record) -> Id {
    let id = self.generate_id();
    self.objects.insert(id.clone(), record);
    id
  }

  pub fn generate_id(&self) -> Id {
    loop {
      let id = random_id();
      if !self.objects.contains_key(&id) {
        return id;
      }
    }
  }

  /// Deletes a record and every array entry or dictionary key referencing
  /// it. Scalar references are the caller's responsibility.
  pub fn purge(&mut self, id: &str) -> Option<Record> {
    let record = self.objects.shift_remove(id)?;
    for other in self.objects.values_mut() {
      scrub(&mut other.fields, id);
    }
    Some(record)
  }

  pub fn root(&self) -> Option<Id> {
    self.header.get("rootObject").and_then(Value::as_token).map(Id::from)
  }

  pub fn project(&self) -> Option<&Record> {
    self.header.get("rootObject")
      .and_then(Value::as_token)
      .and_then(|id| self.objects.get(id))
  }

  pub fn project_mut(&mut self) -> Option<&mut Record> {
    let id = self.root()?;
    self.objects.get_mut(&id)
  }

  /// The primary target: first in the project's target list.
  pub fn first_target(&self) -> Option<Id> {
    self.project()?.refs("targets").into_iter().next()
  }

  /// Named build configurations of a target or of the project.
  pub fn configurations(&self, owner: &str) -> Vec<(String, Id)> {
    self.objects.get(owner)
      .and_then(|r| r.token("buildConfigurationList"))
      .and_then(|list| self.objects.get(list))
      .map(|list| {
        list.refs("buildConfigurations").into_iter()
          .filter_map(|id| {
            let name = self.objects.get(&id)?.text("name")?.into_owned();
            Some((name, id))
          })
          .collect()
      })
      .unwrap_or_default()
  }

  /// References that don't resolve to a record.
  pub fn dangling_refs(&self) -> Vec<DanglingRef> {
    let mut dangling = Vec::new();
    let mut check = |owner: &Id, property: &str, token: &str| {
      if !self.objects.contains_key(token) {
        dangling.push(DanglingRef {
          owner:    owner.clone(),
          property: property.to_string(),
          target:   token.to_string()
        });
      }
    };

    for (id, record) in &self.objects {
      for &key in REF_LISTS {
        for token in record.tokens(key) {
          check(id, key, token);
        }
      }
      for &key in REF_FIELDS {
        if let Some(token) = record.token(key) {
          check(id, key, token);
        }
      }
    }
    dangling
  }
}

fn scrub(d: &mut Dict, id: &str) {
  d.shift_remove(id);
  for (_, value) in d.iter_mut() {
    scrub_value(value, id);
  }
}

fn scrub_value(value: &mut Value, id: &str) {
  match value {
    Value::String(_) => {},
    Value::Dict(d)   => scrub(d, id),
    Value::Array(v)  => {
      v.retain(|x| x.as_token() != Some(id));
      for x in v {
        scrub_value(x, id);
      }
    }
  }
}

static NEXT_ID_PREFIX: AtomicU32 = AtomicU32::new(0);

fn random_id() -> Id {
  use rand::RngCore;
  let mut bytes = [0u8; 12];
  rand::thread_rng().fill_bytes(&mut bytes[4..]);

  // Use a counter as the first ID bytes to try and prevent Xcode from reordering objects.
  let prefix = NEXT_ID_PREFIX.fetch_add(1, Ordering::Relaxed);
  bytes[.. 4].copy_from_slice(&prefix.to_be_bytes());

  let mut id = String::with_capacity(24);
  for b in &bytes {
    id.push(hex_char(b >> 4));
    id.push(hex_char(b & 0xF));
  }
  Id(id)
}

fn hex_char(b: u8) -> char {
  match b < 10 {
    true  => (b'0' + b)        as char,
    false => (b'A' + (b - 10)) as char
  }
}
