use tracing::debug;

use super::Located;
use crate::error::{Error, Result};
use crate::pbx::{Id, Kind, ProjectGraph, Quoting, Record, Value};

/// First group whose path token matches `path` as `quoting` would write it.
pub fn find_group(graph: &ProjectGraph, path: &str, quoting: Quoting) -> Option<Id> {
  let key = quoting.format(path);
  graph.find_record(|r| r.kind == Kind::Group && r.token("path") == Some(&*key))
}

pub fn find_group_by_name(graph: &ProjectGraph, name: &str) -> Option<Id> {
  graph.find_record(|r| r.kind == Kind::Group && r.text("name").as_deref() == Some(name))
}

/// Returns the group at `path`, creating it under the group named `parent`
/// when missing.
pub fn ensure_group(graph: &mut ProjectGraph, path: &str, parent: &str,
                    quoting: Quoting) -> Result<Located>
{
  if let Some(id) = find_group(graph, path, quoting) {
    debug!(%id, "Using existing group {}", path);
    return Ok(Located { id, created: false });
  }

  let parent_id = find_group_by_name(graph, parent)
    .ok_or_else(|| Error::MissingParentGroup(parent.to_string()))?;

  let token = quoting.format(path).into_owned();
  let id = graph.insert(Record::new(Kind::Group)
    .with("children",   Value::array())
    .with("name",       Value::token(token.clone()))
    .with("path",       Value::token(token))
    .with("sourceTree", Value::text("<group>")));

  if let Some(p) = graph.get_mut(parent_id.as_str()) {
    p.push_ref("children", &id);
  }

  debug!(%id, %parent_id, "Created group {}", path);
  Ok(Located { id, created: true })
}

/// Removes the group from the children of every group holding it.
pub fn detach_group(graph: &mut ProjectGraph, group: &Id) -> bool {
  let parents = graph.filter(|r| r.kind == Kind::Group && r.has_ref("children", group.as_str()));
  for parent in &parents {
    if let Some(p) = graph.get_mut(parent.as_str()) {
      p.remove_ref("children", group.as_str());
    }
  }
  !parents.is_empty()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pbx::FIXTURE;

  const CUSTOM_TEMPLATE: &str = "29B97314FDCFA39411CA2CEA";

  fn fixture() -> ProjectGraph {
    ProjectGraph::parse("HelloCordova", FIXTURE).unwrap()
  }

  #[test]
  fn lookup_by_path_uses_the_quoting() {
    let g = fixture();
    // "Other Sources" and "Resources" share this path, the first one wins.
    assert_eq!(find_group(&g, "HelloCordova", Quoting::AsNeeded).unwrap().as_str(),
               "29B97315FDCFA39411CA2CEA");
    assert_eq!(find_group(&g, "HelloCordova", Quoting::Always), None);
    assert_eq!(find_group_by_name(&g, "CustomTemplate").unwrap().as_str(), CUSTOM_TEMPLATE);
  }

  #[test]
  fn creates_under_the_parent() {
    let mut g = fixture();
    let group = ensure_group(&mut g, "ShareExtension", "CustomTemplate", Quoting::Always).unwrap();
    assert!(group.created);
    assert!(g.get(CUSTOM_TEMPLATE).unwrap().has_ref("children", group.id.as_str()));

    let record = g.get(group.id.as_str()).unwrap();
    assert_eq!(record.token("path"), Some("\"ShareExtension\""));
    assert_eq!(record.token("name"), Some("\"ShareExtension\""));

    let again = ensure_group(&mut g, "ShareExtension", "CustomTemplate", Quoting::Always).unwrap();
    assert!(!again.created);
    assert_eq!(again.id, group.id);
  }

  #[test]
  fn missing_parent_fails_before_any_change() {
    let mut g = fixture();
    let before = g.clone();
    match ensure_group(&mut g, "ShareExtension", "Plugins", Quoting::Always) {
      Err(Error::MissingParentGroup(name)) => assert_eq!(name, "Plugins"),
      other => panic!("expected a missing parent group, got {:?}", other.map(|x| x.id))
    }
    assert_eq!(g, before);
  }

  #[test]
  fn detaches_from_parents() {
    let mut g = fixture();
    let group = ensure_group(&mut g, "ShareExtension", "CustomTemplate", Quoting::Always).unwrap();
    assert!(detach_group(&mut g, &group.id));
    assert!(!g.get(CUSTOM_TEMPLATE).unwrap().has_ref("children", group.id.as_str()));
    assert!(!detach_group(&mut g, &group.id));
  }
}
