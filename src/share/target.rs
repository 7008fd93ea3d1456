//! Native targets: lookup, creation with their build phases, embedding into
//! the host application and teardown.

use tracing::debug;

use super::Located;
use crate::pbx::{Dict, Id, Kind, Phase, ProjectGraph, Quoting, Record, Value};

pub const APP_EXTENSION: &str = "com.apple.product-type.app-extension";

const EMBED_PHASE: &str = "Embed App Extensions";

/// `dstSubfolderSpec` of the PlugIns folder inside an application bundle.
const PLUGINS_FOLDER: &str = "13";

const DEFAULT_CONFIGURATIONS: &[&str] = &["Debug", "Release"];

pub fn find_target(graph: &ProjectGraph, name: &str, quoting: Quoting) -> Option<Id> {
  let key = quoting.format(name);
  graph.find_record(|r| r.kind == Kind::NativeTarget && r.token("name") == Some(&*key))
}

/// Returns the target named `name`, creating it with empty Sources and
/// Resources phases when missing.
pub fn ensure_target(graph: &mut ProjectGraph, name: &str, product_type: &str,
                     quoting: Quoting) -> Located
{
  if let Some(id) = find_target(graph, name, quoting) {
    debug!(%id, "Using existing target {}", name);
    return Located { id, created: false };
  }

  let token   = quoting.format(name).into_owned();
  let list    = configuration_list(graph, &token);
  let product = product_reference(graph, name, product_type);

  let id = graph.insert(Record::new(Kind::NativeTarget)
    .with("buildConfigurationList", Value::from(&list))
    .with("buildPhases",            Value::array())
    .with("buildRules",             Value::array())
    .with("dependencies",           Value::array())
    .with("name",                   Value::token(token.clone()))
    .with("productName",            Value::token(token))
    .with("productReference",       Value::from(&product))
    .with("productType",            Value::text(product_type)));

  if let Some(project) = graph.project_mut() {
    project.push_ref("targets", &id);
  }

  add_phase(graph, &id, Phase::Sources);
  add_phase(graph, &id, Phase::Resources);

  debug!(%id, "Created target {}", name);
  Located { id, created: true }
}

pub fn find_phase(graph: &ProjectGraph, target: &str, phase: Phase) -> Option<Id> {
  graph.get(target)?.refs("buildPhases").into_iter().find(|id| {
    graph.get(id.as_str()).map(|r| r.kind == Kind::BuildPhase(phase)).unwrap_or(false)
  })
}

pub fn ensure_phase(graph: &mut ProjectGraph, target: &Id, phase: Phase) -> Id {
  match find_phase(graph, target.as_str(), phase) {
    Some(id) => id,
    None     => add_phase(graph, target, phase)
  }
}

fn add_phase(graph: &mut ProjectGraph, target: &Id, phase: Phase) -> Id {
  let id = graph.insert(phase_record(phase));
  if let Some(t) = graph.get_mut(target.as_str()) {
    t.push_ref("buildPhases", &id);
  }
  id
}

fn phase_record(phase: Phase) -> Record {
  Record::new(Kind::BuildPhase(phase))
    .with("buildActionMask",                    Value::token("2147483647"))
    .with("files",                              Value::array())
    .with("runOnlyForDeploymentPostprocessing", Value::token("0"))
}

/// One configuration per configuration of the primary target.
fn configuration_list(graph: &mut ProjectGraph, product_name: &str) -> Id {
  let mut names: Vec<String> = graph.first_target()
    .map(|host| graph.configurations(host.as_str()).into_iter().map(|(n, _)| n).collect())
    .unwrap_or_else(Vec::new);

  if names.is_empty() {
    names = DEFAULT_CONFIGURATIONS.iter().map(|x| x.to_string()).collect();
  }

  let configs = names.iter().map(|name| {
    let mut settings = Dict::new();
    settings.insert("LD_RUNPATH_SEARCH_PATHS".to_string(),
                    Value::text("$(inherited) @executable_path/Frameworks @executable_path/../../Frameworks"));
    settings.insert("PRODUCT_NAME".to_string(), Value::token(product_name));
    settings.insert("SKIP_INSTALL".to_string(), Value::token("YES"));

    graph.insert(Record::new(Kind::BuildConfiguration)
      .with("buildSettings", Value::Dict(settings))
      .with("name",          Value::text(name)))
  }).collect::<Vec<Id>>();

  let default = match names.iter().any(|x| x == "Release") {
    true  => "Release",
    false => names.last().map(String::as_str).unwrap_or("Release")
  };

  graph.insert(Record::new(Kind::ConfigurationList)
    .with("buildConfigurations",           Value::Array(configs.iter().map(Value::from).collect()))
    .with("defaultConfigurationIsVisible", Value::token("0"))
    .with("defaultConfigurationName",      Value::text(default)))
}

fn product_reference(graph: &mut ProjectGraph, name: &str, product_type: &str) -> Id {
  let (file_type, ext) = match product_type {
    APP_EXTENSION                          => ("wrapper.app-extension", "appex"),
    "com.apple.product-type.application"   => ("wrapper.application",   "app"),
    "com.apple.product-type.framework"     => ("wrapper.framework",     "framework"),
    "com.apple.product-type.library.static" => ("archive.ar",           "a"),
    _                                      => ("compiled.mach-o.executable", "")
  };

  let path = match ext.is_empty() {
    true  => name.to_string(),
    false => format!("{}.{}", name, ext)
  };

  let id = graph.insert(Record::new(Kind::FileReference)
    .with("explicitFileType", Value::text(file_type))
    .with("includeInIndex",   Value::token("0"))
    .with("path",             Value::text(&path))
    .with("sourceTree",       Value::token("BUILT_PRODUCTS_DIR")));

  let products = graph.project()
    .and_then(|p| p.token("productRefGroup"))
    .map(Id::from);

  if let Some(group) = products.and_then(|g| graph.get_mut(g.as_str())) {
    group.push_ref("children", &id);
  }
  id
}

/// Makes the host application build and embed an app extension target.
/// Returns false for other product types.
pub fn embed_in_host(graph: &mut ProjectGraph, host: &Id, target: &Id) -> bool {
  let (product, name) = match graph.get(target.as_str()) {
    Some(r) if r.text("productType").as_deref() == Some(APP_EXTENSION) => {
      match r.token("productReference") {
        Some(p) => (Id::from(p), r.text("name").unwrap_or_default().into_owned()),
        None    => return false
      }
    },
    _ => return false
  };

  let phase = match embed_phase(graph, host.as_str()) {
    Some(id) => id,
    None     => {
      let id = graph.insert(Record::new(Kind::BuildPhase(Phase::CopyFiles))
        .with("buildActionMask",                    Value::token("2147483647"))
        .with("dstPath",                            Value::text(""))
        .with("dstSubfolderSpec",                   Value::token(PLUGINS_FOLDER))
        .with("files",                              Value::array())
        .with("name",                               Value::text(EMBED_PHASE))
        .with("runOnlyForDeploymentPostprocessing", Value::token("0")));

      if let Some(h) = graph.get_mut(host.as_str()) {
        h.push_ref("buildPhases", &id);
      }
      id
    }
  };

  let mut settings = Dict::new();
  settings.insert("ATTRIBUTES".to_string(),
                  Value::Array(vec![Value::token("RemoveHeadersOnCopy")]));

  let file = graph.insert(Record::new(Kind::BuildFile)
    .with("fileRef",  Value::from(&product))
    .with("settings", Value::Dict(settings)));

  if let Some(p) = graph.get_mut(phase.as_str()) {
    p.push_ref("files", &file);
  }

  if let Some(root) = graph.root() {
    let proxy = graph.insert(Record::new(Kind::ContainerItemProxy)
      .with("containerPortal",      Value::from(&root))
      .with("proxyType",            Value::token("1"))
      .with("remoteGlobalIDString", Value::from(target))
      .with("remoteInfo",           Value::text(&name)));

    let dependency = graph.insert(Record::new(Kind::TargetDependency)
      .with("target",      Value::from(target))
      .with("targetProxy", Value::from(&proxy)));

    if let Some(h) = graph.get_mut(host.as_str()) {
      h.push_ref("dependencies", &dependency);
    }
  }

  debug!(%host, %target, "Embedded {} in host", name);
  true
}

fn embed_phase(graph: &ProjectGraph, host: &str) -> Option<Id> {
  graph.get(host)?.refs("buildPhases").into_iter().find(|id| {
    graph.get(id.as_str())
      .map(|r| r.kind == Kind::BuildPhase(Phase::CopyFiles) &&
                r.text("name").as_deref() == Some(EMBED_PHASE))
      .unwrap_or(false)
  })
}

/// Deletes a target and every record only it uses: phases and their build
/// files, configurations, product, embedding and dependencies.
pub fn remove_target(graph: &mut ProjectGraph, target: &Id) -> bool {
  let record = match graph.get(target.as_str()) {
    Some(r) => r.clone(),
    None    => return false
  };

  for phase in record.refs("buildPhases") {
    if let Some(p) = graph.purge(phase.as_str()) {
      for file in p.refs("files") {
        graph.purge(file.as_str());
      }
    }
  }

  if let Some(list) = record.token("buildConfigurationList") {
    if let Some(l) = graph.purge(list) {
      for config in l.refs("buildConfigurations") {
        graph.purge(config.as_str());
      }
    }
  }

  if let Some(product) = record.token("productReference") {
    let embeds = graph.filter(|r| r.kind == Kind::BuildFile && r.token("fileRef") == Some(product));
    let phases = graph.filter(|r| {
      matches!(r.kind, Kind::BuildPhase(_)) && embeds.iter().any(|e| r.has_ref("files", e.as_str()))
    });

    for file in &embeds {
      graph.purge(file.as_str());
    }
    for phase in phases {
      let empty = graph.get(phase.as_str()).map(|r| r.tokens("files").is_empty()).unwrap_or(false);
      if empty {
        graph.purge(phase.as_str());
      }
    }
    graph.purge(product);
  }

  let mut dependencies = record.refs("dependencies");
  dependencies.extend(graph.filter(|r| {
    r.kind == Kind::TargetDependency && r.token("target") == Some(target.as_str())
  }));
  for dependency in dependencies {
    if let Some(d) = graph.purge(dependency.as_str()) {
      if let Some(proxy) = d.token("targetProxy") {
        graph.purge(proxy);
      }
    }
  }

  let proxies = graph.filter(|r| {
    r.kind == Kind::ContainerItemProxy && r.token("remoteGlobalIDString") == Some(target.as_str())
  });
  for proxy in proxies {
    graph.purge(proxy.as_str());
  }

  graph.purge(target.as_str());
  debug!(%target, "Removed target {}", record.text("name").unwrap_or_default());
  true
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pbx::FIXTURE;

  fn fixture() -> ProjectGraph {
    ProjectGraph::parse("HelloCordova", FIXTURE).unwrap()
  }

  #[test]
  fn finds_targets_with_the_same_quoting() {
    let mut g = fixture();
    assert_eq!(find_target(&g, "HelloCordova", Quoting::AsNeeded).unwrap().as_str(),
               "1D6058900D05DD3D006BFB54");
    assert_eq!(find_target(&g, "HelloCordova", Quoting::Always), None);

    let created = ensure_target(&mut g, "ShareExtension", APP_EXTENSION, Quoting::Always);
    assert_eq!(g.get(created.id.as_str()).unwrap().token("name"), Some("\"ShareExtension\""));
    assert_eq!(find_target(&g, "ShareExtension", Quoting::Always), Some(created.id));
    assert_eq!(find_target(&g, "ShareExtension", Quoting::AsNeeded), None);
  }

  #[test]
  fn creates_sources_then_resources() {
    let mut g = fixture();
    let target = ensure_target(&mut g, "ShareExtension", APP_EXTENSION, Quoting::Always);
    assert!(target.created);

    let record = g.get(target.id.as_str()).unwrap();
    let kinds = record.refs("buildPhases").iter()
      .map(|id| g.get(id.as_str()).unwrap().kind.clone())
      .collect::<Vec<Kind>>();
    assert_eq!(kinds, [Kind::BuildPhase(Phase::Sources), Kind::BuildPhase(Phase::Resources)]);
    assert_eq!(record.text("productType").as_deref(), Some(APP_EXTENSION));

    let configs = g.configurations(target.id.as_str()).into_iter()
      .map(|(name, _)| name)
      .collect::<Vec<String>>();
    assert_eq!(configs, ["Debug", "Release"]);

    let product = g.get(record.token("productReference").unwrap()).unwrap();
    assert_eq!(product.text("path").as_deref(), Some("ShareExtension.appex"));
    assert!(g.get("19C28FACFE9D520D11CA2CBB").unwrap().has_ref("children", product_id(&g, &target.id)));
    assert!(g.project().unwrap().has_ref("targets", target.id.as_str()));
    assert!(g.dangling_refs().is_empty());
  }

  fn product_id<'a>(g: &'a ProjectGraph, target: &Id) -> &'a str {
    g.get(target.as_str()).unwrap().token("productReference").unwrap()
  }

  #[test]
  fn existing_target_is_left_alone() {
    let mut g = fixture();
    let first = ensure_target(&mut g, "ShareExtension", APP_EXTENSION, Quoting::Always);
    let len   = g.len();
    let again = ensure_target(&mut g, "ShareExtension", APP_EXTENSION, Quoting::Always);
    assert!(!again.created);
    assert_eq!(again.id, first.id);
    assert_eq!(g.len(), len);
  }

  #[test]
  fn ensure_phase_reuses_or_adds() {
    let mut g = fixture();
    let host = g.first_target().unwrap();
    assert_eq!(ensure_phase(&mut g, &host, Phase::Sources).as_str(), "1D60588E0D05DD3D006BFB54");
    assert_eq!(find_phase(&g, host.as_str(), Phase::Headers), None);

    let headers = ensure_phase(&mut g, &host, Phase::Headers);
    assert_eq!(find_phase(&g, host.as_str(), Phase::Headers), Some(headers));
  }

  #[test]
  fn embeds_extensions_in_the_host() {
    let mut g = fixture();
    let host   = g.first_target().unwrap();
    let target = ensure_target(&mut g, "ShareExtension", APP_EXTENSION, Quoting::Always);
    assert!(embed_in_host(&mut g, &host, &target.id));

    let phase = embed_phase(&g, host.as_str()).unwrap();
    let phase = g.get(phase.as_str()).unwrap();
    assert_eq!(phase.token("dstSubfolderSpec"), Some(PLUGINS_FOLDER));
    assert_eq!(phase.tokens("files").len(), 1);

    let deps = g.get(host.as_str()).unwrap().refs("dependencies");
    assert_eq!(deps.len(), 1);
    assert_eq!(g.get(deps[0].as_str()).unwrap().token("target"), Some(target.id.as_str()));
    assert!(g.dangling_refs().is_empty());

    let out = g.serialize();
    assert!(out.contains("ShareExtension.appex in Embed App Extensions"));
    assert!(out.contains(&format!("remoteGlobalIDString = {};", target.id)));
  }

  #[test]
  fn only_app_extensions_are_embedded() {
    let mut g = fixture();
    let host   = g.first_target().unwrap();
    let target = ensure_target(&mut g, "Tool", "com.apple.product-type.tool", Quoting::AsNeeded);
    assert!(!embed_in_host(&mut g, &host, &target.id));
    assert_eq!(embed_phase(&g, host.as_str()), None);
  }

  #[test]
  fn removal_restores_the_project() {
    let original = fixture();
    let mut g    = original.clone();
    let host     = g.first_target().unwrap();
    let target   = ensure_target(&mut g, "ShareExtension", APP_EXTENSION, Quoting::Always);
    embed_in_host(&mut g, &host, &target.id);

    assert!(remove_target(&mut g, &target.id));
    assert!(!remove_target(&mut g, &target.id));
    assert!(g.dangling_refs().is_empty());
    assert_eq!(g.serialize(), original.serialize());
  }
}
