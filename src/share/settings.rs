//! Target attributes and build settings the extension inherits from the
//! primary application target.

use std::borrow::Cow;
use tracing::debug;

use crate::pbx::{quote, unquote, Dict, Id, ProjectGraph, Value};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SigningStyle {
  Manual,
  Automatic
}

impl SigningStyle {
  pub fn as_str(self) -> &'static str {
    match self {
      SigningStyle::Manual    => "Manual",
      SigningStyle::Automatic => "Automatic"
    }
  }
}

/// Quotes values with embedded whitespace, unless already quoted.
pub fn format_setting(value: &str) -> Cow<'_, str> {
  let quoted = value.len() >= 2 && value.starts_with('"') && value.ends_with('"');
  match !quoted && value.chars().any(char::is_whitespace) {
    true  => Cow::Owned(format!("\"{}\"", value)),
    false => Cow::Borrowed(value)
  }
}

fn format_value(value: &Value) -> Value {
  match value {
    Value::String(s) => Value::token(format_setting(s)),
    Value::Array(v)  => Value::Array(v.iter().map(format_value).collect()),
    Value::Dict(_)   => value.clone()
  }
}

fn target_attributes_mut<'a>(graph: &'a mut ProjectGraph, target: &Id) -> Option<&'a mut Dict> {
  graph.project_mut()?
    .dict_mut("attributes")?
    .entry("TargetAttributes".to_string())
    .or_insert_with(Value::dict)
    .as_dict_mut()?
    .entry(target.to_string())
    .or_insert_with(Value::dict)
    .as_dict_mut()
}

fn build_settings<'a>(graph: &'a ProjectGraph, config: &Id) -> Option<&'a Dict> {
  graph.get(config.as_str())?.get("buildSettings")?.as_dict()
}

fn build_settings_mut<'a>(graph: &'a mut ProjectGraph, config: &Id) -> Option<&'a mut Dict> {
  graph.get_mut(config.as_str())?.dict_mut("buildSettings")
}

/// Copies every attribute of `source` over those of `dest`.
pub fn copy_target_attributes(graph: &mut ProjectGraph, source: &Id, dest: &Id) -> usize {
  let attributes = graph.project()
    .and_then(|p| p.get("attributes"))
    .and_then(Value::as_dict)
    .and_then(|a| a.get("TargetAttributes"))
    .and_then(Value::as_dict)
    .and_then(|t| t.get(source.as_str()))
    .and_then(Value::as_dict)
    .cloned()
    .unwrap_or_default();

  if attributes.is_empty() {
    return 0;
  }

  let count = attributes.len();
  if let Some(d) = target_attributes_mut(graph, dest) {
    for (key, value) in attributes {
      d.insert(key, value);
    }
  }

  debug!(%source, %dest, "Copied {} attributes", count);
  count
}

/// Copies the given settings between configurations of the same name.
/// Configurations missing from `source` are skipped. Keys are matched on
/// their text, so conditional keys like "KEY[sdk=iphoneos*]" work unquoted.
pub fn copy_build_settings<S: AsRef<str>>(graph: &mut ProjectGraph, source: &Id, dest: &Id,
                                          keys: &[S]) -> usize
{
  let sources = graph.configurations(source.as_str());
  let mut copied = 0;

  for (name, config) in graph.configurations(dest.as_str()) {
    let from = match sources.iter().find(|(n, _)| *n == name) {
      Some((_, id)) => id,
      None          => {
        debug!(%source, "No {} configuration to copy settings from", name);
        continue;
      }
    };

    let values = match build_settings(graph, from) {
      None    => continue,
      Some(s) => keys.iter()
        .filter_map(|k| {
          let k = k.as_ref();
          s.iter()
            .find(|(name, _)| unquote(name) == k)
            .map(|(_, v)| (quote(k).into_owned(), format_value(v)))
        })
        .collect::<Vec<(String, Value)>>()
    };

    if let Some(d) = build_settings_mut(graph, &config) {
      copied += values.len();
      for (key, value) in values {
        d.insert(key, value);
      }
    }
  }
  copied
}

/// Derives the extension's bundle identifier from the source's. Falls back
/// to the project-level configuration of the same name.
pub fn set_bundle_identifier(graph: &mut ProjectGraph, source: &Id, dest: &Id,
                             suffix: &str) -> usize
{
  let sources  = graph.configurations(source.as_str());
  let projects = graph.root()
    .map(|root| graph.configurations(root.as_str()))
    .unwrap_or_default();

  let lookup = |configs: &[(String, Id)], name: &str| -> Option<String> {
    let (_, id) = configs.iter().find(|(n, _)| n == name)?;
    build_settings(graph, id)?
      .get("PRODUCT_BUNDLE_IDENTIFIER")?
      .as_text()
      .map(Cow::into_owned)
  };

  let updates = graph.configurations(dest.as_str()).into_iter()
    .filter_map(|(name, config)| {
      let id = lookup(&sources, &name).or_else(|| lookup(&projects, &name))?;
      Some((config, format!("{}{}", id, suffix)))
    })
    .collect::<Vec<(Id, String)>>();

  for (config, id) in &updates {
    if let Some(d) = build_settings_mut(graph, config) {
      d.insert("PRODUCT_BUNDLE_IDENTIFIER".to_string(), Value::text(id));
    }
  }
  updates.len()
}

/// Sets a setting on every configuration of `dest`.
pub fn set_build_setting(graph: &mut ProjectGraph, dest: &Id, key: &str, value: &str) -> usize {
  let configs = graph.configurations(dest.as_str());
  for (_, config) in &configs {
    if let Some(d) = build_settings_mut(graph, config) {
      d.insert(quote(key).into_owned(), Value::text(value));
    }
  }
  configs.len()
}

pub fn set_code_signing_style(graph: &mut ProjectGraph, dest: &Id,
                              style: Option<SigningStyle>) -> usize
{
  let style = match style {
    Some(x) => x,
    None    => return 0
  };

  if let Some(d) = target_attributes_mut(graph, dest) {
    d.insert("ProvisioningStyle".to_string(), Value::token(style.as_str()));
  }
  set_build_setting(graph, dest, "CODE_SIGN_STYLE", style.as_str())
}
