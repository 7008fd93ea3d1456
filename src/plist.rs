//! Just enough of XML property lists to read bundle metadata and patch
//! entitlement arrays in place, leaving the rest of the document untouched.

use regex::Regex;
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{AtPath, Error, Result};

pub const APP_GROUPS: &str = "com.apple.security.application-groups";

const EMPTY_PLIST: &str = concat!(
  r#"<?xml version="1.0" encoding="UTF-8"?>"#, "\n",
  r#"<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "#,
  r#""http://www.apple.com/DTDs/PropertyList-1.0.dtd">"#, "\n",
  r#"<plist version="1.0">"#, "\n",
  "<dict>\n",
  "</dict>\n",
  "</plist>\n");

/// Metadata of the application bundle, from its Info.plist.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BundleInfo {
  pub identifier:    String,
  pub display_name:  String,
  pub version:       String,
  pub short_version: String
}

impl BundleInfo {
  pub fn load(path: &Path) -> Result<Self> {
    let text = fs::read_to_string(path).at(path)?;
    Self::parse(&text).map_err(|key| Error::NotFound(format!("{} in {:?}", key, path)))
  }

  /// Fails with the name of the first missing key.
  pub fn parse(text: &str) -> std::result::Result<Self, &'static str> {
    let get = |key: &'static str| string_value(text, key).ok_or(key);
    Ok(BundleInfo {
      identifier:    get("CFBundleIdentifier")?,
      display_name:  get("CFBundleDisplayName").or_else(|_| get("CFBundleName"))?,
      version:       get("CFBundleVersion")?,
      short_version: get("CFBundleShortVersionString")?
    })
  }
}

fn key_pattern(key: &str) -> String {
  format!(r"<key>\s*{}\s*</key>\s*", regex::escape(key))
}

/// The `<string>` value following `key`.
pub fn string_value(text: &str, key: &str) -> Option<String> {
  let re = Regex::new(&format!(r"{}<string>([^<]*)</string>", key_pattern(key))).ok()?;
  re.captures(text).map(|c| unescape(&c[1]).into_owned())
}

fn unescape(s: &str) -> Cow<'_, str> {
  match s.contains('&') {
    false => Cow::Borrowed(s),
    true  => Cow::Owned(s.replace("&lt;", "<")
                         .replace("&gt;", ">")
                         .replace("&quot;", "\"")
                         .replace("&apos;", "'")
                         .replace("&amp;", "&"))
  }
}

fn escape(s: &str) -> String {
  s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Whitespace at the start of the line holding `pos`, or nothing when other
/// text precedes `pos` on that line.
fn indent_at(text: &str, pos: usize) -> &str {
  let start = text[.. pos].rfind('\n').map(|x| x + 1).unwrap_or(0);
  let line  = &text[start .. pos];
  match line.chars().all(char::is_whitespace) {
    true  => line,
    false => ""
  }
}

/// Appends `value` to the array under `key`, creating the key in the top
/// level dictionary when missing. Returns `None` when `value` is already
/// listed, and fails when `key` holds something other than an array or the
/// document has no dictionary to add it to.
pub fn add_to_list(text: &str, key: &str, value: &str)
                   -> std::result::Result<Option<String>, &'static str>
{
  let invalid = "invalid key";
  let item    = format!("<string>{}</string>", escape(value));

  let re = Regex::new(&format!(r"(?s){}(<array>(.*?)</array>|<array\s*/>)", key_pattern(key)))
    .map_err(|_| invalid)?;
  if let Some(c) = re.captures(text) {
    let whole = c.get(0).ok_or(invalid)?;
    let array = c.get(1).ok_or(invalid)?;
    let mut out = String::with_capacity(text.len() + item.len() + 16);

    match c.get(2) {
      Some(body) => {
        if body.as_str().contains(&item) {
          return Ok(None);
        }
        let close  = array.end() - "</array>".len();
        let indent = indent_at(text, close);
        match indent.is_empty() && !text[.. close].ends_with('\n') {
          true => {
            out.push_str(&text[.. close]);
            out.push_str(&item);
            out.push_str(&text[close ..]);
          },
          false => {
            let line = close - indent.len();
            out.push_str(&text[.. line]);
            out.push_str(indent);
            out.push('\t');
            out.push_str(&item);
            out.push('\n');
            out.push_str(&text[line ..]);
          }
        }
      },
      None => {
        let indent = indent_at(text, whole.start());
        out.push_str(&text[.. array.start()]);
        out.push_str(&format!("<array>\n{0}\t{1}\n{0}</array>", indent, item));
        out.push_str(&text[array.end() ..]);
      }
    }
    return Ok(Some(out));
  }

  let key_only = Regex::new(&key_pattern(key)).map_err(|_| invalid)?;
  if key_only.is_match(text) {
    return Err("the key does not hold an array");
  }

  let close = text.rfind("</dict>").ok_or("no top level dictionary")?;
  let line  = close - indent_at(text, close).len();
  let inner = format!("{}\t", indent_at(text, close));
  let mut out = String::with_capacity(text.len() + 128);
  out.push_str(&text[.. line]);
  out.push_str(&format!("{0}<key>{1}</key>\n{0}<array>\n{0}\t{2}\n{0}</array>\n",
                        inner, escape(key), item));
  out.push_str(&text[line ..]);
  Ok(Some(out))
}

/// Adds an application group to an entitlements file, creating the file if
/// needed. Returns whether the file changed.
pub fn add_entitlement(path: &Path, group: &str) -> Result<bool> {
  let text = match path.exists() {
    true  => fs::read_to_string(path).at(path)?,
    false => EMPTY_PLIST.to_string()
  };

  let patched = add_to_list(&text, APP_GROUPS, group)
    .map_err(|e| Error::config(path, format!("{}: {}", APP_GROUPS, e)))?;

  match patched {
    None      => {
      debug!("{} already lists {}", path.display(), group);
      Ok(false)
    },
    Some(out) => {
      if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).at(dir)?;
      }
      fs::write(path, out).at(path)?;
      debug!("Added {} to {}", group, path.display());
      Ok(true)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const GROUP: &str = "group.com.example.app.ShareExtension";

  const INFO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
	<key>CFBundleDisplayName</key>
	<string>Hello &amp; Cordova</string>
	<key>CFBundleIdentifier</key>
	<string>io.cordova.hellocordova</string>
	<key>CFBundleShortVersionString</key>
	<string>1.2.0</string>
	<key>CFBundleVersion</key>
	<string>120</string>
</dict>
</plist>
"#;

  const ENTITLEMENTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
	<key>com.apple.security.application-groups</key>
	<array>
		<string>group.com.example.other</string>
	</array>
</dict>
</plist>
"#;

  fn groups(text: &str) -> Vec<String> {
    let re = Regex::new(r"<string>([^<]*)</string>").unwrap();
    re.captures_iter(text).map(|c| c[1].to_string()).collect()
  }

  #[test]
  fn reads_bundle_info() {
    let info = BundleInfo::parse(INFO).unwrap();
    assert_eq!(info.identifier, "io.cordova.hellocordova");
    assert_eq!(info.display_name, "Hello & Cordova");
    assert_eq!(info.version, "120");
    assert_eq!(info.short_version, "1.2.0");

    let missing = INFO.replace("CFBundleVersion", "Other");
    assert_eq!(BundleInfo::parse(&missing), Err("CFBundleVersion"));
  }

  #[test]
  fn display_name_falls_back_to_bundle_name() {
    let text = INFO.replace("CFBundleDisplayName", "CFBundleName");
    assert_eq!(BundleInfo::parse(&text).unwrap().display_name, "Hello & Cordova");
  }

  #[test]
  fn appends_once() {
    let once = add_to_list(ENTITLEMENTS, APP_GROUPS, GROUP).unwrap().unwrap();
    assert_eq!(groups(&once), ["group.com.example.other", GROUP]);
    assert!(once.contains(&format!("\t\t<string>{}</string>\n\t</array>", GROUP)));
    assert_eq!(add_to_list(&once, APP_GROUPS, GROUP), Ok(None));
  }

  #[test]
  fn fills_empty_arrays() {
    let text = ENTITLEMENTS.replace("<array>\n\t\t<string>group.com.example.other</string>\n\t</array>", "<array/>");
    assert_eq!(groups(&add_to_list(&text, APP_GROUPS, GROUP).unwrap().unwrap()), [GROUP]);

    let text = ENTITLEMENTS.replace("\n\t\t<string>group.com.example.other</string>\n\t", "");
    assert_eq!(groups(&add_to_list(&text, APP_GROUPS, GROUP).unwrap().unwrap()), [GROUP]);
  }

  #[test]
  fn adds_the_key_when_missing() {
    let out = add_to_list(EMPTY_PLIST, APP_GROUPS, GROUP).unwrap().unwrap();
    assert_eq!(string_value(&out.replace("<array>", "").replace("</array>", ""), APP_GROUPS),
               Some(GROUP.to_string()));
    assert!(out.ends_with("</array>\n</dict>\n</plist>\n"));
  }

  #[test]
  fn rejects_keys_without_an_array() {
    let text = ENTITLEMENTS.replace(
      "<array>\n\t\t<string>group.com.example.other</string>\n\t</array>",
      "<string>group.com.example.other</string>");
    assert_eq!(add_to_list(&text, APP_GROUPS, GROUP), Err("the key does not hold an array"));

    let dir  = tempfile::tempdir().unwrap();
    let path = dir.path().join("Entitlements-Debug.plist");
    fs::write(&path, &text).unwrap();
    match add_entitlement(&path, GROUP) {
      Err(Error::Config { .. }) => {},
      other => panic!("expected a config error, got {:?}", other)
    }
    assert_eq!(fs::read_to_string(&path).unwrap(), text);
  }

  #[test]
  fn creates_missing_entitlements() {
    let dir  = tempfile::tempdir().unwrap();
    let path = dir.path().join("HelloCordova").join("Entitlements-Debug.plist");
    assert!(add_entitlement(&path, GROUP).unwrap());
    assert!(!add_entitlement(&path, GROUP).unwrap());
    assert_eq!(groups(&fs::read_to_string(&path).unwrap()), [GROUP]);
  }

  #[test]
  fn rejects_documents_without_a_dictionary() {
    let dir  = tempfile::tempdir().unwrap();
    let path = dir.path().join("Entitlements-Release.plist");
    fs::write(&path, "<plist version=\"1.0\"><array/></plist>").unwrap();
    match add_entitlement(&path, GROUP) {
      Err(Error::Config { .. }) => {},
      other => panic!("expected a config error, got {:?}", other)
    }
  }
}
