use clap::{App, ArgMatches};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AtPath, Error, Result};
use crate::pbx::Quoting;
use crate::share::settings::SigningStyle;

/// Prefix of every failure reported to the user.
pub const PLUGIN_ID: &str = "cordova-plugin-openwith";

pub const CONFIG_FILE: &str = "shareext.toml";

pub trait Command {
  fn init<'a, 'b>(&self, cmd: App<'a, 'b>) -> App<'a, 'b>;

  fn run(&self, ctx: &Context) -> RunResult;
}

pub type RunResult = Result<()>;

pub type Commands = BTreeMap<&'static str, Box<dyn Command>>;

pub struct Context<'a> {
  pub commands: Commands,
  pub project:  Project,

  pub env:    &'a Env,
  pub args:   &'a ArgMatches<'a>,
  pub config: &'a Config
}

impl<'a> Context<'a> {
  /// Arguments of the running subcommand.
  pub fn sub_args(&self) -> Option<&ArgMatches<'a>> {
    self.args.subcommand().1
  }
}

/// The Xcode project inside the iOS platform folder.
#[derive(Debug, PartialEq)]
pub struct Project {
  pub dir:  PathBuf,
  pub name: String
}

impl Project {
  /// Finds the first "*.xcodeproj" folder in `dir`.
  pub fn discover(dir: &Path) -> Result<Self> {
    let pattern = format!("{}/*.xcodeproj", glob::Pattern::escape(&dir.to_string_lossy()));
    let found = glob::glob(&pattern)
      .map_err(|e| Error::config(dir, e))?
      .filter_map(|x| x.ok())
      .find(|x| x.is_dir());

    let name = found.as_ref()
      .and_then(|x| x.file_stem())
      .and_then(|x| x.to_str())
      .ok_or_else(|| Error::NotFound(format!("an Xcode project in {:?}", dir)))?;

    Ok(Project {
      dir:  dir.to_path_buf(),
      name: name.to_string()
    })
  }

  pub fn pbxproj(&self) -> PathBuf {
    self.dir.join(format!("{}.xcodeproj", self.name)).join("project.pbxproj")
  }

  /// Folder of the application's own sources.
  pub fn app_dir(&self) -> PathBuf {
    self.dir.join(&self.name)
  }

  pub fn info_plist(&self) -> PathBuf {
    self.app_dir().join(format!("{}-Info.plist", self.name))
  }
}

/// Environment overrides, read with the "SHAREEXT_" prefix.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Env {
  pub code_sign_identity:     Option<String>,
  pub development_team:       Option<String>,
  pub provisioning_profile:   Option<String>,
  pub automatic_provisioning: Option<bool>,
  pub build_config:           Option<PathBuf>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct Config {
  pub min_version: String,
  pub extension:   ExtensionSettings,
  pub variables:   HashMap<String, String>
}

impl Config {
  /// Loads the configuration file. A missing file yields the defaults.
  pub fn load(path: &Path) -> Result<Self> {
    if !path.exists() {
      debug!("No config file at {:?}, using defaults", path);
      return Ok(Config::default());
    }

    let text = fs::read_to_string(path).at(path)?;
    let mut config: Config = toml::from_str(&text).map_err(|e| Error::config(path, e))?;

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    config.extension.templates = config.extension.templates.take().map(|x| dir.join(x));
    Ok(config)
  }

  pub fn variable(&self, name: &str) -> Result<&str> {
    self.variables.get(name)
      .map(String::as_str)
      .ok_or_else(|| Error::NotFound(format!("the \"{}\" plugin variable", name)))
  }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct ExtensionSettings {
  pub target:        String,
  pub group:         String,
  pub parent_group:  String,
  pub bundle_suffix: String,
  pub product_type:  String,
  pub quoting:       Quoting,

  /// Folder of template files copied into the extension's group folder.
  pub templates: Option<PathBuf>,

  /// Build settings copied from the application target.
  pub copy_settings: Vec<String>,

  /// Entitlement files, relative to the application folder.
  pub entitlements: Vec<String>
}

impl Default for ExtensionSettings {
  fn default() -> Self {
    let strings = |x: &[&str]| x.iter().map(|s| s.to_string()).collect();
    ExtensionSettings {
      target:        "ShareExtension".to_string(),
      group:         "ShareExtension".to_string(),
      parent_group:  "CustomTemplate".to_string(),
      bundle_suffix: ".ShareExtension".to_string(),
      product_type:  "com.apple.product-type.app-extension".to_string(),
      quoting:       Quoting::default(),
      templates:     None,
      copy_settings: strings(&["IPHONEOS_DEPLOYMENT_TARGET",
                               "TARGETED_DEVICE_FAMILY",
                               "DEVELOPMENT_TEAM",
                               "CODE_SIGN_IDENTITY"]),
      entitlements:  strings(&["Entitlements-Debug.plist",
                               "Entitlements-Release.plist"])
    }
  }
}

/// Signing options for the build, from the command line, the environment
/// and the build configuration file, in that order of precedence.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
  pub code_sign_identity:     Option<String>,
  pub provisioning_profile:   Option<String>,
  pub development_team:       Option<String>,
  pub automatic_provisioning: Option<bool>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BuildConfigFile {
  ios: Option<BuildVariants>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BuildVariants {
  debug:   Option<BuildOptions>,
  release: Option<BuildOptions>
}

impl BuildOptions {
  pub fn from_env(env: &Env) -> Self {
    BuildOptions {
      code_sign_identity:     env.code_sign_identity.clone(),
      provisioning_profile:   env.provisioning_profile.clone(),
      development_team:       env.development_team.clone(),
      automatic_provisioning: env.automatic_provisioning
    }
  }

  /// Reads the "ios" variant of a build configuration file.
  pub fn from_file(path: &Path, release: bool) -> Result<Self> {
    if !path.exists() {
      return Err(Error::NotFound(format!("the build config file {:?}", path)));
    }

    let text = fs::read_to_string(path).at(path)?;
    let file: BuildConfigFile = serde_json::from_str(&text).map_err(|e| Error::config(path, e))?;

    let variant = file.ios.and_then(|x| match release {
      true  => x.release,
      false => x.debug
    });
    Ok(variant.unwrap_or_default())
  }

  pub fn resolve(cli: BuildOptions, env: &Env, file: Option<&Path>, release: bool) -> Result<Self> {
    let file = match file {
      Some(path) => Self::from_file(path, release)?,
      None       => BuildOptions::default()
    };
    Ok(cli.merge(Self::from_env(env)).merge(file))
  }

  /// Fills the options missing here from `o`.
  pub fn merge(self, o: BuildOptions) -> Self {
    BuildOptions {
      code_sign_identity:     self.code_sign_identity.or(o.code_sign_identity),
      provisioning_profile:   self.provisioning_profile.or(o.provisioning_profile),
      development_team:       self.development_team.or(o.development_team),
      automatic_provisioning: self.automatic_provisioning.or(o.automatic_provisioning)
    }
  }

  pub fn signing_style(&self) -> Option<SigningStyle> {
    if self.provisioning_profile.is_some() {
      Some(SigningStyle::Manual)
    }
    else if self.automatic_provisioning == Some(true) {
      Some(SigningStyle::Automatic)
    }
    else {
      None
    }
  }
}
