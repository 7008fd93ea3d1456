use clap::{App, Arg, ArgMatches};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::assets;
use crate::ctx::{BuildOptions, Command, Config, Context, Project, RunResult};
use crate::error::Result;
use crate::pbx::Id;
use crate::plist::{self, BundleInfo};
use crate::share::{self, Request};

pub struct Add;

impl Command for Add {
  fn init<'a, 'b>(&self, cmd: App<'a, 'b>) -> App<'a, 'b> {
    cmd.about("Adds the share extension to the Xcode project")
      .arg(Arg::with_name("release")
           .long("release")
           .help("Use the release variant of the build configuration"))
      .arg(Arg::with_name("build-config")
           .long("build-config")
           .value_name("FILE")
           .help("Build configuration file with the signing options")
           .takes_value(true))
      .arg(Arg::with_name("code-sign-identity")
           .long("code-sign-identity")
           .value_name("ID")
           .takes_value(true))
      .arg(Arg::with_name("provisioning-profile")
           .long("provisioning-profile")
           .value_name("UUID")
           .takes_value(true))
      .arg(Arg::with_name("development-team")
           .long("development-team")
           .value_name("TEAM")
           .takes_value(true))
      .arg(Arg::with_name("automatic-provisioning")
           .long("automatic-provisioning")
           .help("Let Xcode manage the signing of the extension"))
  }

  fn run(&self, ctx: &Context) -> RunResult {
    let args    = ctx.sub_args();
    let release = args.map(|x| x.is_present("release")).unwrap_or(false);
    let file    = args.and_then(|x| x.value_of("build-config")).map(PathBuf::from)
      .or_else(|| ctx.env.build_config.clone());

    let options = BuildOptions::resolve(cli_options(args), ctx.env, file.as_deref(), release)?;
    debug!(?options, "Resolved build options");

    install(&ctx.project, ctx.config, &options)?;
    Ok(())
  }
}

/// Copies the extension's files and patches the entitlements once the
/// project has loaded, then links everything into it.
fn install(project: &Project, config: &Config, options: &BuildOptions) -> Result<Id> {
  let settings = &config.extension;
  let info     = BundleInfo::load(&project.info_plist())?;
  let request  = Request { settings, options, project_dir: &project.dir };

  share::add(&project.pbxproj(), &request, || {
    let dest  = project.dir.join(&settings.group);
    let files = match &settings.templates {
      Some(src) => {
        let subs = assets::substitutions(&info, config, &settings.bundle_suffix)?;
        assets::copy_templates(src, &dest, &subs)?
      },
      None => assets::list_files(&dest)?
    };
    info!("Copied {} extension files to {:?}", files.len(), dest);

    let group = format!("group.{}{}", info.identifier, settings.bundle_suffix);
    for name in &settings.entitlements {
      let path = project.app_dir().join(name);
      if plist::add_entitlement(&path, &group)? {
        info!("Added {} to {:?}", group, path);
      }
    }
    Ok(relative_to(&files, &project.dir))
  })
}

fn cli_options(args: Option<&ArgMatches>) -> BuildOptions {
  let value = |name: &str| args.and_then(|x| x.value_of(name)).map(String::from);
  BuildOptions {
    code_sign_identity:     value("code-sign-identity"),
    provisioning_profile:   value("provisioning-profile"),
    development_team:       value("development-team"),
    automatic_provisioning: args.filter(|x| x.is_present("automatic-provisioning")).map(|_| true)
  }
}

fn relative_to(files: &[PathBuf], dir: &Path) -> Vec<PathBuf> {
  files.iter()
    .map(|x| pathdiff::diff_paths(x, dir).unwrap_or_else(|| x.clone()))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::Error;
  use crate::pbx::{ProjectGraph, Quoting, FIXTURE};
  use crate::share::target;
  use std::fs;

  const INFO: &str = concat!(
    "<plist version=\"1.0\">\n<dict>\n",
    "<key>CFBundleDisplayName</key>\n<string>Hello</string>\n",
    "<key>CFBundleIdentifier</key>\n<string>io.cordova.hellocordova</string>\n",
    "<key>CFBundleShortVersionString</key>\n<string>1.2.0</string>\n",
    "<key>CFBundleVersion</key>\n<string>120</string>\n",
    "</dict>\n</plist>\n");

  const ENTITLEMENTS: &str = "<plist version=\"1.0\">\n<dict>\n</dict>\n</plist>\n";

  /// Lays out a platform folder with the given project file and returns it
  /// with a configuration pointing at its templates.
  fn platform(dir: &Path, pbxproj: &str) -> (Project, Config) {
    let proj = dir.join("HelloCordova.xcodeproj");
    let app  = dir.join("HelloCordova");
    let tmpl = dir.join("templates");
    for x in &[&proj, &app, &tmpl] {
      fs::create_dir_all(x).unwrap();
    }
    fs::write(proj.join("project.pbxproj"), pbxproj).unwrap();
    fs::write(app.join("HelloCordova-Info.plist"), INFO).unwrap();
    fs::write(app.join("Entitlements-Debug.plist"), ENTITLEMENTS).unwrap();
    fs::write(tmpl.join("ShareViewController.m"), "// __BUNDLE_IDENTIFIER__\n").unwrap();
    fs::write(tmpl.join("ShareExtension-Info.plist"), "<string>__DISPLAY_NAME__</string>").unwrap();

    let mut config = Config::default();
    config.extension.templates = Some(tmpl);
    config.variables.insert("IOS_URL_SCHEME".to_string(), "hello".to_string());
    config.variables.insert("IOS_UNIFORM_TYPE_IDENTIFIER".to_string(), "public.image".to_string());

    let project = Project { dir: dir.to_path_buf(), name: "HelloCordova".to_string() };
    (project, config)
  }

  #[test]
  fn installs_files_entitlements_and_target() {
    let dir = tempfile::tempdir().unwrap();
    let (project, config) = platform(dir.path(), FIXTURE);

    install(&project, &config, &BuildOptions::default()).unwrap();

    let copied = fs::read_to_string(dir.path().join("ShareExtension").join("ShareViewController.m")).unwrap();
    assert_eq!(copied, "// io.cordova.hellocordova.ShareExtension\n");

    let group = "<string>group.io.cordova.hellocordova.ShareExtension</string>";
    for name in &["Entitlements-Debug.plist", "Entitlements-Release.plist"] {
      let text = fs::read_to_string(project.app_dir().join(name)).unwrap();
      assert!(text.contains(group), "{} lacks the app group", name);
    }

    let graph = ProjectGraph::load(&project.pbxproj()).unwrap();
    assert!(target::find_target(&graph, "ShareExtension", Quoting::Always).is_some());
  }

  #[test]
  fn malformed_project_changes_nothing() {
    let dir  = tempfile::tempdir().unwrap();
    let text = FIXTURE.replacen("objects = {", "objects = (", 1);
    let (project, config) = platform(dir.path(), &text);

    match install(&project, &config, &BuildOptions::default()) {
      Err(Error::Parse { .. }) => {},
      other => panic!("expected a parse error, got {:?}", other)
    }

    assert_eq!(fs::read_to_string(project.app_dir().join("Entitlements-Debug.plist")).unwrap(), ENTITLEMENTS);
    assert!(!project.app_dir().join("Entitlements-Release.plist").exists());
    assert!(!dir.path().join("ShareExtension").exists());
    assert_eq!(fs::read_to_string(project.pbxproj()).unwrap(), text);
  }

  #[test]
  fn files_are_made_project_relative() {
    let dir   = Path::new("/work/platforms/ios");
    let files = [dir.join("ShareExtension").join("ShareViewController.m")];
    assert_eq!(relative_to(&files, dir), [Path::new("ShareExtension/ShareViewController.m")]);
  }

  #[test]
  fn missing_arguments_leave_options_unset() {
    assert_eq!(cli_options(None), BuildOptions::default());
  }
}
