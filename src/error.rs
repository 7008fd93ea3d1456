use semver::Version;
use std::path::{Path, PathBuf};

use crate::pbx::SyntaxError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The project descriptor exists but could not be parsed.
  #[error("Failed to parse project file ({path:?}): {source}")]
  Parse {
    path:   PathBuf,
    source: SyntaxError
  },

  #[error("Couldn't find {0}")]
  NotFound(String),

  /// The group expected to hold the extension group is not in the project.
  #[error("Couldn't find the \"{0}\" group to attach the extension group to")]
  MissingParentGroup(String),

  #[error("I/O error ({path:?}): {source}")]
  Io {
    path:   PathBuf,
    source: std::io::Error
  },

  #[error("Invalid configuration ({path:?}): {message}")]
  Config {
    path:    PathBuf,
    message: String
  },

  #[error("Project does not support this version: expected {expected} but running {current}")]
  Version {
    expected: Version,
    current:  Version
  },

  #[error("Project file has {0} dangling reference(s)")]
  Integrity(usize)
}

/// Attaches the offending path to I/O failures.
pub trait AtPath<T> {
  fn at<P: AsRef<Path>>(self, path: P) -> Result<T>;
}

impl<T> AtPath<T> for std::io::Result<T> {
  fn at<P: AsRef<Path>>(self, path: P) -> Result<T> {
    self.map_err(|source| Error::Io { path: path.as_ref().to_path_buf(), source })
  }
}

impl Error {
  pub fn config<P: AsRef<Path>, S: ToString>(path: P, message: S) -> Self {
    Error::Config {
      path:    path.as_ref().to_path_buf(),
      message: message.to_string()
    }
  }
}
