use crate::config::schema::{EditScript, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

/// Where a script came from, for messages.
struct Origin<'a>(Option<&'a Path>);

impl fmt::Display for Origin<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(path) => write!(f, "{}", path.display()),
            None => f.write_str("<inline script>"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "{}: cannot read edit script: {source}", path.display())
            }
            ConfigError::Toml { path, source } => {
                let origin = Origin(path.as_deref());
                write!(f, "{origin}: not a valid edit script: {}", source.to_string().trim_end())
            }
            ConfigError::Validation { path, source } => {
                let origin = Origin(path.as_deref());
                write!(f, "{origin}: edit script rejected: {source}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

fn parse_script(contents: &str, path: Option<&Path>) -> Result<EditScript, ConfigError> {
    let owned = || path.map(Path::to_path_buf);
    let script: EditScript = toml_edit::de::from_str(contents)
        .map_err(|source| ConfigError::Toml { path: owned(), source })?;
    script
        .validate()
        .map_err(|source| ConfigError::Validation { path: owned(), source })?;
    log::debug!(
        "{}: {} edit(s), {} namespace binding(s)",
        Origin(path),
        script.edits.len(),
        script.namespaces.len()
    );
    Ok(script)
}

pub fn load_from_str(input: &str) -> Result<EditScript, ConfigError> {
    parse_script(input, None)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<EditScript, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&contents, Some(path))
}
