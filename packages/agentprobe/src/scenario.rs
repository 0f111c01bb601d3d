//! Scenario files: plain-text task prompts stored as
//! `<dir>/<tool>/<name>.txt`.

use std::ffi::OsStr;
use std::fs::read_to_string;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};
use tap::Tap;
use walkdir::WalkDir;

const EXTENSION: &str = "txt";

#[derive(Debug, Display, Error)]
pub enum ScenarioError {
    #[display("scenario {tool}/{name} not found at {}", path.display())]
    NotFound { tool: String, name: String, path: PathBuf },

    #[display("read scenario {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[display("scenario {} is empty", path.display())]
    Empty { path: PathBuf },
}

/// Identifies a scenario within a [`Scenarios`] directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("{tool}/{name}")]
pub struct ScenarioId {
    pub tool: String,
    pub name: String,
}

/// A directory of scenarios, grouped by tool.
#[derive(Debug, Clone)]
pub struct Scenarios {
    root: PathBuf,
}

impl Scenarios {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file a scenario is stored in.
    pub fn path(&self, tool: &str, name: &str) -> PathBuf {
        self.root.join(tool).join(format!("{name}.{EXTENSION}"))
    }

    /// Load the text of a scenario.
    #[tracing::instrument(skip(self), fields(root = ?self.root))]
    pub fn load(&self, tool: &str, name: &str) -> Result<String, ScenarioError> {
        let path = self.path(tool, name);
        let content = match read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ScenarioError::NotFound {
                    tool: tool.to_string(),
                    name: name.to_string(),
                    path,
                });
            }
            Err(e) => {
                return Err(ScenarioError::Read {
                    path,
                    message: e.to_string(),
                });
            }
        };

        let text = content.trim();
        if text.is_empty() {
            return Err(ScenarioError::Empty { path });
        }
        Ok(text.to_string())
    }

    /// List scenarios, optionally only those for one tool, sorted by id.
    #[tracing::instrument(skip(self), fields(root = ?self.root))]
    pub fn list(&self, tool: Option<&str>) -> Vec<ScenarioId> {
        let root = match tool {
            Some(tool) => self.root.join(tool),
            None => self.root.clone(),
        };
        if !root.is_dir() {
            return vec![];
        }

        let mut ids = Vec::new();
        for entry in WalkDir::new(&root).min_depth(1).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::warn!(?error, ?root, "walking scenario directory");
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || path.extension() != Some(OsStr::new(EXTENSION)) {
                continue;
            }
            if let Some(id) = self.id_of(path) {
                ids.push(id);
            }
        }

        ids.tap_mut(|ids| ids.sort())
            .tap(|ids| tracing::debug!(count = ids.len(), "listed scenarios"))
    }

    /// The id of a scenario file, if it sits directly in a tool directory.
    fn id_of(&self, path: &Path) -> Option<ScenarioId> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut components = relative.components();
        let tool = components.next()?.as_os_str().to_str()?;
        let file = Path::new(components.next()?.as_os_str());
        if components.next().is_some() {
            return None;
        }
        Some(ScenarioId {
            tool: tool.to_string(),
            name: file.file_stem()?.to_str()?.to_string(),
        })
    }
}
