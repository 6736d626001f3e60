use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Where the global toolkit lives. Everything hangs off one root so tests
/// (and the `--claude-dir` flag) can point it at any directory.
#[derive(Debug, Clone)]
pub struct Layout {
    pub claude_dir: PathBuf,
}

impl Layout {
    pub fn new(claude_dir: impl Into<PathBuf>) -> Self {
        Layout {
            claude_dir: claude_dir.into(),
        }
    }

    /// Default root: `~/.claude`.
    pub fn default_root() -> Result<Self> {
        let home = dirs::home_dir().context("Failed to find home directory")?;
        Ok(Layout::new(home.join(".claude")))
    }

    pub fn claude_md(&self) -> PathBuf {
        self.claude_dir.join("CLAUDE.md")
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.claude_dir.join("agents")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.claude_dir.join("templates")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.claude_dir.join("bin")
    }

    /// Display label for a path under the root, e.g. `~/.claude/agents/x.md`.
    /// Paths outside the root are shown as-is.
    pub fn label(&self, path: &Path) -> String {
        match path.strip_prefix(&self.claude_dir) {
            Ok(rel) => format!("{}/{}", self.display_root(), rel.display()),
            Err(_) => path.display().to_string(),
        }
    }

    fn display_root(&self) -> String {
        dirs::home_dir()
            .and_then(|home| {
                self.claude_dir
                    .strip_prefix(&home)
                    .ok()
                    .map(|rel| format!("~/{}", rel.display()))
            })
            .unwrap_or_else(|| self.claude_dir.display().to_string())
    }
}
