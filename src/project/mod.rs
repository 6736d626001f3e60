use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cfg::Layout;

/// Kept out of version control: holds personal permission grants.
pub const GITIGNORE_ENTRY: &str = ".claude/settings.local.json";

/// True when the project's .gitignore already lists the local settings file.
pub fn gitignore_has_entry(project_dir: &Path) -> bool {
    fs::read_to_string(project_dir.join(".gitignore"))
        .map(|content| content.lines().any(|line| line.trim() == GITIGNORE_ENTRY))
        .unwrap_or(false)
}

/// Append the local settings entry to .gitignore if absent. Append-only:
/// existing content is never rewritten. Returns true when an entry was added.
pub fn ensure_gitignore_entry(project_dir: &Path) -> Result<bool> {
    if gitignore_has_entry(project_dir) {
        return Ok(false);
    }

    let path = project_dir.join(".gitignore");
    let needs_gap = fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    if needs_gap {
        writeln!(file).context("Failed to update .gitignore")?;
    }
    writeln!(file, "# Claude Code personal settings").context("Failed to update .gitignore")?;
    writeln!(file, "{GITIGNORE_ENTRY}").context("Failed to update .gitignore")?;

    Ok(true)
}

/// A rendered .mcp.json should still parse; substitution mistakes show up
/// here.
pub fn mcp_json_is_valid(path: &Path) -> bool {
    fs::read_to_string(path)
        .ok()
        .map(|content| serde_json::from_str::<serde_json::Value>(&content).is_ok())
        .unwrap_or(false)
}

/// Copy the running executable into `<claude_dir>/bin/claude-init`. Always
/// updated: no prompt, no backup.
pub fn self_install(layout: &Layout) -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    let bin_dir = layout.bin_dir();
    let dest = bin_dir.join("claude-init");

    if exe == dest {
        return Ok(dest);
    }

    fs::create_dir_all(&bin_dir)
        .with_context(|| format!("Failed to create {}", bin_dir.display()))?;
    fs::copy(&exe, &dest)
        .with_context(|| format!("Failed to install {}", dest.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("Failed to set permissions on {}", dest.display()))?;
    }

    Ok(dest)
}

/// True when `bin_dir` is already on `$PATH`.
pub fn bin_on_path(bin_dir: &Path) -> bool {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).any(|dir| dir == bin_dir))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_gitignore_created_when_absent() {
        let tmp = TempDir::new().unwrap();
        assert!(ensure_gitignore_entry(tmp.path()).unwrap());

        let content = fs::read_to_string(tmp.path().join(".gitignore")).unwrap();
        assert!(content.contains(GITIGNORE_ENTRY));
        assert!(gitignore_has_entry(tmp.path()));
    }

    #[test]
    fn test_gitignore_append_preserves_existing_content() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "target/\n*.log").unwrap();

        assert!(ensure_gitignore_entry(tmp.path()).unwrap());
        let content = fs::read_to_string(tmp.path().join(".gitignore")).unwrap();
        assert!(content.starts_with("target/\n*.log"));
        assert!(content.contains(GITIGNORE_ENTRY));
    }

    #[test]
    fn test_gitignore_entry_added_once() {
        let tmp = TempDir::new().unwrap();
        assert!(ensure_gitignore_entry(tmp.path()).unwrap());
        assert!(!ensure_gitignore_entry(tmp.path()).unwrap());

        let content = fs::read_to_string(tmp.path().join(".gitignore")).unwrap();
        assert_eq!(content.matches(GITIGNORE_ENTRY).count(), 1);
    }

    #[test]
    fn test_mcp_json_validity() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good.json");
        let bad = tmp.path().join("bad.json");
        fs::write(&good, "{\"mcpServers\": {}}").unwrap();
        fs::write(&bad, "{\"mcpServers\": ").unwrap();

        assert!(mcp_json_is_valid(&good));
        assert!(!mcp_json_is_valid(&bad));
        assert!(!mcp_json_is_valid(&tmp.path().join("missing.json")));
    }

    #[test]
    fn test_bin_on_path() {
        let tmp = TempDir::new().unwrap();
        assert!(!bin_on_path(&tmp.path().join("bin")));
    }
}
