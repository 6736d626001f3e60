use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cfg::Layout;
use crate::installer::{InstallEntry, Placeholders};

/// Literal token replaced with the project name in substituted templates.
/// Case-sensitive, no nested expansion.
pub const PROJECT_NAME_TOKEN: &str = "<project-name>";

/// Accepted source names for the global CLAUDE.md (template name varies
/// between toolkit versions).
const GLOBAL_CLAUDE_SOURCES: &[&str] = &["CLAUDE.global-template.md", "CLAUDE.md"];

pub const PROJECT_CLAUDE_TEMPLATE: &str = "CLAUDE.project-template.md";
pub const MCP_TEMPLATE: &str = ".mcp.json.template";

/// Planned entries plus the optional sources that were absent from the
/// toolkit (reported as warnings, not errors).
#[derive(Debug)]
pub struct GlobalManifest {
    pub entries: Vec<InstallEntry>,
    pub missing: Vec<String>,
}

#[derive(Debug)]
pub struct ProjectManifest {
    pub entries: Vec<InstallEntry>,
    pub placeholders: Placeholders,
    pub missing: Vec<String>,
}

/// True when `dir` looks like a toolkit root.
pub fn is_toolkit_dir(dir: &Path) -> bool {
    dir.join("agents").is_dir() && dir.join("templates").is_dir()
}

/// Locate the toolkit root: the directory holding `agents/` and `templates/`.
/// Checked next to the running executable first, then the current directory.
pub fn detect_source_dir() -> Result<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.to_path_buf());
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd);
    }

    for dir in candidates {
        if is_toolkit_dir(&dir) {
            return Ok(dir);
        }
    }

    bail!(
        "Cannot find toolkit files (agents/ and templates/ directories); \
         run from inside the toolkit directory or pass --from /path/to/toolkit"
    )
}

/// Build the manifest for `init-globals`: the global CLAUDE.md, every agent
/// definition, and every template file, in deterministic sorted order.
pub fn global_entries(source_dir: &Path, layout: &Layout) -> GlobalManifest {
    let mut entries = Vec::new();
    let mut missing = Vec::new();

    match GLOBAL_CLAUDE_SOURCES
        .iter()
        .map(|name| source_dir.join(name))
        .find(|path| path.exists())
    {
        Some(src) => {
            let dest = layout.claude_md();
            let label = layout.label(&dest);
            entries.push(InstallEntry::new(src, dest, label));
        }
        None => missing.push("CLAUDE.md source".to_string()),
    }

    for src in files_in(&source_dir.join("agents")) {
        if src.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let Some(name) = src.file_name() else { continue };
        let dest = layout.agents_dir().join(name);
        let label = layout.label(&dest);
        entries.push(InstallEntry::new(src, dest, label));
    }

    for src in files_in(&source_dir.join("templates")) {
        let Some(name) = src.file_name() else { continue };
        let dest = layout.templates_dir().join(name);
        let label = layout.label(&dest);
        entries.push(InstallEntry::new(src, dest, label));
    }

    GlobalManifest { entries, missing }
}

/// Build the manifest for `init-project`, scaffolding from the installed
/// templates into `project_dir`.
pub fn project_entries(
    layout: &Layout,
    project_dir: &Path,
    project_name: &str,
    collection: Option<&str>,
    no_mcp: bool,
) -> ProjectManifest {
    let templates = layout.templates_dir();
    let mut entries = Vec::new();
    let mut missing = Vec::new();

    let mut placeholders = Placeholders::new();
    placeholders.insert(PROJECT_NAME_TOKEN.to_string(), project_name.to_string());

    let mut plan = |template: &str, dest: PathBuf, label: &str, substitute: bool| {
        let src = templates.join(template);
        if src.exists() {
            let entry = InstallEntry::new(src, dest, label);
            entries.push(if substitute { entry.substituting() } else { entry });
        } else {
            missing.push(format!("templates/{template}"));
        }
    };

    plan(
        PROJECT_CLAUDE_TEMPLATE,
        project_dir.join("CLAUDE.md"),
        "CLAUDE.md",
        true,
    );
    plan(
        "CONVENTIONS.md",
        project_dir.join("CONVENTIONS.md"),
        "CONVENTIONS.md",
        false,
    );
    plan(
        "session-notes.md",
        project_dir.join("docs").join("session-notes.md"),
        "docs/session-notes.md",
        false,
    );
    plan(
        "settings.json",
        project_dir.join(".claude").join("settings.json"),
        ".claude/settings.json",
        false,
    );
    plan(
        "settings.local.json",
        project_dir.join(".claude").join("settings.local.json"),
        ".claude/settings.local.json",
        false,
    );
    if !no_mcp {
        let src = templates.join(MCP_TEMPLATE);
        if src.exists() {
            let entry = InstallEntry::new(src, project_dir.join(".mcp.json"), ".mcp.json");
            // The collection tokens are scoped to the mcp template; they
            // never apply to the other rendered files. Without --collection
            // the template is copied verbatim so the user can fill in the
            // collection name themselves.
            let entry = match collection {
                Some(collection) => {
                    let mut mcp = Placeholders::new();
                    mcp.insert("your-collection-name".to_string(), collection.to_string());
                    mcp.insert(
                        "project-search".to_string(),
                        format!("{project_name}-search"),
                    );
                    entry.substituting().with_placeholders(mcp)
                }
                None => entry,
            };
            entries.push(entry);
        } else {
            missing.push(format!("templates/{MCP_TEMPLATE}"));
        }
    }

    ProjectManifest {
        entries,
        placeholders,
        missing,
    }
}

/// Regular files directly inside `dir`, sorted for reproducible output.
fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn toolkit(tmp: &TempDir) -> PathBuf {
        let root = tmp.path().join("toolkit");
        fs::create_dir_all(root.join("agents")).unwrap();
        fs::create_dir_all(root.join("templates")).unwrap();
        fs::write(root.join("CLAUDE.global-template.md"), "# Global").unwrap();
        fs::write(root.join("agents/architect.md"), "# Architect").unwrap();
        fs::write(root.join("agents/developer.md"), "# Developer").unwrap();
        fs::write(root.join("agents/notes.txt"), "not an agent").unwrap();
        fs::write(
            root.join("templates").join(PROJECT_CLAUDE_TEMPLATE),
            "# <project-name>",
        )
        .unwrap();
        fs::write(root.join("templates/CONVENTIONS.md"), "rules").unwrap();
        fs::write(root.join("templates/session-notes.md"), "notes").unwrap();
        fs::write(root.join("templates/settings.json"), "{}").unwrap();
        fs::write(root.join("templates/settings.local.json"), "{}").unwrap();
        fs::write(
            root.join("templates").join(MCP_TEMPLATE),
            "{\"collection\": \"your-collection-name\"}",
        )
        .unwrap();
        root
    }

    #[test]
    fn test_toolkit_detection() {
        let tmp = TempDir::new().unwrap();
        let root = toolkit(&tmp);
        assert!(is_toolkit_dir(&root));
        assert!(!is_toolkit_dir(tmp.path()));
    }

    #[test]
    fn test_global_entries_cover_toolkit() {
        let tmp = TempDir::new().unwrap();
        let root = toolkit(&tmp);
        let layout = Layout::new(tmp.path().join("claude"));

        let built = global_entries(&root, &layout);
        assert!(built.missing.is_empty());

        let dests: Vec<PathBuf> = built.entries.iter().map(|e| e.destination.clone()).collect();
        assert_eq!(dests[0], layout.claude_md());
        assert!(dests.contains(&layout.agents_dir().join("architect.md")));
        assert!(dests.contains(&layout.agents_dir().join("developer.md")));
        // Non-markdown files in agents/ are not agents.
        assert!(!dests.iter().any(|d| d.ends_with("agents/notes.txt")));
        assert!(dests.contains(&layout.templates_dir().join("settings.json")));
        assert!(dests.contains(&layout.templates_dir().join(MCP_TEMPLATE)));
        // No substitution during the global install.
        assert!(built.entries.iter().all(|e| !e.substitute));
    }

    #[test]
    fn test_global_entries_order_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let root = toolkit(&tmp);
        let layout = Layout::new(tmp.path().join("claude"));

        let a = global_entries(&root, &layout);
        let b = global_entries(&root, &layout);
        let labels = |m: &GlobalManifest| m.entries.iter().map(|e| e.label.clone()).collect::<Vec<_>>();
        assert_eq!(labels(&a), labels(&b));
    }

    #[test]
    fn test_global_entries_missing_claude_source() {
        let tmp = TempDir::new().unwrap();
        let root = toolkit(&tmp);
        fs::remove_file(root.join("CLAUDE.global-template.md")).unwrap();
        let layout = Layout::new(tmp.path().join("claude"));

        let built = global_entries(&root, &layout);
        assert_eq!(built.missing, vec!["CLAUDE.md source".to_string()]);
        assert!(!built.entries.iter().any(|e| e.destination == layout.claude_md()));
    }

    #[test]
    fn test_project_entries_layout() {
        let tmp = TempDir::new().unwrap();
        let root = toolkit(&tmp);
        // Project scaffolding reads from the installed templates dir.
        let layout = Layout::new(&root);
        let project = tmp.path().join("myproj");

        let built = project_entries(&layout, &project, "demo", None, false);
        assert!(built.missing.is_empty());

        let labels: Vec<&str> = built.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "CLAUDE.md",
                "CONVENTIONS.md",
                "docs/session-notes.md",
                ".claude/settings.json",
                ".claude/settings.local.json",
                ".mcp.json",
            ]
        );

        // Only CLAUDE.md is rendered when no collection is given.
        let claude = &built.entries[0];
        assert!(claude.substitute);
        assert!(built.entries[1..].iter().all(|e| !e.substitute));
        assert_eq!(
            built.placeholders.get(PROJECT_NAME_TOKEN),
            Some(&"demo".to_string())
        );
    }

    #[test]
    fn test_project_entries_with_collection_render_mcp() {
        let tmp = TempDir::new().unwrap();
        let root = toolkit(&tmp);
        let layout = Layout::new(&root);

        let built = project_entries(&layout, tmp.path(), "demo", Some("demo-docs"), false);
        let mcp = built
            .entries
            .iter()
            .find(|e| e.label == ".mcp.json")
            .unwrap();
        assert!(mcp.substitute);

        // Collection tokens live on the mcp entry only, never in the shared
        // map where they would leak into CLAUDE.md.
        let scoped = mcp.placeholders.as_ref().unwrap();
        assert_eq!(
            scoped.get("your-collection-name"),
            Some(&"demo-docs".to_string())
        );
        assert_eq!(
            scoped.get("project-search"),
            Some(&"demo-search".to_string())
        );
        assert!(!built.placeholders.contains_key("your-collection-name"));
        assert!(!built.placeholders.contains_key("project-search"));

        let claude = built.entries.iter().find(|e| e.label == "CLAUDE.md").unwrap();
        assert!(claude.placeholders.is_none());
    }

    #[test]
    fn test_project_entries_no_mcp() {
        let tmp = TempDir::new().unwrap();
        let root = toolkit(&tmp);
        let layout = Layout::new(&root);

        let built = project_entries(&layout, tmp.path(), "demo", None, true);
        assert!(!built.entries.iter().any(|e| e.label == ".mcp.json"));
    }

    #[test]
    fn test_project_entries_report_missing_templates() {
        let tmp = TempDir::new().unwrap();
        let root = toolkit(&tmp);
        fs::remove_file(root.join("templates/CONVENTIONS.md")).unwrap();
        let layout = Layout::new(&root);

        let built = project_entries(&layout, tmp.path(), "demo", None, false);
        assert!(built
            .missing
            .contains(&"templates/CONVENTIONS.md".to_string()));
        assert!(!built.entries.iter().any(|e| e.label == "CONVENTIONS.md"));
    }
}
