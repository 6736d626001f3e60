use chrono::Local;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One planned file operation: copy (or render) `source` into `destination`.
#[derive(Debug, Clone)]
pub struct InstallEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Short name shown in console output (e.g. ".claude/settings.json").
    pub label: String,
    /// Apply placeholder substitution instead of a byte-for-byte copy.
    pub substitute: bool,
    /// When set, rendered with these placeholders instead of the run-wide
    /// map. Lets a manifest scope tokens to a single template.
    pub placeholders: Option<Placeholders>,
}

impl InstallEntry {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        label: impl Into<String>,
    ) -> Self {
        InstallEntry {
            source: source.into(),
            destination: destination.into(),
            label: label.into(),
            substitute: false,
            placeholders: None,
        }
    }

    /// Mark this entry for placeholder substitution.
    pub fn substituting(mut self) -> Self {
        self.substitute = true;
        self
    }

    /// Render this entry with its own placeholder map, ignoring the
    /// run-wide one.
    pub fn with_placeholders(mut self, placeholders: Placeholders) -> Self {
        self.placeholders = Some(placeholders);
        self
    }

    /// True when the destination already exists on disk.
    pub fn conflicts(&self) -> bool {
        self.destination.exists()
    }
}

/// Literal token -> replacement value. Applied in map order; replacement is a
/// plain text substitution with no recursive expansion.
pub type Placeholders = BTreeMap<String, String>;

/// Decision for a single conflicting entry. `Overwrite` always backs up the
/// existing destination before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Skip,
    Overwrite,
}

/// Run-wide conflict policy. Interactive per-file prompting is not a third
/// variant: callers supply their own decision callback to [`install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    Skip,
    ForceWithBackup,
}

impl ConflictPolicy {
    pub fn resolve(self, _entry: &InstallEntry) -> Resolution {
        match self {
            ConflictPolicy::Skip => Resolution::Skip,
            ConflictPolicy::ForceWithBackup => Resolution::Overwrite,
        }
    }
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("cannot read source {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {path}: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to back up {path} to {backup}: {source}")]
    BackupFailed {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What happened to one entry. Failures are entry-local: the run continues
/// with the next entry.
#[derive(Debug)]
pub enum EntryOutcome {
    Installed { backup: Option<PathBuf> },
    Skipped,
    Failed(InstallError),
}

#[derive(Debug)]
pub struct EntryResult {
    pub label: String,
    pub destination: PathBuf,
    pub outcome: EntryOutcome,
}

/// Aggregate result of one run. Lives only for the invocation; nothing is
/// persisted.
#[derive(Debug, Default, Serialize)]
pub struct InstallReport {
    pub installed: usize,
    pub skipped: usize,
    pub backed_up: usize,
    pub failed: usize,
    /// Backup paths created this run, for user-facing confirmation.
    pub backups: Vec<PathBuf>,
    /// Per-entry results in manifest order.
    #[serde(skip)]
    pub outcomes: Vec<EntryResult>,
}

impl InstallReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Install every entry in order. For each conflicting entry, `decide` picks
/// skip or overwrite; overwrite renames the existing destination to a
/// timestamped backup strictly before the new content is written.
pub fn install<F>(entries: &[InstallEntry], mut decide: F, placeholders: &Placeholders) -> InstallReport
where
    F: FnMut(&InstallEntry) -> Resolution,
{
    let mut report = InstallReport::default();

    for entry in entries {
        let outcome = install_entry(entry, &mut decide, placeholders);
        match &outcome {
            EntryOutcome::Installed { backup } => {
                report.installed += 1;
                if let Some(backup) = backup {
                    report.backed_up += 1;
                    report.backups.push(backup.clone());
                }
            }
            EntryOutcome::Skipped => report.skipped += 1,
            EntryOutcome::Failed(_) => report.failed += 1,
        }
        report.outcomes.push(EntryResult {
            label: entry.label.clone(),
            destination: entry.destination.clone(),
            outcome,
        });
    }

    report
}

fn install_entry<F>(entry: &InstallEntry, decide: &mut F, placeholders: &Placeholders) -> EntryOutcome
where
    F: FnMut(&InstallEntry) -> Resolution,
{
    // Read the source before touching the destination, so an unreadable
    // source never costs the existing file.
    let content = match read_source(entry, placeholders) {
        Ok(content) => content,
        Err(err) => return EntryOutcome::Failed(err),
    };

    let mut backup = None;
    if entry.destination.exists() {
        match decide(entry) {
            Resolution::Skip => return EntryOutcome::Skipped,
            Resolution::Overwrite => match backup_existing(&entry.destination) {
                Ok(path) => backup = Some(path),
                Err(err) => return EntryOutcome::Failed(err),
            },
        }
    }

    if let Err(err) = write_destination(&entry.destination, &content) {
        return EntryOutcome::Failed(err);
    }

    EntryOutcome::Installed { backup }
}

fn read_source(entry: &InstallEntry, placeholders: &Placeholders) -> Result<Vec<u8>, InstallError> {
    if entry.substitute {
        let text = fs::read_to_string(&entry.source).map_err(|source| {
            InstallError::SourceUnreadable {
                path: entry.source.clone(),
                source,
            }
        })?;
        let placeholders = entry.placeholders.as_ref().unwrap_or(placeholders);
        Ok(render(&text, placeholders).into_bytes())
    } else {
        fs::read(&entry.source).map_err(|source| InstallError::SourceUnreadable {
            path: entry.source.clone(),
            source,
        })
    }
}

fn write_destination(destination: &Path, content: &[u8]) -> Result<(), InstallError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|source| InstallError::DestinationUnwritable {
            path: destination.to_path_buf(),
            source,
        })?;
    }

    fs::write(destination, content).map_err(|source| InstallError::DestinationUnwritable {
        path: destination.to_path_buf(),
        source,
    })
}

/// Rename the existing destination to `<name>.bak.<YYYYMMDD_HHMMSS>`, next
/// to the original.
fn backup_existing(destination: &Path) -> Result<PathBuf, InstallError> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let backup = PathBuf::from(format!("{}.bak.{}", destination.display(), timestamp));

    fs::rename(destination, &backup).map_err(|source| InstallError::BackupFailed {
        path: destination.to_path_buf(),
        backup: backup.clone(),
        source,
    })?;

    Ok(backup)
}

/// Replace every literal occurrence of each placeholder token. Values are
/// not re-scanned for further tokens.
pub fn render(text: &str, placeholders: &Placeholders) -> String {
    let mut out = text.to_string();
    for (token, value) in placeholders {
        out = out.replace(token, value);
    }
    out
}
