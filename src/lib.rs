//! claude-init - Claude Code project toolkit.
//!
//! Installs global agents, templates, and rules into `~/.claude/` and
//! scaffolds per-project configuration files. The core is the
//! conflict-aware installer in [`installer`]: it copies or renders each
//! manifest entry into place, skipping or backing up pre-existing files
//! and isolating per-entry failures.

pub mod cfg;
pub mod installer;
pub mod manifest;
pub mod project;
pub mod ui;
