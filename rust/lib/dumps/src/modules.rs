//! Module comparison between a migrated database and its references.

use std::collections::BTreeSet;
use std::fmt;

/// A row of `ir_module_module`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleState {
    pub name: String,
    pub state: String,
}

impl ModuleState {
    pub fn new(name: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: state.into(),
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.state)
    }
}

/// Set differences printed by `check-modules`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleComparison {
    pub migrated: BTreeSet<ModuleState>,
    pub full: BTreeSet<ModuleState>,
    /// Compared by name only: the migrated database still holds modules
    /// `to install`/`to upgrade` while the full one only has `installed`.
    pub migrated_not_in_full: BTreeSet<String>,
    pub full_not_in_sample: Option<BTreeSet<ModuleState>>,
    pub sample_not_in_full: Option<BTreeSet<ModuleState>>,
}

impl ModuleComparison {
    pub fn new(
        migrated: Vec<ModuleState>,
        full: Vec<ModuleState>,
        sample: Option<Vec<ModuleState>>,
    ) -> Self {
        let migrated: BTreeSet<_> = migrated.into_iter().collect();
        let full: BTreeSet<_> = full.into_iter().collect();

        let full_names: BTreeSet<&str> = full.iter().map(|m| m.name.as_str()).collect();
        let migrated_not_in_full = migrated
            .iter()
            .filter(|m| !full_names.contains(m.name.as_str()))
            .map(|m| m.name.clone())
            .collect();

        let sample: Option<BTreeSet<_>> = sample.map(|s| s.into_iter().collect());
        let full_not_in_sample = sample
            .as_ref()
            .map(|s| full.difference(s).cloned().collect());
        let sample_not_in_full = sample
            .as_ref()
            .map(|s| s.difference(&full).cloned().collect());

        Self {
            migrated,
            full,
            migrated_not_in_full,
            full_not_in_sample,
            sample_not_in_full,
        }
    }
}

fn section<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    items: &BTreeSet<T>,
) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{title}:")?;
    if items.is_empty() {
        writeln!(f, "  (none)")?;
    }
    for item in items {
        writeln!(f, "  {item}")?;
    }
    Ok(())
}

impl fmt::Display for ModuleComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "Modules in migrated database", &self.migrated)?;
        section(f, "Modules in full database", &self.full)?;
        section(
            f,
            "Modules in migrated database, but not in full database",
            &self.migrated_not_in_full,
        )?;
        if let Some(items) = &self.full_not_in_sample {
            section(f, "Modules in full database, but not in sample database", items)?;
        }
        if let Some(items) = &self.sample_not_in_full {
            section(f, "Modules in sample database, but not in full database", items)?;
        }
        Ok(())
    }
}
