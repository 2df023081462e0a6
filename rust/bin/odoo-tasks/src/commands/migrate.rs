//! Migration checks.

use anyhow::Result;
use odoo_dumps::{Catalog, ModuleComparison};

use crate::commands::database::with_catalog;
use crate::config::ClientConfig;

/// CHECK-MODULES: print the module differences between a migrated database,
/// the full reference database and, optionally, the sample one.
pub fn check_modules(
    config: &ClientConfig,
    migrated_db: &str,
    full_db: &str,
    sample_db: Option<&str>,
) -> Result<()> {
    let comparison = with_catalog(config, |catalog| {
        compare_modules(catalog, migrated_db, full_db, sample_db)
    })?;
    print!("{comparison}");
    Ok(())
}

pub(crate) fn compare_modules(
    catalog: &dyn Catalog,
    migrated_db: &str,
    full_db: &str,
    sample_db: Option<&str>,
) -> Result<ModuleComparison> {
    let missing = missing_databases(catalog, migrated_db, full_db, sample_db)?;
    if !missing.is_empty() {
        for line in &missing {
            println!("{line}");
        }
        anyhow::bail!("Cannot compare modules: {} database(s) not found.", missing.len());
    }

    let migrated = catalog.modules(migrated_db)?;
    let full = catalog.modules(full_db)?;
    let sample = sample_db.map(|db| catalog.modules(db)).transpose()?;
    Ok(ModuleComparison::new(migrated, full, sample))
}

fn missing_databases(
    catalog: &dyn Catalog,
    migrated_db: &str,
    full_db: &str,
    sample_db: Option<&str>,
) -> Result<Vec<String>> {
    let existing = catalog.databases()?;
    let exists = |db: &str| existing.iter().any(|d| d == db);

    let mut missing = Vec::new();
    if !exists(migrated_db) {
        missing.push(format!("Migrated database `{}` not found", migrated_db));
    }
    if !exists(full_db) {
        missing.push(format!("Full database `{}` not found", full_db));
    }
    if let Some(sample) = sample_db.filter(|s| !exists(s)) {
        missing.push(format!("Sample database `{}` not found", sample));
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use odoo_dumps::StaticCatalog;

    use super::*;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new()
            .with_modules(
                "migrated",
                [("base", "installed"), ("sale", "to upgrade"), ("stock", "to install")],
            )
            .with_modules("full", [("base", "installed"), ("sale", "installed")])
            .with_modules("sample", [("base", "installed"), ("demo_data", "installed")])
    }

    #[test]
    fn test_missing_databases_reported() {
        let missing =
            missing_databases(&catalog(), "migrated", "prod_copy", Some("ghost")).unwrap();
        assert_eq!(
            missing,
            vec![
                "Full database `prod_copy` not found",
                "Sample database `ghost` not found",
            ]
        );
        assert!(compare_modules(&catalog(), "migrated", "prod_copy", None).is_err());
    }

    #[test]
    fn test_compare_modules() {
        let cmp = compare_modules(&catalog(), "migrated", "full", Some("sample")).unwrap();
        let migrated_only: Vec<_> = cmp.migrated_not_in_full.iter().cloned().collect();
        assert_eq!(migrated_only, vec!["stock"]);

        let full_only: Vec<_> = cmp
            .full_not_in_sample
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(full_only, vec!["sale"]);

        let sample_only: Vec<_> = cmp
            .sample_not_in_full
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(sample_only, vec!["demo_data"]);
    }

    #[test]
    fn test_compare_without_sample() {
        let cmp = compare_modules(&catalog(), "migrated", "full", None).unwrap();
        assert!(cmp.full_not_in_sample.is_none());
        assert!(cmp.sample_not_in_full.is_none());
    }
}
