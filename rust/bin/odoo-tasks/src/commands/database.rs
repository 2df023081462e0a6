//! Database dump commands.
//!
//! `odoo-tasks local-dump`, `odoo-tasks dump-and-share`, etc. Each command
//! wires the shell toolchain and prints what happened.

use std::path::{Path, PathBuf};

use anyhow::Result;
use odoo_dumps::artifact::{current_user, expand_path};
use odoo_dumps::gpg::fetch_public_keys;
use odoo_dumps::versions::render_table;
use odoo_dumps::{
    Catalog, DatabaseVersion, Download, DumpName, DumpWorkflow, LastPass, PgCatalog,
    ProjectContext, SharedDump, ShellRunner,
};

use crate::config::ClientConfig;

fn workflow(config: &ClientConfig) -> DumpWorkflow<ShellRunner> {
    DumpWorkflow::new(ShellRunner, &config.settings())
}

/// Project name from the config override or the cookiecutter context.
fn project_name(config: &ClientConfig) -> Result<String> {
    if let Some(name) = &config.project_name {
        return Ok(name.clone());
    }
    let cwd = std::env::current_dir()?;
    Ok(ProjectContext::discover(&cwd)?.project_name)
}

fn dump_name(config: &ClientConfig) -> Result<DumpName> {
    let user = current_user()?;
    let project = project_name(config)?;
    Ok(DumpName::new(&user, &project, chrono::Local::now().naive_local()))
}

/// Run `f` against the live catalog, keeping the db container up meanwhile.
pub(crate) fn with_catalog<T>(
    config: &ClientConfig,
    f: impl FnOnce(&dyn Catalog) -> Result<T>,
) -> Result<T> {
    let workflow = workflow(config);
    let container = workflow.container();
    let guard = container.ensure_up()?;
    let catalog = PgCatalog::new(&config.database, guard.port())?;
    f(&catalog)
}

/// LIST-VERSIONS: Marabunta version and install date of every database.
pub fn list_versions(config: &ClientConfig) -> Result<()> {
    let rows = with_catalog(config, collect_versions)?;
    if rows.is_empty() {
        println!("No databases found.");
        return Ok(());
    }
    print!("{}", render_table(rows));
    Ok(())
}

pub(crate) fn collect_versions(catalog: &dyn Catalog) -> Result<Vec<DatabaseVersion>> {
    let mut rows = Vec::new();
    for database in catalog.databases()? {
        let version = catalog.latest_version(&database)?;
        rows.push(DatabaseVersion { database, version });
    }
    Ok(rows)
}

/// DOWNLOAD-DUMP: fetch and decrypt the newest dump of a customer database.
pub fn download_dump(config: &ClientConfig, database_name: &str, dumpdir: &str) -> Result<()> {
    let dir = expand_path(dumpdir);
    let secrets = LastPass::new(ShellRunner, &config.tools.lpass);

    println!("Looking up the latest dump of {}...", database_name);
    let download = workflow(config).download(database_name, &dir, &secrets)?;
    for line in download_messages(&download) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn download_messages(d: &Download) -> Vec<String> {
    let mut lines = Vec::new();
    let file_name = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    if d.downloaded {
        lines.push("S3 downloaded dump".to_string());
        lines.push(format!("From: {}", d.url));
        lines.push(format!("to: {}", d.encrypted.display()));
    } else {
        lines.push(format!(
            "A file named {} already exists, skipping download.",
            file_name(&d.encrypted)
        ));
    }
    if d.decrypted_now {
        lines.push(format!("File decrypted as {}", file_name(&d.decrypted)));
    } else {
        lines.push(format!(
            "A decrypted file named {} already exists, skipping decryption.",
            file_name(&d.decrypted)
        ));
    }
    lines
}

/// LOCAL-DUMP: dump a database of the compose project to `path`.
pub fn local_dump(config: &ClientConfig, db_name: &str, path: &str) -> Result<PathBuf> {
    let name = dump_name(config)?;
    let dump = workflow(config).local_dump(db_name, &expand_path(path), &name)?;
    println!("Dump successfully generated at {}", dump.display());
    Ok(dump)
}

/// SHARE-ON-DUMPS-BAG: encrypt a dump and push it to s3://<bucket>/<user>.
pub fn share_on_dumps_bag(config: &ClientConfig, dump_file_path: &str) -> Result<()> {
    let dump = expand_path(dump_file_path);
    let keys = fetch_public_keys(&config.dumps.keys_url)?;
    let user = current_user()?;
    let shared = workflow(config).share(&dump, &user, &keys)?;
    print_shared(&shared);
    Ok(())
}

/// DUMP-AND-SHARE: `local-dump` followed by `share-on-dumps-bag`.
pub fn dump_and_share(
    config: &ClientConfig,
    db_name: &str,
    tmp_path: &str,
    keep_local_dump: bool,
) -> Result<()> {
    let keys = fetch_public_keys(&config.dumps.keys_url)?;
    let name = dump_name(config)?;
    let shared = workflow(config).dump_and_share(
        db_name,
        &expand_path(tmp_path),
        &name,
        &keys,
        keep_local_dump,
    )?;
    print_shared(&shared);
    if !keep_local_dump {
        println!("Local dump files removed.");
    }
    Ok(())
}

fn print_shared(shared: &SharedDump) {
    println!("Dump successfully encrypted at {}", shared.encrypted.display());
    println!("Encrypted dump successfully shared on dumps bag at: {}", shared.url);
    println!("NOTE: this dump will be auto-deleted after 7 days.");
}

/// EMPTY-MY-DUMP-BAG: remove everything under s3://<bucket>/<user>/.
pub fn empty_my_dump_bag(config: &ClientConfig) -> Result<()> {
    let user = current_user()?;
    workflow(config).empty_bag(&user)?;
    println!("Your dumps bag has been emptied successfully.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use odoo_dumps::{StaticCatalog, VersionRecord};

    use super::*;

    #[test]
    fn test_collect_versions() {
        let date_done = NaiveDate::from_ymd_opt(2019, 6, 15).and_then(|d| d.and_hms_opt(8, 0, 0));
        let catalog = StaticCatalog::new()
            .database(
                "prod",
                Some(VersionRecord {
                    date_done,
                    number: "12.0.3".to_string(),
                }),
            )
            .database("scratch", None);

        let rows = collect_versions(&catalog).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].number(), "12.0.3");
        assert_eq!(rows[0].install_date(), "2019-06-15");
        assert_eq!(rows[1].number(), "unknown");
        assert_eq!(rows[1].install_date(), "unknown");
    }

    fn download(downloaded: bool, decrypted_now: bool) -> Download {
        Download {
            url: "s3://odoo-dumps/snail/snail.pg.gpg".to_string(),
            encrypted: PathBuf::from("/dumps/snail.pg.gpg"),
            decrypted: PathBuf::from("/dumps/snail.pg"),
            downloaded,
            decrypted_now,
        }
    }

    #[test]
    fn test_download_messages_fresh() {
        let lines = download_messages(&download(true, true));
        assert_eq!(
            lines,
            vec![
                "S3 downloaded dump",
                "From: s3://odoo-dumps/snail/snail.pg.gpg",
                "to: /dumps/snail.pg.gpg",
                "File decrypted as snail.pg",
            ]
        );
    }

    #[test]
    fn test_download_messages_skipped() {
        let lines = download_messages(&download(false, false));
        assert_eq!(
            lines,
            vec![
                "A file named snail.pg.gpg already exists, skipping download.",
                "A decrypted file named snail.pg already exists, skipping decryption.",
            ]
        );
    }
}
