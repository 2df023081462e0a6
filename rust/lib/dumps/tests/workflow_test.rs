/// End-to-end dump workflows against a scripted toolchain.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use odoo_dumps::*;

const LISTING: &str = r#"["snail/snail-20190101-010101.pg.gpg", "snail/snail-20190301-010101.pg.gpg"]"#;

const KEYRING: &str = "\
pub:-:4096:1:AAAA1111BBBB2222:1600000000:::-:::scESC::::::23::0:
fpr:::::::::0123456789ABCDEF0123456789ABCDEF01234567:
pub:-:255:22:EEEE5555FFFF6666:1650000000:::-:::scESC::::::23::0:
fpr:::::::::1111222233334444555566667777888899990000:
";

#[derive(Default)]
struct CountingStore {
    lookups: AtomicUsize,
}

impl PasswordStore for CountingStore {
    fn password(&self, _id: &str) -> Result<String, DumpError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok("passphrase".to_string())
    }
}

fn no_wait() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        delay: Duration::ZERO,
    }
}

/// Path argument following `flag`.
fn arg_after(cmd: &Cmd, flag: &str) -> Option<PathBuf> {
    cmd.args
        .iter()
        .position(|a| a == flag)
        .and_then(|i| cmd.args.get(i + 1))
        .map(PathBuf::from)
}

fn touch(path: &Path) {
    fs::write(path, b"data").unwrap();
}

#[test]
fn test_download_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new().ok("list-objects-v2", LISTING);
    let workflow = DumpWorkflow::new(&runner, &Settings::default());
    let store = CountingStore::default();

    let first = workflow.download("snail", dir.path(), &store).unwrap();
    assert!(first.downloaded);
    assert!(first.decrypted_now);
    assert_eq!(first.url, "s3://odoo-dumps/snail/snail-20190301-010101.pg.gpg");
    assert_eq!(first.encrypted, dir.path().join("snail-20190301-010101.pg.gpg"));
    assert_eq!(first.decrypted, dir.path().join("snail-20190301-010101.pg"));
    assert_eq!(runner.count("s3 cp"), 1);
    assert_eq!(runner.count("--decrypt"), 1);
    assert_eq!(store.lookups.load(Ordering::SeqCst), 1);

    // Both files now present: nothing to do.
    touch(&first.encrypted);
    touch(&first.decrypted);
    let second = workflow.download("snail", dir.path(), &store).unwrap();
    assert!(!second.downloaded);
    assert!(!second.decrypted_now);
    assert_eq!(runner.count("s3 cp"), 1);
    assert_eq!(runner.count("--decrypt"), 1);
    assert_eq!(store.lookups.load(Ordering::SeqCst), 1);

    // Decrypted copy removed: decrypt again, no download.
    fs::remove_file(&first.decrypted).unwrap();
    let third = workflow.download("snail", dir.path(), &store).unwrap();
    assert!(!third.downloaded);
    assert!(third.decrypted_now);
    assert_eq!(runner.count("s3 cp"), 1);
    assert_eq!(runner.count("--decrypt"), 2);
}

#[test]
fn test_fresh_download_always_decrypts() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new().ok("list-objects-v2", LISTING);
    let workflow = DumpWorkflow::new(&runner, &Settings::default());
    let store = CountingStore::default();

    // A stale decrypted file from an earlier download.
    touch(&dir.path().join("snail-20190301-010101.pg"));
    let res = workflow.download("snail", dir.path(), &store).unwrap();
    assert!(res.downloaded);
    assert!(res.decrypted_now);
}

#[test]
fn test_download_unknown_database() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new().ok("list-objects-v2", "null\n");
    let workflow = DumpWorkflow::new(&runner, &Settings::default());

    let err = workflow
        .download("ghost", dir.path(), &CountingStore::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "Dump not found for ghost");
    assert_eq!(runner.count("s3 cp"), 0);
}

#[test]
fn test_dump_and_share_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new()
        .fail_times("port db 5432", 1, "not running")
        .ok("port db 5432", "0.0.0.0:49160\n")
        .ok("--list-keys", KEYRING)
        .effect("pg_dump", |cmd| touch(&arg_after(cmd, "--file").unwrap()))
        .effect("--encrypt", |cmd| touch(&arg_after(cmd, "--output").unwrap()));
    let workflow = DumpWorkflow::new(&runner, &Settings::default()).with_retry(no_wait());

    let taken_at = NaiveDate::from_ymd_opt(2019, 5, 2)
        .and_then(|d| d.and_hms_opt(14, 30, 0))
        .unwrap();
    let name = DumpName::new("jdoe", "students", taken_at);

    let shared = workflow
        .dump_and_share("odoodb", dir.path(), &name, "ARMORED KEYS", false)
        .unwrap();

    assert_eq!(shared.key, "jdoe/jdoe_students-20190502-143000.pg.gpg");
    assert_eq!(
        shared.url,
        "s3://odoo-dumps/jdoe/jdoe_students-20190502-143000.pg.gpg"
    );
    assert!(!dir.path().join("jdoe_students-20190502-143000.pg").exists());
    assert!(!shared.encrypted.exists());

    let calls = runner.calls();
    let position = |pattern: &str| calls.iter().position(|c| c.contains(pattern)).unwrap();
    assert!(position("up -d db") < position("pg_dump"));
    assert!(position("pg_dump") < position("stop db"));
    assert!(position("--import") < position("--encrypt"));
    assert!(position("s3 cp") < position("put-object-tagging"));
    assert!(calls.iter().any(|c| c.contains(
        "--recipient 0123456789ABCDEF0123456789ABCDEF01234567 \
         --recipient 1111222233334444555566667777888899990000"
    )));
    assert!(calls.iter().any(|c| c.contains("--key jdoe/jdoe_students-20190502-143000.pg.gpg")));

    let import = runner
        .commands()
        .into_iter()
        .find(|c| c.args.iter().any(|a| a == "--import"))
        .unwrap();
    assert_eq!(import.stdin.as_deref(), Some("ARMORED KEYS"));
}

#[test]
fn test_dump_and_share_keeps_local_files() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new()
        .ok("port db 5432", "0.0.0.0:49160\n")
        .ok("--list-keys", KEYRING)
        .effect("pg_dump", |cmd| touch(&arg_after(cmd, "--file").unwrap()))
        .effect("--encrypt", |cmd| touch(&arg_after(cmd, "--output").unwrap()));
    let workflow = DumpWorkflow::new(&runner, &Settings::default());

    let taken_at = NaiveDate::from_ymd_opt(2020, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let name = DumpName::new("jdoe", "students", taken_at);
    let shared = workflow
        .dump_and_share("odoodb", dir.path(), &name, "KEYS", true)
        .unwrap();

    assert!(shared.encrypted.exists());
    assert!(dir.path().join("jdoe_students-20200101-000000.pg").exists());
    assert_eq!(runner.count("stop db"), 0);
}

#[test]
fn test_download_ignores_sibling_folders() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new()
        .ok("--prefix snail/", LISTING)
        .ok(
            "--prefix snail",
            r#"["snail/snail-20190301-010101.pg.gpg", "snail_old/snail_old-20200101-000000.pg.gpg"]"#,
        );
    let workflow = DumpWorkflow::new(&runner, &Settings::default());

    let res = workflow
        .download("snail", dir.path(), &CountingStore::default())
        .unwrap();
    assert_eq!(res.url, "s3://odoo-dumps/snail/snail-20190301-010101.pg.gpg");
    assert_eq!(runner.count("--prefix snail/"), 1);
}
