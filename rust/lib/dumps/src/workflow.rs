//! Dump lifecycle: produce a dump from the compose database, publish it
//! encrypted to the dumps bag, fetch and decrypt a published one.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::artifact::{base_name, decrypted_name, encrypted_path, DumpName};
use crate::bag::DumpBag;
use crate::compose::{DbContainer, RetryPolicy};
use crate::error::DumpError;
use crate::gpg::Gpg;
use crate::runner::{Cmd, CommandRunner};
use crate::secrets::PasswordStore;
use crate::settings::Settings;

/// Result of publishing a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedDump {
    pub encrypted: PathBuf,
    pub key: String,
    pub url: String,
}

/// What `download` had to do. Both flags are false when everything was
/// already present locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub url: String,
    pub encrypted: PathBuf,
    pub decrypted: PathBuf,
    pub downloaded: bool,
    pub decrypted_now: bool,
}

pub struct DumpWorkflow<R> {
    runner: R,
    settings: Settings,
    retry: RetryPolicy,
}

impl<R: CommandRunner> DumpWorkflow<R> {
    pub fn new(runner: R, settings: &Settings) -> Self {
        Self {
            runner,
            settings: settings.clone(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn container(&self) -> DbContainer<&R> {
        DbContainer::new(&self.runner, &self.settings.tools, &self.settings.database)
            .with_retry(self.retry)
    }

    pub fn bag(&self) -> DumpBag<&R> {
        DumpBag::new(&self.runner, &self.settings.tools.aws, &self.settings.dumps)
    }

    pub fn gpg(&self) -> Gpg<&R> {
        Gpg::new(&self.runner, &self.settings.tools.gpg)
    }

    /// Dump `db_name` in custom format to `dir/{name}`.
    pub fn local_dump(&self, db_name: &str, dir: &Path, name: &DumpName) -> Result<PathBuf, DumpError> {
        let container = self.container();
        let guard = container.ensure_up()?;

        fs::create_dir_all(dir)?;
        let path = dir.join(name.file_name());
        let db = &self.settings.database;
        let cmd = Cmd::new(&self.settings.tools.pg_dump)
            .args(["-h", db.host.as_str(), "-p"])
            .arg(guard.port().to_string())
            .args(["--format=c", "-U", db.user.as_str(), "--file"])
            .arg(path.to_string_lossy())
            .arg(db_name);
        self.runner.run(&cmd)?;

        info!("dumped {} to {}", db_name, path.display());
        Ok(path)
    }

    /// Encrypt `dump` for every key in `armored_keys` into `{dump}.gpg`.
    pub fn encrypt_for_bag(&self, dump: &Path, armored_keys: &str) -> Result<PathBuf, DumpError> {
        if !dump.is_file() {
            return Err(DumpError::NotFound(format!(
                "dump file {} not found",
                dump.display()
            )));
        }
        let gpg = self.gpg();
        gpg.import_keys(armored_keys)?;
        let recipients = gpg.fingerprints()?;

        let target = encrypted_path(dump);
        gpg.encrypt(dump, &target, &recipients)?;
        info!("encrypted {} for {} keys", target.display(), recipients.len());
        Ok(target)
    }

    /// Encrypt `dump` and upload it to the user's folder of the bag, tagged
    /// for short expiry.
    pub fn share(&self, dump: &Path, user: &str, armored_keys: &str) -> Result<SharedDump, DumpError> {
        let encrypted = self.encrypt_for_bag(dump, armored_keys)?;
        let file_name = encrypted
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let key = format!("{user}/{file_name}");

        let bag = self.bag();
        let url = bag.upload(&encrypted, &key)?;
        bag.tag_short_expire(&key)?;
        Ok(SharedDump { encrypted, key, url })
    }

    /// `local_dump` then `share`. Unless `keep_local`, both local files are
    /// removed once uploaded.
    pub fn dump_and_share(
        &self,
        db_name: &str,
        dir: &Path,
        name: &DumpName,
        armored_keys: &str,
        keep_local: bool,
    ) -> Result<SharedDump, DumpError> {
        let dump = self.local_dump(db_name, dir, name)?;
        let shared = self.share(&dump, &name.user, armored_keys)?;
        if !keep_local {
            fs::remove_file(&dump)?;
            fs::remove_file(&shared.encrypted)?;
        }
        Ok(shared)
    }

    /// Fetch the newest dump of `database_name` into `dir` and decrypt it.
    ///
    /// An encrypted file already in `dir` is not downloaded again, and an
    /// existing decrypted file is kept unless a fresh copy was downloaded.
    pub fn download(
        &self,
        database_name: &str,
        dir: &Path,
        secrets: &dyn PasswordStore,
    ) -> Result<Download, DumpError> {
        let bag = self.bag();
        let latest = bag
            .latest_key(database_name)?
            .ok_or_else(|| DumpError::NotFound(format!("Dump not found for {database_name}")))?;

        let gpg_name = base_name(&latest).to_string();
        let dump_name = decrypted_name(&gpg_name).to_string();
        if dump_name == gpg_name {
            return Err(DumpError::Parse(format!("{latest} is not an encrypted dump")));
        }

        fs::create_dir_all(dir)?;
        let encrypted = dir.join(&gpg_name);
        let decrypted = dir.join(&dump_name);
        let key = format!("{database_name}/{gpg_name}");
        let url = bag.settings().s3_url(&key);

        let downloaded = !encrypted.is_file();
        if downloaded {
            bag.download(&key, dir)?;
        } else {
            info!("{} already exists, skipping download", encrypted.display());
        }

        let decrypted_now = downloaded || !decrypted.is_file();
        if decrypted_now {
            let passphrase = secrets.password(&self.settings.dumps.passphrase_secret_id)?;
            self.gpg().decrypt(&encrypted, &decrypted, &passphrase)?;
        } else {
            info!("{} already exists, skipping decryption", decrypted.display());
        }

        Ok(Download {
            url,
            encrypted,
            decrypted,
            downloaded,
            decrypted_now,
        })
    }

    /// Remove everything the user shared on the bag.
    pub fn empty_bag(&self, user: &str) -> Result<(), DumpError> {
        self.bag().remove_prefix(user)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;
    use crate::runner::ScriptedRunner;

    fn workflow(runner: &ScriptedRunner) -> DumpWorkflow<&ScriptedRunner> {
        DumpWorkflow::new(runner, &Settings::default()).with_retry(RetryPolicy {
            attempts: 3,
            delay: Duration::ZERO,
        })
    }

    fn name() -> DumpName {
        let at = NaiveDate::from_ymd_opt(2019, 5, 2)
            .and_then(|d| d.and_hms_opt(14, 30, 0))
            .unwrap();
        DumpName::new("jdoe", "students", at)
    }

    #[test]
    fn test_local_dump_command() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().ok("port db 5432", "0.0.0.0:49160\n");
        let path = workflow(&runner)
            .local_dump("odoodb", dir.path(), &name())
            .unwrap();

        assert_eq!(path, dir.path().join("jdoe_students-20190502-143000.pg"));
        let expected = format!(
            "pg_dump -h localhost -p 49160 --format=c -U odoo --file {} odoodb",
            path.display()
        );
        assert!(runner.calls().contains(&expected));
        assert_eq!(runner.count("stop db"), 0);
    }

    #[test]
    fn test_local_dump_stops_container_it_started() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new()
            .fail_times("port db 5432", 1, "not running")
            .ok("port db 5432", "0.0.0.0:49160\n");
        workflow(&runner)
            .local_dump("odoodb", dir.path(), &name())
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.last().map(String::as_str), Some("docker-compose stop db"));
        assert_eq!(runner.count("up -d db"), 1);
    }

    #[test]
    fn test_encrypt_missing_dump() {
        let runner = ScriptedRunner::new();
        let res = workflow(&runner).encrypt_for_bag(Path::new("/nonexistent/a.pg"), "KEYS");
        assert!(matches!(res, Err(DumpError::NotFound(_))));
        assert!(runner.calls().is_empty());
    }
}
