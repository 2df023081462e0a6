//! The dumps bag: an S3 bucket driven through the AWS CLI.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::artifact::base_name;
use crate::error::DumpError;
use crate::runner::{Cmd, CommandRunner};
use crate::settings::DumpsSettings;

pub struct DumpBag<R> {
    runner: R,
    program: String,
    settings: DumpsSettings,
}

impl<R: CommandRunner> DumpBag<R> {
    pub fn new(runner: R, program: &str, settings: &DumpsSettings) -> Self {
        Self {
            runner,
            program: program.to_string(),
            settings: settings.clone(),
        }
    }

    pub fn settings(&self) -> &DumpsSettings {
        &self.settings
    }

    fn aws(&self) -> Cmd {
        Cmd::new(&self.program).arg(format!("--profile={}", self.settings.aws_profile))
    }

    /// Object keys starting with `prefix`, in bucket listing order.
    pub fn list_keys(&self, prefix: &str) -> Result<Vec<String>, DumpError> {
        let out = self.runner.run(
            &self
                .aws()
                .args(["s3api", "list-objects-v2", "--bucket"])
                .arg(&self.settings.bucket)
                .args(["--query", "Contents[].Key", "--prefix", prefix]),
        )?;
        parse_key_listing(&out.stdout)
    }

    /// Newest dump stored in `folder`. Dump names embed their timestamp,
    /// so the last key of the listing is the most recent. Sibling folders
    /// sharing the name as a prefix (`snail_old/` for `snail`) are ignored.
    pub fn latest_key(&self, folder: &str) -> Result<Option<String>, DumpError> {
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        Ok(self.list_keys(&prefix)?.pop())
    }

    /// Copy `key` into `dir`, returning the local path.
    pub fn download(&self, key: &str, dir: &Path) -> Result<PathBuf, DumpError> {
        let url = self.settings.s3_url(key);
        let target = dir.join(base_name(key));
        info!("downloading {} to {}", url, target.display());
        self.runner.run(
            &self
                .aws()
                .args(["s3", "cp"])
                .arg(&url)
                .arg(target.to_string_lossy())
                .visible(),
        )?;
        Ok(target)
    }

    /// Copy a local file to `key`, returning the object URL.
    pub fn upload(&self, local: &Path, key: &str) -> Result<String, DumpError> {
        let url = self.settings.s3_url(key);
        debug!("uploading {} to {}", local.display(), url);
        self.runner.run(
            &self
                .aws()
                .args(["s3", "cp"])
                .arg(local.to_string_lossy())
                .arg(&url),
        )?;
        Ok(url)
    }

    /// Tag `key` so the bucket lifecycle rule deletes it after a week.
    pub fn tag_short_expire(&self, key: &str) -> Result<(), DumpError> {
        let tagging = format!(
            "TagSet=[{{Key={},Value=True}}]",
            self.settings.expire_tag
        );
        self.runner.run(
            &self
                .aws()
                .args(["s3api", "put-object-tagging", "--bucket"])
                .arg(&self.settings.bucket)
                .args(["--key", key, "--tagging"])
                .arg(tagging),
        )?;
        Ok(())
    }

    /// Delete every object under `prefix/`.
    pub fn remove_prefix(&self, prefix: &str) -> Result<(), DumpError> {
        let url = self.settings.s3_url(&format!("{}/", prefix.trim_end_matches('/')));
        self.runner
            .run(&self.aws().args(["s3", "rm"]).arg(url).arg("--recursive"))?;
        Ok(())
    }
}

/// Parse the JSON printed by `list-objects-v2 --query 'Contents[].Key'`.
/// An empty prefix prints `null`.
pub fn parse_key_listing(output: &str) -> Result<Vec<String>, DumpError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let keys: Option<Vec<String>> = serde_json::from_str(trimmed)
        .map_err(|e| DumpError::Parse(format!("unexpected object listing: {e}")))?;
    Ok(keys.unwrap_or_default())
}
