//! GnuPG encryption of dump artifacts.
//!
//! Dumps are encrypted for every public key published by the dumps bag and
//! decrypted with the shared passphrase stored in the password manager.

use std::path::Path;

use tracing::{debug, info};

use crate::error::DumpError;
use crate::runner::{Cmd, CommandRunner};

/// Download the armored public keys served at `url`.
pub fn fetch_public_keys(url: &str) -> Result<String, DumpError> {
    info!("fetching dumps bag public keys from {}", url);
    let resp = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| DumpError::Http(format!("{url}: {e}")))?;
    resp.text()
        .map_err(|e| DumpError::Http(format!("{url}: {e}")))
}

/// Thin wrapper over the `gpg` executable.
pub struct Gpg<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> Gpg<R> {
    pub fn new(runner: R, program: &str) -> Self {
        Self {
            runner,
            program: program.to_string(),
        }
    }

    fn gpg(&self) -> Cmd {
        Cmd::new(&self.program).args(["--batch", "--yes"])
    }

    /// Import armored public keys into the keyring.
    pub fn import_keys(&self, armored: &str) -> Result<(), DumpError> {
        self.runner.run(&self.gpg().arg("--import").stdin(armored))?;
        Ok(())
    }

    /// Fingerprints of all primary keys in the keyring.
    pub fn fingerprints(&self) -> Result<Vec<String>, DumpError> {
        let out = self.runner.run(
            &self
                .gpg()
                .args(["--with-colons", "--fingerprint", "--list-keys"]),
        )?;
        Ok(parse_fingerprints(&out.stdout))
    }

    /// Encrypt `src` into `dst` for every given recipient.
    pub fn encrypt(&self, src: &Path, dst: &Path, recipients: &[String]) -> Result<(), DumpError> {
        if recipients.is_empty() {
            return Err(DumpError::NotFound(
                "no public key to encrypt the dump for".to_string(),
            ));
        }
        debug!("encrypting {} for {} recipients", src.display(), recipients.len());
        let mut cmd = self
            .gpg()
            .args(["--trust-model", "always", "--output"])
            .arg(dst.to_string_lossy());
        for fpr in recipients {
            cmd = cmd.arg("--recipient").arg(fpr);
        }
        self.runner
            .run(&cmd.arg("--encrypt").arg(src.to_string_lossy()))?;
        Ok(())
    }

    /// Decrypt `src` into `dst` with a symmetric passphrase fed on stdin.
    pub fn decrypt(&self, src: &Path, dst: &Path, passphrase: &str) -> Result<(), DumpError> {
        let cmd = self
            .gpg()
            .args(["--pinentry-mode", "loopback", "--passphrase-fd", "0", "--output"])
            .arg(dst.to_string_lossy())
            .arg("--decrypt")
            .arg(src.to_string_lossy())
            .stdin(passphrase);
        self.runner.run(&cmd)?;
        Ok(())
    }
}

/// Extract primary key fingerprints from `gpg --with-colons` output.
/// Subkey fingerprints (`fpr` records following a `sub` record) are skipped.
pub fn parse_fingerprints(colons: &str) -> Vec<String> {
    let mut fingerprints = Vec::new();
    let mut in_primary = false;
    for line in colons.lines() {
        let mut fields = line.split(':');
        match fields.next() {
            Some("pub") => in_primary = true,
            Some("fpr") if in_primary => {
                if let Some(fpr) = fields.nth(8).filter(|f| !f.is_empty()) {
                    fingerprints.push(fpr.to_string());
                }
                in_primary = false;
            }
            Some("sub") | Some("sec") | Some("ssb") => in_primary = false,
            _ => {}
        }
    }
    fingerprints
}
