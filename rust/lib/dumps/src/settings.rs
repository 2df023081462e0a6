//! Tunables shared by the dump workflow.
//!
//! Every field has a default matching the dumps bag conventions, so an empty
//! (or absent) config section behaves like the stock setup.

use serde::{Deserialize, Serialize};

/// All sections together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub dumps: DumpsSettings,
    pub tools: ToolSettings,
}

/// Where the project database lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Docker Compose service running PostgreSQL.
    pub service: String,
    /// Port PostgreSQL listens on inside the container.
    pub container_port: u16,
    pub host: String,
    pub user: String,
    pub password: String,
    /// Database dumped when no name is given.
    pub default_db: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            service: "db".to_string(),
            container_port: 5432,
            host: "localhost".to_string(),
            user: "odoo".to_string(),
            password: "odoo".to_string(),
            default_db: "odoodb".to_string(),
        }
    }
}

/// The shared S3 dumps bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpsSettings {
    pub bucket: String,
    pub aws_profile: String,
    /// Endpoint serving the armored public keys dumps are encrypted for.
    pub keys_url: String,
    /// Password manager entry holding the dump decryption passphrase.
    pub passphrase_secret_id: String,
    /// Object tag picked up by the bucket lifecycle rule.
    pub expire_tag: String,
}

impl Default for DumpsSettings {
    fn default() -> Self {
        Self {
            bucket: "odoo-dumps".to_string(),
            aws_profile: "odoo-dumps".to_string(),
            keys_url: "https://dump-bag.odoo.camptocamp.ch/keys".to_string(),
            passphrase_secret_id: "5794282849981145008".to_string(),
            expire_tag: "ShortExpire".to_string(),
        }
    }
}

impl DumpsSettings {
    /// `s3://{bucket}/{key}`.
    pub fn s3_url(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

/// Program names of the external tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub docker_compose: String,
    pub pg_dump: String,
    pub aws: String,
    pub gpg: String,
    pub lpass: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            docker_compose: "docker-compose".to_string(),
            pg_dump: "pg_dump".to_string(),
            aws: "aws".to_string(),
            gpg: "gpg".to_string(),
            lpass: "lpass".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_url() {
        let dumps = DumpsSettings::default();
        assert_eq!(
            dumps.s3_url("jdoe/dump.pg.gpg"),
            "s3://odoo-dumps/jdoe/dump.pg.gpg"
        );
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let db: DatabaseSettings = serde_json::from_str(r#"{"service": "postgres"}"#).unwrap();
        assert_eq!(db.service, "postgres");
        assert_eq!(db.container_port, 5432);
        assert_eq!(db.user, "odoo");
    }
}
