//! Read-only queries against the project PostgreSQL instance.

use std::collections::BTreeMap;

use tokio::runtime::{Builder, Runtime};
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};
use tracing::debug;

use crate::error::DumpError;
use crate::modules::ModuleState;
use crate::settings::DatabaseSettings;
use crate::versions::VersionRecord;

const LIST_DATABASES: &str = "
    SELECT datname
    FROM pg_database
    WHERE datistemplate = false
    AND datname not in ('postgres', 'odoo');
";

const LATEST_VERSION: &str = "
    SELECT date_done, number
    FROM marabunta_version
    ORDER BY date_done DESC
    LIMIT 1;
";

const INSTALLED_MODULES: &str = "
    SELECT name, state
    FROM ir_module_module
    WHERE state IN ('to install', 'to upgrade', 'installed')
    ORDER BY name;
";

/// What the tasks need to know about the databases of the instance.
pub trait Catalog {
    /// User databases, excluding templates and the `postgres`/`odoo` ones.
    fn databases(&self) -> Result<Vec<String>, DumpError>;

    /// Newest Marabunta version applied to `db`, or None when the database
    /// was never migrated by Marabunta.
    fn latest_version(&self, db: &str) -> Result<Option<VersionRecord>, DumpError>;

    /// Modules installed or pending installation/upgrade in `db`.
    fn modules(&self, db: &str) -> Result<Vec<ModuleState>, DumpError>;
}

/// Catalog backed by tokio-postgres. A connection is opened and closed for
/// every query.
pub struct PgCatalog {
    settings: DatabaseSettings,
    port: u16,
    runtime: Runtime,
}

impl PgCatalog {
    /// `port` is the host port the database container is published on.
    pub fn new(settings: &DatabaseSettings, port: u16) -> Result<Self, DumpError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DumpError::Database(format!("failed to start runtime: {e}")))?;
        Ok(Self {
            settings: settings.clone(),
            port,
            runtime,
        })
    }

    fn query(&self, dbname: &str, sql: &str) -> Result<Vec<Row>, tokio_postgres::Error> {
        debug!("querying {} on port {}", dbname, self.port);
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.settings.host)
            .port(self.port)
            .user(&self.settings.user)
            .password(&self.settings.password)
            .dbname(dbname);

        self.runtime.block_on(async move {
            let (client, connection) = config.connect(NoTls).await?;
            let handle = tokio::spawn(connection);
            let rows = client.query(sql, &[]).await;
            drop(client);
            let _ = handle.await;
            rows
        })
    }
}

fn db_err(dbname: &str) -> impl Fn(tokio_postgres::Error) -> DumpError + '_ {
    move |e| DumpError::Database(format!("{dbname}: {e}"))
}

impl Catalog for PgCatalog {
    fn databases(&self) -> Result<Vec<String>, DumpError> {
        self.query("postgres", LIST_DATABASES)
            .map_err(db_err("postgres"))?
            .iter()
            .map(|row| row.try_get::<_, String>(0).map_err(db_err("postgres")))
            .collect()
    }

    fn latest_version(&self, db: &str) -> Result<Option<VersionRecord>, DumpError> {
        let rows = match self.query(db, LATEST_VERSION) {
            Ok(rows) => rows,
            Err(e) if e.code() == Some(&SqlState::UNDEFINED_TABLE) => return Ok(None),
            Err(e) => return Err(db_err(db)(e)),
        };
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        Ok(Some(VersionRecord {
            date_done: row.try_get(0).map_err(db_err(db))?,
            number: row.try_get(1).map_err(db_err(db))?,
        }))
    }

    fn modules(&self, db: &str) -> Result<Vec<ModuleState>, DumpError> {
        self.query(db, INSTALLED_MODULES)
            .map_err(db_err(db))?
            .iter()
            .map(|row| {
                Ok(ModuleState::new(
                    row.try_get::<_, String>(0).map_err(db_err(db))?,
                    row.try_get::<_, String>(1).map_err(db_err(db))?,
                ))
            })
            .collect()
    }
}

/// In-memory catalog. Used for testing.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    versions: BTreeMap<String, Option<VersionRecord>>,
    modules: BTreeMap<String, Vec<ModuleState>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a database, optionally with a Marabunta version.
    pub fn database(mut self, name: &str, version: Option<VersionRecord>) -> Self {
        self.versions.insert(name.to_string(), version);
        self
    }

    /// Register the module states of a database.
    pub fn with_modules<'a>(
        mut self,
        name: &str,
        modules: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        self.versions.entry(name.to_string()).or_insert(None);
        self.modules.insert(
            name.to_string(),
            modules
                .into_iter()
                .map(|(n, s)| ModuleState::new(n, s))
                .collect(),
        );
        self
    }
}

impl Catalog for StaticCatalog {
    fn databases(&self) -> Result<Vec<String>, DumpError> {
        Ok(self.versions.keys().cloned().collect())
    }

    fn latest_version(&self, db: &str) -> Result<Option<VersionRecord>, DumpError> {
        self.versions
            .get(db)
            .cloned()
            .ok_or_else(|| DumpError::Database(format!("database \"{db}\" does not exist")))
    }

    fn modules(&self, db: &str) -> Result<Vec<ModuleState>, DumpError> {
        if !self.versions.contains_key(db) {
            return Err(DumpError::Database(format!("database \"{db}\" does not exist")));
        }
        Ok(self.modules.get(db).cloned().unwrap_or_default())
    }
}
