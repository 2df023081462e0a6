//! Database dump tooling for Odoo projects running PostgreSQL under Docker
//! Compose: local dumps, encrypted sharing through the S3 dumps bag, and
//! read-only inspection of the project databases.

pub mod artifact;
pub mod bag;
pub mod catalog;
pub mod compose;
pub mod error;
pub mod gpg;
pub mod modules;
pub mod project;
pub mod runner;
pub mod secrets;
pub mod settings;
pub mod versions;
pub mod workflow;

pub use artifact::DumpName;
pub use bag::DumpBag;
pub use catalog::{Catalog, PgCatalog, StaticCatalog};
pub use compose::{ContainerGuard, DbContainer, RetryPolicy};
pub use error::DumpError;
pub use gpg::Gpg;
pub use modules::{ModuleComparison, ModuleState};
pub use project::ProjectContext;
pub use runner::{Cmd, CmdOutput, CommandRunner, ScriptedRunner, ShellRunner};
pub use secrets::{LastPass, PasswordStore};
pub use settings::{DatabaseSettings, DumpsSettings, Settings, ToolSettings};
pub use versions::{DatabaseVersion, VersionRecord};
pub use workflow::{Download, DumpWorkflow, SharedDump};
