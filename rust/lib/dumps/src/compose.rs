//! Docker Compose database container lifecycle.
//!
//! [`DbContainer::ensure_up`] hands out a [`ContainerGuard`]. The guard stops
//! the service on drop, but only when it was the one that started it.

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::DumpError;
use crate::runner::{Cmd, CommandRunner};
use crate::settings::{DatabaseSettings, ToolSettings};

/// Readiness polling after `up -d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(300),
        }
    }
}

/// The compose service running PostgreSQL.
pub struct DbContainer<R> {
    runner: R,
    program: String,
    service: String,
    container_port: u16,
    retry: RetryPolicy,
}

impl<R: CommandRunner> DbContainer<R> {
    pub fn new(runner: R, tools: &ToolSettings, db: &DatabaseSettings) -> Self {
        Self {
            runner,
            program: tools.docker_compose.clone(),
            service: db.service.clone(),
            container_port: db.container_port,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn compose(&self) -> Cmd {
        Cmd::new(&self.program)
    }

    fn port_cmd(&self) -> Cmd {
        self.compose()
            .args(["port", self.service.as_str()])
            .arg(self.container_port.to_string())
    }

    /// Whether the service currently publishes its port.
    pub fn is_up(&self) -> bool {
        self.runner.run(&self.port_cmd()).is_ok()
    }

    /// Host port the container port is published on.
    pub fn host_port(&self) -> Result<u16, DumpError> {
        let out = self.runner.run(&self.port_cmd())?;
        parse_port(&out.stdout)
    }

    /// Make sure the service is reachable until the returned guard is dropped.
    pub fn ensure_up(&self) -> Result<ContainerGuard<'_, R>, DumpError> {
        if self.is_up() {
            let port = self.host_port()?;
            debug!("{} already up on port {}", self.service, port);
            return Ok(ContainerGuard {
                container: self,
                port,
                started: false,
            });
        }

        info!("starting compose service {}", self.service);
        self.runner
            .run(&self.compose().args(["up", "-d", self.service.as_str()]))?;

        // From here on the guard owns the service, so an early return still stops it.
        let mut guard = ContainerGuard {
            container: self,
            port: 0,
            started: true,
        };

        let mut count = 0;
        loop {
            match self.host_port() {
                Ok(port) => {
                    guard.port = port;
                    return Ok(guard);
                }
                Err(e) => {
                    count += 1;
                    if count >= self.retry.attempts {
                        return Err(e);
                    }
                    println!("Waiting for DB container to start");
                    thread::sleep(self.retry.delay);
                }
            }
        }
    }

    fn stop(&self) -> Result<(), DumpError> {
        self.runner
            .run(&self.compose().args(["stop", self.service.as_str()]))?;
        Ok(())
    }
}

/// Keeps the database reachable. See [`DbContainer::ensure_up`].
pub struct ContainerGuard<'a, R: CommandRunner> {
    container: &'a DbContainer<R>,
    port: u16,
    started: bool,
}

impl<R: CommandRunner> ContainerGuard<'_, R> {
    /// Host port of the running database.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl<R: CommandRunner> Drop for ContainerGuard<'_, R> {
    fn drop(&mut self) {
        if !self.started {
            return;
        }
        if let Err(e) = self.container.stop() {
            warn!("failed to stop {}: {}", self.container.service, e);
        }
    }
}

/// Parse the host port from `docker-compose port` output (`0.0.0.0:49153`).
pub fn parse_port(output: &str) -> Result<u16, DumpError> {
    let field = output.trim().rsplit(':').next().unwrap_or_default();
    field
        .trim()
        .parse()
        .map_err(|_| DumpError::Parse(format!("unexpected port output: {:?}", output.trim())))
}
