use crate::error::DumpError;
use crate::runner::{Cmd, CommandRunner};

/// Looks up secrets by identifier.
pub trait PasswordStore {
    fn password(&self, id: &str) -> Result<String, DumpError>;
}

/// LastPass CLI (`lpass`). Requires a prior `lpass login`.
pub struct LastPass<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> LastPass<R> {
    pub fn new(runner: R, program: &str) -> Self {
        Self {
            runner,
            program: program.to_string(),
        }
    }
}

impl<R: CommandRunner> PasswordStore for LastPass<R> {
    fn password(&self, id: &str) -> Result<String, DumpError> {
        let out = self
            .runner
            .run(&Cmd::new(&self.program).args(["show", "--password", id]))?;
        let password = out.stdout.trim_end_matches(['\r', '\n']).to_string();
        if password.is_empty() {
            return Err(DumpError::NotFound(format!("no password stored for entry {id}")));
        }
        Ok(password)
    }
}
