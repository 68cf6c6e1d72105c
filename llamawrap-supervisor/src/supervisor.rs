//! The server supervisor and the handles it returns.

use std::process::Stdio;

use llamawrap_types::SupervisorError;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::process;

/// Executable started by default.
pub const DEFAULT_PROGRAM: &str = "ollama";

/// Arguments passed to [`DEFAULT_PROGRAM`].
pub const DEFAULT_SERVE_ARGS: &[&str] = &["serve"];

/// Process name that identifies a running server.
pub const DEFAULT_PROCESS_NAME: &str = "ollama";

/// A running server, either found or started by a [`ServerSupervisor`].
#[derive(Debug)]
pub struct ServerHandle {
    pid: u32,
    child: Option<Child>,
}

impl ServerHandle {
    /// Process id of the server.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the supervisor spawned this server (and will kill it on stop).
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.child.is_some()
    }
}

/// Starts the server on demand and stops what it started.
///
/// `start` is a critical section: concurrent calls are serialized, and each
/// one first looks for a server that is already up, so two calls never
/// spawn two servers.
#[derive(Debug)]
pub struct ServerSupervisor {
    program: String,
    args: Vec<String>,
    process_name: String,
    /// Pid of the server this supervisor last spawned.
    spawned: Mutex<Option<u32>>,
}

impl Default for ServerSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerSupervisor {
    /// Supervise `ollama serve`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: DEFAULT_PROGRAM.into(),
            args: DEFAULT_SERVE_ARGS.iter().map(|a| (*a).to_string()).collect(),
            process_name: DEFAULT_PROCESS_NAME.into(),
            spawned: Mutex::new(None),
        }
    }

    /// Override the executable.
    #[must_use]
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Override the arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Override the process name used to detect a running server.
    #[must_use]
    pub fn process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = name.into();
        self
    }

    /// Pid of a running server, if any.
    #[must_use]
    pub fn find_running_pid(&self) -> Option<u32> {
        process::find_by_name(&self.process_name)
    }

    /// Make sure a server is running.
    ///
    /// Returns an attached handle for a server that was already up, or an
    /// owned handle for one spawned now.
    ///
    /// # Errors
    ///
    /// [`SupervisorError::Start`] if the program cannot be spawned,
    /// [`SupervisorError::MissingPid`] if it exited before reporting a pid.
    pub async fn start(&self) -> Result<ServerHandle, SupervisorError> {
        let mut spawned = self.spawned.lock().await;

        if let Some(pid) = *spawned {
            if process::is_alive(pid) {
                tracing::debug!(pid, "server started earlier is still running");
                return Ok(ServerHandle { pid, child: None });
            }
            *spawned = None;
        }

        if let Some(pid) = self.find_running_pid() {
            tracing::info!(pid, process = %self.process_name, "attaching to running server");
            return Ok(ServerHandle { pid, child: None });
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(SupervisorError::Start)?;
        let pid = child.id().ok_or(SupervisorError::MissingPid)?;

        tracing::info!(pid, program = %self.program, args = ?self.args, "started server");
        *spawned = Some(pid);
        Ok(ServerHandle {
            pid,
            child: Some(child),
        })
    }

    /// Stop a server returned by [`start`](Self::start).
    ///
    /// An owned server is killed and reaped. An attached server was not
    /// started here and is left running.
    ///
    /// # Errors
    ///
    /// [`SupervisorError::Stop`] if the owned process cannot be killed.
    pub async fn stop(&self, handle: ServerHandle) -> Result<(), SupervisorError> {
        let ServerHandle { pid, child } = handle;
        let Some(mut child) = child else {
            tracing::debug!(pid, "leaving attached server running");
            return Ok(());
        };

        let mut spawned = self.spawned.lock().await;
        child
            .kill()
            .await
            .map_err(|source| SupervisorError::Stop { pid, source })?;
        if *spawned == Some(pid) {
            *spawned = None;
        }

        tracing::info!(pid, "stopped server");
        Ok(())
    }
}
