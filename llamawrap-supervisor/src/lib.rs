#![deny(missing_docs)]
//! Starting, locating and stopping the local `ollama serve` process.
//!
//! ```no_run
//! # async fn demo() -> Result<(), llamawrap_types::SupervisorError> {
//! use llamawrap_supervisor::ServerSupervisor;
//!
//! let supervisor = ServerSupervisor::new();
//! let handle = supervisor.start().await?;
//! // ... talk to the server ...
//! supervisor.stop(handle).await?;
//! # Ok(())
//! # }
//! ```

mod process;
mod supervisor;

pub use supervisor::{
    DEFAULT_PROCESS_NAME, DEFAULT_PROGRAM, DEFAULT_SERVE_ARGS, ServerHandle, ServerSupervisor,
};
