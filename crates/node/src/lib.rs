#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! The provider daemon: process lifecycle, the `Environment` seam external
//! wiring plugs into, and the boot sequence that assembles every other crate
//! in this workspace into one running process (C10 of the design docs).

/// The bundled in-memory reference [`Environment`].
pub mod dev;
/// The `Environment` trait: everything the boot sequence needs from outside
/// this workspace.
pub mod environment;
/// SIGINT/SIGTERM handling and the process exit code contract.
pub mod signals;
/// The Lifecycle Supervisor boot sequence.
pub mod supervisor;

pub use dev::DevEnvironment;
pub use environment::{Environment, EnvironmentError};
