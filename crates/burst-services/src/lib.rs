//! burst-services: link management, admission control, transfer engines,
//! and the server/client connection supervisors.

pub mod client;
pub mod link;
pub mod pool;
pub mod receive;
pub mod send;
pub mod server;

pub use client::{run_cycle, ClientSettings, ClientSupervisor, CycleOutcome};
pub use link::{Credentials, LinkDriver, LinkError, LinkEvent, LinkManager, LinkSignal, LinkState};
pub use pool::{SpawnError, TaskPool};
pub use receive::{receive, ReceiveOutcome, ReceiveReport};
pub use send::{serve, SendOutcome, SendReport};
pub use server::{ServerError, ServerSettings, ServerSupervisor};
