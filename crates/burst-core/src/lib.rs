//! burst-core: configuration and transfer-plan types shared by the
//! burst server and client. No I/O lives here.

pub mod config;
pub mod plan;

pub use config::{BurstConfig, ConfigError, StaticAddress};
pub use plan::{ChunkBuffer, ReceivePlan, SendPlan, FILL_BYTE};
