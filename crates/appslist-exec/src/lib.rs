//! appslist-exec: Local process execution abstraction
//!
//! Provides the `CommandExecutor` trait and a `tokio::process` backed implementation
//! used for share mounting and product catalog queries.

pub mod error;
pub mod local;
pub mod result;
pub mod traits;

pub use error::ExecError;
pub use local::LocalExecutor;
pub use result::{CommandResult, CommandSpec};
pub use traits::CommandExecutor;
