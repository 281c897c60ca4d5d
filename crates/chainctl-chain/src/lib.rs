//! chainctl Chain - lifecycle coordinator for a locally built node
//!
//! Given a Cosmos SDK application source tree, this crate:
//! - classifies the SDK version and binds a version-specific [`Plugin`]
//! - resolves chain ID, home, keyring backend, binary and addresses through
//!   ordered fallback [`Cascade`]s over options, config and defaults
//! - builds a [`Runner`] that renders and executes node commands
//! - serves the node: generate, compile, start, and restart on source changes
//!
//! # Example
//!
//! ```rust,ignore
//! use chainctl_chain::{Chain, ChainOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let mut chain = Chain::new("./mars", ChainOptions::new().verbose())?;
//! println!("{} at {}", chain.id()?, chain.home()?.display());
//!
//! let shutdown = CancellationToken::new();
//! chain.serve(shutdown.clone()).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod addr;
pub mod app;
pub mod cascade;
pub mod chain;
pub mod chaincmd;
pub mod codegen;
pub mod env;
pub mod error;
pub mod exec;
mod gomod;
pub mod keyring;
pub mod options;
pub mod plugin;
pub mod revision;
pub mod runner;
pub mod serve;
pub mod version;

pub use app::App;
pub use cascade::{Cascade, Resolved};
pub use chain::Chain;
pub use chaincmd::{ChainCmd, ChainCmdSettings, Step};
pub use codegen::{
    BufGenerator, CacheStorage, CodeGenerator, GenerateOptions, GoToolchain, Toolchain,
};
pub use env::{Environment, RPC_ADDRESS_VAR};
pub use error::{ChainError, GenerationError, ProcessError, Result, SourceError, VersionError};
pub use keyring::{KeyringBackend, UnknownKeyringBackend};
pub use options::{ChainOptions, Verbosity};
pub use plugin::{CommandConventions, Plugin, StargatePlugin};
pub use revision::{GitRevision, RevisionSource, SourceRevision, StaticRevision};
pub use runner::{
    LabeledOutput, NodeProcess, OutputSink, Runner, StdioSink, StepOutput, Stream, LABEL_WIDTH,
};
pub use serve::{Fingerprint, Refresher, ServeEvent};
pub use version::{Family, Version};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
