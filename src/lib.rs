//! Switchboard: multi-agent conversational orchestration.
//!
//! A user turn flows through an [`agent::AgentRunner`], which loads the
//! session, runs the active [`agent::Agent`]'s bounded tool loop against a
//! [`provider::ModelProvider`], and hands the conversation to another agent
//! when the active one calls `get_help`.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use switchboard::prelude::*;
//! use switchboard::tools::builtin::get_help_tool;
//!
//! # async fn example() -> Result<(), SwitchboardError> {
//! let config = SwitchboardConfig::load(None)?;
//! let provider: Arc<dyn ModelProvider> =
//!     Arc::from(switchboard::provider::create_provider(&config.provider)?);
//! let catalog = ToolCatalog::new().with(get_help_tool());
//! let store = Arc::new(InMemorySessionStore::new());
//!
//! let runner = AgentRunner::from_config(&config, provider, &catalog, store)?;
//! let reply = runner.run(Some("What is the slogan of NESCAFE?"), "s1").await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod history;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
