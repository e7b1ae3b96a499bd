//! # codebox-core
//!
//! Sandbox orchestration layer for the codebox MCP server.
//!
//! This crate hides *where* code runs behind the [`CodeInterpreter`] and
//! [`FileInterface`] traits and keeps track of live sandboxes per session.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      codebox-core                        │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌─────────────────┐     ┌──────────────────────────┐   │
//! │  │ SandboxManager  │────▶│  HashMap<SessionId,      │   │
//! │  │   - create()    │     │       Arc<Sandbox>>      │   │
//! │  │   - get()       │     └──────────────────────────┘   │
//! │  │   - close()     │                                    │
//! │  └─────────────────┘                                    │
//! │           │                                              │
//! │           ▼                                              │
//! │  ┌─────────────────┐     ┌──────────────────────────┐   │
//! │  │    Sandbox      │────▶│ Box<dyn CodeInterpreter> │   │
//! │  │  - run_code()   │     └──────────────────────────┘   │
//! │  │  - files()      │           │              │         │
//! │  └─────────────────┘           ▼              ▼         │
//! │                      ┌──────────────┐ ┌──────────────┐  │
//! │                      │E2bInterpreter│ │    Local     │  │
//! │                      │  (HTTPS)     │ │ Interpreter  │  │
//! │                      └──────────────┘ └──────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use codebox_core::{InterpreterConfig, InterpreterKind, Language, ManagerConfig, SandboxManager};
//!
//! # async fn example() -> codebox_core::Result<()> {
//! let interpreter = InterpreterConfig::builder()
//!     .kind(InterpreterKind::E2b)
//!     .api_key(std::env::var("E2B_API_KEY").unwrap_or_default())
//!     .build()?;
//! let manager = SandboxManager::new(ManagerConfig::new(interpreter));
//!
//! let id = manager.create(None).await?;
//! let sandbox = manager.get(&id).await?;
//!
//! let result = sandbox.run_code("print('Hello from sandbox!')", Language::Python).await?;
//! println!("{}", result.stdout);
//!
//! sandbox.files().write("/tmp/test.txt", "Hello, World!").await?;
//! println!("{}", sandbox.files().read("/tmp/test.txt").await?);
//!
//! manager.close(&id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! - **e2b**: hosted code-interpreter sandboxes reached over HTTPS.
//! - **local**: a scratch directory plus host processes. Meant for
//!   development and tests; it is not an isolation boundary.

pub mod chart;
mod config;
mod e2b;
mod error;
mod interpreter;
mod local;
mod manager;
mod sandbox;

pub use chart::{ChartData, ChartImage, ChartKind, ChartRequest, ChartScript, PlotStyle, Series};
pub use config::{InterpreterConfig, InterpreterConfigBuilder, InterpreterKind};
pub use e2b::E2bInterpreter;
pub use error::{CoreError, Result};
pub use interpreter::{
    create_interpreter, Artifact, CodeInterpreter, ExecResult, ExecutionError, FileEntry,
    FileInterface, FileMetadata, Language,
};
pub use local::LocalInterpreter;
pub use manager::{ManagerConfig, SandboxManager};
pub use sandbox::{Sandbox, SandboxStatus, SandboxSummary, SessionId};
