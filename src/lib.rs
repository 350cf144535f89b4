#![forbid(unsafe_code)]

//! Client SDK for the `adom` agent.
//!
//! Spawns the agent executable, starts or resumes threads, and streams turn
//! and item events back over a JSON Lines stdio protocol.
//!
//! ```rust,no_run
//! use adom_sdk::{Adom, ClientConfig, ThreadOptions, TurnOptions};
//!
//! # async fn demo() -> adom_sdk::Result<()> {
//! let client = Adom::new(ClientConfig::default())?;
//! let thread = client.start_thread(ThreadOptions::default());
//! let result = thread.run("Summarize the repository", TurnOptions::default()).await?;
//! println!("{}", result.final_response);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod errors;
pub mod exec;
pub mod models;
pub mod options;
pub mod orchestrator;

pub use client::Adom;
pub use config::ClientConfig;
pub use errors::{Result, SdkError};
pub use models::events::{ThreadEvent, Usage};
pub use models::input::{Input, UserInput};
pub use models::items::ThreadItem;
pub use options::{ApprovalMode, ReasoningEffort, SandboxMode, ThreadOptions, TurnOptions};
pub use orchestrator::controller::EventStream;
pub use orchestrator::thread::Thread;
pub use orchestrator::turn::RunResult;
