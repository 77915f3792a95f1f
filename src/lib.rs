//! # Annai - IVR Flow Compilation and Call Navigation Engine
//!
//! **Annai** turns declarative IVR flows (languages, prompts, DTMF menus and
//! their actions) into something a telephony platform can run. A flow is
//! validated once; the validated flow is then either walked directly by the
//! live navigation engine or compiled ahead of time into a dialplan artifact
//! that runs on a small VM or renders as Asterisk `extensions.conf` text.
//!
//! ## Core Workflow
//!
//! 1.  **Load Your Flow**: Parse a flow document (JSON or YAML) with [`flow::FlowDocument`],
//!     or implement [`flow::IntoFlow`] for your own format.
//! 2.  **Validate**: [`validator::validate`] collects every structural and
//!     referential defect and yields a [`validator::ValidatedFlow`].
//! 3.  **Navigate**: Pick a backend with [`backend::load_backend`] and feed it
//!     caller events. Each call owns its own [`navigation::CallSession`].
//! 4.  **Compile**: [`dialplan::compile`] produces a deterministic, versioned
//!     artifact for deployment.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use annai::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<()> {
//!     let config = EngineConfig::default();
//!     let flow = FlowDocument::from_file("flows/sales.yaml")?.into_flow()?;
//!     let validated = Arc::new(validate(flow, &config.validation_options())?);
//!
//!     let backend = load_backend(BackendChoice::Live, validated, &config);
//!     let now = chrono::Utc::now();
//!     let (mut session, effects) = backend.start("call-1", now);
//!     println!("{}", TraceFormatter::format_effects(&effects));
//!
//!     let effects = backend.handle(&mut session, CallEvent::Digits("1".into()), now)?;
//!     println!("{}", TraceFormatter::format_effects(&effects));
//!     println!("{}", session.state);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod data;
pub mod dialplan;
pub mod error;
pub mod flow;
pub mod navigation;
pub mod prelude;
pub mod prompt;
pub mod schedule;
pub mod trace;
pub mod validator;
