//! Prelude module for convenient imports
//!
//! Re-exports the types most programs embedding the engine need.
//!
//! ```rust,no_run
//! use annai::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let flow = FlowDocument::from_file("path/to/flow.json")?.into_flow()?;
//! let validated = validate(flow, &ValidationOptions::default())?;
//! let artifact = compile(&validated, &CompileOptions::default());
//! println!("{}", render_asterisk(&artifact));
//! # Ok(())
//! # }
//! ```

// Flows and validation
pub use crate::flow::{Action, Flow, FlowDocument, FlowRegistry, IntoFlow, Language, Menu, Prompt};
pub use crate::validator::{ValidatedFlow, ValidationOptions, validate};

// Navigation
pub use crate::backend::{BackendChoice, CallBackend, load_backend};
pub use crate::navigation::{CallEvent, CallSession, CallState, Effect, NavigationEngine};

// Dialplan compilation
pub use crate::dialplan::{CompileOptions, DialplanArtifact, DialplanVm, compile, render_asterisk};

// Configuration and scripted input
pub use crate::config::EngineConfig;
pub use crate::data::CallScript;

// Error types
pub use crate::error::{FlowError, NavigationError, ValidationError};

// Trace formatting
pub use crate::trace::TraceFormatter;

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
