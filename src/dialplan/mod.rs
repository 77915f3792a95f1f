//! Ahead-of-time compilation of validated flows into dialplan artifacts.
//!
//! A [`DialplanArtifact`] is a self-contained, versioned set of instruction
//! blocks. It can be saved with bincode, executed by [`DialplanVm`] with the
//! same observable behavior as the live engine, or rendered as Asterisk
//! `extensions.conf` text.

pub mod artifact;
pub mod compiler;
pub mod instruction;
pub mod render;
pub mod visualizer;
pub mod vm;

pub use artifact::{DialplanArtifact, FORMAT_VERSION, MenuBlock};
pub use compiler::{CompileOptions, compile};
pub use instruction::{Block, Instruction, Target, Terminal};
pub use render::render_asterisk;
pub use visualizer::visualize_artifact;
pub use vm::DialplanVm;
