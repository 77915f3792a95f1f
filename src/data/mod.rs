mod model;

pub use model::{CallScript, ScriptStep};
