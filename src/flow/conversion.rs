use super::definition::Flow;
use crate::error::FlowError;

/// A trait for custom document models that can be converted into an annai `Flow`.
///
/// This is the extension point that keeps annai format-agnostic. The bundled
/// [`FlowDocument`](super::FlowDocument) implements it for the JSON/YAML layout;
/// management layers with their own storage model implement it for theirs.
///
/// # Example
///
/// ```rust,no_run
/// use annai::error::FlowError;
/// use annai::flow::{Action, Flow, IntoFlow, Menu, Prompt};
///
/// struct StoredFlow {
///     id: String,
///     greeting: String,
///     sales_queue: String,
/// }
///
/// impl IntoFlow for StoredFlow {
///     fn into_flow(self) -> Result<Flow, FlowError> {
///         let mut flow = Flow::new(&self.id);
///         flow.prompts.insert(
///             "welcome".to_string(),
///             Prompt::new("welcome").with_text("en-US", &self.greeting),
///         );
///         flow.menus.insert(
///             "main".to_string(),
///             Menu::new("main", "welcome").with_option(
///                 "1",
///                 Action::Queue { queue_ref: self.sales_queue },
///             ),
///         );
///         Ok(flow)
///     }
/// }
/// ```
pub trait IntoFlow {
    /// Consumes the object and converts it into an annai flow.
    fn into_flow(self) -> Result<Flow, FlowError>;
}

impl IntoFlow for Flow {
    fn into_flow(self) -> Result<Flow, FlowError> {
        Ok(self)
    }
}
