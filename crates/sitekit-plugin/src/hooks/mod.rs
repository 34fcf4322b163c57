//! Hook system — registry, dispatcher, and the hook name vocabulary.

pub mod definitions;
pub mod dispatcher;
pub mod registry;

pub use definitions::{HookArgs, HookName, HookOutcome};
pub use dispatcher::{DispatchReport, HookDispatcher, HookFailure, HookFailureKind};
pub use registry::{ClosureHandler, DEFAULT_PRIORITY, HookHandler, HookRegistry};
