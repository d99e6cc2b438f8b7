//! # Pipeline Designer
//!
//! A desktop editor for pipelines of nodes wired by lines. Each node exposes
//! events, actions and out-pins; connecting an event or out-pin to an action
//! creates a line whose params follow the action's schema.
//!
//! The heart of the crate is the [`property`] module: a declarative control
//! schema (inputs, pickers, containers and Lists) that is analysed into a
//! default value tree and rendered as an egui form, with edits written back
//! immutably.
//!
//! ## Features
//! - Schema analysis with elevated fields and List-scoped paths
//! - Getter params evaluated as JavaScript arrow functions
//! - List rows with stable identity across external updates
//! - Undo/redo, copy/paste and native save/load of pipelines

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod constants;
pub mod diff;
pub mod property;
pub mod script_engine;
mod types;
mod ui;

// Re-export public types and functions
pub use types::*;
pub use ui::{DesignerApp, PropertyChange, PropertyEditor};

/// Runs the designer with default window settings.
///
/// Must be called from within a tokio runtime context; file dialogs are
/// spawned onto it.
///
/// # Example
///
/// ```no_run
/// fn main() -> Result<(), eframe::Error> {
///     let runtime = tokio::runtime::Runtime::new().expect("runtime");
///     let _guard = runtime.enter();
///     pipeline_designer::run_app()
/// }
/// ```
pub fn run_app() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Pipeline Designer",
        options,
        Box::new(|cc| Ok(Box::new(DesignerApp::restore(cc.storage)))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_default() {
        let pipeline = Pipeline::default();
        assert!(pipeline.nodes.is_empty());
        assert!(pipeline.lines.is_empty());
        assert_eq!(pipeline.name, "Untitled pipeline");
    }

    #[test]
    fn test_designer_default() {
        let app = DesignerApp::default();
        assert!(app.pipeline.nodes.is_empty());
        assert!(!app.file.has_unsaved_changes);
    }
}
