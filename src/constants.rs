//! Shared application-wide constants.
//! Centralizes tweakable values used by the property editor, the pipeline model and the UI.

// Property editor
/// Trailing-edge debounce window (seconds) before a List control emits its array upward.
pub const LIST_EMIT_DEBOUNCE_SECS: f64 = 0.1;
/// Indentation used when encoding schemas to text.
pub const SCHEMA_INDENT: &[u8] = b"    ";
/// Distinct schemas the property panel keeps analysed before starting over.
pub const ANALYSIS_CACHE_LIMIT: usize = 64;

// Script sandbox
/// Maximum loop iterations a single getter may run.
pub const SCRIPT_LOOP_ITERATION_LIMIT: u64 = 100_000;
/// Maximum call depth inside a getter.
pub const SCRIPT_RECURSION_LIMIT: usize = 256;
/// Longest array a getter may return.
pub const SCRIPT_MAX_ARRAY_LEN: usize = 10_000;
/// Deepest nesting of arrays and objects a getter may return.
pub const SCRIPT_MAX_VALUE_DEPTH: usize = 64;

// Pipeline ids
/// Separator between the parts of an endpoint id (`outPin@action@node`).
pub const ENDPOINT_ID_SEPARATOR: char = '@';
/// Separator between the source and target endpoint ids of a line.
pub const LINE_ID_SEPARATOR: char = '&';

// Undo/redo
/// Maximum number of undo history entries to retain.
pub const MAX_UNDO_HISTORY: usize = 100;

// Layout
/// Default width of the property panel in points.
pub const PROPERTY_PANEL_WIDTH: f32 = 320.0;
/// Offset applied to pasted nodes so they do not cover the originals.
pub const PASTE_OFFSET: f32 = 40.0;
