//! The schema-driven property form engine.
//!
//! A schema is a tree of [`PropertyDefine`]s. [`analyse`] decorates every
//! define with its write-back path and collects the default value tree;
//! [`get_property_value`] and [`write_back`] read and write single controls
//! in a value tree; [`codec`] turns schemas into text and back; [`list`]
//! keeps row identity for List controls.

pub mod analyse;
pub mod codec;
pub mod getter;
pub mod list;
pub mod path;
pub mod schema;
pub mod values;

pub use analyse::{analyse, analyse_with, Analysis, DecoratedNode};
pub use codec::{decode, encode, try_decode};
pub use getter::GetterRunner;
pub use list::{Debouncer, ListBinding, ListEvent, ListState, RowId};
pub use path::{get_property_value, path_keys, resolve_path, PathSegment};
pub use schema::{Ctrl, CtrlType, Getter, PropertyDefine, PropertyParam, SelectOption};
pub use values::{create_branch, deep_merge, write_back, ArrayMerge};

use thiserror::Error;

/// Problems with schema text or schema shape.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The text is not valid schema JSON
    #[error("invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A List must have exactly one template define
    #[error("list '{key}' must have exactly one template define, found {count}")]
    ListTemplateCardinality {
        /// Key of the offending List
        key: String,
        /// Number of template defines found
        count: usize,
    },
    /// A list-only operation was used on another kind of control
    #[error("control '{key}' is a {type_name}, not a List")]
    NotAList {
        /// Key of the control
        key: String,
        /// Its control kind
        type_name: String,
    },
}
