//! Crate-wide error type.

use crate::graph::connection::ConnectionError;

/// Errors surfaced by the graph browser itself.
///
/// Routine graph mutations (dropping an absent id, re-adding a present one)
/// are NOT errors - the surface reports those as `bool` results so callers
/// can branch without exceptions-as-control-flow.
#[derive(Debug, thiserror::Error)]
pub enum GraphBrowserError {
    /// `change_setting` was called with a key the surface does not know.
    #[error("unknown setting: {0}")]
    UnknownSetting(String),

    /// `change_setting` was called with a value of the wrong kind.
    #[error("setting {0} expects a {1} value")]
    SettingType(String, &'static str),

    /// The connection collaborator reported a failure.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Schema information was missing or malformed.
    #[error("schema error: {0}")]
    Schema(String),

    /// A serialized snapshot could not be read or written.
    #[error(transparent)]
    Snapshot(#[from] serde_json::Error),
}
