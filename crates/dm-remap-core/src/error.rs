//! Domain error types for the target-type core.
//!
//! Uses `thiserror` for ergonomic error definitions with proper context.

use thiserror::Error;

use crate::device::DeviceId;
use crate::io::Sector;
use crate::table::Origin;

/// Errors raised while registering target types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A target type with this name is already registered.
    #[error("target type '{name}' already registered")]
    DuplicateTargetName { name: String },

    /// The name is empty, too long, or contains characters outside `[A-Za-z0-9._+-]`.
    #[error("invalid target type name '{name}': {reason}")]
    InvalidTargetName { name: String, reason: &'static str },

    /// The registry could not grow to hold another entry.
    #[error("out of memory while registering target type '{name}'")]
    AllocationFailure { name: String },
}

/// Errors raised by a target's `construct`.
///
/// A construct that fails never leaves a device dependency or an instance behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructError {
    /// Missing, excess or unparseable argument tokens.
    #[error("malformed arguments: {reason}")]
    MalformedArguments { reason: String },

    /// The device path could not be resolved to a device.
    #[error("no such device '{path}'")]
    DeviceResolutionFailure {
        path: String,
        #[source]
        source: DeviceError,
    },

    /// The device table refused to record the dependency.
    #[error("failed to add destination device {device} to list")]
    DependencyRegistrationFailure {
        device: DeviceId,
        #[source]
        source: DeviceError,
    },

    /// Instance state could not be allocated.
    #[error("couldn't allocate memory for {target} context")]
    AllocationFailure { target: &'static str },
}

impl ConstructError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedArguments {
            reason: reason.into(),
        }
    }

    /// Short label for the failing step, used as a metric label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedArguments { .. } => "malformed_arguments",
            Self::DeviceResolutionFailure { .. } => "device_resolution",
            Self::DependencyRegistrationFailure { .. } => "dependency_registration",
            Self::AllocationFailure { .. } => "allocation",
        }
    }
}

/// Errors raised by a [`DeviceTable`](crate::device::DeviceTable).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No device is known under the given path.
    #[error("device path '{0}' not found")]
    NotFound(String),

    /// The dependency could not be recorded.
    #[error("dependency on {device} rejected: {reason}")]
    DependencyRejected { device: DeviceId, reason: String },
}

/// Errors raised by the [`ArgumentCursor`](crate::args::ArgumentCursor).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    /// No token remains.
    #[error("no more arguments")]
    Exhausted,

    /// A token was present but could not be parsed.
    #[error("'{token}' is not an unsigned number")]
    Malformed { token: String },

    /// A token remained after the last expected argument.
    #[error("unexpected argument '{token}'")]
    Unexpected { token: String },
}

/// Errors raised while building a segment table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// The table line could not be split into start, length and target type.
    #[error("{at}: {reason}")]
    Syntax { at: Origin, reason: String },

    /// No target type with this name is registered.
    #[error("{at}: unknown target type '{name}'")]
    UnknownTargetName { at: Origin, name: String },

    /// A segment of zero sectors.
    #[error("{at}: segment at sector {start} has zero length")]
    EmptySegment { at: Origin, start: Sector },

    /// The segment does not start where the previous one ended.
    #[error("{at}: segment starts at sector {start}, expected {expected}")]
    NotContiguous {
        at: Origin,
        start: Sector,
        expected: Sector,
    },

    /// The target's construct failed.
    #[error("{at}: {target}: {source}")]
    Construct {
        at: Origin,
        target: String,
        #[source]
        source: ConstructError,
    },

    /// The segment list could not grow.
    #[error("{at}: out of memory growing segment table")]
    AllocationFailure { at: Origin },

    /// `build` was called before any segment was added.
    #[error("table has no segments")]
    Empty,
}

/// Errors related to configuration parsing and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Two devices share a path.
    #[error("device path '{0}' declared more than once")]
    DuplicateDevice(String),

    /// A device was declared without a path.
    #[error("device {0} has an empty path")]
    EmptyDevicePath(DeviceId),

    /// No table lines were given.
    #[error("table has no segments")]
    EmptyTable,
}

/// Result type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Result type alias for target construction.
pub type ConstructResult<T> = std::result::Result<T, ConstructError>;

/// Result type alias for table building.
pub type TableResult<T> = std::result::Result<T, TableError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
