//! Registry of named target types.
//!
//! Maps a target type name, as it appears in a table line, to the
//! implementation that constructs segments of that type. Entries are
//! permanent: there is no unregistration, so a [`TargetTypeRef`] obtained
//! from [`TargetRegistry::lookup`] never dangles.
//!
//! # Usage
//!
//! ```ignore
//! let registry = TargetRegistry::with_builtins()?;
//!
//! let linear = registry.lookup("linear").expect("built-in");
//! let instance = linear.construct(&devices, segment, &mut args, &mut sink)?;
//! ```

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::target::{ErrorTarget, LinearTarget, TargetType, TargetTypeRef};

/// Longest accepted target type name, in bytes.
pub const MAX_TARGET_NAME_LEN: usize = 128;

/// Name of the built-in [`ErrorTarget`].
pub const IO_ERR: &str = "io-err";

/// Name of the built-in [`LinearTarget`].
pub const LINEAR: &str = "linear";

/// Registry of target types keyed by name.
///
/// A single lock covers the whole map. Registration checks for a duplicate
/// and inserts under the write lock; lookups take the read lock. Neither is
/// on the I/O path: segments keep the instance they constructed and never
/// consult the registry again.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: RwLock<HashMap<String, TargetTypeRef>>,
}

impl TargetRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in `io-err` and `linear` targets.
    ///
    /// # Errors
    ///
    /// Returns the first registration error. On a fresh registry this
    /// indicates a broken build and should abort initialization.
    pub fn with_builtins() -> RegistryResult<Self> {
        let registry = Self::new();
        registry.register(IO_ERR, ErrorTarget)?;
        registry.register(LINEAR, LinearTarget)?;
        info!(targets = ?registry.names(), "built-in target types registered");
        Ok(registry)
    }

    /// The process-wide registry, bootstrapped with the built-in targets on
    /// first use.
    ///
    /// # Panics
    ///
    /// Panics if bootstrapping the built-in targets fails; the process cannot
    /// map any table without them.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<TargetRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            Self::with_builtins().unwrap_or_else(|e| panic!("target registry bootstrap failed: {e}"))
        })
    }

    /// Register a target type under `name`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidTargetName`] if the name is empty, longer
    ///   than [`MAX_TARGET_NAME_LEN`] or uses characters outside `[A-Za-z0-9._+-]`
    /// - [`RegistryError::DuplicateTargetName`] if the name is taken; the
    ///   existing entry is left untouched
    /// - [`RegistryError::AllocationFailure`] if the map cannot grow
    pub fn register<T: TargetType>(&self, name: &str, target: T) -> RegistryResult<()> {
        validate_name(name)?;
        let entry = TargetTypeRef::new(name, target);

        // Poisoning cannot leave a torn entry behind: the map is only ever
        // inserted into, after all fallible work is done.
        let mut targets = self.targets.write().unwrap_or_else(PoisonError::into_inner);
        if targets.contains_key(name) {
            warn!(target_type = name, "target type already registered");
            return Err(RegistryError::DuplicateTargetName {
                name: name.to_string(),
            });
        }
        targets
            .try_reserve(1)
            .map_err(|_| RegistryError::AllocationFailure {
                name: name.to_string(),
            })?;
        targets.insert(name.to_string(), entry);
        drop(targets);

        debug!(target_type = name, "target type registered");
        Ok(())
    }

    /// Look up a target type by exact name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TargetTypeRef> {
        self.targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Check whether a target type is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of registered target types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Table lines select a target type by a single whitespace-delimited token,
/// so names are limited to characters that survive that split.
fn validate_name(name: &str) -> RegistryResult<()> {
    static VALID: OnceLock<Regex> = OnceLock::new();
    let valid = VALID.get_or_init(|| Regex::new(r"^[A-Za-z0-9._+-]+$").expect("valid regex"));

    let reason = if name.is_empty() {
        "name is empty"
    } else if name.len() > MAX_TARGET_NAME_LEN {
        "name is longer than 128 bytes"
    } else if !valid.is_match(name) {
        "name may only contain letters, digits, '.', '_', '+' and '-'"
    } else {
        return Ok(());
    };

    Err(RegistryError::InvalidTargetName {
        name: name.to_string(),
        reason,
    })
}
