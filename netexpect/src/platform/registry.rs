//! Global dialect registry for looking up device families by name.

use std::sync::RwLock;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use super::device_type::{DeviceType, Dialect};
use crate::error::{PlatformError, Result};

/// Global dialect registry.
static REGISTRY: Lazy<RwLock<DialectRegistry>> = Lazy::new(|| {
    let mut registry = DialectRegistry::new();
    registry.register_builtin_dialects();
    RwLock::new(registry)
});

/// Registry mapping device-type keys to dialect records.
#[derive(Debug, Default)]
pub struct DialectRegistry {
    dialects: IndexMap<String, Dialect>,
}

impl DialectRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            dialects: IndexMap::new(),
        }
    }

    /// Get the global registry.
    pub fn global() -> &'static RwLock<DialectRegistry> {
        &REGISTRY
    }

    /// Resolve a key against the global registry.
    pub fn lookup(name: &str) -> Result<Dialect> {
        let registry = Self::global()
            .read()
            .map_err(|_| PlatformError::InvalidDefinition {
                message: "dialect registry lock poisoned".to_string(),
            })?;
        registry.resolve(name)
    }

    fn register_builtin_dialects(&mut self) {
        for device_type in DeviceType::ALL {
            self.dialects
                .insert(device_type.name().to_string(), device_type.dialect());
        }
    }

    /// Register a custom dialect under its name.
    pub fn register(&mut self, dialect: Dialect) -> Result<()> {
        if self.dialects.contains_key(&dialect.name) {
            return Err(PlatformError::AlreadyRegistered {
                name: dialect.name.clone(),
            }
            .into());
        }
        self.dialects.insert(dialect.name.clone(), dialect);
        Ok(())
    }

    /// Resolve a key, accepting built-in aliases.
    pub fn resolve(&self, name: &str) -> Result<Dialect> {
        if let Some(dialect) = self.dialects.get(name) {
            return Ok(dialect.clone());
        }

        let device_type: DeviceType = name.parse()?;
        self.dialects
            .get(device_type.name())
            .cloned()
            .ok_or_else(|| PlatformError::UnknownDeviceType { name: name.to_string() }.into())
    }

    /// Get a dialect by exact name.
    pub fn get(&self, name: &str) -> Option<&Dialect> {
        self.dialects.get(name)
    }

    /// Check if a dialect is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.dialects.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.dialects.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DialectCapabilities;

    fn builtin() -> DialectRegistry {
        let mut registry = DialectRegistry::new();
        registry.register_builtin_dialects();
        registry
    }

    #[test]
    fn test_builtin_names_in_order() {
        let registry = builtin();
        let names: Vec<&String> = registry.names().collect();
        assert_eq!(names.first().map(|s| s.as_str()), Some("cisco_ios"));
        assert_eq!(names.len(), DeviceType::ALL.len());
    }

    #[test]
    fn test_resolve_alias() {
        let registry = builtin();
        let dialect = registry.resolve("cisco_iosxe").unwrap();
        assert_eq!(dialect.name, "cisco_xe");
    }

    #[test]
    fn test_register_custom_and_reject_duplicate() {
        let mut registry = builtin();
        let custom = Dialect::new("acme_os", DialectCapabilities::new(">#"));
        registry.register(custom.clone()).unwrap();
        assert!(registry.contains("acme_os"));
        assert!(registry.register(custom).is_err());
    }

    #[test]
    fn test_unknown_name() {
        assert!(builtin().resolve("nope").is_err());
    }

    #[test]
    fn test_global_lookup() {
        let dialect = DialectRegistry::lookup("linux").unwrap();
        assert!(dialect.capabilities.ansi_escape_codes);
    }
}
