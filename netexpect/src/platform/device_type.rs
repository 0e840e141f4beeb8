//! Supported device families.

use std::fmt;
use std::str::FromStr;

use super::capabilities::DialectCapabilities;
use super::vendors;
use crate::error::PlatformError;

/// Login flows that cannot be expressed as plain data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStrategy {
    /// Wait for a prompt, disable paging, capture the base prompt.
    #[default]
    Standard,

    /// Junos users may land in the FreeBSD shell (`%` prompt); `cli` is
    /// sent to reach the operational CLI before the standard setup.
    JunosCli,
}

/// A resolved dialect: the capability record plus its strategy tag.
#[derive(Debug, Clone)]
pub struct Dialect {
    /// Registry key (e.g. `cisco_ios`).
    pub name: String,

    /// Commands and patterns for this family.
    pub capabilities: DialectCapabilities,

    /// Login strategy.
    pub strategy: SessionStrategy,
}

impl Dialect {
    /// Create a dialect with the standard strategy.
    pub fn new(name: impl Into<String>, capabilities: DialectCapabilities) -> Self {
        Self {
            name: name.into(),
            capabilities,
            strategy: SessionStrategy::Standard,
        }
    }

    /// Set the login strategy.
    pub fn with_strategy(mut self, strategy: SessionStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Built-in device families, parsed once from a `device_type` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    CiscoIos,
    CiscoXe,
    CiscoNxos,
    CiscoXr,
    CiscoAsa,
    AristaEos,
    JuniperJunos,
    Linux,
    Generic,
}

impl DeviceType {
    /// All built-in device types.
    pub const ALL: [DeviceType; 9] = [
        DeviceType::CiscoIos,
        DeviceType::CiscoXe,
        DeviceType::CiscoNxos,
        DeviceType::CiscoXr,
        DeviceType::CiscoAsa,
        DeviceType::AristaEos,
        DeviceType::JuniperJunos,
        DeviceType::Linux,
        DeviceType::Generic,
    ];

    /// Registry key for this device type.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceType::CiscoIos => "cisco_ios",
            DeviceType::CiscoXe => "cisco_xe",
            DeviceType::CiscoNxos => "cisco_nxos",
            DeviceType::CiscoXr => "cisco_xr",
            DeviceType::CiscoAsa => "cisco_asa",
            DeviceType::AristaEos => "arista_eos",
            DeviceType::JuniperJunos => "juniper_junos",
            DeviceType::Linux => "linux",
            DeviceType::Generic => "generic",
        }
    }

    /// Build the dialect record for this device type.
    pub fn dialect(&self) -> Dialect {
        let capabilities = match self {
            DeviceType::CiscoIos => vendors::cisco::ios(),
            DeviceType::CiscoXe => vendors::cisco::xe(),
            DeviceType::CiscoNxos => vendors::cisco::nxos(),
            DeviceType::CiscoXr => vendors::cisco::xr(),
            DeviceType::CiscoAsa => vendors::cisco::asa(),
            DeviceType::AristaEos => vendors::arista::eos(),
            DeviceType::JuniperJunos => vendors::juniper::junos(),
            DeviceType::Linux => vendors::linux::linux(),
            DeviceType::Generic => vendors::generic(),
        };

        let strategy = match self {
            DeviceType::JuniperJunos => SessionStrategy::JunosCli,
            _ => SessionStrategy::Standard,
        };

        Dialect::new(self.name(), capabilities).with_strategy(strategy)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceType {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let device_type = match key.as_str() {
            "cisco_ios" => DeviceType::CiscoIos,
            "cisco_xe" | "cisco_iosxe" => DeviceType::CiscoXe,
            "cisco_nxos" => DeviceType::CiscoNxos,
            "cisco_xr" | "cisco_iosxr" => DeviceType::CiscoXr,
            "cisco_asa" => DeviceType::CiscoAsa,
            "arista_eos" => DeviceType::AristaEos,
            "juniper" | "juniper_junos" => DeviceType::JuniperJunos,
            "linux" => DeviceType::Linux,
            "generic" | "generic_termserver" => DeviceType::Generic,
            _ => return Err(PlatformError::UnknownDeviceType { name: s.to_string() }),
        };
        Ok(device_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("cisco_ios".parse::<DeviceType>().unwrap(), DeviceType::CiscoIos);
        assert_eq!("CISCO_IOSXE".parse::<DeviceType>().unwrap(), DeviceType::CiscoXe);
        assert_eq!("juniper".parse::<DeviceType>().unwrap(), DeviceType::JuniperJunos);
        assert!("hp_comware".parse::<DeviceType>().is_err());
    }

    #[test]
    fn test_name_round_trips_through_parse() {
        for device_type in DeviceType::ALL {
            assert_eq!(device_type.name().parse::<DeviceType>().unwrap(), device_type);
        }
    }

    #[test]
    fn test_strategy_tag() {
        assert_eq!(DeviceType::JuniperJunos.dialect().strategy, SessionStrategy::JunosCli);
        assert_eq!(DeviceType::CiscoIos.dialect().strategy, SessionStrategy::Standard);
    }
}
