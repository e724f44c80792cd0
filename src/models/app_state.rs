use std::fmt;

/// Names of the Steam app state flags, indexed by bit position + 1.
///
/// Index 0 is reserved. A set bit `i` in a manifest's `StateFlags` value marks
/// the flag at index `i + 1` as active.
pub const APP_STATE_FLAGS: [&str; 22] = [
    "Invalid",
    "Uninstalled",
    "Update Required",
    "Fully Installed",
    "Encrypted",
    "Locked",
    "Files Missing",
    "AppRunning",
    "Files Corrupt",
    "Update Running",
    "Update Paused",
    "Update Started",
    "Uninstalling",
    "Backup Running",
    "Reconfiguring",
    "Validating",
    "Adding Files",
    "Preallocating",
    "Downloading",
    "Staging",
    "Committing",
    "Update Stopping",
];

/// Flag that must be active for an app to count as installed.
pub const FULLY_INSTALLED: &str = "Fully Installed";

/// Decoded `StateFlags` bitmask of an app manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StateFlags(u64);

impl StateFlags {
    pub fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Parse the decimal string stored in a manifest.
    ///
    /// Anything that isn't an unsigned integer decodes to an empty flag set.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<u64>() {
            Ok(bits) => Self(bits),
            Err(_) => {
                tracing::debug!("Ignoring unparseable StateFlags value: {:?}", raw);
                Self(0)
            }
        }
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Active flag names, lowest bit first.
    ///
    /// Bits without a name in [`APP_STATE_FLAGS`] are ignored.
    pub fn names(&self) -> Vec<&'static str> {
        (0..u64::BITS as usize)
            .filter(|bit| self.0 >> bit & 1 == 1)
            .filter_map(|bit| APP_STATE_FLAGS.get(bit + 1).copied())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().contains(&name)
    }

    pub fn is_fully_installed(&self) -> bool {
        self.contains(FULLY_INSTALLED)
    }
}

impl fmt::Display for StateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fully_installed_bit() {
        let flags = StateFlags::parse("4");
        assert_eq!(flags.names(), vec!["Fully Installed"]);
        assert!(flags.is_fully_installed());
    }

    #[test]
    fn test_default_manifest_flags() {
        // 1026 = 0b100_0000_0010, bits 1 and 10
        let flags = StateFlags::parse("1026");
        assert_eq!(flags.names(), vec!["Update Required", "Update Started"]);
        assert!(!flags.is_fully_installed());
    }

    #[test]
    fn test_lowest_bit_is_uninstalled() {
        assert_eq!(StateFlags::new(1).names(), vec!["Uninstalled"]);
    }

    #[test]
    fn test_installed_and_running() {
        // Fully Installed (bit 2) + AppRunning (bit 6)
        let flags = StateFlags::new(4 | 64);
        assert!(flags.is_fully_installed());
        assert!(flags.contains("AppRunning"));
        assert_eq!(flags.to_string(), "Fully Installed, AppRunning");
    }

    #[test]
    fn test_highest_named_bit() {
        assert_eq!(StateFlags::new(1 << 20).names(), vec!["Update Stopping"]);
        assert!(StateFlags::new(1 << 21).names().is_empty());
    }

    #[test]
    fn test_invalid_values_decode_empty() {
        assert_eq!(StateFlags::parse(""), StateFlags::default());
        assert_eq!(StateFlags::parse("abc"), StateFlags::default());
        assert_eq!(StateFlags::parse("-4"), StateFlags::default());
        assert!(!StateFlags::parse("").is_fully_installed());
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        assert!(StateFlags::parse(" 6 ").is_fully_installed());
    }
}
