//! Keyring backend names

use std::fmt;
use std::str::FromStr;

/// Keyring backend accepted by SDK node binaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyringBackend {
    /// OS credential store
    Os,
    /// Encrypted files
    File,
    /// KDE wallet
    Kwallet,
    /// `pass` password store
    Pass,
    /// Unencrypted, for development
    #[default]
    Test,
    /// In-memory
    Memory,
}

impl KeyringBackend {
    /// All backends
    pub const ALL: [Self; 6] = [
        Self::Os,
        Self::File,
        Self::Kwallet,
        Self::Pass,
        Self::Test,
        Self::Memory,
    ];

    /// Flag value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Os => "os",
            Self::File => "file",
            Self::Kwallet => "kwallet",
            Self::Pass => "pass",
            Self::Test => "test",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for KeyringBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown keyring backend name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown keyring backend '{0}'")]
pub struct UnknownKeyringBackend(pub String);

impl FromStr for KeyringBackend {
    type Err = UnknownKeyringBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| UnknownKeyringBackend(s.to_string()))
    }
}
