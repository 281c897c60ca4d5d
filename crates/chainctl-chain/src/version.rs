//! Cosmos SDK version detection
//!
//! Reads the SDK dependency from `go.mod` (honoring `replace`) and sorts it
//! into a [`Family`]. Anything that does not parse as `vMAJOR.MINOR.PATCH`
//! is [`Family::Unrecognized`]; it is never guessed into a known family.

use crate::app::GO_MOD;
use crate::error::VersionError;
use crate::gomod::GoMod;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

/// Module path of the Cosmos SDK
pub const SDK_MODULE: &str = "github.com/cosmos/cosmos-sdk";

/// First Stargate release
pub const STARGATE_MIN: SemVer = SemVer {
    major: 0,
    minor: 40,
    patch: 0,
};

/// SDK release family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Pre-0.40 releases with a separate CLI binary
    Launchpad,
    /// 0.40 and later
    Stargate,
    /// Version string could not be parsed
    Unrecognized,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Launchpad => "Launchpad",
            Self::Stargate => "Stargate",
            Self::Unrecognized => "Unrecognized",
        })
    }
}

/// Numeric core of a version string
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemVer {
    /// Major
    pub major: u64,
    /// Minor
    pub minor: u64,
    /// Patch
    pub patch: u64,
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Classified SDK version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    family: Family,
    raw: String,
    semantic: Option<SemVer>,
}

impl Version {
    /// Classify a raw version string
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        let semantic = parse_semver(raw);
        let family = match semantic {
            Some(v) if v >= STARGATE_MIN => Family::Stargate,
            Some(_) => Family::Launchpad,
            None => Family::Unrecognized,
        };
        Self {
            family,
            raw: raw.to_string(),
            semantic,
        }
    }

    /// Release family
    #[inline]
    #[must_use]
    pub fn family(&self) -> Family {
        self.family
    }

    /// Whether this version belongs to `family`
    #[inline]
    #[must_use]
    pub fn is_family(&self, family: Family) -> bool {
        self.family == family
    }

    /// Version string as written in `go.mod`
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed numeric version, if any
    #[inline]
    #[must_use]
    pub fn semantic(&self) -> Option<SemVer> {
        self.semantic
    }
}

/// Detect the SDK version of the module at `root`
///
/// # Errors
/// - `VersionError::MissingModule` without `go.mod`
/// - `VersionError::SdkNotFound` if the SDK is not required
pub fn detect(root: impl AsRef<Path>) -> Result<Version, VersionError> {
    let root = root.as_ref();
    let path = root.join(GO_MOD);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(VersionError::MissingModule {
                path: root.to_path_buf(),
            })
        }
        Err(source) => return Err(VersionError::Io { path, source }),
    };

    let go_mod = GoMod::parse(&content);
    let raw = go_mod
        .effective_version(SDK_MODULE)
        .ok_or(VersionError::SdkNotFound { path })?;

    let version = Version::classify(raw);
    tracing::debug!(raw = version.raw(), family = %version.family(), "detected cosmos sdk version");
    Ok(version)
}

fn parse_semver(raw: &str) -> Option<SemVer> {
    let core = raw.strip_prefix('v')?;
    let core = core.split(['-', '+']).next()?;
    let mut parts = core.split('.');
    let mut next = || -> Option<u64> {
        let part = parts.next()?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse().ok()
    };
    let version = SemVer {
        major: next()?,
        minor: next()?,
        patch: next()?,
    };
    parts.next().is_none().then_some(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn classifies_known_families() {
        assert_eq!(Version::classify("v0.39.2").family(), Family::Launchpad);
        assert_eq!(Version::classify("v0.40.0").family(), Family::Stargate);
        assert_eq!(Version::classify("v0.45.4").family(), Family::Stargate);
        assert_eq!(Version::classify("v0.46.0-rc1").family(), Family::Stargate);
        assert_eq!(Version::classify("v1.0.0").family(), Family::Stargate);
    }

    #[test]
    fn pseudo_version_keeps_core() {
        let v = Version::classify("v0.45.0-20220101010101-abcdef123456");
        assert!(v.is_family(Family::Stargate));
        assert_eq!(v.semantic().unwrap().to_string(), "v0.45.0");
    }

    #[test]
    fn garbage_is_unrecognized() {
        for raw in ["", "latest", "0.45.0", "v0.45", "vX.Y.Z", "v0.45.0.1"] {
            let v = Version::classify(raw);
            assert_eq!(v.family(), Family::Unrecognized, "{raw}");
            assert!(v.semantic().is_none());
        }
    }

    #[test]
    fn detect_reads_go_mod() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(GO_MOD),
            "module mars\n\nrequire (\n\tgithub.com/cosmos/cosmos-sdk v0.44.3\n)\n",
        )
        .unwrap();

        let v = detect(dir.path()).unwrap();
        assert_eq!(v.raw(), "v0.44.3");
        assert!(v.is_family(Family::Stargate));
    }

    #[test]
    fn detect_without_sdk() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(GO_MOD), "module mars\n").unwrap();
        assert!(matches!(
            detect(dir.path()),
            Err(VersionError::SdkNotFound { .. })
        ));
    }

    #[test]
    fn detect_without_go_mod() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            detect(dir.path()),
            Err(VersionError::MissingModule { .. })
        ));
    }

    proptest! {
        #[test]
        fn family_follows_numeric_order(major in 0u64..3, minor in 0u64..100, patch in 0u64..20) {
            let v = Version::classify(&format!("v{major}.{minor}.{patch}"));
            let expected = if major > 0 || minor >= 40 { Family::Stargate } else { Family::Launchpad };
            prop_assert_eq!(v.family(), expected);
        }

        #[test]
        fn classify_never_panics(raw in ".{0,24}") {
            let _ = Version::classify(&raw);
        }
    }
}
