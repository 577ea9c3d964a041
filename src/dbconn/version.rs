//! Server version reported by a connection

use regex::Regex;
use semver::Version;
use std::sync::LazyLock;

use super::DbError;

static GREENPLUM_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Greenplum Database (\d+\.\d+\.\d+)").unwrap());
static ANY_VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.\d+\.\d+)").unwrap());

/// Server version, both as reported and parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbVersion {
    pub version_string: String,
    pub semver: Version,
}

impl Default for DbVersion {
    fn default() -> Self {
        Self {
            version_string: String::new(),
            semver: Version::new(0, 0, 0),
        }
    }
}

impl DbVersion {
    /// Parse a full semantic version such as `5.1.0`
    pub fn parse(version: &str) -> Result<Self, DbError> {
        let semver = Version::parse(version).map_err(|source| DbError::Version {
            version: version.to_string(),
            source,
        })?;
        Ok(Self {
            version_string: version.to_string(),
            semver,
        })
    }

    /// Extract the version from `SELECT version()` output
    ///
    /// `PostgreSQL 8.3.23 (Greenplum Database 5.1.0 build 1)` yields `5.1.0`;
    /// output without a Greenplum marker yields its first `X.Y.Z`.
    pub fn from_server_output(output: &str) -> Result<Self, DbError> {
        let captures = GREENPLUM_VERSION
            .captures(output)
            .or_else(|| ANY_VERSION.captures(output))
            .ok_or_else(|| DbError::VersionNotFound(output.to_string()))?;
        Self::parse(&captures[1])
    }

    /// True if the major version equals `major`
    pub fn is(&self, major: u64) -> bool {
        self.semver.major == major
    }

    /// True if this version is `target` or newer; `target` may be partial (`"6"`, `"6.2"`)
    pub fn at_least(&self, target: &str) -> Result<bool, DbError> {
        Ok(self.semver >= padded(target)?)
    }

    /// True if this version is older than `target`; `target` may be partial
    pub fn before(&self, target: &str) -> Result<bool, DbError> {
        Ok(self.semver < padded(target)?)
    }
}

impl std::fmt::Display for DbVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.version_string)
    }
}

fn padded(target: &str) -> Result<Version, DbError> {
    let full = match target.matches('.').count() {
        0 => format!("{}.0.0", target),
        1 => format!("{}.0", target),
        _ => target.to_string(),
    };
    Version::parse(&full).map_err(|source| DbError::Version {
        version: target.to_string(),
        source,
    })
}
