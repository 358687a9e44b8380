use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Datasets are addressed by the tuple (internal UUID, access scope, project,
// zone) rather than a single identifier. Keeping the tuple together avoids
// threading four loose strings through every transfer entry point.

/// Visibility level governing who may read a dataset.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessScope {
    Public,
    Project,
    User,
}

impl AccessScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessScope::Public => "public",
            AccessScope::Project => "project",
            AccessScope::User => "user",
        }
    }
}

impl FromStr for AccessScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(AccessScope::Public),
            "project" => Ok(AccessScope::Project),
            "user" => Ok(AccessScope::User),
            other => Err(format!(
                "'{other}' is not an access scope (expected public, project or user)"
            )),
        }
    }
}

impl Display for AccessScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a dataset lives in the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetLocation {
    pub internal_id: String,
    pub access: AccessScope,
    pub project: String,
    pub zone: String,
}

impl DatasetLocation {
    pub fn new(
        internal_id: impl Into<String>,
        access: AccessScope,
        project: impl Into<String>,
        zone: impl Into<String>,
    ) -> Self {
        DatasetLocation {
            internal_id: internal_id.into(),
            access,
            project: project.into(),
            zone: zone.into(),
        }
    }

    /// The staging path of the dataset inside its zone. User-scoped datasets
    /// live under the owning username, which is not part of the location
    /// tuple and must be supplied.
    pub fn staging_path(&self, username: &str) -> String {
        match self.access {
            AccessScope::Public => format!("public/{}/{}", self.project, self.internal_id),
            AccessScope::Project => format!("project/{}/{}", self.project, self.internal_id),
            AccessScope::User => format!(
                "user/{}/{}/{}",
                username, self.project, self.internal_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_scope_round_trip() {
        for (text, scope) in [
            ("public", AccessScope::Public),
            ("project", AccessScope::Project),
            ("user", AccessScope::User),
        ] {
            assert_eq!(AccessScope::from_str(text).unwrap(), scope);
            assert_eq!(scope.to_string(), text);
        }

        assert!(AccessScope::from_str("shared").is_err());
    }

    #[test]
    fn test_access_scope_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AccessScope::Project).unwrap(),
            "\"project\""
        );
    }

    #[test]
    fn test_staging_path_by_scope() {
        let id = "5a0ca748-0b3a-4f83-a784-4b32b2f0f123";

        let public = DatasetLocation::new(id, AccessScope::Public, "proj", "MainZone");
        assert_eq!(public.staging_path(""), format!("public/proj/{id}"));

        let user = DatasetLocation::new(id, AccessScope::User, "proj", "MainZone");
        assert_eq!(user.staging_path("alice"), format!("user/alice/proj/{id}"));
    }
}
