use std::fmt;

use serde::{Deserialize, Serialize};

/// Role is the access level a user holds on a household or store.
///
/// One ordered hierarchy serves both scopes: owner > editor > viewer.
/// Stores never grant viewer directly (collaborators are owner or editor),
/// but a household viewer reaches a household-owned store with viewer access
/// through inheritance, so the store-side evaluation still needs the full
/// lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer = 1,
    Editor = 2,
    Owner = 3,
}

impl Role {
    /// Converts a role string to its enum value.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "owner" => Some(Role::Owner),
            "editor" => Some(Role::Editor),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    /// Combines a directly-held role with an inherited one, taking the
    /// higher of the two. Either side may be absent.
    #[must_use]
    pub fn max_of(direct: Option<Role>, inherited: Option<Role>) -> Option<Role> {
        match (direct, inherited) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    /// True for roles allowed to hold a store collaborator row.
    /// Stores have no viewer tier.
    #[must_use]
    pub const fn valid_for_store(self) -> bool {
        matches!(self, Role::Owner | Role::Editor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Membership management threshold: editors and owners may invite.
#[must_use]
pub fn can_manage_members(role: Role) -> bool {
    role >= Role::Editor
}

/// Role/removal management threshold: owners only.
#[must_use]
pub fn can_manage_roles(role: Role) -> bool {
    role >= Role::Owner
}
