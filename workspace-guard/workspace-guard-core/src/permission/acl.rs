use crate::principal::{PrincipalType, Principals};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    Read,
    Write,
    LibraryRead,
    LibraryWrite,
}

/// Access level an operation needs on its targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    /// Modes a document's own ACL must grant.
    pub fn object_modes(self) -> &'static [PermissionMode] {
        match self {
            Access::Read => &[PermissionMode::Read],
            Access::Write => &[PermissionMode::Write],
        }
    }

    /// Alternatives an owning workspace may grant; any one suffices.
    pub fn library_modes(self) -> &'static [PermissionMode] {
        match self {
            Access::Read => &[PermissionMode::LibraryRead, PermissionMode::Read],
            Access::Write => &[PermissionMode::LibraryWrite, PermissionMode::Write],
        }
    }

    /// Alternatives a workspace document must grant on itself.
    pub fn workspace_modes(self) -> &'static [PermissionMode] {
        match self {
            Access::Read => &[PermissionMode::Read, PermissionMode::LibraryRead],
            Access::Write => &[PermissionMode::Write],
        }
    }
}

/// Per-mode grant lists attached to a document or a workspace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(BTreeMap<PermissionMode, Principals>);

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Permissions::add_permission`] for a single principal.
    pub fn grant(mut self, mode: PermissionMode, principal_type: PrincipalType, id: &str) -> Self {
        let list = self.0.entry(mode).or_default().entries_mut(principal_type);
        if !list.iter().any(|p| p == id) {
            list.push(id.to_string());
        }
        self
    }

    pub fn grants(&self, mode: PermissionMode) -> Option<&Principals> {
        self.0.get(&mode)
    }

    pub fn add_permission(&mut self, modes: &[PermissionMode], principals: &Principals) {
        for mode in modes {
            let entry = self.0.entry(*mode).or_default();
            for user in &principals.users {
                if !entry.users.contains(user) {
                    entry.users.push(user.clone());
                }
            }
            for group in &principals.groups {
                if !entry.groups.contains(group) {
                    entry.groups.push(group.clone());
                }
            }
        }
    }

    pub fn remove_permission(&mut self, modes: &[PermissionMode], principals: &Principals) {
        for mode in modes {
            if let Some(entry) = self.0.get_mut(mode) {
                entry.users.retain(|u| !principals.users.contains(u));
                entry.groups.retain(|g| !principals.groups.contains(g));
                if entry.is_unrestricted() {
                    self.0.remove(mode);
                }
            }
        }
    }

    fn grants_mode(&self, mode: PermissionMode, principals: &Principals) -> bool {
        let Some(granted) = self.0.get(&mode) else {
            return false;
        };
        principals.users.iter().any(|u| granted.users.contains(u))
            || principals.groups.iter().any(|g| granted.groups.contains(g))
    }

    /// True iff every mode in `modes` is granted to `principals`.
    pub fn has_permission(&self, modes: &[PermissionMode], principals: &Principals) -> bool {
        !modes.is_empty() && modes.iter().all(|m| self.grants_mode(*m, principals))
    }

    pub fn has_any_permission(&self, modes: &[PermissionMode], principals: &Principals) -> bool {
        modes.iter().any(|m| self.grants_mode(*m, principals))
    }

    /// First mode of `modes` not granted to `principals`.
    pub fn missing_permission(
        &self,
        modes: &[PermissionMode],
        principals: &Principals,
    ) -> Option<PermissionMode> {
        modes
            .iter()
            .copied()
            .find(|m| !self.grants_mode(*m, principals))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
