use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::models::{RoleMembership, User, UserId};

/// The two field roles tracked by reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportingRole {
    A,
    B,
}

impl ReportingRole {
    pub const fn ordered() -> [Self; 2] {
        [Self::A, Self::B]
    }
}

/// Read-only view of users and the reporting role groups they belong to.
#[derive(Debug, Default)]
pub struct RoleDirectory {
    users: BTreeMap<UserId, User>,
    role_names: HashMap<ReportingRole, String>,
    groups: HashMap<UserId, Vec<ReportingRole>>,
}

impl RoleDirectory {
    /// Memberships in groups other than `role_a`/`role_b` are ignored.
    pub fn new(
        users: Vec<User>,
        memberships: Vec<RoleMembership>,
        role_a: impl Into<String>,
        role_b: impl Into<String>,
    ) -> Self {
        let role_names = HashMap::from([
            (ReportingRole::A, role_a.into()),
            (ReportingRole::B, role_b.into()),
        ]);

        let mut groups: HashMap<UserId, Vec<ReportingRole>> = HashMap::new();
        for membership in memberships {
            let role = ReportingRole::ordered()
                .into_iter()
                .find(|role| role_names[role] == membership.role_name);
            if let Some(role) = role {
                let roles = groups.entry(membership.user_id).or_default();
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
        }

        Self {
            users: users.into_iter().map(|user| (user.id, user)).collect(),
            role_names,
            groups,
        }
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn role_name(&self, role: ReportingRole) -> &str {
        &self.role_names[&role]
    }

    /// Members of the group named `role_name`, ordered by user id.
    pub fn members_of(&self, role_name: &str) -> Vec<&User> {
        match self.role_by_name(role_name) {
            Some(role) => self.members(role),
            None => Vec::new(),
        }
    }

    pub fn members(&self, role: ReportingRole) -> Vec<&User> {
        self.users
            .values()
            .filter(|user| self.is_member(user.id, role))
            .collect()
    }

    pub fn is_member(&self, user_id: UserId, role: ReportingRole) -> bool {
        self.groups
            .get(&user_id)
            .is_some_and(|roles| roles.contains(&role))
    }

    /// The user's single reporting role. `None` when the user is in neither
    /// group or in both.
    pub fn role_of(&self, user_id: UserId) -> Option<ReportingRole> {
        match self.groups.get(&user_id).map(Vec::as_slice) {
            Some([role]) => Some(*role),
            Some([]) | None => None,
            Some(_) => {
                warn!(user_id, "user belongs to several reporting roles");
                None
            }
        }
    }

    /// Display label for the user's role, empty when there is none.
    pub fn role_label(&self, user_id: UserId) -> &str {
        self.role_of(user_id)
            .map(|role| self.role_name(role))
            .unwrap_or("")
    }

    fn role_by_name(&self, role_name: &str) -> Option<ReportingRole> {
        ReportingRole::ordered()
            .into_iter()
            .find(|role| self.role_names[role] == role_name)
    }
}
