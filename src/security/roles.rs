//! Hierarchical roles and permission lookup.
//!
//! # Responsibilities
//! - Collect role declarations (programmatic or from config)
//! - Wire parent links by identifier once every role is known
//! - Answer permission queries by walking parents
//!
//! # Design Decisions
//! - One owned table keyed by role id; parents are ids, not references
//! - Two-phase build so declarations may arrive in any order
//! - Walks keep a visited set, so cycles terminate
//! - Unknown role ids have no permissions (fail closed)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// A role declaration.
pub trait Role {
    fn identifier(&self) -> String;
    fn permissions(&self) -> Vec<String>;
    fn parents(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Plain data form of a role, as read from config.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RoleDefinition {
    pub id: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl RoleDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }
}

impl Role for RoleDefinition {
    fn identifier(&self) -> String {
        self.id.clone()
    }

    fn permissions(&self) -> Vec<String> {
        self.permissions.clone()
    }

    fn parents(&self) -> Vec<String> {
        self.parents.clone()
    }
}

#[derive(Debug, Default)]
struct RoleNode {
    permissions: HashSet<String>,
    parents: Vec<String>,
}

/// Collects role declarations before the graph is frozen.
#[derive(Debug, Default)]
pub struct RoleGraphBuilder {
    declared: Vec<RoleDefinition>,
}

impl RoleGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a role. A later declaration with the same id replaces the earlier one.
    pub fn register(&mut self, role: &dyn Role) -> &mut Self {
        let definition = RoleDefinition {
            id: role.identifier(),
            permissions: role.permissions(),
            parents: role.parents(),
        };
        if let Some(existing) = self.declared.iter_mut().find(|d| d.id == definition.id) {
            tracing::warn!(role = %definition.id, "Role registered twice, keeping the latest declaration");
            *existing = definition;
        } else {
            self.declared.push(definition);
        }
        self
    }

    pub fn build(self) -> RoleGraph {
        let mut roles: HashMap<String, RoleNode> = HashMap::with_capacity(self.declared.len());

        for definition in &self.declared {
            roles.insert(
                definition.id.clone(),
                RoleNode {
                    permissions: definition.permissions.iter().cloned().collect(),
                    parents: Vec::new(),
                },
            );
            tracing::debug!(role = %definition.id, "Registered role");
        }

        for definition in &self.declared {
            let known: Vec<String> = definition
                .parents
                .iter()
                .filter(|parent| {
                    let exists = roles.contains_key(parent.as_str());
                    if !exists {
                        tracing::warn!(role = %definition.id, parent = %parent, "Unknown parent role ignored");
                    }
                    exists
                })
                .cloned()
                .collect();
            if let Some(node) = roles.get_mut(&definition.id) {
                node.parents = known;
            }
        }

        RoleGraph { roles }
    }
}

/// Read-only role table.
#[derive(Debug, Default)]
pub struct RoleGraph {
    roles: HashMap<String, RoleNode>,
}

impl RoleGraph {
    pub fn builder() -> RoleGraphBuilder {
        RoleGraphBuilder::new()
    }

    pub fn has_role(&self, role_id: &str) -> bool {
        self.roles.contains_key(role_id)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// True if the role or any ancestor holds `permission`.
    pub fn has_permission(&self, role_id: &str, permission: &str) -> bool {
        let mut found = false;
        self.walk(role_id, |node| {
            found = node.permissions.contains(permission);
            found
        });
        found
    }

    pub fn has_all_permissions<'a, I>(&self, role_id: &str, permissions: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        if !self.has_role(role_id) {
            return false;
        }
        permissions
            .into_iter()
            .all(|permission| self.has_permission(role_id, permission))
    }

    /// Own and inherited permissions of a role.
    pub fn effective_permissions(&self, role_id: &str) -> BTreeSet<String> {
        let mut all = BTreeSet::new();
        self.walk(role_id, |node| {
            all.extend(node.permissions.iter().cloned());
            false
        });
        all
    }

    /// Depth-first walk from `role_id` through parents. `visit` returns true to stop.
    fn walk<F>(&self, role_id: &str, mut visit: F)
    where
        F: FnMut(&RoleNode) -> bool,
    {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![role_id];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.roles.get(id) else {
                continue;
            };
            if visit(node) {
                return;
            }
            stack.extend(node.parents.iter().rev().map(String::as_str));
        }
    }
}
