//! Actors and the user lookup collaborator.
//!
//! Credentials are verified upstream; the engine only receives an [`Actor`]
//! and checks what that actor may do.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Supervisor,
    Technician,
}

impl Role {
    /// Whether this role may approve or reject permits.
    pub fn can_respond(&self) -> bool {
        matches!(self, Role::Admin | Role::Supervisor)
    }
}

/// The authenticated caller of a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn technician(id: impl Into<String>) -> Self {
        Self::new(id, Role::Technician)
    }

    pub fn supervisor(id: impl Into<String>) -> Self {
        Self::new(id, Role::Supervisor)
    }
}

/// Minimal user reference returned by a [`UserDirectory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub name: String,
    pub role: Role,
}

/// Lookup of users owned by another part of the system.
pub trait UserDirectory: Send + Sync {
    fn get(&self, id: &str) -> Option<UserRef>;

    fn exists(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// In-process [`UserDirectory`].
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, UserRef>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserRef) {
        let mut users = match self.users.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("User directory lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        users.insert(user.id.clone(), user);
    }

    pub fn with_user(self, id: &str, name: &str, role: Role) -> Self {
        self.insert(UserRef {
            id: id.to_string(),
            name: name.to_string(),
            role,
        });
        self
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn get(&self, id: &str) -> Option<UserRef> {
        let users = match self.users.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("User directory lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        users.get(id).cloned()
    }
}
