use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Who owns a log, a ledger entry or an award.
///
/// Resolved once per request by the profile resolver and threaded through every
/// downstream call. Storage encodes it as `(owner_parent_id, owner_child_id)` with
/// an empty child id meaning the parent itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OwnerRef {
    #[serde(rename_all = "camelCase")]
    Parent { parent_id: Uuid },
    #[serde(rename_all = "camelCase")]
    Child { parent_id: Uuid, child_id: String },
}

impl OwnerRef {
    pub fn parent(parent_id: Uuid) -> Self {
        OwnerRef::Parent { parent_id }
    }

    pub fn child(parent_id: Uuid, child_id: impl Into<String>) -> Self {
        OwnerRef::Child {
            parent_id,
            child_id: child_id.into(),
        }
    }

    /// The account that owns this identity (itself, for a parent).
    pub fn parent_id(&self) -> Uuid {
        match self {
            OwnerRef::Parent { parent_id } | OwnerRef::Child { parent_id, .. } => *parent_id,
        }
    }

    pub fn child_id(&self) -> Option<&str> {
        match self {
            OwnerRef::Parent { .. } => None,
            OwnerRef::Child { child_id, .. } => Some(child_id),
        }
    }

    pub fn kind(&self) -> IdentityKind {
        match self {
            OwnerRef::Parent { .. } => IdentityKind::Parent,
            OwnerRef::Child { .. } => IdentityKind::Child,
        }
    }

    /// Child column value as persisted; `""` for the parent.
    pub fn storage_child_key(&self) -> &str {
        self.child_id().unwrap_or("")
    }

    pub fn from_storage(parent_id: Uuid, child_key: String) -> Self {
        if child_key.is_empty() {
            OwnerRef::Parent { parent_id }
        } else {
            OwnerRef::Child {
                parent_id,
                child_id: child_key,
            }
        }
    }

    /// Public identifier: the parent's uuid or the child's id.
    pub fn identity_id(&self) -> String {
        match self {
            OwnerRef::Parent { parent_id } => parent_id.to_string(),
            OwnerRef::Child { child_id, .. } => child_id.clone(),
        }
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerRef::Parent { parent_id } => write!(f, "parent:{}", parent_id),
            OwnerRef::Child { parent_id, child_id } => write!(f, "child:{}/{}", parent_id, child_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Parent,
    Child,
}

/// Parent account row. `active_child_id` is the persisted active-profile pointer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ParentAccount {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub coins: i64,
    pub active_child_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ParentAccount {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChildProfile {
    pub parent_id: Uuid,
    pub child_id: String,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub health_notes: String,
    pub avatar_url: Option<String>,
    pub coins: i64,
    pub created_at: DateTime<Utc>,
}

impl ChildProfile {
    /// Generates a fresh child id of the form `child_<32 hex>`.
    pub fn generate_id() -> String {
        format!("child_{}", Uuid::new_v4().simple())
    }
}

/// A parent account together with its child profiles.
#[derive(Debug, Clone)]
pub struct Household {
    pub parent: ParentAccount,
    pub children: Vec<ChildProfile>,
}

impl Household {
    pub fn find_child(&self, child_id: &str) -> Option<&ChildProfile> {
        self.children.iter().find(|c| c.child_id == child_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewParent {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChild {
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub health_notes: Option<String>,
    pub avatar_url: Option<String>,
}

/// The identity a request operates as. Rebuilt from storage on every request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveIdentity {
    #[serde(skip)]
    pub owner: OwnerRef,
    pub id: String,
    pub kind: IdentityKind,
    pub display_name: String,
    pub coin_balance: i64,
    pub avatar_url: Option<String>,
}

impl ActiveIdentity {
    pub fn for_parent(parent: &ParentAccount) -> Self {
        let owner = OwnerRef::parent(parent.id);
        Self {
            id: owner.identity_id(),
            owner,
            kind: IdentityKind::Parent,
            display_name: parent.full_name(),
            coin_balance: parent.coins,
            avatar_url: parent.avatar_url.clone(),
        }
    }

    pub fn for_child(child: &ChildProfile) -> Self {
        let owner = OwnerRef::child(child.parent_id, child.child_id.clone());
        Self {
            id: owner.identity_id(),
            owner,
            kind: IdentityKind::Child,
            display_name: child.name.clone(),
            coin_balance: child.coins,
            avatar_url: child.avatar_url.clone(),
        }
    }

    pub fn is_child(&self) -> bool {
        self.kind == IdentityKind::Child
    }
}
