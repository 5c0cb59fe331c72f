//! Profile resolver: which identity a request acts as.
//!
//! Nothing is cached between requests; the persisted pointer on the parent
//! account is re-read every time. A pointer to a missing child degrades to
//! parent mode and is cleared in the background.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::models::{
    ActiveIdentity, ChildProfile, Household, IdentityKind, NewChild, OwnerRef,
};
use crate::database::{SharedStore, StoreError};

const MAX_CHILD_NAME_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Parent account {0} not found")]
    ParentNotFound(Uuid),

    #[error("No child profile with id '{0}'")]
    InvalidChild(String),

    #[error("Child profile '{0}' not found")]
    ChildNotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of reading the active pointer against the household.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub identity: ActiveIdentity,
    /// Pointer value that matched no child, if any.
    pub stale_pointer: Option<String>,
}

/// Pure pointer resolution; never fails.
pub fn select_active(household: &Household) -> Resolution {
    match household.parent.active_child_id.as_deref() {
        None => Resolution {
            identity: ActiveIdentity::for_parent(&household.parent),
            stale_pointer: None,
        },
        Some(child_id) => match household.find_child(child_id) {
            Some(child) => Resolution {
                identity: ActiveIdentity::for_child(child),
                stale_pointer: None,
            },
            None => Resolution {
                identity: ActiveIdentity::for_parent(&household.parent),
                stale_pointer: Some(child_id.to_string()),
            },
        },
    }
}

/// `null`, `""` and `"parent"` all select parent mode.
pub fn normalize_switch_target(requested: Option<&str>) -> Option<&str> {
    match requested.map(str::trim) {
        None | Some("") | Some("parent") => None,
        Some(child_id) => Some(child_id),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: String,
    pub kind: IdentityKind,
    pub display_name: String,
    pub coin_balance: i64,
    pub avatar_url: Option<String>,
    pub is_active: bool,
}

impl ProfileSummary {
    fn from_identity(identity: ActiveIdentity, active: &OwnerRef) -> Self {
        Self {
            is_active: &identity.owner == active,
            id: identity.id,
            kind: identity.kind,
            display_name: identity.display_name,
            coin_balance: identity.coin_balance,
            avatar_url: identity.avatar_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub name: String,
    pub coins: i64,
    pub kind: IdentityKind,
    pub is_me: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub my_rank: Option<usize>,
    pub my_coins: i64,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Clone)]
pub struct ProfileService {
    store: SharedStore,
    clock: Arc<dyn Clock>,
}

impl ProfileService {
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn household(&self, parent_id: Uuid) -> Result<Household, ProfileError> {
        self.store
            .load_household(parent_id)
            .await?
            .ok_or(ProfileError::ParentNotFound(parent_id))
    }

    /// Resolve the active identity for an authenticated parent.
    pub async fn resolve(&self, parent_id: Uuid) -> Result<ActiveIdentity, ProfileError> {
        let household = self.household(parent_id).await?;
        let resolution = select_active(&household);
        if let Some(stale) = resolution.stale_pointer {
            self.heal_pointer(parent_id, stale);
        }
        Ok(resolution.identity)
    }

    /// Clear a dangling pointer without blocking the request.
    fn heal_pointer(&self, parent_id: Uuid, stale_child_id: String) {
        warn!(
            "Active profile of parent {} points at missing child '{}'; resetting to parent",
            parent_id, stale_child_id
        );
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store
                .clear_stale_active_child(parent_id, &stale_child_id)
                .await
            {
                warn!("Failed to reset active profile of parent {}: {}", parent_id, e);
            }
        });
    }

    pub async fn switch_active(
        &self,
        parent_id: Uuid,
        requested: Option<&str>,
    ) -> Result<ActiveIdentity, ProfileError> {
        let target = normalize_switch_target(requested);
        let household = self.household(parent_id).await?;
        if let Some(child_id) = target {
            if household.find_child(child_id).is_none() {
                return Err(ProfileError::InvalidChild(child_id.to_string()));
            }
        }

        // The store re-checks child existence in the same write
        if !self.store.set_active_child(parent_id, target).await? {
            return Err(match target {
                Some(child_id) => ProfileError::InvalidChild(child_id.to_string()),
                None => ProfileError::ParentNotFound(parent_id),
            });
        }

        info!(
            "Parent {} switched active profile to {}",
            parent_id,
            target.unwrap_or("parent")
        );
        self.resolve(parent_id).await
    }

    pub async fn list(&self, parent_id: Uuid) -> Result<Vec<ProfileSummary>, ProfileError> {
        let household = self.household(parent_id).await?;
        let active = select_active(&household).identity.owner;

        let mut profiles = vec![ProfileSummary::from_identity(
            ActiveIdentity::for_parent(&household.parent),
            &active,
        )];
        profiles.extend(
            household
                .children
                .iter()
                .map(|c| ProfileSummary::from_identity(ActiveIdentity::for_child(c), &active)),
        );
        Ok(profiles)
    }

    pub async fn create_child(
        &self,
        parent_id: Uuid,
        request: NewChild,
    ) -> Result<ProfileSummary, ProfileError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(ProfileError::Validation("name is required".into()));
        }
        if name.chars().count() > MAX_CHILD_NAME_CHARS {
            return Err(ProfileError::Validation(format!(
                "name cannot exceed {} characters",
                MAX_CHILD_NAME_CHARS
            )));
        }

        let child = ChildProfile {
            parent_id,
            child_id: ChildProfile::generate_id(),
            name,
            date_of_birth: request.date_of_birth,
            health_notes: request.health_notes.unwrap_or_default().trim().to_string(),
            avatar_url: request.avatar_url,
            coins: 0,
            created_at: self.clock.now(),
        };
        self.store.insert_child(&child).await.map_err(|e| match e {
            StoreError::NotFound(_) => ProfileError::ParentNotFound(parent_id),
            other => ProfileError::Store(other),
        })?;

        info!("Parent {} added child profile {}", parent_id, child.child_id);
        let owner = OwnerRef::parent(parent_id);
        Ok(ProfileSummary::from_identity(
            ActiveIdentity::for_child(&child),
            &owner,
        ))
    }

    pub async fn delete_child(&self, parent_id: Uuid, child_id: &str) -> Result<(), ProfileError> {
        if !self.store.delete_child(parent_id, child_id).await? {
            return Err(ProfileError::ChildNotFound(child_id.to_string()));
        }
        info!("Parent {} removed child profile {}", parent_id, child_id);
        Ok(())
    }

    /// Household ranking by coins, highest first; ties by name.
    pub async fn leaderboard(
        &self,
        parent_id: Uuid,
        active: &OwnerRef,
    ) -> Result<Leaderboard, ProfileError> {
        let household = self.household(parent_id).await?;

        let mut identities = vec![ActiveIdentity::for_parent(&household.parent)];
        identities.extend(household.children.iter().map(ActiveIdentity::for_child));
        identities.sort_by(|a, b| {
            b.coin_balance
                .cmp(&a.coin_balance)
                .then_with(|| a.display_name.cmp(&b.display_name))
        });

        let leaderboard: Vec<LeaderboardEntry> = identities
            .into_iter()
            .enumerate()
            .map(|(index, identity)| LeaderboardEntry {
                rank: index + 1,
                is_me: &identity.owner == active,
                name: identity.display_name,
                coins: identity.coin_balance,
                kind: identity.kind,
            })
            .collect();

        let me = leaderboard.iter().find(|e| e.is_me);
        Ok(Leaderboard {
            my_rank: me.map(|e| e.rank),
            my_coins: me.map_or(0, |e| e.coins),
            leaderboard,
        })
    }
}
