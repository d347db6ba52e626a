// Favorite, shopping cart and subscription toggles
//
// Each toggle is a check-then-act over a per-user membership set. Adding an
// existing member or removing a missing one is rejected, never silently
// accepted.

use crate::errors::{DatabaseError, MembershipError};
use crate::telemetry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;
use uuid::Uuid;

/// Which membership set a toggle operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipKind {
    Favorite,
    ShoppingCart,
    Follow,
}

impl MembershipKind {
    fn target_missing(&self) -> &'static str {
        match self {
            MembershipKind::Favorite | MembershipKind::ShoppingCart => "Recipe not found",
            MembershipKind::Follow => "Author not found",
        }
    }

    fn already_present(&self) -> &'static str {
        match self {
            MembershipKind::Favorite => "Recipe is already in favorites",
            MembershipKind::ShoppingCart => "Recipe is already in the shopping cart",
            MembershipKind::Follow => "You are already subscribed to this author",
        }
    }

    fn not_present(&self) -> &'static str {
        match self {
            MembershipKind::Favorite => "Recipe is not in favorites",
            MembershipKind::ShoppingCart => "Recipe is not in the shopping cart",
            MembershipKind::Follow => "You are not subscribed to this author",
        }
    }
}

impl fmt::Display for MembershipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipKind::Favorite => write!(f, "favorite"),
            MembershipKind::ShoppingCart => write!(f, "shopping_cart"),
            MembershipKind::Follow => write!(f, "follow"),
        }
    }
}

/// Persistence operations the toggles need
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Whether the recipe (favorite/cart) or author (follow) exists
    async fn target_exists(&self, kind: MembershipKind, target: Uuid)
        -> Result<bool, DatabaseError>;

    async fn contains(
        &self,
        kind: MembershipKind,
        user_id: Uuid,
        target: Uuid,
    ) -> Result<bool, DatabaseError>;

    async fn insert(
        &self,
        kind: MembershipKind,
        user_id: Uuid,
        target: Uuid,
    ) -> Result<(), DatabaseError>;

    /// Returns `false` when there was nothing to remove
    async fn remove(
        &self,
        kind: MembershipKind,
        user_id: Uuid,
        target: Uuid,
    ) -> Result<bool, DatabaseError>;
}

/// Add `target` to the user's `kind` set
#[instrument(skip(store))]
pub async fn add_member<S: MembershipStore + ?Sized>(
    store: &S,
    kind: MembershipKind,
    user_id: Uuid,
    target: Uuid,
) -> Result<(), MembershipError> {
    if kind == MembershipKind::Follow && user_id == target {
        return Err(MembershipError::SelfSubscription);
    }

    if !store.target_exists(kind, target).await? {
        return Err(MembershipError::TargetNotFound(
            kind.target_missing().to_string(),
        ));
    }

    if store.contains(kind, user_id, target).await? {
        return Err(MembershipError::AlreadyPresent(
            kind.already_present().to_string(),
        ));
    }

    match store.insert(kind, user_id, target).await {
        Ok(()) => {}
        // Lost a race with a concurrent insert of the same pair
        Err(DatabaseError::DuplicateKey(_)) => {
            return Err(MembershipError::AlreadyPresent(
                kind.already_present().to_string(),
            ));
        }
        // Target deleted after the existence check
        Err(DatabaseError::ForeignKeyViolation(_)) => {
            return Err(MembershipError::TargetNotFound(
                kind.target_missing().to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    telemetry::record_membership_change(kind, "add");
    tracing::info!(kind = %kind, user_id = %user_id, target = %target, "Membership added");
    Ok(())
}

/// Remove `target` from the user's `kind` set
#[instrument(skip(store))]
pub async fn remove_member<S: MembershipStore + ?Sized>(
    store: &S,
    kind: MembershipKind,
    user_id: Uuid,
    target: Uuid,
) -> Result<(), MembershipError> {
    if !store.target_exists(kind, target).await? {
        return Err(MembershipError::TargetNotFound(
            kind.target_missing().to_string(),
        ));
    }

    if !store.remove(kind, user_id, target).await? {
        return Err(MembershipError::NotPresent(kind.not_present().to_string()));
    }

    telemetry::record_membership_change(kind, "remove");
    tracing::info!(kind = %kind, user_id = %user_id, target = %target, "Membership removed");
    Ok(())
}
