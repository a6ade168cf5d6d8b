//! In-process document store for local development and tests.

use axum::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{ObjectId, StoreError};
use crate::cards::repo::CardRepo;
use crate::cards::repo_types::{Card, NewCard};
use crate::users::repo::UserRepo;
use crate::users::repo_types::{NewUser, User, UserPatch};

/// Each collection sits behind its own lock, so every operation on a single
/// document is atomic, the same guarantee the Postgres store gives.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    cards: RwLock<Vec<Card>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().await.clone())
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.iter().find(|u| &u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        user.check()?;
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate);
        }
        let user = user.into_user(ObjectId::new());
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: &ObjectId, patch: UserPatch) -> Result<Option<User>, StoreError> {
        patch.check()?;
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| &u.id == id) else {
            return Ok(None);
        };
        patch.apply(user);
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl CardRepo for MemoryStore {
    async fn find_all(&self) -> Result<Vec<Card>, StoreError> {
        Ok(self.cards.read().await.clone())
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Card>, StoreError> {
        Ok(self.cards.read().await.iter().find(|c| &c.id == id).cloned())
    }

    async fn create(&self, card: NewCard) -> Result<Card, StoreError> {
        card.check()?;
        let card = card.into_card(ObjectId::new(), OffsetDateTime::now_utc());
        self.cards.write().await.push(card.clone());
        Ok(card)
    }

    async fn delete(&self, id: &ObjectId) -> Result<Option<Card>, StoreError> {
        let mut cards = self.cards.write().await;
        let removed = cards
            .iter()
            .position(|c| &c.id == id)
            .map(|idx| cards.remove(idx));
        Ok(removed)
    }

    async fn add_like(&self, id: &ObjectId, user: &ObjectId) -> Result<Option<Card>, StoreError> {
        let mut cards = self.cards.write().await;
        Ok(cards.iter_mut().find(|c| &c.id == id).map(|card| {
            card.add_like(user);
            card.clone()
        }))
    }

    async fn remove_like(
        &self,
        id: &ObjectId,
        user: &ObjectId,
    ) -> Result<Option<Card>, StoreError> {
        let mut cards = self.cards.write().await;
        Ok(cards.iter_mut().find(|c| &c.id == id).map(|card| {
            card.remove_like(user);
            card.clone()
        }))
    }
}
