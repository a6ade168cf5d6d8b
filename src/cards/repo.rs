use axum::async_trait;
use time::OffsetDateTime;

use crate::cards::repo_types::{Card, CardRow, NewCard};
use crate::db::{ObjectId, PgStore, StoreError};

/// Card collection of the document store.
#[async_trait]
pub trait CardRepo: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Card>, StoreError>;
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Card>, StoreError>;
    async fn create(&self, card: NewCard) -> Result<Card, StoreError>;
    /// Removes the card, returning it; `None` if it was already gone.
    async fn delete(&self, id: &ObjectId) -> Result<Option<Card>, StoreError>;
    /// Atomically adds `user` to the likes set.
    async fn add_like(&self, id: &ObjectId, user: &ObjectId) -> Result<Option<Card>, StoreError>;
    /// Atomically removes `user` from the likes set.
    async fn remove_like(&self, id: &ObjectId, user: &ObjectId)
        -> Result<Option<Card>, StoreError>;
}

const SELECT_CARD: &str = r#"
    SELECT c.id, c.name, c.link, c.owner, c.created_at,
           ARRAY(SELECT l.user_id FROM card_likes l
                  WHERE l.card_id = c.id
                  ORDER BY l.liked_at) AS likes
      FROM cards c
"#;

#[async_trait]
impl CardRepo for PgStore {
    async fn find_all(&self) -> Result<Vec<Card>, StoreError> {
        let sql = format!("{SELECT_CARD} ORDER BY c.created_at");
        let rows = sqlx::query_as::<_, CardRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Card::try_from).collect()
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Card>, StoreError> {
        let sql = format!("{SELECT_CARD} WHERE c.id = $1");
        let row = sqlx::query_as::<_, CardRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Card::try_from).transpose()
    }

    async fn create(&self, card: NewCard) -> Result<Card, StoreError> {
        card.check()?;
        let card = card.into_card(ObjectId::new(), OffsetDateTime::now_utc());
        sqlx::query(
            r#"
            INSERT INTO cards (id, name, link, owner, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(card.id.as_str())
        .bind(&card.name)
        .bind(&card.link)
        .bind(card.owner.as_str())
        .bind(card.created_at)
        .execute(&self.pool)
        .await?;
        Ok(card)
    }

    async fn delete(&self, id: &ObjectId) -> Result<Option<Card>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!("{SELECT_CARD} WHERE c.id = $1 FOR UPDATE OF c");
        let row = sqlx::query_as::<_, CardRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM cards WHERE id = $1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Card::try_from(row).map(Some)
    }

    async fn add_like(&self, id: &ObjectId, user: &ObjectId) -> Result<Option<Card>, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO card_likes (card_id, user_id)
            SELECT id, $2 FROM cards WHERE id = $1
            ON CONFLICT (card_id, user_id) DO NOTHING
            "#,
        )
        .bind(id.as_str())
        .bind(user.as_str())
        .execute(&self.pool)
        .await?;
        self.find_by_id(id).await
    }

    async fn remove_like(
        &self,
        id: &ObjectId,
        user: &ObjectId,
    ) -> Result<Option<Card>, StoreError> {
        sqlx::query("DELETE FROM card_likes WHERE card_id = $1 AND user_id = $2")
            .bind(id.as_str())
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        self.find_by_id(id).await
    }
}
