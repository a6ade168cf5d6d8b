use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::{check_link, check_text, ObjectId, StoreError};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Card {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub link: String,
    pub owner: ObjectId,
    pub likes: Vec<ObjectId>, // set semantics, no duplicates
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Card {
    pub fn add_like(&mut self, user: &ObjectId) {
        if !self.likes.contains(user) {
            self.likes.push(user.clone());
        }
    }

    pub fn remove_like(&mut self, user: &ObjectId) {
        self.likes.retain(|id| id != user);
    }
}

#[derive(Debug, Clone)]
pub struct NewCard {
    pub name: String,
    pub link: String,
    pub owner: ObjectId,
}

impl NewCard {
    pub fn check(&self) -> Result<(), StoreError> {
        check_text("name", &self.name, 2, 30)?;
        check_link("link", &self.link)
    }

    pub fn into_card(self, id: ObjectId, created_at: OffsetDateTime) -> Card {
        Card {
            id,
            name: self.name,
            link: self.link,
            owner: self.owner,
            likes: Vec::new(),
            created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct CardRow {
    pub id: String,
    pub name: String,
    pub link: String,
    pub owner: String,
    pub likes: Vec<String>,
    pub created_at: OffsetDateTime,
}

impl TryFrom<CardRow> for Card {
    type Error = StoreError;

    fn try_from(r: CardRow) -> Result<Self, Self::Error> {
        let parse = |raw: &str| ObjectId::parse(raw).map_err(anyhow::Error::new);
        Ok(Self {
            id: parse(&r.id)?,
            name: r.name,
            link: r.link,
            owner: parse(&r.owner)?,
            likes: r
                .likes
                .iter()
                .map(|raw| parse(raw))
                .collect::<Result<_, _>>()?,
            created_at: r.created_at,
        })
    }
}
