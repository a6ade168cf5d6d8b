use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::{check_email, check_link, check_text, ObjectId, StoreError};

pub const DEFAULT_NAME: &str = "Жак-Ив Кусто";
pub const DEFAULT_ABOUT: &str = "Исследователь";
pub const DEFAULT_AVATAR: &str =
    "https://pictures.s3.yandex.net/resources/jacques-cousteau_1604399756.png";

/// User record. The password hash is never serialized.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub about: String,
    pub avatar: String,
}

/// Insert payload; missing profile fields take the defaults.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub about: Option<String>,
    pub avatar: Option<String>,
}

impl NewUser {
    pub fn check(&self) -> Result<(), StoreError> {
        check_email(&self.email)?;
        if let Some(name) = &self.name {
            check_text("name", name, 2, 30)?;
        }
        if let Some(about) = &self.about {
            check_text("about", about, 2, 30)?;
        }
        if let Some(avatar) = &self.avatar {
            check_link("avatar", avatar)?;
        }
        Ok(())
    }

    pub fn into_user(self, id: ObjectId) -> User {
        User {
            id,
            email: self.email,
            password_hash: self.password_hash,
            name: self.name.unwrap_or_else(|| DEFAULT_NAME.into()),
            about: self.about.unwrap_or_else(|| DEFAULT_ABOUT.into()),
            avatar: self.avatar.unwrap_or_else(|| DEFAULT_AVATAR.into()),
        }
    }
}

/// Partial profile update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub about: Option<String>,
    pub avatar: Option<String>,
}

impl UserPatch {
    pub fn check(&self) -> Result<(), StoreError> {
        if let Some(name) = &self.name {
            check_text("name", name, 2, 30)?;
        }
        if let Some(about) = &self.about {
            check_text("about", about, 2, 30)?;
        }
        if let Some(avatar) = &self.avatar {
            check_link("avatar", avatar)?;
        }
        Ok(())
    }

    pub fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(about) = self.about {
            user.about = about;
        }
        if let Some(avatar) = self.avatar {
            user.avatar = avatar;
        }
    }
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub about: String,
    pub avatar: String,
    #[allow(dead_code)]
    pub created_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ObjectId::parse(&r.id).map_err(anyhow::Error::new)?,
            email: r.email,
            password_hash: r.password_hash,
            name: r.name,
            about: r.about,
            avatar: r.avatar,
        })
    }
}
