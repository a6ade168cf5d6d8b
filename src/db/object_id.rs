use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Length of the textual form: 12 bytes, hex encoded.
pub const OBJECT_ID_LEN: usize = 24;

/// Document identifier in the store's native format.
///
/// Four big-endian bytes of creation time in seconds followed by eight random
/// bytes, rendered as 24 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("identifier must be {OBJECT_ID_LEN} hex characters")]
pub struct InvalidObjectId;

impl ObjectId {
    pub fn new() -> Self {
        let secs = OffsetDateTime::now_utc().unix_timestamp() as u32;
        let tail: u64 = rand::random();
        Self(format!("{:08x}{:016x}", secs, tail))
    }

    pub fn parse(raw: &str) -> Result<Self, InvalidObjectId> {
        if is_object_id(raw) {
            Ok(Self(raw.to_ascii_lowercase()))
        } else {
            Err(InvalidObjectId)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_object_id(raw: &str) -> bool {
    raw.len() == OBJECT_ID_LEN && raw.bytes().all(|b| b.is_ascii_hexdigit())
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = InvalidObjectId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
