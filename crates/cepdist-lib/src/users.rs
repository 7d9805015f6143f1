//! Gateway user records.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::db::{new_id, Database};
use crate::error::{Error, Resource, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    preferences TEXT
);
";

pub const MIN_NAME_LEN: usize = 3;
pub const MIN_EMAIL_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub preferences: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub preferences: Option<Map<String, Value>>,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferences: Option<Map<String, Value>>,
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(Error::InvalidUser {
            message: format!("name must have at least {MIN_NAME_LEN} characters"),
        });
    }
    Ok(())
}

fn check_email(email: &str) -> Result<()> {
    if email.trim().chars().count() < MIN_EMAIL_LEN {
        return Err(Error::InvalidUser {
            message: format!("email must have at least {MIN_EMAIL_LEN} characters"),
        });
    }
    Ok(())
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        check_name(&self.name)?;
        check_email(&self.email)
    }
}

impl UserUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    pub fn new(db: Database) -> Result<Self> {
        db.with_connection(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })?;
        Ok(Self { db })
    }

    /// Create a user; the email must not already be registered.
    pub fn create(&self, new_user: NewUser) -> Result<User> {
        new_user.validate()?;
        let user = User {
            id: new_id(),
            name: new_user.name,
            email: new_user.email,
            preferences: new_user.preferences.unwrap_or_default(),
        };

        self.db.with_connection(|conn| {
            ensure_email_free(conn, &user.email, None)?;
            conn.execute(
                "INSERT INTO users (id, name, email, preferences) VALUES (?1, ?2, ?3, ?4)",
                params![
                    user.id,
                    user.name,
                    user.email,
                    serde_json::to_string(&user.preferences)?
                ],
            )?;
            Ok(())
        })?;

        debug!(id = %user.id, "user created");
        Ok(user)
    }

    pub fn get(&self, id: &str) -> Result<User> {
        self.db.with_connection(|conn| fetch(conn, id))
    }

    /// Apply the supplied fields, re-checking email uniqueness against other users.
    pub fn update(&self, id: &str, update: UserUpdate) -> Result<User> {
        update.validate()?;
        self.db.with_connection(|conn| {
            let tx = conn.transaction()?;
            let mut user = fetch(&tx, id)?;

            if let Some(email) = update.email {
                if email != user.email {
                    ensure_email_free(&tx, &email, Some(id))?;
                }
                user.email = email;
            }
            if let Some(name) = update.name {
                user.name = name;
            }
            if let Some(preferences) = update.preferences {
                user.preferences = preferences;
            }

            tx.execute(
                "UPDATE users SET name = ?1, email = ?2, preferences = ?3 WHERE id = ?4",
                params![
                    user.name,
                    user.email,
                    serde_json::to_string(&user.preferences)?,
                    id
                ],
            )?;
            tx.commit()?;
            Ok(user)
        })
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let removed = self.db.with_connection(|conn| {
            Ok(conn.execute("DELETE FROM users WHERE id = ?1", params![id])?)
        })?;
        if removed == 0 {
            return Err(Error::not_found(Resource::User, id));
        }
        Ok(())
    }
}

fn ensure_email_free(conn: &Connection, email: &str, except: Option<&str>) -> Result<()> {
    let owner: Option<String> = conn
        .query_row(
            "SELECT id FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )
        .optional()?;
    match owner {
        Some(owner) if Some(owner.as_str()) != except => Err(Error::Conflict {
            message: format!("email '{email}' is already registered"),
        }),
        _ => Ok(()),
    }
}

fn fetch(conn: &Connection, id: &str) -> Result<User> {
    conn.query_row(
        "SELECT id, name, email, preferences FROM users WHERE id = ?1",
        params![id],
        read_user,
    )
    .optional()?
    .ok_or_else(|| Error::not_found(Resource::User, id))
}

fn read_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let preferences: Option<String> = row.get(3)?;
    let preferences = match preferences.as_deref() {
        None | Some("") => Map::new(),
        Some(raw) => serde_json::from_str(raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
    };
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        preferences,
    })
}
