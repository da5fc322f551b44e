use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::schema::SCHEMA;
use super::{HistoryUpdate, PlaylistEdit, Store};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database. Used by tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Fixed-width so that text ordering matches time ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Error::from)
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn asset_columns(row: &Row<'_>, url_idx: usize, id_idx: usize) -> rusqlite::Result<Option<Asset>> {
    let url: Option<String> = row.get(url_idx)?;
    let public_id: Option<String> = row.get(id_idx)?;
    Ok(match (url, public_id) {
        (Some(url), Some(public_id)) => Some(Asset { url, public_id }),
        _ => None,
    })
}

fn set_add(items: &mut Vec<String>, id: &str) -> bool {
    if items.iter().any(|i| i == id) {
        return false;
    }
    items.push(id.to_string());
    true
}

fn set_remove(items: &mut Vec<String>, id: &str) -> bool {
    let before = items.len();
    items.retain(|i| i != id);
    items.len() != before
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn query_list<T, P>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>>
where
    P: rusqlite::Params,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, verified, avatar_url, avatar_public_id, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        verified: row.get(4)?,
        avatar: asset_columns(row, 5, 6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

const SESSION_COLUMNS: &str = "id, token_hash, token_lookup, user_id, created_at, last_used_at";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        user_id: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        last_used_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
    })
}

const AUDIO_COLUMNS: &str = "id, title, about, owner_id, category, file_url, file_public_id, \
     poster_url, poster_public_id, likes, duration_seconds, created_at, updated_at";

fn audio_from_row(row: &Row<'_>) -> rusqlite::Result<Audio> {
    Ok(Audio {
        id: row.get(0)?,
        title: row.get(1)?,
        about: row.get(2)?,
        owner_id: row.get(3)?,
        category: Category::parse(&row.get::<_, String>(4)?).unwrap_or_default(),
        file: Asset {
            url: row.get(5)?,
            public_id: row.get(6)?,
        },
        poster: asset_columns(row, 7, 8)?,
        likes: json_column(row, 9)?,
        duration_seconds: row.get(10)?,
        created_at: parse_datetime(&row.get::<_, String>(11)?),
        updated_at: parse_datetime(&row.get::<_, String>(12)?),
    })
}

const PLAYLIST_COLUMNS: &str = "id, title, owner_id, visibility, items, created_at, updated_at";

fn playlist_from_row(row: &Row<'_>) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        title: row.get(1)?,
        owner_id: row.get(2)?,
        visibility: Visibility::parse(&row.get::<_, String>(3)?).unwrap_or_default(),
        items: json_column(row, 4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        updated_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

const AUTO_PLAYLIST_COLUMNS: &str = "id, title, items, created_at, updated_at";

fn auto_playlist_from_row(row: &Row<'_>) -> rusqlite::Result<AutoPlaylist> {
    Ok(AutoPlaylist {
        id: row.get(0)?,
        title: row.get(1)?,
        items: json_column(row, 2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

const FAVORITE_COLUMNS: &str = "id, owner_id, items, created_at, updated_at";

fn favorite_from_row(row: &Row<'_>) -> rusqlite::Result<Favorite> {
    Ok(Favorite {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        items: json_column(row, 2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

const HISTORY_COLUMNS: &str = "id, owner_id, last_entry, entries, created_at, updated_at";

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<History> {
    Ok(History {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        last: json_column(row, 2)?,
        all: json_column(row, 3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn history_in(conn: &Connection, owner_id: &str) -> Result<Option<History>> {
    conn.query_row(
        &format!("SELECT {HISTORY_COLUMNS} FROM histories WHERE owner_id = ?1"),
        params![owner_id],
        history_from_row,
    )
    .optional()
    .map_err(Error::from)
}

/// Reads one of the follow-graph columns (`followers` or `followings`).
fn id_set_in(conn: &Connection, column: &'static str, user_id: &str) -> Result<Option<Vec<String>>> {
    conn.query_row(
        &format!("SELECT {column} FROM users WHERE id = ?1"),
        params![user_id],
        |row| json_column(row, 0),
    )
    .optional()
    .map_err(Error::from)
}

fn write_id_set(conn: &Connection, column: &'static str, user_id: &str, ids: &[String]) -> Result<()> {
    conn.execute(
        &format!("UPDATE users SET {column} = ?1 WHERE id = ?2"),
        params![to_json(ids)?, user_id],
    )?;
    Ok(())
}

fn playlist_items_in(conn: &Connection, id: &str) -> Result<Vec<String>> {
    conn.query_row(
        "SELECT items FROM playlists WHERE id = ?1",
        params![id],
        |row| json_column(row, 0),
    )
    .optional()?
    .ok_or(Error::NotFound)
}

fn write_playlist_items(conn: &Connection, id: &str, items: &[String]) -> Result<()> {
    conn.execute(
        "UPDATE playlists SET items = ?1, updated_at = ?2 WHERE id = ?3",
        params![to_json(items)?, format_datetime(&Utc::now()), id],
    )?;
    Ok(())
}

fn insert_playlist(conn: &Connection, playlist: &Playlist) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO playlists ({PLAYLIST_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            playlist.id,
            playlist.title,
            playlist.owner_id,
            playlist.visibility.as_str(),
            to_json(&playlist.items)?,
            format_datetime(&playlist.created_at),
            format_datetime(&playlist.updated_at),
        ],
    )?;
    Ok(())
}

fn insert_auto_playlist(conn: &Connection, playlist: &AutoPlaylist) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO auto_playlists ({AUTO_PLAYLIST_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
        params![
            playlist.id,
            playlist.title,
            to_json(&playlist.items)?,
            format_datetime(&playlist.created_at),
            format_datetime(&playlist.updated_at),
        ],
    )?;
    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, name, email, password_hash, verified, avatar_url, avatar_public_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user.id,
                user.name,
                user.email,
                user.password_hash,
                user.verified,
                user.avatar.as_ref().map(|a| a.url.as_str()),
                user.avatar.as_ref().map(|a| a.public_id.as_str()),
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_users(&self, ids: &[String]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        query_list(
            &conn,
            &format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id IN (SELECT value FROM json_each(?1))"
            ),
            params![to_json(ids)?],
            user_from_row,
        )
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "UPDATE users SET name = ?1, email = ?2, password_hash = ?3, verified = ?4,
                 avatar_url = ?5, avatar_public_id = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                user.name,
                user.email,
                user.password_hash,
                user.verified,
                user.avatar.as_ref().map(|a| a.url.as_str()),
                user.avatar.as_ref().map(|a| a.public_id.as_str()),
                format_datetime(&user.updated_at),
                user.id,
            ],
        );

        match result {
            Ok(0) => Err(Error::NotFound),
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    // Session operations

    fn create_session(&self, session: &Session) -> Result<()> {
        let result = self.conn().execute(
            &format!("INSERT INTO sessions ({SESSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                session.id,
                session.token_hash,
                session.token_lookup,
                session.user_id,
                format_datetime(&session.created_at),
                session.last_used_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(Error::TokenLookupCollision),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE token_lookup = ?1"),
            params![lookup],
            session_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn delete_user_sessions(&self, user_id: &str) -> Result<usize> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
        Ok(rows)
    }

    fn update_session_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE sessions SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // One-time token operations

    fn replace_one_time_token(&self, token: &OneTimeToken) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO one_time_tokens (owner_id, kind, token_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                token.owner_id,
                token.kind.as_str(),
                token.token_hash,
                format_datetime(&token.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_one_time_token(
        &self,
        owner_id: &str,
        kind: OneTimeTokenKind,
    ) -> Result<Option<OneTimeToken>> {
        let conn = self.conn();
        let token = conn
            .query_row(
                "SELECT owner_id, token_hash, created_at FROM one_time_tokens
                 WHERE owner_id = ?1 AND kind = ?2",
                params![owner_id, kind.as_str()],
                |row| {
                    Ok(OneTimeToken {
                        owner_id: row.get(0)?,
                        kind,
                        token_hash: row.get(1)?,
                        created_at: parse_datetime(&row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;

        Ok(token.filter(|t| !t.is_expired(Utc::now())))
    }

    fn delete_one_time_token(&self, owner_id: &str, kind: OneTimeTokenKind) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM one_time_tokens WHERE owner_id = ?1 AND kind = ?2",
            params![owner_id, kind.as_str()],
        )?;
        Ok(rows > 0)
    }

    // Follow graph

    fn follow(&self, user_id: &str, profile_id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut followings = id_set_in(&tx, "followings", user_id)?.ok_or(Error::NotFound)?;
        let mut followers = id_set_in(&tx, "followers", profile_id)?.ok_or(Error::NotFound)?;

        if set_add(&mut followings, profile_id) {
            write_id_set(&tx, "followings", user_id, &followings)?;
        }
        if set_add(&mut followers, user_id) {
            write_id_set(&tx, "followers", profile_id, &followers)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn unfollow(&self, user_id: &str, profile_id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if let Some(mut followings) = id_set_in(&tx, "followings", user_id)? {
            if set_remove(&mut followings, profile_id) {
                write_id_set(&tx, "followings", user_id, &followings)?;
            }
        }
        if let Some(mut followers) = id_set_in(&tx, "followers", profile_id)? {
            if set_remove(&mut followers, user_id) {
                write_id_set(&tx, "followers", profile_id, &followers)?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn list_followers(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(id_set_in(&self.conn(), "followers", user_id)?.unwrap_or_default())
    }

    fn list_followings(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(id_set_in(&self.conn(), "followings", user_id)?.unwrap_or_default())
    }

    // Audio operations

    fn create_audio(&self, audio: &Audio) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO audios ({AUDIO_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                audio.id,
                audio.title,
                audio.about,
                audio.owner_id,
                audio.category.as_str(),
                audio.file.url,
                audio.file.public_id,
                audio.poster.as_ref().map(|p| p.url.as_str()),
                audio.poster.as_ref().map(|p| p.public_id.as_str()),
                to_json(&audio.likes)?,
                audio.duration_seconds,
                format_datetime(&audio.created_at),
                format_datetime(&audio.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_audio(&self, id: &str) -> Result<Option<Audio>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {AUDIO_COLUMNS} FROM audios WHERE id = ?1"),
            params![id],
            audio_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_audios(&self, ids: &[String]) -> Result<Vec<Audio>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        query_list(
            &conn,
            &format!(
                "SELECT {AUDIO_COLUMNS} FROM audios WHERE id IN (SELECT value FROM json_each(?1))"
            ),
            params![to_json(ids)?],
            audio_from_row,
        )
    }

    fn list_audios(&self) -> Result<Vec<Audio>> {
        let conn = self.conn();
        query_list(
            &conn,
            &format!("SELECT {AUDIO_COLUMNS} FROM audios ORDER BY created_at DESC, id DESC"),
            [],
            audio_from_row,
        )
    }

    fn list_audios_by_owner(&self, owner_id: &str) -> Result<Vec<Audio>> {
        let conn = self.conn();
        query_list(
            &conn,
            &format!(
                "SELECT {AUDIO_COLUMNS} FROM audios WHERE owner_id = ?1
                 ORDER BY created_at DESC, id DESC"
            ),
            params![owner_id],
            audio_from_row,
        )
    }

    fn list_latest_audios(&self, limit: usize) -> Result<Vec<Audio>> {
        let conn = self.conn();
        query_list(
            &conn,
            &format!(
                "SELECT {AUDIO_COLUMNS} FROM audios ORDER BY created_at DESC, id DESC LIMIT ?1"
            ),
            params![limit as i64],
            audio_from_row,
        )
    }

    fn count_audios_by_owner(&self, owner_id: &str) -> Result<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM audios WHERE owner_id = ?1",
            params![owner_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn update_audio(&self, audio: &Audio) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE audios SET title = ?1, about = ?2, category = ?3,
                 poster_url = ?4, poster_public_id = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                audio.title,
                audio.about,
                audio.category.as_str(),
                audio.poster.as_ref().map(|p| p.url.as_str()),
                audio.poster.as_ref().map(|p| p.public_id.as_str()),
                format_datetime(&audio.updated_at),
                audio.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Favorite operations

    fn get_favorite(&self, owner_id: &str) -> Result<Option<Favorite>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {FAVORITE_COLUMNS} FROM favorites WHERE owner_id = ?1"),
            params![owner_id],
            favorite_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn toggle_favorite(&self, owner_id: &str, audio_id: &str) -> Result<FavoriteToggle> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = format_datetime(&Utc::now());

        let mut likes: Vec<String> = tx
            .query_row(
                "SELECT likes FROM audios WHERE id = ?1",
                params![audio_id],
                |row| json_column(row, 0),
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        let favorite: Option<(String, Vec<String>)> = tx
            .query_row(
                "SELECT id, items FROM favorites WHERE owner_id = ?1",
                params![owner_id],
                |row| Ok((row.get(0)?, json_column(row, 1)?)),
            )
            .optional()?;

        let outcome = match favorite {
            Some((id, mut items)) => {
                let outcome = if set_remove(&mut items, audio_id) {
                    FavoriteToggle::Removed
                } else {
                    items.push(audio_id.to_string());
                    FavoriteToggle::Added
                };
                tx.execute(
                    "UPDATE favorites SET items = ?1, updated_at = ?2 WHERE id = ?3",
                    params![to_json(&items)?, now, id],
                )?;
                outcome
            }
            None => {
                tx.execute(
                    "INSERT INTO favorites (id, owner_id, items, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    params![new_id(), owner_id, to_json(&[audio_id])?, now],
                )?;
                FavoriteToggle::Created
            }
        };

        if outcome.is_favorite() {
            set_add(&mut likes, owner_id);
        } else {
            set_remove(&mut likes, owner_id);
        }
        tx.execute(
            "UPDATE audios SET likes = ?1 WHERE id = ?2",
            params![to_json(&likes)?, audio_id],
        )?;

        tx.commit()?;
        Ok(outcome)
    }

    // Playlist operations

    fn create_playlist(&self, playlist: &Playlist) -> Result<()> {
        insert_playlist(&self.conn(), playlist)
    }

    fn get_playlist(&self, id: &str) -> Result<Option<Playlist>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE id = ?1"),
            params![id],
            playlist_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_mixed_playlist(&self, owner_id: &str) -> Result<Option<Playlist>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {PLAYLIST_COLUMNS} FROM playlists
                 WHERE owner_id = ?1 AND title = ?2 AND visibility = 'auto'
                 ORDER BY created_at LIMIT 1"
            ),
            params![owner_id, Playlist::MIXED_TITLE],
            playlist_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_playlists_by_owner(&self, owner_id: &str) -> Result<Vec<Playlist>> {
        let conn = self.conn();
        query_list(
            &conn,
            &format!(
                "SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE owner_id = ?1
                 ORDER BY created_at DESC, id DESC"
            ),
            params![owner_id],
            playlist_from_row,
        )
    }

    fn edit_playlist(&self, id: &str, owner_id: &str, edit: &PlaylistEdit) -> Result<Playlist> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut playlist = tx
            .query_row(
                &format!(
                    "SELECT {PLAYLIST_COLUMNS} FROM playlists
                     WHERE id = ?1 AND owner_id = ?2 AND visibility != 'auto'"
                ),
                params![id, owner_id],
                playlist_from_row,
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        if let Some(audio_id) = &edit.add_audio {
            set_add(&mut playlist.items, audio_id);
        }
        playlist.title.clone_from(&edit.title);
        playlist.visibility = edit.visibility;
        playlist.updated_at = Utc::now();

        tx.execute(
            "UPDATE playlists SET title = ?1, visibility = ?2, items = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                playlist.title,
                playlist.visibility.as_str(),
                to_json(&playlist.items)?,
                format_datetime(&playlist.updated_at),
                playlist.id,
            ],
        )?;

        tx.commit()?;
        Ok(playlist)
    }

    fn delete_playlist(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM playlists WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn add_playlist_item(&self, id: &str, audio_id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut items = playlist_items_in(&tx, id)?;
        let added = set_add(&mut items, audio_id);
        if added {
            write_playlist_items(&tx, id, &items)?;
        }

        tx.commit()?;
        Ok(added)
    }

    fn remove_playlist_item(&self, id: &str, audio_id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut items = playlist_items_in(&tx, id)?;
        let removed = set_remove(&mut items, audio_id);
        if removed {
            write_playlist_items(&tx, id, &items)?;
        }

        tx.commit()?;
        Ok(removed)
    }

    fn upsert_mixed_playlist(&self, owner_id: &str, items: &[String]) -> Result<Playlist> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = Utc::now();

        let existing = tx
            .query_row(
                &format!(
                    "SELECT {PLAYLIST_COLUMNS} FROM playlists
                     WHERE owner_id = ?1 AND title = ?2 AND visibility = 'auto'
                     ORDER BY created_at LIMIT 1"
                ),
                params![owner_id, Playlist::MIXED_TITLE],
                playlist_from_row,
            )
            .optional()?;

        let playlist = match existing {
            Some(mut playlist) => {
                playlist.items = items.to_vec();
                playlist.updated_at = now;
                write_playlist_items(&tx, &playlist.id, &playlist.items)?;
                playlist
            }
            None => {
                let playlist = Playlist {
                    id: new_id(),
                    title: Playlist::MIXED_TITLE.to_string(),
                    owner_id: owner_id.to_string(),
                    visibility: Visibility::Auto,
                    items: items.to_vec(),
                    created_at: now,
                    updated_at: now,
                };
                insert_playlist(&tx, &playlist)?;
                playlist
            }
        };

        tx.commit()?;
        Ok(playlist)
    }

    // Auto playlist operations

    fn create_auto_playlist(&self, playlist: &AutoPlaylist) -> Result<()> {
        insert_auto_playlist(&self.conn(), playlist)
    }

    fn get_auto_playlist(&self, id: &str) -> Result<Option<AutoPlaylist>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {AUTO_PLAYLIST_COLUMNS} FROM auto_playlists WHERE id = ?1"),
            params![id],
            auto_playlist_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_auto_playlists(&self) -> Result<Vec<AutoPlaylist>> {
        let conn = self.conn();
        query_list(
            &conn,
            &format!("SELECT {AUTO_PLAYLIST_COLUMNS} FROM auto_playlists ORDER BY title, id"),
            [],
            auto_playlist_from_row,
        )
    }

    fn replace_auto_playlists(&self, playlists: &[AutoPlaylist]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM auto_playlists", [])?;
        for playlist in playlists {
            insert_auto_playlist(&tx, playlist)?;
        }

        tx.commit()?;
        Ok(())
    }

    // History operations

    fn get_history(&self, owner_id: &str) -> Result<Option<History>> {
        history_in(&self.conn(), owner_id)
    }

    fn update_history(
        &self,
        owner_id: &str,
        apply: &mut HistoryUpdate<'_>,
    ) -> Result<Option<History>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let current = history_in(&tx, owner_id)?;
        let existed = current.is_some();
        let next = apply(current)?;

        match &next {
            Some(history) if existed => {
                tx.execute(
                    "UPDATE histories SET last_entry = ?1, entries = ?2, updated_at = ?3
                     WHERE owner_id = ?4",
                    params![
                        to_json(&history.last)?,
                        to_json(&history.all)?,
                        format_datetime(&history.updated_at),
                        owner_id,
                    ],
                )?;
            }
            Some(history) => {
                tx.execute(
                    &format!(
                        "INSERT INTO histories ({HISTORY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                    ),
                    params![
                        history.id,
                        owner_id,
                        to_json(&history.last)?,
                        to_json(&history.all)?,
                        format_datetime(&history.created_at),
                        format_datetime(&history.updated_at),
                    ],
                )?;
            }
            None if existed => {
                tx.execute("DELETE FROM histories WHERE owner_id = ?1", params![owner_id])?;
            }
            None => {}
        }

        tx.commit()?;
        Ok(next)
    }

    fn delete_history(&self, owner_id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM histories WHERE owner_id = ?1", params![owner_id])?;
        Ok(rows > 0)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures;
    use chrono::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "users",
            "sessions",
            "one_time_tokens",
            "audios",
            "playlists",
            "auto_playlists",
            "favorites",
            "histories",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_user_crud_and_unique_email() {
        let store = fixtures::store();
        let user = fixtures::user(&store, "alice");

        let fetched = store.get_user(&user.id).unwrap().unwrap();
        assert_eq!(fetched.email, "alice@example.com");
        assert!(fetched.verified);

        let by_email = store.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        let mut duplicate = user.clone();
        duplicate.id = new_id();
        assert!(matches!(
            store.create_user(&duplicate),
            Err(Error::AlreadyExists)
        ));

        let mut renamed = fetched;
        renamed.name = "Alice".to_string();
        renamed.avatar = Some(Asset {
            url: "https://cdn.example.com/a.png".to_string(),
            public_id: "a".to_string(),
        });
        store.update_user(&renamed).unwrap();
        let updated = store.get_user(&user.id).unwrap().unwrap();
        assert_eq!(updated.name, "Alice");
        assert_eq!(updated.avatar.unwrap().public_id, "a");
    }

    #[test]
    fn test_session_lookup_collision() {
        let store = fixtures::store();
        let user = fixtures::user(&store, "bob");

        let session = Session {
            id: new_id(),
            token_hash: "hash1".to_string(),
            token_lookup: "lookup12".to_string(),
            user_id: user.id.clone(),
            created_at: Utc::now(),
            last_used_at: None,
        };
        store.create_session(&session).unwrap();

        let clash = Session {
            id: new_id(),
            token_hash: "hash2".to_string(),
            ..session.clone()
        };
        assert!(matches!(
            store.create_session(&clash),
            Err(Error::TokenLookupCollision)
        ));

        assert_eq!(store.delete_user_sessions(&user.id).unwrap(), 1);
        assert!(store.get_session_by_lookup("lookup12").unwrap().is_none());
    }

    #[test]
    fn test_expired_one_time_token_reads_as_absent() {
        let store = fixtures::store();
        let user = fixtures::user(&store, "carol");

        let token = OneTimeToken {
            owner_id: user.id.clone(),
            kind: OneTimeTokenKind::EmailVerification,
            token_hash: "hash".to_string(),
            created_at: Utc::now() - Duration::minutes(61),
        };
        store.replace_one_time_token(&token).unwrap();
        assert!(
            store
                .get_one_time_token(&user.id, OneTimeTokenKind::EmailVerification)
                .unwrap()
                .is_none()
        );

        let fresh = OneTimeToken {
            created_at: Utc::now(),
            ..token
        };
        store.replace_one_time_token(&fresh).unwrap();
        assert!(
            store
                .get_one_time_token(&user.id, OneTimeTokenKind::EmailVerification)
                .unwrap()
                .is_some()
        );
        assert!(
            store
                .get_one_time_token(&user.id, OneTimeTokenKind::PasswordReset)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_toggle_favorite_keeps_likes_in_lockstep() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        let fan = fixtures::user(&store, "fan");
        let audio = fixtures::audio(&store, &owner.id, "Episode", Category::Tech, 125.0);

        let first = store.toggle_favorite(&fan.id, &audio.id).unwrap();
        assert_eq!(first, FavoriteToggle::Created);
        assert_eq!(store.get_audio(&audio.id).unwrap().unwrap().likes, vec![fan.id.clone()]);
        assert_eq!(store.get_favorite(&fan.id).unwrap().unwrap().items, vec![audio.id.clone()]);

        let second = store.toggle_favorite(&fan.id, &audio.id).unwrap();
        assert_eq!(second, FavoriteToggle::Removed);
        assert!(store.get_audio(&audio.id).unwrap().unwrap().likes.is_empty());
        assert!(store.get_favorite(&fan.id).unwrap().unwrap().items.is_empty());

        let third = store.toggle_favorite(&fan.id, &audio.id).unwrap();
        assert_eq!(third, FavoriteToggle::Added);
        assert_eq!(store.get_audio(&audio.id).unwrap().unwrap().likes, vec![fan.id]);
    }

    #[test]
    fn test_toggle_favorite_missing_audio() {
        let store = fixtures::store();
        let fan = fixtures::user(&store, "fan");

        assert!(matches!(
            store.toggle_favorite(&fan.id, &new_id()),
            Err(Error::NotFound)
        ));
        assert!(store.get_favorite(&fan.id).unwrap().is_none());
    }

    #[test]
    fn test_follow_writes_both_sides_idempotently() {
        let store = fixtures::store();
        let a = fixtures::user(&store, "a");
        let b = fixtures::user(&store, "b");

        store.follow(&b.id, &a.id).unwrap();
        store.follow(&b.id, &a.id).unwrap();
        assert_eq!(store.list_followers(&a.id).unwrap(), vec![b.id.clone()]);
        assert_eq!(store.list_followings(&b.id).unwrap(), vec![a.id.clone()]);

        store.unfollow(&b.id, &a.id).unwrap();
        assert!(store.list_followers(&a.id).unwrap().is_empty());
        assert!(store.list_followings(&b.id).unwrap().is_empty());
    }

    #[test]
    fn test_follow_missing_profile_writes_nothing() {
        let store = fixtures::store();
        let a = fixtures::user(&store, "a");

        assert!(matches!(store.follow(&a.id, &new_id()), Err(Error::NotFound)));
        assert!(store.list_followings(&a.id).unwrap().is_empty());
    }

    #[test]
    fn test_add_playlist_item_is_set_union() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        let audio = fixtures::audio(&store, &owner.id, "Episode", Category::Music, 60.0);
        let playlist = fixtures::playlist(&store, &owner.id, "Drive", Visibility::Public, &[]);

        assert!(store.add_playlist_item(&playlist.id, &audio.id).unwrap());
        assert!(!store.add_playlist_item(&playlist.id, &audio.id).unwrap());
        assert_eq!(store.get_playlist(&playlist.id).unwrap().unwrap().items.len(), 1);

        assert!(store.remove_playlist_item(&playlist.id, &audio.id).unwrap());
        assert!(!store.remove_playlist_item(&playlist.id, &audio.id).unwrap());
        assert!(matches!(
            store.add_playlist_item(&new_id(), &audio.id),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_upsert_mixed_playlist_overwrites_items() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");

        let created = store
            .upsert_mixed_playlist(&owner.id, &["x".to_string(), "y".to_string()])
            .unwrap();
        assert_eq!(created.visibility, Visibility::Auto);

        let updated = store
            .upsert_mixed_playlist(&owner.id, &["z".to_string()])
            .unwrap();
        assert_eq!(updated.id, created.id);

        let stored = store.get_mixed_playlist(&owner.id).unwrap().unwrap();
        assert_eq!(stored.items, vec!["z".to_string()]);
        assert_eq!(store.list_playlists_by_owner(&owner.id).unwrap().len(), 1);
    }

    #[test]
    fn test_update_history_inserts_updates_and_deletes() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "listener");
        let entry = HistoryEntry {
            id: new_id(),
            audio_id: new_id(),
            progress_seconds: 12.0,
            played_at: Utc::now(),
        };

        store
            .update_history(&owner.id, &mut |current| {
                assert!(current.is_none());
                Ok(Some(History {
                    id: new_id(),
                    owner_id: owner.id.clone(),
                    last: entry.clone(),
                    all: vec![entry.clone()],
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                }))
            })
            .unwrap();

        store
            .update_history(&owner.id, &mut |current| {
                let mut history = current.expect("history exists");
                history.all[0].progress_seconds = 30.0;
                Ok(Some(history))
            })
            .unwrap();
        let stored = store.get_history(&owner.id).unwrap().unwrap();
        assert_eq!(stored.all[0].progress_seconds, 30.0);

        store.update_history(&owner.id, &mut |_| Ok(None)).unwrap();
        assert!(store.get_history(&owner.id).unwrap().is_none());
    }

    #[test]
    fn test_get_audios_skips_unknown_ids() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        let audio = fixtures::audio(&store, &owner.id, "One", Category::Arts, 10.0);

        let found = store.get_audios(&[audio.id.clone(), new_id()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, audio.id);
        assert!(store.get_audios(&[]).unwrap().is_empty());
    }
}
