use crate::Database;
use crate::models::{ReactionRow, ThoughtRow, UserInsert, UserRow, WriteOutcome};
use anyhow::Result;
use rusqlite::{Connection, Row, params, params_from_iter};

const USER_COLUMNS: &str = "id, username, email, password, created_at";
const THOUGHT_COLUMNS: &str = "id, thought_text, username, created_at";

/// IDs bound per `IN (...)` lookup. SQLite rejects statements with more than
/// 32766 bound parameters, so batched lookups are split into chunks.
const BATCH_SIZE: usize = 500;

impl Database {
    // -- Users --

    /// Insert a user unless the username or email is already taken.
    /// The check and the insert happen under one lock, so two concurrent
    /// registrations cannot both pass.
    pub fn create_user(&self, user: &UserRow) -> Result<UserInsert> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let username_taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                [&user.username],
                |row| row.get(0),
            )?;
            if username_taken {
                return Ok(UserInsert::UsernameTaken);
            }

            let email_taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                [&user.email],
                |row| row.get(0),
            )?;
            if email_taken {
                return Ok(UserInsert::EmailTaken);
            }

            tx.execute(
                "INSERT INTO users (id, username, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user.id, user.username, user.email, user.password, user.created_at],
            )?;
            tx.commit()?;
            Ok(UserInsert::Created)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, rowid"
            ))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Friends --

    /// Add `friend_id` to the friend set of `user_id`. Only the caller's side
    /// is written, and adding an existing friend again is a no-op.
    pub fn add_friend(&self, user_id: &str, friend_id: &str) -> Result<WriteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !user_exists(&tx, user_id)? {
                return Ok(WriteOutcome::UnknownCaller);
            }
            if !user_exists(&tx, friend_id)? {
                return Ok(WriteOutcome::UnknownTarget);
            }

            tx.execute(
                "INSERT OR IGNORE INTO friends (user_id, friend_id) VALUES (?1, ?2)",
                [user_id, friend_id],
            )?;
            tx.commit()?;
            Ok(WriteOutcome::Written)
        })
    }

    /// Friends of each listed user as `(user_id, friend)` pairs, in the order
    /// each user added them.
    pub fn get_friends_for_users(&self, user_ids: &[String]) -> Result<Vec<(String, UserRow)>> {
        self.with_conn(|conn| {
            query_batched(
                conn,
                user_ids,
                |placeholders| {
                    format!(
                        "SELECT f.user_id, u.id, u.username, u.email, u.password, u.created_at
                         FROM friends f
                         JOIN users u ON u.id = f.friend_id
                         WHERE f.user_id IN ({placeholders})
                         ORDER BY f.rowid"
                    )
                },
                |row| {
                    Ok((
                        row.get(0)?,
                        UserRow {
                            id: row.get(1)?,
                            username: row.get(2)?,
                            email: row.get(3)?,
                            password: row.get(4)?,
                            created_at: row.get(5)?,
                        },
                    ))
                },
            )
        })
    }

    // -- Thoughts --

    /// Store a thought and append it to its owner's thought list atomically.
    /// Returns false (and writes nothing) if the owner does not exist.
    pub fn insert_thought(&self, owner_id: &str, thought: &ThoughtRow) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !user_exists(&tx, owner_id)? {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO thoughts (id, thought_text, username, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![thought.id, thought.thought_text, thought.username, thought.created_at],
            )?;
            tx.execute(
                "INSERT INTO user_thoughts (user_id, thought_id) VALUES (?1, ?2)",
                params![owner_id, thought.id],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn get_thought(&self, id: &str) -> Result<Option<ThoughtRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {THOUGHT_COLUMNS} FROM thoughts WHERE id = ?1"))?;
            stmt.query_row([id], thought_from_row).optional()
        })
    }

    /// All thoughts, or only those by `username`, newest first.
    pub fn list_thoughts(&self, username: Option<&str>) -> Result<Vec<ThoughtRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {THOUGHT_COLUMNS} FROM thoughts
                 WHERE ?1 IS NULL OR username = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([username], thought_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Each listed user's own thought list as `(user_id, thought)` pairs, in
    /// the order the thoughts were appended.
    pub fn get_thoughts_for_users(&self, user_ids: &[String]) -> Result<Vec<(String, ThoughtRow)>> {
        self.with_conn(|conn| {
            query_batched(
                conn,
                user_ids,
                |placeholders| {
                    format!(
                        "SELECT ut.user_id, t.id, t.thought_text, t.username, t.created_at
                         FROM user_thoughts ut
                         JOIN thoughts t ON t.id = ut.thought_id
                         WHERE ut.user_id IN ({placeholders})
                         ORDER BY ut.rowid"
                    )
                },
                |row| {
                    Ok((
                        row.get(0)?,
                        ThoughtRow {
                            id: row.get(1)?,
                            thought_text: row.get(2)?,
                            username: row.get(3)?,
                            created_at: row.get(4)?,
                        },
                    ))
                },
            )
        })
    }

    // -- Reactions --

    /// Append a reaction, written by `author_id`, to its thought.
    pub fn push_reaction(&self, author_id: &str, reaction: &ReactionRow) -> Result<WriteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !user_exists(&tx, author_id)? {
                return Ok(WriteOutcome::UnknownCaller);
            }

            let thought_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM thoughts WHERE id = ?1)",
                [&reaction.thought_id],
                |row| row.get(0),
            )?;
            if !thought_exists {
                return Ok(WriteOutcome::UnknownTarget);
            }

            tx.execute(
                "INSERT INTO reactions (id, thought_id, reaction_body, username, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    reaction.id,
                    reaction.thought_id,
                    reaction.reaction_body,
                    reaction.username,
                    reaction.created_at
                ],
            )?;
            tx.commit()?;
            Ok(WriteOutcome::Written)
        })
    }

    /// Batch-fetch reactions for a set of thought IDs, in append order.
    pub fn get_reactions_for_thoughts(&self, thought_ids: &[String]) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| {
            query_batched(
                conn,
                thought_ids,
                |placeholders| {
                    format!(
                        "SELECT id, thought_id, reaction_body, username, created_at
                         FROM reactions WHERE thought_id IN ({placeholders})
                         ORDER BY rowid"
                    )
                },
                |row| {
                    Ok(ReactionRow {
                        id: row.get(0)?,
                        thought_id: row.get(1)?,
                        reaction_body: row.get(2)?,
                        username: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
        })
    }
}

/// Run an `IN (...)` lookup over `ids` in chunks of `BATCH_SIZE`. Rows for
/// one ID always come from the same chunk, so per-ID ordering holds.
fn query_batched<T>(
    conn: &Connection,
    ids: &[String],
    sql: impl Fn(&str) -> String,
    map: impl Fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();

    for chunk in ids.chunks(BATCH_SIZE) {
        let placeholders: Vec<String> = (1..=chunk.len()).map(|i| format!("?{}", i)).collect();
        let mut stmt = conn.prepare_cached(&sql(&placeholders.join(", ")))?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), &map)?;
        for row in rows {
            out.push(row?);
        }
    }

    Ok(out)
}

fn user_exists(conn: &Connection, id: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"
    ))?;
    stmt.query_row([value], user_from_row).optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn thought_from_row(row: &Row<'_>) -> rusqlite::Result<ThoughtRow> {
    Ok(ThoughtRow {
        id: row.get(0)?,
        thought_text: row.get(1)?,
        username: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
