/// Database row types, mapped directly from SQLite rows.
/// Kept separate from the GraphQL objects so the store has no API dependency.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ThoughtRow {
    pub id: String,
    pub thought_text: String,
    pub username: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ReactionRow {
    pub id: String,
    pub thought_id: String,
    pub reaction_body: String,
    pub username: String,
    pub created_at: String,
}

/// Outcome of a user insert. Duplicates are an expected result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInsert {
    Created,
    UsernameTaken,
    EmailTaken,
}

/// Outcome of a write made on behalf of a caller against some target row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    UnknownCaller,
    UnknownTarget,
}
