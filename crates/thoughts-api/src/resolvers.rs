//! One function per schema operation. Each takes the shared state and, where
//! identity matters, the request's `Session` explicitly.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, error, info};
use uuid::Uuid;

use thoughts_db::Database;
use thoughts_db::models::{ReactionRow, ThoughtRow, UserInsert, UserRow, WriteOutcome};
use thoughts_types::api::now_timestamp;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Session;
use crate::schema::loader::UserLinks;
use crate::schema::types::{Auth, Reaction, Thought, User};

// -- Queries --

pub async fn me(state: &AppState, session: &Session) -> Result<User, ApiError> {
    let id = session.require()?.sub.to_string();

    // A valid token for a user that is no longer in the store is no identity.
    with_db(state, move |db| db.get_user_by_id(&id))
        .await?
        .map(User::from)
        .ok_or(ApiError::Unauthenticated)
}

pub async fn users(state: &AppState) -> Result<Vec<User>, ApiError> {
    let rows = with_db(state, |db| db.list_users()).await?;
    Ok(rows.into_iter().map(User::from).collect())
}

pub async fn user(state: &AppState, username: String) -> Result<Option<User>, ApiError> {
    let row = with_db(state, move |db| db.get_user_by_username(&username)).await?;
    Ok(row.map(User::from))
}

pub async fn thoughts(state: &AppState, username: Option<String>) -> Result<Vec<Thought>, ApiError> {
    with_db(state, move |db| {
        let rows = db.list_thoughts(username.as_deref())?;
        attach_reactions(db, rows)
    })
    .await
}

pub async fn thought(state: &AppState, id: String) -> Result<Option<Thought>, ApiError> {
    with_db(state, move |db| load_thought(db, &id)).await
}

// -- User fields --

/// Owned thoughts and friends for a batch of users. Users with neither are
/// left out of the map.
pub async fn user_links(
    state: &AppState,
    user_ids: Vec<String>,
) -> Result<HashMap<String, UserLinks>, ApiError> {
    with_db(state, move |db| {
        let mut links: HashMap<String, UserLinks> = HashMap::new();

        let (owners, rows): (Vec<String>, Vec<ThoughtRow>) =
            db.get_thoughts_for_users(&user_ids)?.into_iter().unzip();
        for (owner, thought) in owners.into_iter().zip(attach_reactions(db, rows)?) {
            links.entry(owner).or_default().thoughts.push(thought);
        }

        for (user_id, friend) in db.get_friends_for_users(&user_ids)? {
            links.entry(user_id).or_default().friends.push(User::from(friend));
        }

        Ok(links)
    })
    .await
}

// -- Mutations --

pub async fn add_user(
    state: &AppState,
    username: String,
    email: String,
    password: String,
) -> Result<Auth, ApiError> {
    let username = username.trim().to_string();
    let email = email.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::Validation("Username must not be blank".into()));
    }
    if email.is_empty() {
        return Err(ApiError::Validation("Email must not be blank".into()));
    }

    let user_id = Uuid::new_v4();
    let row = UserRow {
        id: user_id.to_string(),
        username,
        email,
        password: state.credentials.hash_password(&password)?,
        created_at: now_timestamp(),
    };

    let insert = row.clone();
    match with_db(state, move |db| db.create_user(&insert)).await? {
        UserInsert::Created => {}
        UserInsert::UsernameTaken => return Err(ApiError::UniquenessViolation("username")),
        UserInsert::EmailTaken => return Err(ApiError::UniquenessViolation("email")),
    }

    info!("Registered user {}", row.username);
    let token = state.credentials.issue_token(user_id, &row.username, &row.email)?;

    Ok(Auth {
        token: token.into(),
        user: User::from(row),
    })
}

pub async fn login(state: &AppState, email: String, password: String) -> Result<Auth, ApiError> {
    let lookup = email.trim().to_string();
    let user = with_db(state, move |db| db.get_user_by_email(&lookup)).await?;

    let Some(user) = user else {
        state.credentials.verify_unknown_user(&password);
        debug!("Login for unknown email");
        return Err(ApiError::AuthenticationFailed);
    };

    if !state.credentials.verify_password(&password, &user.password) {
        debug!("Login with wrong password for {}", user.username);
        return Err(ApiError::AuthenticationFailed);
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow!("Corrupt user id '{}': {}", user.id, e))?;
    let token = state.credentials.issue_token(user_id, &user.username, &user.email)?;

    info!("User {} logged in", user.username);
    Ok(Auth {
        token: token.into(),
        user: User::from(user),
    })
}

pub async fn add_thought(
    state: &AppState,
    session: &Session,
    thought_text: String,
) -> Result<Thought, ApiError> {
    let claims = session.require()?;

    let row = ThoughtRow {
        id: Uuid::new_v4().to_string(),
        thought_text,
        username: claims.username.clone(),
        created_at: now_timestamp(),
    };

    let owner_id = claims.sub.to_string();
    let insert = row.clone();
    if !with_db(state, move |db| db.insert_thought(&owner_id, &insert)).await? {
        return Err(ApiError::Unauthenticated);
    }

    debug!("{} posted thought {}", row.username, row.id);
    Ok(Thought::from_row(row, Vec::new()))
}

pub async fn add_reaction(
    state: &AppState,
    session: &Session,
    thought_id: String,
    reaction_body: String,
) -> Result<Thought, ApiError> {
    let claims = session.require()?;

    let row = ReactionRow {
        id: Uuid::new_v4().to_string(),
        thought_id,
        reaction_body,
        username: claims.username.clone(),
        created_at: now_timestamp(),
    };

    let author_id = claims.sub.to_string();
    let (outcome, thought) = with_db(state, move |db| {
        let outcome = db.push_reaction(&author_id, &row)?;
        if outcome != WriteOutcome::Written {
            return Ok((outcome, None));
        }
        Ok((outcome, load_thought(db, &row.thought_id)?))
    })
    .await?;

    written(outcome, "Thought")?;
    thought.ok_or(ApiError::NotFound("Thought"))
}

/// Only the caller's friend set changes; the friend's own set is left alone.
pub async fn add_friend(
    state: &AppState,
    session: &Session,
    friend_id: String,
) -> Result<User, ApiError> {
    let user_id = session.require()?.sub.to_string();

    let (outcome, caller) = with_db(state, move |db| {
        let outcome = db.add_friend(&user_id, &friend_id)?;
        if outcome != WriteOutcome::Written {
            return Ok((outcome, None));
        }
        Ok((outcome, db.get_user_by_id(&user_id)?))
    })
    .await?;

    written(outcome, "User")?;
    caller.map(User::from).ok_or(ApiError::Unauthenticated)
}

// -- Helpers --

/// A caller missing from the store holds a valid token but no identity.
fn written(outcome: WriteOutcome, target: &'static str) -> Result<(), ApiError> {
    match outcome {
        WriteOutcome::Written => Ok(()),
        WriteOutcome::UnknownCaller => Err(ApiError::Unauthenticated),
        WriteOutcome::UnknownTarget => Err(ApiError::NotFound(target)),
    }
}

/// Run a store call off the async runtime.
async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::Internal)
}

fn load_thought(db: &Database, id: &str) -> anyhow::Result<Option<Thought>> {
    match db.get_thought(id)? {
        Some(row) => Ok(attach_reactions(db, vec![row])?.pop()),
        None => Ok(None),
    }
}

/// Fetch reactions for all rows in one query and embed them, keeping the
/// rows' order and each thought's reaction order.
fn attach_reactions(db: &Database, rows: Vec<ThoughtRow>) -> anyhow::Result<Vec<Thought>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

    let mut by_thought: HashMap<String, Vec<Reaction>> = HashMap::new();
    for reaction in db.get_reactions_for_thoughts(&ids)? {
        by_thought
            .entry(reaction.thought_id.clone())
            .or_default()
            .push(Reaction::from(reaction));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let reactions = by_thought.remove(&row.id).unwrap_or_default();
            Thought::from_row(row, reactions)
        })
        .collect())
}
