use async_graphql::{Context, ErrorExtensions, ID, Object, Result};

use crate::resolvers;

use super::types::{Thought, User};
use super::{session, state};

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The logged-in caller.
    async fn me(&self, ctx: &Context<'_>) -> Result<User> {
        resolvers::me(state(ctx)?, &session(ctx))
            .await
            .map_err(|e| e.extend())
    }

    async fn users(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        resolvers::users(state(ctx)?).await.map_err(|e| e.extend())
    }

    /// Null when no user has this name.
    async fn user(&self, ctx: &Context<'_>, username: String) -> Result<Option<User>> {
        resolvers::user(state(ctx)?, username)
            .await
            .map_err(|e| e.extend())
    }

    /// Newest first, optionally only those by `username`.
    async fn thoughts(&self, ctx: &Context<'_>, username: Option<String>) -> Result<Vec<Thought>> {
        resolvers::thoughts(state(ctx)?, username)
            .await
            .map_err(|e| e.extend())
    }

    async fn thought(
        &self,
        ctx: &Context<'_>,
        #[graphql(name = "_id")] id: ID,
    ) -> Result<Option<Thought>> {
        resolvers::thought(state(ctx)?, id.0)
            .await
            .map_err(|e| e.extend())
    }
}
