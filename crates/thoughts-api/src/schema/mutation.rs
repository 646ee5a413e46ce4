use async_graphql::{Context, ErrorExtensions, ID, Object, Result};

use crate::resolvers;

use super::types::{Auth, Thought, User};
use super::{session, state};

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn login(&self, ctx: &Context<'_>, email: String, password: String) -> Result<Auth> {
        resolvers::login(state(ctx)?, email, password)
            .await
            .map_err(|e| e.extend())
    }

    async fn add_user(
        &self,
        ctx: &Context<'_>,
        #[graphql(validator(chars_min_length = 1, chars_max_length = 32))] username: String,
        #[graphql(validator(email))] email: String,
        #[graphql(validator(chars_min_length = 5))] password: String,
    ) -> Result<Auth> {
        resolvers::add_user(state(ctx)?, username, email, password)
            .await
            .map_err(|e| e.extend())
    }

    async fn add_thought(
        &self,
        ctx: &Context<'_>,
        #[graphql(validator(chars_min_length = 1, chars_max_length = 280))] thought_text: String,
    ) -> Result<Thought> {
        resolvers::add_thought(state(ctx)?, &session(ctx), thought_text)
            .await
            .map_err(|e| e.extend())
    }

    /// Returns the parent thought, not the reaction.
    async fn add_reaction(
        &self,
        ctx: &Context<'_>,
        thought_id: ID,
        #[graphql(validator(chars_min_length = 1, chars_max_length = 280))] reaction_body: String,
    ) -> Result<Thought> {
        resolvers::add_reaction(state(ctx)?, &session(ctx), thought_id.0, reaction_body)
            .await
            .map_err(|e| e.extend())
    }

    async fn add_friend(&self, ctx: &Context<'_>, friend_id: ID) -> Result<User> {
        resolvers::add_friend(state(ctx)?, &session(ctx), friend_id.0)
            .await
            .map_err(|e| e.extend())
    }
}
