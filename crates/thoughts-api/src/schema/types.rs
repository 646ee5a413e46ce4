use async_graphql::dataloader::DataLoader;
use async_graphql::{ComplexObject, Context, ID, Result, SimpleObject};

use thoughts_db::models::{ReactionRow, ThoughtRow, UserRow};

use super::loader::{UserLinks, UserLinksLoader};

/// A reply embedded in a thought.
#[derive(Debug, Clone, SimpleObject)]
pub struct Reaction {
    #[graphql(name = "_id")]
    pub id: ID,
    pub reaction_body: String,
    pub created_at: String,
    pub username: String,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(complex)]
pub struct Thought {
    #[graphql(name = "_id")]
    pub id: ID,
    pub thought_text: String,
    pub created_at: String,
    /// Author name as it was when the thought was posted.
    pub username: String,
    pub reactions: Vec<Reaction>,
}

#[ComplexObject]
impl Thought {
    async fn reaction_count(&self) -> usize {
        self.reactions.len()
    }
}

/// Public projection of a user. The password hash never leaves the store.
#[derive(Debug, Clone, SimpleObject)]
#[graphql(complex)]
pub struct User {
    #[graphql(name = "_id")]
    pub id: ID,
    pub username: String,
    pub email: String,
}

#[ComplexObject]
impl User {
    async fn friend_count(&self, ctx: &Context<'_>) -> Result<usize> {
        Ok(self.links(ctx).await?.friends.len())
    }

    async fn thoughts(&self, ctx: &Context<'_>) -> Result<Vec<Thought>> {
        Ok(self.links(ctx).await?.thoughts)
    }

    async fn friends(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        Ok(self.links(ctx).await?.friends)
    }
}

impl User {
    async fn links(&self, ctx: &Context<'_>) -> Result<UserLinks> {
        let links = ctx
            .data::<DataLoader<UserLinksLoader>>()?
            .load_one(self.id.to_string())
            .await?;
        Ok(links.unwrap_or_default())
    }
}

/// Returned by `login` and `addUser`.
#[derive(Debug, Clone, SimpleObject)]
pub struct Auth {
    pub token: ID,
    pub user: User,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id.into(),
            username: row.username,
            email: row.email,
        }
    }
}

impl From<ReactionRow> for Reaction {
    fn from(row: ReactionRow) -> Self {
        Self {
            id: row.id.into(),
            reaction_body: row.reaction_body,
            created_at: row.created_at,
            username: row.username,
        }
    }
}

impl Thought {
    pub fn from_row(row: ThoughtRow, reactions: Vec<Reaction>) -> Self {
        Self {
            id: row.id.into(),
            thought_text: row.thought_text,
            created_at: row.created_at,
            username: row.username,
            reactions,
        }
    }
}
