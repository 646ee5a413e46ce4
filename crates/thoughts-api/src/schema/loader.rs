use std::collections::HashMap;

use async_graphql::dataloader::Loader;
use async_graphql::{Error, ErrorExtensions};

use crate::auth::AppState;
use crate::resolvers;

use super::types::{Thought, User};

/// Everything hanging off a user: owned thoughts in append order, friends in
/// the order they were added.
#[derive(Debug, Clone, Default)]
pub struct UserLinks {
    pub thoughts: Vec<Thought>,
    pub friends: Vec<User>,
}

/// Batches the `thoughts`, `friends` and `friendCount` fields of every user
/// in a response into two store queries.
pub struct UserLinksLoader {
    pub state: AppState,
}

impl Loader<String> for UserLinksLoader {
    type Value = UserLinks;
    type Error = Error;

    async fn load(&self, keys: &[String]) -> Result<HashMap<String, UserLinks>, Error> {
        resolvers::user_links(&self.state, keys.to_vec())
            .await
            .map_err(|e| e.extend())
    }
}
