//! GraphQL contract: object types, query/mutation roots and argument
//! validators. Malformed documents and out-of-bounds arguments are rejected
//! by the engine before the resolver layer is reached.
//!
//! ```graphql
//! mutation {
//!   addThought(thoughtText: "Hello") { _id createdAt reactionCount }
//! }
//!
//! query {
//!   thoughts(username: "lernantino") { thoughtText reactions { reactionBody username } }
//! }
//! ```

pub mod loader;
pub mod mutation;
pub mod query;
pub mod types;

use async_graphql::dataloader::DataLoader;
use async_graphql::{Context, EmptySubscription, Schema};

use crate::auth::AppState;
use crate::middleware::Session;

use self::loader::UserLinksLoader;
use self::mutation::MutationRoot;
use self::query::QueryRoot;

pub type ThoughtsSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// The schema carries the shared `AppState` and the user-field loader; each
/// request adds its own `Session`.
pub fn build_schema(state: AppState) -> ThoughtsSchema {
    let links = DataLoader::new(UserLinksLoader { state: state.clone() }, tokio::spawn);

    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(state)
        .data(links)
        .finish()
}

fn state<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a AppState> {
    ctx.data::<AppState>()
}

/// Requests executed without a session (e.g. straight against the schema)
/// are anonymous.
fn session(ctx: &Context<'_>) -> Session {
    ctx.data_opt::<Session>().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AppStateInner;
    use crate::auth::tests::fast_credentials;
    use async_graphql::{Request, Response, Value};
    use serde_json::json;
    use std::sync::Arc;
    use thoughts_db::Database;

    struct Harness {
        schema: ThoughtsSchema,
        state: AppState,
    }

    fn harness() -> Harness {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            credentials: fast_credentials(),
        });
        Harness {
            schema: build_schema(state.clone()),
            state,
        }
    }

    /// Execute a document the way the HTTP layer does: a token that fails
    /// to authenticate leaves the request anonymous.
    async fn run(h: &Harness, token: Option<&str>, doc: &str) -> Response {
        let session = token
            .and_then(|t| h.state.credentials.authenticate(t).ok())
            .map(Session::authenticated)
            .unwrap_or_default();
        h.schema.execute(Request::new(doc).data(session)).await
    }

    fn data(response: &Response) -> serde_json::Value {
        assert!(response.errors.is_empty(), "unexpected errors: {:?}", response.errors);
        response.data.clone().into_json().unwrap()
    }

    fn error_code(response: &Response) -> Option<String> {
        let error = serde_json::to_value(response.errors.first()?).unwrap();
        error["extensions"]["code"].as_str().map(str::to_string)
    }

    async fn register(h: &Harness, username: &str) -> (String, String) {
        let doc = format!(
            r#"mutation {{ addUser(username: "{username}", email: "{username}@example.com", password: "password12345") {{ token user {{ _id }} }} }}"#
        );
        let body = data(&run(h, None, &doc).await);
        (
            body["addUser"]["token"].as_str().unwrap().to_string(),
            body["addUser"]["user"]["_id"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn registration_token_round_trips() {
        let h = harness();
        let (token, _) = register(&h, "lernantino").await;

        let claims = h.state.credentials.authenticate(&token).unwrap();
        assert_eq!(claims.username, "lernantino");
        assert_eq!(claims.email, "lernantino@example.com");

        let me = data(&run(&h, Some(&token), "{ me { username email friendCount thoughts { _id } } }").await);
        assert_eq!(
            me,
            json!({ "me": { "username": "lernantino", "email": "lernantino@example.com", "friendCount": 0, "thoughts": [] } })
        );
    }

    #[tokio::test]
    async fn password_is_not_in_the_contract() {
        let h = harness();
        let response = run(&h, None, "{ users { password } }").await;
        assert!(!response.errors.is_empty());
        assert!(response.data == Value::Null);
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_uniqueness_violation() {
        let h = harness();
        register(&h, "dup").await;

        let response = run(
            &h,
            None,
            r#"mutation { addUser(username: "dup", email: "fresh@example.com", password: "password12345") { token } }"#,
        )
        .await;
        assert_eq!(error_code(&response).as_deref(), Some("UNIQUENESS_VIOLATION"));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let h = harness();
        register(&h, "sal").await;

        let wrong_password = run(
            &h,
            None,
            r#"mutation { login(email: "sal@example.com", password: "nope-nope") { token } }"#,
        )
        .await;
        let unknown_email = run(
            &h,
            None,
            r#"mutation { login(email: "ghost@example.com", password: "password12345") { token } }"#,
        )
        .await;

        assert_eq!(error_code(&wrong_password).as_deref(), Some("AUTHENTICATION_ERROR"));
        assert_eq!(error_code(&unknown_email).as_deref(), Some("AUTHENTICATION_ERROR"));
        assert_eq!(wrong_password.errors[0].message, unknown_email.errors[0].message);

        let ok = data(
            &run(
                &h,
                None,
                r#"mutation { login(email: "sal@example.com", password: "password12345") { user { username } } }"#,
            )
            .await,
        );
        assert_eq!(ok["login"]["user"]["username"], "sal");
    }

    #[tokio::test]
    async fn anonymous_writes_are_unauthenticated() {
        let h = harness();
        let (_, user_id) = register(&h, "target").await;
        let (poster, poster_id) = register(&h, "poster").await;

        let thought = data(&run(&h, Some(&poster), r#"mutation { addThought(thoughtText: "mine") { _id } }"#).await);
        let thought_id = thought["addThought"]["_id"].as_str().unwrap().to_string();

        let docs = [
            "{ me { username } }".to_string(),
            r#"mutation { addThought(thoughtText: "sneaky") { _id } }"#.to_string(),
            format!(r#"mutation {{ addReaction(thoughtId: "{thought_id}", reactionBody: "sneaky") {{ _id }} }}"#),
            format!(r#"mutation {{ addFriend(friendId: "{user_id}") {{ _id }} }}"#),
        ];

        for token in [None, Some("garbage-token")] {
            for doc in &docs {
                let response = run(&h, token, doc).await;
                assert_eq!(error_code(&response).as_deref(), Some("UNAUTHENTICATED"), "{doc}");
            }
        }

        let all = h.state.db.list_thoughts(None).unwrap();
        assert_eq!(all.len(), 1);
        assert!(h.state.db.get_reactions_for_thoughts(&[thought_id]).unwrap().is_empty());
        let friends = h.state.db.get_friends_for_users(&[poster_id, user_id]).unwrap();
        assert!(friends.is_empty());
    }

    #[tokio::test]
    async fn new_thought_leads_the_feed() {
        let h = harness();
        let (alice, _) = register(&h, "alice").await;
        let (bob, _) = register(&h, "bob").await;

        run(&h, Some(&bob), r#"mutation { addThought(thoughtText: "older") { _id } }"#).await;
        let posted = data(&run(&h, Some(&alice), r#"mutation { addThought(thoughtText: "newest") { _id username reactionCount } }"#).await);
        assert_eq!(posted["addThought"]["username"], "alice");
        assert_eq!(posted["addThought"]["reactionCount"], 0);
        let id = posted["addThought"]["_id"].clone();

        let feed = data(&run(&h, None, "{ thoughts { _id thoughtText } }").await);
        let feed = feed["thoughts"].as_array().unwrap();
        assert_eq!(feed.iter().filter(|t| t["_id"] == id).count(), 1);
        assert_eq!(feed[0]["thoughtText"], "newest");
        assert_eq!(feed[1]["thoughtText"], "older");

        let filtered = data(&run(&h, None, r#"{ thoughts(username: "bob") { thoughtText } }"#).await);
        assert_eq!(filtered, json!({ "thoughts": [{ "thoughtText": "older" }] }));

        let mine = data(&run(&h, Some(&alice), "{ me { thoughts { thoughtText } } }").await);
        assert_eq!(mine, json!({ "me": { "thoughts": [{ "thoughtText": "newest" }] } }));
    }

    #[tokio::test]
    async fn reaction_is_appended_and_persisted() {
        let h = harness();
        let (alice, _) = register(&h, "alice").await;
        let (bob, _) = register(&h, "bob").await;

        let posted = data(&run(&h, Some(&alice), r#"mutation { addThought(thoughtText: "react to me") { _id } }"#).await);
        let id = posted["addThought"]["_id"].as_str().unwrap().to_string();

        run(&h, Some(&alice), &format!(r#"mutation {{ addReaction(thoughtId: "{id}", reactionBody: "first") {{ _id }} }}"#)).await;
        let reacted = data(
            &run(
                &h,
                Some(&bob),
                &format!(r#"mutation {{ addReaction(thoughtId: "{id}", reactionBody: "second") {{ _id reactionCount reactions {{ reactionBody username }} }} }}"#),
            )
            .await,
        );
        assert_eq!(reacted["addReaction"]["_id"], id.as_str());
        assert_eq!(reacted["addReaction"]["reactionCount"], 2);
        assert_eq!(
            reacted["addReaction"]["reactions"][1],
            json!({ "reactionBody": "second", "username": "bob" })
        );

        let fetched = data(&run(&h, None, &format!(r#"{{ thought(_id: "{id}") {{ reactions {{ reactionBody username }} }} }}"#)).await);
        assert_eq!(fetched["thought"]["reactions"], reacted["addReaction"]["reactions"]);
    }

    #[tokio::test]
    async fn reaction_on_missing_thought_is_not_found() {
        let h = harness();
        let (alice, _) = register(&h, "alice").await;

        let response = run(
            &h,
            Some(&alice),
            r#"mutation { addReaction(thoughtId: "nope", reactionBody: "hello?") { _id } }"#,
        )
        .await;
        assert_eq!(error_code(&response).as_deref(), Some("NOT_FOUND"));
    }

    #[tokio::test]
    async fn friends_are_a_set_on_the_caller_only() {
        let h = harness();
        let (alice, _) = register(&h, "alice").await;
        let (_, bob_id) = register(&h, "bob").await;

        let doc = format!(r#"mutation {{ addFriend(friendId: "{bob_id}") {{ username friendCount friends {{ username }} }} }}"#);
        data(&run(&h, Some(&alice), &doc).await);
        let twice = data(&run(&h, Some(&alice), &doc).await);
        assert_eq!(
            twice,
            json!({ "addFriend": { "username": "alice", "friendCount": 1, "friends": [{ "username": "bob" }] } })
        );

        let bob = data(&run(&h, None, r#"{ user(username: "bob") { friendCount } }"#).await);
        assert_eq!(bob, json!({ "user": { "friendCount": 0 } }));

        let missing = run(&h, Some(&alice), r#"mutation { addFriend(friendId: "nobody") { _id } }"#).await;
        assert_eq!(error_code(&missing).as_deref(), Some("NOT_FOUND"));
    }

    #[tokio::test]
    async fn absent_entities_read_as_null() {
        let h = harness();
        let body = data(&run(&h, None, r#"{ user(username: "nobody") { _id } thought(_id: "nothing") { _id } }"#).await);
        assert_eq!(body, json!({ "user": null, "thought": null }));
    }

    #[tokio::test]
    async fn contract_rejects_bad_arguments() {
        let h = harness();
        let (alice, _) = register(&h, "alice").await;

        let too_long = "x".repeat(281);
        let cases = [
            format!(r#"mutation {{ addThought(thoughtText: "{too_long}") {{ _id }} }}"#),
            r#"mutation { addThought(thoughtText: "") { _id } }"#.to_string(),
            r#"mutation { addThought { _id } }"#.to_string(),
            r#"{ user { _id } }"#.to_string(),
        ];
        for doc in &cases {
            let response = run(&h, Some(&alice), doc).await;
            assert!(!response.errors.is_empty(), "{doc}");
        }
        assert!(h.state.db.list_thoughts(None).unwrap().is_empty());

        let bad_email = run(
            &h,
            None,
            r#"mutation { addUser(username: "x", email: "not-an-email", password: "password12345") { token } }"#,
        )
        .await;
        assert!(!bad_email.errors.is_empty());

        let short_password = run(
            &h,
            None,
            r#"mutation { addUser(username: "y", email: "y@example.com", password: "abc") { token } }"#,
        )
        .await;
        assert!(!short_password.errors.is_empty());
        assert_eq!(h.state.db.list_users().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn text_limits_count_characters() {
        let h = harness();
        let (alice, _) = register(&h, "alice").await;

        let fits = "é".repeat(280);
        let posted = data(&run(&h, Some(&alice), &format!(r#"mutation {{ addThought(thoughtText: "{fits}") {{ _id thoughtText }} }}"#)).await);
        assert_eq!(posted["addThought"]["thoughtText"], fits.as_str());
        let id = posted["addThought"]["_id"].as_str().unwrap().to_string();

        let reaction = "🙂".repeat(200);
        let reacted = run(
            &h,
            Some(&alice),
            &format!(r#"mutation {{ addReaction(thoughtId: "{id}", reactionBody: "{reaction}") {{ reactionCount }} }}"#),
        )
        .await;
        assert_eq!(data(&reacted), json!({ "addReaction": { "reactionCount": 1 } }));

        let too_long = "é".repeat(281);
        let rejected = run(&h, Some(&alice), &format!(r#"mutation {{ addThought(thoughtText: "{too_long}") {{ _id }} }}"#)).await;
        assert!(!rejected.errors.is_empty());

        let name = "ü".repeat(32);
        let signup = run(
            &h,
            None,
            &format!(r#"mutation {{ addUser(username: "{name}", email: "u@example.com", password: "pässwörd") {{ user {{ username }} }} }}"#),
        )
        .await;
        assert_eq!(data(&signup)["addUser"]["user"]["username"], name.as_str());
        assert_eq!(h.state.db.list_thoughts(None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn every_user_in_a_listing_gets_their_own_links() {
        let h = harness();
        let (alice, _) = register(&h, "alice").await;
        let (bob, bob_id) = register(&h, "bob").await;
        register(&h, "carol").await;

        run(&h, Some(&alice), r#"mutation { addThought(thoughtText: "from alice") { _id } }"#).await;
        run(&h, Some(&bob), r#"mutation { addThought(thoughtText: "bob one") { _id } }"#).await;
        run(&h, Some(&bob), r#"mutation { addThought(thoughtText: "bob two") { _id } }"#).await;
        run(&h, Some(&alice), &format!(r#"mutation {{ addFriend(friendId: "{bob_id}") {{ _id }} }}"#)).await;

        let listing = data(
            &run(
                &h,
                None,
                "{ users { username friendCount thoughts { thoughtText } friends { username thoughts { thoughtText } } } }",
            )
            .await,
        );
        assert_eq!(
            listing,
            json!({ "users": [
                {
                    "username": "alice",
                    "friendCount": 1,
                    "thoughts": [{ "thoughtText": "from alice" }],
                    "friends": [{ "username": "bob", "thoughts": [{ "thoughtText": "bob one" }, { "thoughtText": "bob two" }] }],
                },
                {
                    "username": "bob",
                    "friendCount": 0,
                    "thoughts": [{ "thoughtText": "bob one" }, { "thoughtText": "bob two" }],
                    "friends": [],
                },
                { "username": "carol", "friendCount": 0, "thoughts": [], "friends": [] },
            ] })
        );
    }
}
