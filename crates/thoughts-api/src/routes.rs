use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Extension, Router,
    extract::State,
    middleware,
    response::{Html, IntoResponse},
    routing::get,
};

use crate::auth::AppState;
use crate::middleware::{Session, resolve_session};
use crate::schema::{ThoughtsSchema, build_schema};

/// `POST /graphql` executes operations, `GET /graphql` serves GraphiQL.
pub fn router(state: AppState) -> Router {
    let schema = build_schema(state.clone());

    let graphql_routes = Router::new()
        .route("/graphql", get(graphiql).post(graphql))
        .layer(middleware::from_fn_with_state(state, resolve_session))
        .with_state(schema);

    Router::new()
        .route("/health", get(health))
        .merge(graphql_routes)
}

async fn graphql(
    State(schema): State<ThoughtsSchema>,
    Extension(session): Extension<Session>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    schema.execute(req.into_inner().data(session)).await.into()
}

async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AppStateInner;
    use crate::auth::tests::fast_credentials;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use thoughts_db::Database;
    use tower::ServiceExt;

    fn app() -> Router {
        router(Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            credentials: fast_credentials(),
        }))
    }

    async fn post(app: &Router, token: Option<&str>, query: &str) -> Value {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/graphql")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = Body::from(json!({ "query": query }).to_string());

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn bearer_header_identifies_the_caller() {
        let app = app();
        let signup = post(
            &app,
            None,
            r#"mutation { addUser(username: "kim", email: "kim@example.com", password: "hunter22") { token } }"#,
        )
        .await;
        let token = signup["data"]["addUser"]["token"].as_str().unwrap().to_string();

        let me = post(&app, Some(&token), "{ me { username } }").await;
        assert_eq!(me, json!({ "data": { "me": { "username": "kim" } } }));

        let anonymous = post(&app, Some("tampered"), "{ me { username } }").await;
        assert_eq!(anonymous["errors"][0]["extensions"]["code"], "UNAUTHENTICATED");
        assert_eq!(anonymous["data"], Value::Null);
    }

    #[tokio::test]
    async fn health_and_explorer_respond() {
        let app = app();

        let health = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let explorer = app
            .oneshot(Request::get("/graphql").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(explorer.status(), StatusCode::OK);
    }
}
