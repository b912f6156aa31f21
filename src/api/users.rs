use async_stream::stream;
use axum::{
    body::{Body, Bytes},
    extract::{MatchedPath, Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use tracing::debug;

use crate::api::server::AppState;
use crate::db::models::User;
use crate::error::{Error, Result};

const NDJSON: &str = "application/x-ndjson";

/// Streams every user, as a JSON array or as newline-delimited JSON when asked for.
pub async fn list(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let users = state.users.list();

    let (content_type, body) = if accepts_ndjson(&headers) {
        (NDJSON, Body::from_stream(ndjson(users)))
    } else {
        ("application/json", Body::from_stream(json_array(users)))
    };

    (
        [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
        body,
    )
        .into_response()
}

pub async fn get_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<User>> {
    Ok(Json(state.users.get_by_id(&id).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(user): Json<User>,
) -> Result<Json<User>> {
    debug!("CREATE or UPDATE User from: {:?}", user);
    Ok(Json(state.users.create_or_update(user).await?))
}

/// The path id wins over whatever id the body carries.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(user): Json<User>,
) -> Result<Json<User>> {
    debug!("UPDATE User {} from: {:?}", id, user);
    Ok(Json(state.users.update(&id, user).await?))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<User>> {
    debug!("DELETE User {}", id);
    Ok(Json(state.users.delete(&id).await?))
}

/// `/user/client` and `/user/ws` reserve only GET; other methods treat the last
/// segment as an ordinary user id.
pub async fn update_named(
    state: State<Arc<AppState>>,
    path: MatchedPath,
    user: Json<User>,
) -> Result<Json<User>> {
    update(state, Path(last_segment(&path)), user).await
}

pub async fn delete_named(
    state: State<Arc<AppState>>,
    path: MatchedPath,
) -> Result<Json<User>> {
    delete(state, Path(last_segment(&path))).await
}

fn last_segment(path: &MatchedPath) -> String {
    path.as_str().rsplit('/').next().unwrap_or_default().to_string()
}

fn accepts_ndjson(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains(NDJSON))
}

fn json_array<S>(users: S) -> impl Stream<Item = Result<Bytes>> + Send + 'static
where
    S: Stream<Item = Result<User>> + Send + 'static,
{
    stream! {
        let mut users = std::pin::pin!(users);
        let mut first = true;

        yield Ok(Bytes::from_static(b"["));
        while let Some(user) = users.next().await {
            let mut chunk = if first { Vec::new() } else { vec![b','] };
            first = false;
            match user.and_then(|u| serde_json::to_writer(&mut chunk, &u).map_err(Error::from)) {
                Ok(()) => yield Ok(Bytes::from(chunk)),
                Err(err) => {
                    yield Err(err);
                    return;
                }
            }
        }
        yield Ok(Bytes::from_static(b"]"));
    }
}

fn ndjson<S>(users: S) -> impl Stream<Item = Result<Bytes>> + Send + 'static
where
    S: Stream<Item = Result<User>> + Send + 'static,
{
    users.map(|user| -> Result<Bytes> {
        let mut line = serde_json::to_vec(&user?)?;
        line.push(b'\n');
        Ok(Bytes::from(line))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::{router, tests::test_state};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    async fn send(
        app: &axum::Router,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, Bytes) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes)
    }

    async fn create_user(app: &axum::Router, name: &str) -> User {
        let (status, body) = send(
            app,
            Method::POST,
            "/user",
            Some(json!({ "name": name, "email": format!("{name}@example.com") })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn create_then_get_returns_the_same_user() {
        let app = router(test_state().await);
        let created = create_user(&app, "ada").await;
        assert!(!created.id.is_empty());

        let (status, body) = send(&app, Method::GET, &format!("/user/{}", created.id), None).await;
        assert_eq!(status, StatusCode::OK);

        let fetched: User = serde_json::from_slice(&body).unwrap();
        assert_eq!(fetched.name, "ada");
        assert_eq!(fetched.email, "ada@example.com");
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found_with_empty_body() {
        let app = router(test_state().await);
        let body = json!({ "name": "A", "email": "B" });

        for (method, uri, payload) in [
            (Method::GET, "/user/missing", None),
            (Method::PUT, "/user/missing", Some(body.clone())),
            (Method::DELETE, "/user/missing", None),
            (Method::PUT, "/user/client", Some(body.clone())),
            (Method::DELETE, "/user/client", None),
            (Method::PUT, "/user/ws", Some(body.clone())),
            (Method::DELETE, "/user/ws", None),
        ] {
            let (status, bytes) = send(&app, method.clone(), uri, payload).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
            assert!(bytes.is_empty(), "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn put_stores_under_the_path_id() {
        let app = router(test_state().await);
        let x = create_user(&app, "x").await;
        let y = create_user(&app, "y").await;

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/user/{}", x.id),
            Some(json!({ "id": y.id, "name": "A", "email": "B" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let saved: User = serde_json::from_slice(&body).unwrap();
        assert_eq!(saved.id, x.id);

        let (_, body) = send(&app, Method::GET, &format!("/user/{}", y.id), None).await;
        let untouched: User = serde_json::from_slice(&body).unwrap();
        assert_eq!(untouched.name, "y");
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let app = router(test_state().await);
        let created = create_user(&app, "ada").await;
        let path = format!("/user/{}", created.id);

        let (status, body) = send(&app, Method::DELETE, &path, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_slice::<User>(&body).unwrap(), created);

        let (status, _) = send(&app, Method::GET, &path, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_streams_every_user_as_a_json_array() {
        let app = router(test_state().await);
        let (_, body) = send(&app, Method::GET, "/user", None).await;
        assert_eq!(&body[..], b"[]");

        let mut created = Vec::new();
        for name in ["u1", "u2", "u3"] {
            created.push(create_user(&app, name).await);
        }

        let (status, body) = send(&app, Method::GET, "/user", None).await;
        assert_eq!(status, StatusCode::OK);
        let listed: Vec<User> = serde_json::from_slice(&body).unwrap();
        assert_eq!(listed, created);
    }

    #[tokio::test]
    async fn writes_proceed_while_a_list_body_is_unread() {
        use std::time::Duration;

        let app = router(test_state().await);
        for name in ["u1", "u2", "u3"] {
            create_user(&app, name).await;
        }

        let request = Request::builder().uri("/user").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let mut chunks = response.into_body().into_data_stream();
        assert_eq!(&chunks.next().await.unwrap().unwrap()[..], b"[");
        assert!(chunks.next().await.unwrap().is_ok());

        let created = tokio::time::timeout(Duration::from_secs(2), create_user(&app, "late"))
            .await
            .expect("create must not wait for the open listing");
        assert_eq!(created.name, "late");

        drop(chunks);
    }

    #[tokio::test]
    async fn list_honours_ndjson_accept_header() {
        let app = router(test_state().await);
        create_user(&app, "u1").await;
        create_user(&app, "u2").await;

        let request = Request::builder()
            .uri("/user")
            .header(header::ACCEPT, NDJSON)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], NDJSON);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let names: Vec<String> = std::str::from_utf8(&body)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str::<User>(line).unwrap().name)
            .collect();
        assert_eq!(names, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let app = router(test_state().await);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/user")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }
}
