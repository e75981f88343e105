// SPDX-FileCopyrightText: The pkgdist authors
// SPDX-License-Identifier: MPL-2.0

use std::path::Path as FsPath;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State, rejection::BytesRejection},
    handler::HandlerWithoutStateExt as _,
    http::StatusCode,
    routing::{get, post, put},
};
use sqlx::SqlitePool;
use tower_http::services::ServeDir;

use pkgdist::{
    Distribution, DistributionId, NewDistribution, NewPackage, Package, PackageId, Snapshot,
    import_snapshot, parse_body,
};
use serde_json::Value;

use crate::error::ApiError;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
struct AppState {
    pool: SqlitePool,
}

/// Builds the router.
///
/// Requests that match no API route are answered from `static_dir`. Missing
/// files and non-GET requests result in a JSON "Not found" error.
pub(crate) fn router(pool: SqlitePool, static_dir: &FsPath) -> Router {
    let static_files = ServeDir::new(static_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(route_not_found.into_service());
    Router::new()
        .route("/api/packages", get(list_packages).post(create_package))
        .route("/api/packages/{id}", put(update_package))
        .route(
            "/api/distributions",
            get(list_distributions).post(create_distribution),
        )
        .route("/api/distributions/{id}", put(update_distribution))
        .route("/api/export", get(export_snapshot))
        .route("/api/import", post(import))
        .method_not_allowed_fallback(route_not_found)
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(AppState { pool })
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

/// Reads a request body leniently, see [`parse_body()`].
fn read_body(body: Result<Bytes, BytesRejection>) -> Result<Value, ApiError> {
    Ok(parse_body(&body?))
}

async fn list_packages(State(state): State<AppState>) -> Result<Json<Vec<Package>>, ApiError> {
    let mut tx = state.pool.begin().await?;
    let packages = Package::load_all(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(packages))
}

async fn create_package(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<Package>), ApiError> {
    let new_package = NewPackage::from_json(&read_body(body)?);
    let mut tx = state.pool.begin().await?;
    let package = Package::create(&mut tx, &new_package).await?;
    tx.commit().await?;
    log::info!("Created package {id}", id = package.id);
    Ok((StatusCode::CREATED, Json(package)))
}

async fn update_package(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Package>, ApiError> {
    let id: PackageId = id.parse().map_err(|_| ApiError::InvalidId)?;
    let new_package = NewPackage::from_json(&read_body(body)?);
    let mut tx = state.pool.begin().await?;
    let Some(package) = Package::update(&mut tx, id, &new_package).await? else {
        log::info!("Package {id} not found");
        return Err(ApiError::PackageNotFound);
    };
    tx.commit().await?;
    log::info!("Updated package {id}");
    Ok(Json(package))
}

async fn list_distributions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Distribution>>, ApiError> {
    let mut tx = state.pool.begin().await?;
    let distributions = Distribution::load_all(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(distributions))
}

async fn create_distribution(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<Distribution>), ApiError> {
    let new_distribution = NewDistribution::from_json(&read_body(body)?);
    let mut tx = state.pool.begin().await?;
    let distribution = Distribution::create(&mut tx, &new_distribution).await?;
    tx.commit().await?;
    log::info!("Created distribution {id}", id = distribution.id);
    Ok((StatusCode::CREATED, Json(distribution)))
}

async fn update_distribution(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Distribution>, ApiError> {
    let id: DistributionId = id.parse().map_err(|_| ApiError::InvalidId)?;
    let new_distribution = NewDistribution::from_json(&read_body(body)?);
    let mut tx = state.pool.begin().await?;
    let Some(distribution) = Distribution::update(&mut tx, id, &new_distribution).await? else {
        log::info!("Distribution {id} not found");
        return Err(ApiError::DistributionNotFound);
    };
    tx.commit().await?;
    log::info!("Updated distribution {id}");
    Ok(Json(distribution))
}

async fn export_snapshot(State(state): State<AppState>) -> Result<Json<Snapshot>, ApiError> {
    let mut tx = state.pool.begin().await?;
    let snapshot = Snapshot::load(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(snapshot))
}

async fn import(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Snapshot>, ApiError> {
    let incoming = read_body(body)?;
    let mut tx = state.pool.begin().await?;
    import_snapshot(&mut tx, &incoming).await?;
    let snapshot = Snapshot::load(&mut tx).await?;
    tx.commit().await?;
    Ok(Json(snapshot))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use axum::{
        Router,
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use http_body_util::BodyExt as _;
    use serde_json::{Value, json};
    use tower::ServiceExt as _;

    use pkgdist::open_in_memory_database;

    async fn app(static_dir: &Path) -> Router {
        let pool = open_in_memory_database().await.unwrap();
        super::router(pool, static_dir)
    }

    async fn send_raw(
        app: &Router,
        method: Method,
        uri: &str,
        body: Body,
    ) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = body.map_or_else(Body::empty, |body| Body::from(body.to_string()));
        let (status, bytes) = send_raw(app, method, uri, body).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn ids(items: &Value, key: &str) -> Vec<i64> {
        items[key]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn create_and_list_packages() {
        let static_dir = tempfile::tempdir().unwrap();
        let app = app(static_dir.path()).await;

        let (status, created) = send(
            &app,
            Method::POST,
            "/api/packages",
            Some(json!({
                "packageName": "Daily sales",
                "distributionGroup": "Sales",
                "deliveryType": "Mail (One email)",
                "emailTitle": "Report",
                "emailMessage": "Attached",
                "location": "HQ",
                "contents": [
                    { "filePath": "a.xlsx", "outputFilename": "A", "accessGroup": "g", "enabled": 1 },
                    { "filePath": "b.xlsx", "outputFilename": "B", "accessGroup": "g", "enabled": false },
                ],
                "parameters": [{ "name": "Param_Time", "value": "|!Param_Time_Input!|", "isStatic": true }],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            created,
            json!({
                "id": 1,
                "packageName": "Daily sales",
                "distributionGroup": "Sales",
                "deliveryType": "Mail (One email)",
                "emailTitle": "Report",
                "emailMessage": "Attached",
                "location": "HQ",
                "contents": [
                    { "id": 1, "filePath": "a.xlsx", "outputFilename": "A", "accessGroup": "g", "enabled": true },
                    { "id": 2, "filePath": "b.xlsx", "outputFilename": "B", "accessGroup": "g", "enabled": false },
                ],
                "parameters": [{ "id": 1, "name": "Param_Time", "value": "|!Param_Time_Input!|", "isStatic": true }],
            })
        );

        let (status, listed) = send(&app, Method::GET, "/api/packages", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed, json!([created]));
    }

    #[tokio::test]
    async fn create_package_without_parameters() {
        let static_dir = tempfile::tempdir().unwrap();
        let app = app(static_dir.path()).await;

        let (status, created) = send(
            &app,
            Method::POST,
            "/api/packages",
            Some(json!({ "packageName": "foo" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            created["parameters"],
            json!([
                { "id": 1, "name": "param_Consol", "value": "USD", "isStatic": true },
                { "id": 2, "name": "Param_Store_Entities", "value": "STORE_REG", "isStatic": true },
                { "id": 3, "name": "Param_Time", "value": "|!Param_Time_Input!|", "isStatic": true },
            ])
        );
        assert_eq!(created["contents"], json!([]));
        assert_eq!(created["location"], json!(""));
    }

    #[tokio::test]
    async fn malformed_body_is_treated_as_empty_object() {
        let static_dir = tempfile::tempdir().unwrap();
        let app = app(static_dir.path()).await;

        let (status, bytes) = send_raw(
            &app,
            Method::POST,
            "/api/packages",
            Body::from("{not json"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(created["packageName"], json!(""));
        assert_eq!(created["parameters"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn update_package_replaces_contents() {
        let static_dir = tempfile::tempdir().unwrap();
        let app = app(static_dir.path()).await;

        let (_, created) = send(
            &app,
            Method::POST,
            "/api/packages",
            Some(json!({
                "packageName": "foo",
                "contents": [{ "filePath": "a" }, { "filePath": "b" }],
            })),
        )
        .await;
        let old_content_ids = ids(&created, "contents");
        assert_eq!(old_content_ids.len(), 2);

        let (status, updated) = send(
            &app,
            Method::PUT,
            "/api/packages/1",
            Some(json!({
                "packageName": "bar",
                "contents": [{ "filePath": "c", "enabled": true }],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["id"], json!(1));
        assert_eq!(updated["packageName"], json!("bar"));

        let (_, listed) = send(&app, Method::GET, "/api/packages", None).await;
        let listed = &listed[0];
        assert_eq!(listed, &updated);
        let new_content_ids = ids(listed, "contents");
        assert_eq!(new_content_ids.len(), 1);
        assert!(!old_content_ids.contains(&new_content_ids[0]));
        assert_eq!(listed["contents"][0]["filePath"], json!("c"));
    }

    #[tokio::test]
    async fn update_missing_package() {
        let static_dir = tempfile::tempdir().unwrap();
        let app = app(static_dir.path()).await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/packages/999999",
            Some(json!({ "packageName": "foo", "contents": [{ "filePath": "a" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Package not found" }));

        let (_, listed) = send(&app, Method::GET, "/api/packages", None).await;
        assert_eq!(listed, json!([]));

        // No IDs have been consumed.
        let (_, created) = send(&app, Method::POST, "/api/packages", Some(json!({}))).await;
        assert_eq!(created["id"], json!(1));
        assert_eq!(created["parameters"][0]["id"], json!(1));
    }

    #[tokio::test]
    async fn update_with_invalid_id() {
        let static_dir = tempfile::tempdir().unwrap();
        let app = app(static_dir.path()).await;

        let (status, body) = send(&app, Method::PUT, "/api/packages/abc", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid id" }));

        let (status, _) = send(&app, Method::PUT, "/api/distributions/1.5", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_packages_ordered_by_id() {
        let static_dir = tempfile::tempdir().unwrap();
        let app = app(static_dir.path()).await;

        for name in ["one", "two", "three"] {
            let body = json!({ "packageName": name });
            send(&app, Method::POST, "/api/packages", Some(body)).await;
        }
        // Updating must not change the order.
        for (uri, name) in [("/api/packages/2", "TWO"), ("/api/packages/1", "ONE")] {
            let (status, _) = send(&app, Method::PUT, uri, Some(json!({ "packageName": name }))).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, listed) = send(&app, Method::GET, "/api/packages", None).await;
        let names: Vec<_> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|package| {
                (
                    package["id"].as_i64().unwrap(),
                    package["packageName"].as_str().unwrap().to_owned(),
                )
            })
            .collect();
        assert_eq!(
            names,
            [
                (1, "ONE".to_owned()),
                (2, "TWO".to_owned()),
                (3, "three".to_owned())
            ]
        );
    }

    #[tokio::test]
    async fn distribution_visibility() {
        let static_dir = tempfile::tempdir().unwrap();
        let app = app(static_dir.path()).await;

        let (status, disabled) = send(
            &app,
            Method::POST,
            "/api/distributions",
            Some(json!({
                "distributionName": "Finance",
                "isPublic": "disabled",
                "users": [{ "user": "alice", "alternateEmail": "alice@example.com", "enabled": true }],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            disabled,
            json!({
                "id": 1,
                "distributionName": "Finance",
                "isPublic": "disabled",
                "users": [{ "id": 1, "user": "alice", "alternateEmail": "alice@example.com", "enabled": true }],
            })
        );

        let (_, enabled) = send(
            &app,
            Method::POST,
            "/api/distributions",
            Some(json!({ "distributionName": "Sales" })),
        )
        .await;
        assert_eq!(enabled["isPublic"], json!("enabled"));
        assert_eq!(enabled["users"], json!([]));

        let (status, listed) = send(&app, Method::GET, "/api/distributions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed, json!([disabled, enabled]));
    }

    #[tokio::test]
    async fn update_distribution() {
        let static_dir = tempfile::tempdir().unwrap();
        let app = app(static_dir.path()).await;

        send(
            &app,
            Method::POST,
            "/api/distributions",
            Some(json!({ "distributionName": "foo", "users": [{ "user": "alice" }] })),
        )
        .await;
        let (status, updated) = send(
            &app,
            Method::PUT,
            "/api/distributions/1",
            Some(json!({ "distributionName": "bar", "users": [{ "user": "bob" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            updated,
            json!({
                "id": 1,
                "distributionName": "bar",
                "isPublic": "enabled",
                "users": [{ "id": 2, "user": "bob", "alternateEmail": "", "enabled": false }],
            })
        );

        let (status, body) = send(&app, Method::PUT, "/api/distributions/2", Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Distribution not found" }));
    }

    #[tokio::test]
    async fn unknown_routes() {
        let static_dir = tempfile::tempdir().unwrap();
        let app = app(static_dir.path()).await;

        let not_found = json!({ "error": "Not found" });
        for (method, uri) in [
            (Method::GET, "/api/nonexistent"),
            (Method::POST, "/api/nonexistent"),
            (Method::DELETE, "/api/packages"),
            (Method::DELETE, "/api/packages/1"),
            (Method::GET, "/api/packages/1"),
            (Method::PATCH, "/api/distributions/1"),
            (Method::PUT, "/api/packages"),
        ] {
            let (status, body) = send(&app, method.clone(), uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
            assert_eq!(body, not_found, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn static_files() {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("index.html"), "<h1>pkgdist</h1>").unwrap();
        let app = app(static_dir.path()).await;

        let (status, bytes) = send_raw(&app, Method::GET, "/index.html", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"<h1>pkgdist</h1>");

        let (status, bytes) = send_raw(&app, Method::GET, "/", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"<h1>pkgdist</h1>");

        let (status, body) = send(&app, Method::GET, "/missing.html", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Not found" }));

        let (status, body) = send(&app, Method::POST, "/index.html", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Not found" }));
    }

    #[tokio::test]
    async fn export_and_import() {
        let static_dir = tempfile::tempdir().unwrap();
        let source = app(static_dir.path()).await;
        send(
            &source,
            Method::POST,
            "/api/packages",
            Some(json!({ "packageName": "foo", "contents": [{ "filePath": "a" }] })),
        )
        .await;
        send(
            &source,
            Method::POST,
            "/api/distributions",
            Some(json!({ "distributionName": "bar", "isPublic": "disabled" })),
        )
        .await;
        let (status, exported) = send(&source, Method::GET, "/api/export", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(exported["packages"].as_array().unwrap().len(), 1);
        assert_eq!(exported["distributions"].as_array().unwrap().len(), 1);

        let target = app(static_dir.path()).await;
        let (status, imported) =
            send(&target, Method::POST, "/api/import", Some(exported.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(imported, exported);
    }

    #[tokio::test]
    async fn oversized_body() {
        let static_dir = tempfile::tempdir().unwrap();
        let app = app(static_dir.path()).await;

        let body = Body::from(vec![b' '; super::MAX_BODY_BYTES + 1]);
        let (status, bytes) = send_raw(&app, Method::POST, "/api/packages", body).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            serde_json::from_slice::<Value>(&bytes).unwrap(),
            json!({ "error": "Payload too large" })
        );

        let (_, packages) = send(&app, Method::GET, "/api/packages", None).await;
        assert_eq!(packages, json!([]));
    }
}
