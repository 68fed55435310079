use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes::health::HealthResponse;

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(
            models::page::Page,
            models::page::PageWithPermissions,
            models::page::PageCreateRequest,
            models::page::PageUpdateRequest,
            models::grants::PermissionAction,
            models::grants::RoleGrantRow,
            models::grants::GrantState,
            models::grants::RolePageGrants,
            models::grants::GrantEntry,
            models::grants::ReplacePageGrantsRequest,
            models::grants::GrantedPagePermission,
            models::grants::ReplaceRoleGrantsRequest,
            models::grants::PermissionCheck,
            HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Navigation", description = "Caller-visible pages and permission checks"),
        (name = "Pages", description = "Page catalog management"),
        (name = "Grants", description = "Role grant matrix management")
    )
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
    let mut doc = serde_json::to_value(ApiDoc::openapi())?;

    normalize_path_operations(&mut doc);
    ensure_security_components(&mut doc);
    ensure_global_security(&mut doc);
    ensure_openapi_version(&mut doc);
    ensure_servers(&mut doc, port);

    Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    let doc_json = Arc::new(serde_json::to_value(&doc)?);

    let json_route = {
        let doc_json = Arc::clone(&doc_json);
        get(move || {
            let doc_json = Arc::clone(&doc_json);
            async move { Json((*doc_json).clone()) }
        })
    };

    Ok(Router::new()
        .route("/api-docs/openapi.json", json_route)
        .merge(SwaggerUi::new("/docs").config(swagger_config)))
}

/// Lowercase and merge duplicate method keys so Swagger's parser never sees
/// a duplicated mapping key.
fn normalize_path_operations(doc: &mut Value) {
    if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
        let snapshot = paths.clone();
        for (path, item) in snapshot {
            if let Some(ops) = item.as_object() {
                let mut normalized = Map::new();
                for (method, val) in ops {
                    let key = method.to_lowercase();
                    if let Some(existing) = normalized.get_mut(&key) {
                        merge_values(existing, val);
                    } else {
                        normalized.insert(key, val.clone());
                    }
                }
                paths.insert(path, Value::Object(normalized));
            }
        }
    }
}

fn ensure_security_components(doc: &mut Value) {
    let root = match doc.as_object_mut() {
        Some(root) => root,
        None => return,
    };

    let components = root
        .entry("components")
        .or_insert_with(|| Value::Object(Map::new()));

    if let Some(components) = components.as_object_mut() {
        let schemes = components
            .entry("securitySchemes")
            .or_insert_with(|| Value::Object(Map::new()));

        if let Some(schemes) = schemes.as_object_mut() {
            schemes.insert(
                "bearerAuth".to_string(),
                json!({
                    "type": "http",
                    "scheme": "bearer",
                    "bearerFormat": "JWT"
                }),
            );
        }
    }
}

fn ensure_global_security(doc: &mut Value) {
    if let Some(root) = doc.as_object_mut() {
        root.entry("security").or_insert_with(|| json!([{ "bearerAuth": [] }]));
    }
}

fn ensure_openapi_version(doc: &mut Value) {
    if let Some(root) = doc.as_object_mut() {
        root.entry("openapi").or_insert_with(|| Value::String("3.1.0".to_string()));
    }
}

fn ensure_servers(doc: &mut Value, port: u16) {
    let server_url = format!("http://localhost:{}", port);

    match doc.get_mut("servers") {
        Some(Value::Array(arr)) => {
            let has = arr
                .iter()
                .any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
            if !has {
                arr.push(json!({ "url": server_url }));
            }
        }
        _ => {
            doc["servers"] = json!([{ "url": server_url }]);
        }
    }
}

fn merge_values(target: &mut Value, addition: &Value) {
    match (target, addition) {
        (Value::Object(dest), Value::Object(src)) => {
            for (key, value) in src {
                if let Some(existing) = dest.get_mut(key) {
                    merge_values(existing, value);
                } else {
                    dest.insert(key.clone(), value.clone());
                }
            }
        }
        (Value::Array(dest), Value::Array(src)) => {
            for item in src {
                if !dest.contains(item) {
                    dest.push(item.clone());
                }
            }
        }
        _ => {}
    }
}
