use utoipa::OpenApi;
use utoipa::ToSchema;

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

/// `action` defaults to `upsert`; `entry` is required for upsert, `id` for delete.
#[derive(ToSchema)]
pub struct SaveEntryRequestDoc {
    #[schema(example = "upsert")]
    pub action: Option<String>,
    #[schema(value_type = Option<Object>, example = json!({"id": "42", "name": "Alice"}))]
    pub entry: Option<serde_json::Value>,
    #[schema(value_type = Option<String>, example = "7")]
    pub id: Option<serde_json::Value>,
}

#[derive(ToSchema)]
pub struct SaveEntryResponseDoc {
    pub ok: bool,
    #[schema(example = "upsert")]
    pub action: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::entries::save_entry,
    ),
    components(
        schemas(
            HealthResponse,
            SaveEntryRequestDoc,
            SaveEntryResponseDoc,
        )
    ),
    tags(
        (name = "health"),
        (name = "entries")
    )
)]
pub struct ApiDoc;
