use axum::Router;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{DefaultBodyLimit, Json, Multipart, Path, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use rti_chain::TxHash;
use rti_core::{CreateFields, NewAttachment, RtiRequest, RtiSummary, StoredAttachment};
use rti_store::StoreError;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, instrument};

use crate::error::ApiError;
use crate::lifecycle::{self, Edit, OfficerResponse};
use crate::state::{AppState, ServerConfig};

/// Build the full HTTP surface over `state`.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let app = Router::new()
        .route("/rtis", get(list_rtis).post(create_rti))
        .route("/rtis/:id", get(get_rti).patch(update_rti))
        .route("/rtis/:id/resync", post(resync_rti))
        .route("/respond", post(respond))
        .route("/verify", post(verify))
        .route("/refund", post(refund))
        .route("/download/:id", get(download))
        .route("/upload", post(upload))
        .route("/ipfs/:handle", get(serve_upload))
        .route("/verify-doc", post(verify_doc))
        .route("/esign", post(esign))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match &config.cors_origin {
        Some(origin) => app.layer(cors(origin.clone())),
        None => app,
    }
}

fn cors(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

// ---------------------------------------------------------------------------
// Extraction helpers
// ---------------------------------------------------------------------------

/// Form clients send ids as numbers, string-typed fields as "7".
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RtiId {
    Number(i64),
    Text(String),
}

fn rti_id(raw: Option<RtiId>) -> Result<i64, ApiError> {
    match raw {
        Some(RtiId::Number(id)) => Ok(id),
        Some(RtiId::Text(text)) => text.trim().parse().map_err(|_| {
            ApiError::from(rti_core::ValidationError::Invalid {
                field: "rti_id",
                reason: format!("not an integer: {text}"),
            })
        }),
        None => Err(rti_core::ValidationError::Missing("rti_id").into()),
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn path_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::BadRequest(e.body_text())
}

/// Read an uploaded file part. A part with an empty filename is "no file".
async fn file_part(field: Field<'_>) -> Result<Option<NewAttachment>, ApiError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);
    let data = field.bytes().await.map_err(multipart_error)?;
    if file_name.is_empty() {
        return Ok(None);
    }
    Ok(Some(NewAttachment::from_upload(
        &file_name,
        content_type.as_deref(),
        data.to_vec(),
    )))
}

fn tx_ok(message: &str, tx_hash: &TxHash) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": message,
        "tx_hash": tx_hash,
    }))
}

fn file_response(file: StoredAttachment) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", file.meta.file_name);
    (
        [
            (header::CONTENT_TYPE, file.meta.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.data,
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Request records
// ---------------------------------------------------------------------------

async fn list_rtis(State(state): State<AppState>) -> Result<Json<Vec<RtiSummary>>, ApiError> {
    Ok(Json(lifecycle::list(&state)?))
}

async fn get_rti(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<RtiRequest>, ApiError> {
    let id = path_id(path)?;
    Ok(Json(lifecycle::get(&state, id)?))
}

#[instrument(skip_all)]
async fn create_rti(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut fields = CreateFields::default();
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        let slot = match name.as_str() {
            "file" => {
                file = file_part(field).await?;
                continue;
            }
            "citizen_address" => &mut fields.citizen_address,
            "title" => &mut fields.title,
            "description" => &mut fields.description,
            "bounty" => &mut fields.bounty,
            "deadline_days" => &mut fields.deadline_days,
            other => {
                debug!(field = other, "ignoring unknown form field");
                continue;
            }
        };
        *slot = Some(field.text().await.map_err(multipart_error)?);
    }

    let created = lifecycle::create(&state, fields, file).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "RTI created successfully",
            "rti_id": created.rti_id,
            "blockchain_id": created.blockchain_id,
            "tx_hash": created.tx_hash,
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct EditBody {
    #[serde(default, alias = "responder_address")]
    officer_address: Option<String>,
    #[serde(default)]
    response_text: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    rejection_reason: Option<String>,
}

async fn update_rti(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<EditBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = path_id(path)?;
    let body = json_body(body)?;
    lifecycle::update(
        &state,
        id,
        Edit {
            officer_address: body.officer_address,
            response_text: body.response_text,
            status: body.status,
            rejection_reason: body.rejection_reason,
        },
    )?;
    Ok(Json(json!({ "success": true, "message": "RTI updated" })))
}

async fn resync_rti(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = path_id(path)?;
    let tx_hash = lifecycle::resync(&state, id).await?;
    Ok(tx_ok("Response resubmitted", &tx_hash))
}

// ---------------------------------------------------------------------------
// Lifecycle actions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RespondBody {
    rti_id: Option<RtiId>,
    response_text: Option<String>,
    officer_address: Option<String>,
}

async fn respond(
    State(state): State<AppState>,
    body: Result<Json<RespondBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = json_body(body)?;
    let id = rti_id(body.rti_id)?;
    let tx_hash = lifecycle::respond(
        &state,
        id,
        OfficerResponse {
            response_text: body.response_text,
            officer_address: body.officer_address,
        },
    )
    .await?;
    Ok(tx_ok("Response submitted", &tx_hash))
}

#[derive(Debug, Deserialize)]
struct VerifyBody {
    rti_id: Option<RtiId>,
    admin_address: Option<String>,
}

async fn verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = json_body(body)?;
    let id = rti_id(body.rti_id)?;
    let tx_hash = lifecycle::verify(&state, id, body.admin_address.as_deref()).await?;
    Ok(tx_ok("RTI verified and bounty released", &tx_hash))
}

#[derive(Debug, Deserialize)]
struct RefundBody {
    rti_id: Option<RtiId>,
}

async fn refund(
    State(state): State<AppState>,
    body: Result<Json<RefundBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = rti_id(json_body(body)?.rti_id)?;
    let tx_hash = lifecycle::refund(&state, id).await?;
    Ok(tx_ok("Bounty refunded", &tx_hash))
}

async fn download(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let id = path_id(path)?;
    Ok(file_response(lifecycle::attachment_of(&state, id).await?))
}

// ---------------------------------------------------------------------------
// Standalone documents
// ---------------------------------------------------------------------------

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file = file_part(field)
            .await?
            .ok_or_else(|| ApiError::BadRequest("No selected file".into()))?;
        let meta = state.attachments.put(file).await?;
        debug!(handle = %meta.handle, backend = state.attachments.backend(), "document uploaded");
        return Ok(Json(json!({ "ipfs_hash": meta.handle })));
    }
    Err(ApiError::BadRequest("No file part".into()))
}

async fn serve_upload(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Response, ApiError> {
    let stored = match state.attachments.get(&handle).await {
        Ok(stored) => stored,
        Err(StoreError::InvalidHandle(_)) => None,
        Err(e) => return Err(e.into()),
    };
    let stored = stored.ok_or(ApiError::NotFound("File not found"))?;
    Ok(file_response(stored))
}

async fn verify_doc() -> Json<Value> {
    Json(json!({
        "verified": true,
        "message": "Document verified successfully",
    }))
}

async fn esign() -> Json<Value> {
    Json(json!({
        "signed": true,
        "signature": "mock_signature_123",
    }))
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let records = state.store.session()?.count()?;
    Ok(Json(json!({ "status": "ok", "records": records })))
}
