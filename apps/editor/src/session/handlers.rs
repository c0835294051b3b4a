use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::format::applicator::{ApplyOutcome, ClearOutcome};
use crate::format::attributes::FormatCommand;
use crate::layout::{PageConfig, PaginationResult};
use crate::models::document::ResumeDocument;
use crate::preview::resolver::NativeSelection;
use crate::preview::sync_bridge::{ClickOutcome, FormCommand};
use crate::preview::toolbar::{Rect, ToolbarView, Viewport};
use crate::preview::tree::{NodeId, PreviewTree};
use crate::session::callbacks::CallbackEvent;
use crate::session::editor::{Edit, EditReceipt, EditorSession, ToolbarInput, ToolbarResponse};
use crate::session::store::SavedDocument;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub document: ResumeDocument,
    pub toolbar: ToolbarView,
    pub pending_edits: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    fn of(session: &EditorSession) -> Self {
        Self {
            session_id: session.id(),
            document: session.document().clone(),
            toolbar: session.toolbar(),
            pending_edits: session.pending_edits(),
            created_at: session.created_at(),
            updated_at: session.updated_at(),
        }
    }
}

/// Wraps a handler result with the callback events it raised.
#[derive(Serialize)]
pub struct WithCallbacks<T> {
    #[serde(flatten)]
    pub body: T,
    pub callbacks: Vec<CallbackEvent>,
}

// ────────────────────────────────────────────────────────────────────────────
// Session lifecycle
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    pub document: Option<ResumeDocument>,
    /// Reopen a previously saved document instead.
    pub stored_id: Option<Uuid>,
}

/// POST /api/v1/documents
pub async fn handle_open(
    State(state): State<AppState>,
    body: Option<Json<OpenRequest>>,
) -> Result<(StatusCode, Json<SessionSnapshot>), AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let document = match (req.document, req.stored_id) {
        (Some(_), Some(_)) => {
            return Err(AppError::Validation(
                "Provide either document or storedId, not both".to_string(),
            ))
        }
        (Some(document), None) => document,
        (None, Some(id)) => state.store.load(id).await?,
        (None, None) => ResumeDocument::default(),
    };

    let handle = state.sessions.open(document).await;
    let snapshot = handle.with(|s, _| SessionSnapshot::of(s)).await;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// GET /api/v1/documents/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let handle = state.sessions.get(id).await?;
    Ok(Json(handle.with(|s, _| SessionSnapshot::of(s)).await))
}

/// DELETE /api/v1/documents/:id
pub async fn handle_close(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.close(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/documents/:id/preview
pub async fn handle_get_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PreviewTree>, AppError> {
    let handle = state.sessions.get(id).await?;
    Ok(Json(handle.with(|s, _| s.preview().clone()).await))
}

// ────────────────────────────────────────────────────────────────────────────
// Form edits
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/documents/:id/edits
pub async fn handle_edit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(edit): Json<Edit>,
) -> Result<(StatusCode, Json<EditReceipt>), AppError> {
    let handle = state.sessions.get(id).await?;
    let receipt = handle.with(|s, now| s.edit(edit, now)).await?;
    let status = if receipt.applied {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(receipt)))
}

// ────────────────────────────────────────────────────────────────────────────
// Selection & formatting
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    pub selection: Option<NativeSelection>,
    pub rect: Option<Rect>,
    pub viewport: Viewport,
    #[serde(default)]
    pub expand_to_words: bool,
}

/// POST /api/v1/documents/:id/selection
pub async fn handle_selection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectionRequest>,
) -> Result<Json<ToolbarView>, AppError> {
    let handle = state.sessions.get(id).await?;
    let view = handle
        .with(|s, _| s.select(req.selection, req.rect, req.viewport, req.expand_to_words))
        .await;
    Ok(Json(view))
}

#[derive(Deserialize)]
pub struct FormatRequest {
    pub command: FormatCommand,
}

/// POST /api/v1/documents/:id/format
pub async fn handle_format(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FormatRequest>,
) -> Result<Json<WithCallbacks<ApplyOutcome>>, AppError> {
    let handle = state.sessions.get(id).await?;
    let outcome = handle.with(|s, now| s.format(req.command, now)).await?;
    Ok(Json(WithCallbacks {
        body: outcome,
        callbacks: handle.drain_callbacks(),
    }))
}

/// POST /api/v1/documents/:id/format/clear
pub async fn handle_clear_format(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WithCallbacks<ClearOutcome>>, AppError> {
    let handle = state.sessions.get(id).await?;
    let outcome = handle.with(|s, _| s.clear_format()).await?;
    Ok(Json(WithCallbacks {
        body: outcome,
        callbacks: handle.drain_callbacks(),
    }))
}

/// POST /api/v1/documents/:id/toolbar
pub async fn handle_toolbar_input(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ToolbarInput>,
) -> Result<Json<WithCallbacks<ToolbarResponse>>, AppError> {
    let handle = state.sessions.get(id).await?;
    let response = handle.with(|s, now| s.toolbar_input(input, now)).await?;
    Ok(Json(WithCallbacks {
        body: response,
        callbacks: handle.drain_callbacks(),
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Navigation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ClickRequest {
    pub node: NodeId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickResponse {
    pub outcome: ClickOutcome,
    pub highlighted: Option<String>,
}

/// POST /api/v1/documents/:id/click
pub async fn handle_click(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ClickRequest>,
) -> Result<Json<WithCallbacks<ClickResponse>>, AppError> {
    let handle = state.sessions.get(id).await?;
    let response = handle
        .with(|s, now| {
            let outcome = s.click(req.node, now);
            ClickResponse {
                outcome,
                highlighted: s.highlighted(now).map(str::to_string),
            }
        })
        .await;
    Ok(Json(WithCallbacks {
        body: response,
        callbacks: handle.drain_callbacks(),
    }))
}

#[derive(Deserialize)]
pub struct JumpRequest {
    pub section: String,
}

/// POST /api/v1/documents/:id/jump
pub async fn handle_jump(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<JumpRequest>,
) -> Result<Json<FormCommand>, AppError> {
    let handle = state.sessions.get(id).await?;
    handle
        .with(|s, _| s.jump(&req.section))
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Section '{}' is not rendered", req.section)))
}

// ────────────────────────────────────────────────────────────────────────────
// Pagination
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/documents/:id/pages
pub async fn handle_get_pages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaginationResult>, AppError> {
    let handle = state.sessions.get(id).await?;
    handle
        .with(|s, now| {
            // Settle any pending recompute so the answer reflects the latest edits.
            s.tick(now);
            s.pagination().cloned()
        })
        .await
        .map(Json)
        .ok_or_else(|| AppError::Conflict("Pagination has not completed yet".to_string()))
}

#[derive(Deserialize)]
pub struct ViewportRequest {
    pub page: PageConfig,
}

/// POST /api/v1/documents/:id/viewport
pub async fn handle_viewport(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ViewportRequest>,
) -> Result<StatusCode, AppError> {
    if req.page.margin_pt * 2.0 >= req.page.page_height_pt.min(req.page.page_width_pt) {
        return Err(AppError::Validation("Margins leave no content area".to_string()));
    }
    let handle = state.sessions.get(id).await?;
    handle.with(|s, _| s.resize(req.page)).await;
    Ok(StatusCode::ACCEPTED)
}

// ────────────────────────────────────────────────────────────────────────────
// Persistence
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/documents/:id/save
pub async fn handle_save(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SavedDocument>, AppError> {
    let handle = state.sessions.get(id).await?;
    let document = handle
        .with(|s, _| {
            s.flush();
            s.document().clone()
        })
        .await;
    let saved = state.store.save(id, &document).await?;
    info!(session_id = %id, version = saved.version, "Document saved");
    Ok(Json(saved))
}
