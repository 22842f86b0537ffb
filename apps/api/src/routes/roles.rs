use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::job::{NewRole, Role};
use crate::pipeline::reports::RoleOverview;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRoleRequest {
    pub external_job_ref: String,
    pub title: String,
    pub description: Option<String>,
}

/// PUT /api/roles
/// Upserts by `externalJobRef` and links the role to an existing job with that ref.
pub async fn handle_upsert_role(
    State(state): State<AppState>,
    Json(req): Json<UpsertRoleRequest>,
) -> Result<Json<Role>, AppError> {
    let external_ref = req.external_job_ref.trim();
    if external_ref.is_empty() || req.title.trim().is_empty() {
        return Err(AppError::Validation(
            "externalJobRef and title are required".into(),
        ));
    }

    let role = state
        .store
        .upsert_role(NewRole {
            external_job_ref: external_ref.to_string(),
            title: req.title.trim().to_string(),
            description: req.description,
        })
        .await?;

    if let Some(job) = state.store.find_job_by_ref(external_ref).await? {
        if job.role_id != Some(role.id) {
            state.store.set_job_role(job.id, role.id).await?;
        }
    }
    Ok(Json(role))
}

/// GET /api/roles
pub async fn handle_list_roles(
    State(state): State<AppState>,
) -> Result<Json<Vec<RoleOverview>>, AppError> {
    Ok(Json(state.pipeline.role_overview().await?))
}
