use axum::{
    Extension, Json,
    extract::{FromRequest, Multipart, Request, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{debug, info, warn};

use postbox_crypto::ids::create_id;
use postbox_db::models::NewSubmission;
use postbox_types::api::{ApiResponse, DeleteRequest, SubmitRequest};
use postbox_types::models::Submission;

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, JsonBody};
use crate::middleware::CurrentUser;
use crate::storage::PhotoUpload;
use crate::validation::{self, ContactFields};

/// Listings are capped, there is no pagination.
const LIST_LIMIT: u32 = 100;

const SUBMIT_FAILED: &str = "An error occurred while processing your submission";

struct SubmissionForm {
    fields: ContactFields,
    photo: Option<PhotoUpload>,
}

/// POST /api/submit: multipart form with optional `photo`, or the older
/// JSON body without one.
pub async fn create_submission(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("multipart/form-data"));

    let form = if is_multipart {
        let multipart = Multipart::from_request(request, &state).await?;
        read_multipart(multipart).await?
    } else {
        let JsonBody(body) = JsonBody::<SubmitRequest>::from_request(request, &state).await?;
        SubmissionForm {
            fields: validation::validate_contact(body.name, body.email, body.message)?,
            photo: None,
        }
    };

    let photo_path = match &form.photo {
        Some(photo) => Some(
            state
                .storage
                .save_photo(&photo.data, &photo.extension())
                .await
                .map_err(|e| ApiError::internal("Failed to save photo", e))?,
        ),
        None => None,
    };

    let fields = form.fields;
    let stored_path = photo_path.clone();
    let owner = user.id.clone();
    let inserted = blocking(&state, move |s| {
        let id = create_id();
        s.db.insert_submission(&NewSubmission {
            id: &id,
            name: &fields.name,
            email: &fields.email,
            message: &fields.message,
            photo_path: stored_path.as_deref(),
            user_id: Some(&owner),
        })
    })
    .await;

    let row = match inserted {
        Ok(row) => row,
        Err(e) => {
            // Don't leave an orphaned file behind
            if let Some(path) = &photo_path {
                state.storage.delete_photo(path).await;
            }
            return Err(ApiError::internal(SUBMIT_FAILED, e));
        }
    };

    info!("Submission {} saved for user {}", row.id, user.id);

    let message = if photo_path.is_some() {
        "Submission saved with photo"
    } else {
        "Submission saved"
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(Submission::from(row)).with_message(message)),
    ))
}

/// GET /api/submit: admins see everything, others only their own rows.
pub async fn list_submissions(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<Submission>>>, ApiError> {
    let rows = blocking(&state, move |s| {
        if user.role.is_admin() {
            s.db.list_submissions(LIST_LIMIT)
        } else {
            s.db.list_submissions_for_user(&user.id, LIST_LIMIT)
        }
    })
    .await
    .map_err(|e| ApiError::internal("Failed to retrieve submissions", e))?;

    Ok(Json(ApiResponse::data(
        rows.into_iter().map(Submission::from).collect(),
    )))
}

/// POST /api/delete. The photo is removed best-effort; the row always goes.
pub async fn delete_submission(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    JsonBody(req): JsonBody<DeleteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = req
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Submission ID is required"))?;

    let lookup_id = id.clone();
    let row = blocking(&state, move |s| s.db.get_submission(&lookup_id))
        .await
        .map_err(|e| ApiError::internal("Failed to delete submission", e))?;

    // Other users' rows look the same as missing ones
    let row = row
        .filter(|row| user.role.is_admin() || row.user_id.as_deref() == Some(user.id.as_str()))
        .ok_or_else(|| ApiError::NotFound("Submission not found".into()))?;

    if let Some(path) = &row.photo_path {
        if !state.storage.delete_photo(path).await {
            warn!("Continuing delete of submission {} without its photo", row.id);
        }
    }

    let delete_id = id.clone();
    blocking(&state, move |s| s.db.delete_submission(&delete_id))
        .await
        .map_err(|e| ApiError::internal("Failed to delete submission", e))?;

    info!("Submission {} deleted by user {}", id, user.id);

    Ok(Json(ApiResponse::message("Submission deleted successfully")))
}

async fn read_multipart(mut multipart: Multipart) -> Result<SubmissionForm, ApiError> {
    let (mut name, mut email, mut message) = (None, None, None);
    let mut photo = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };

        match field_name.as_str() {
            "name" => name = Some(field.text().await?),
            "email" => email = Some(field.text().await?),
            "message" => message = Some(field.text().await?),
            "photo" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                // An empty file input still sends the part
                if !data.is_empty() {
                    photo = Some(PhotoUpload {
                        file_name,
                        content_type,
                        data,
                    });
                }
            }
            other => debug!("Ignoring form field {}", other),
        }
    }

    let fields = validation::validate_contact(name, email, message)?;
    if let Some(photo) = &photo {
        validation::validate_photo(photo)?;
    }

    Ok(SubmissionForm { fields, photo })
}
