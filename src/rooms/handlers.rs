use crate::auth::middleware::authenticate;
use crate::auth::token::generate_invite_password;
use crate::db::models::Room;
use crate::error::AppError;
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    pub room_id: Uuid,
    pub name: String,
    pub created_at: String,
}

/// POST /api/v0/rooms/create
///
/// The creator is joined to the room as part of creation.
pub async fn create_room(
    req: HttpRequest,
    body: web::Json<CreateRoomRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let account = authenticate(&req, &state.authority).await?;

    if body.name.is_empty() {
        return Err(AppError::ValidationError("room name is required".into()));
    }

    let invite_password = generate_invite_password(state.rng.as_ref());
    let room = state
        .store
        .create_room(&body.name, &invite_password, account.id)
        .await?;

    info!(room_id = %room.id, user_id = %account.id, "created room");

    Ok(HttpResponse::Ok().json(RoomResponse {
        room_id: room.id,
        name: room.name,
        created_at: room.created_at.to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub invite_password: String,
}

/// POST /api/v0/rooms/{room_id}/join
///
/// Unknown room and wrong password are indistinguishable to the caller.
pub async fn join_room(
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<JoinRoomRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let account = authenticate(&req, &state.authority).await?;
    let room_id = path.into_inner();

    let room = state
        .store
        .find_room_by_id(room_id)
        .await?
        .filter(|room| room.invite_password == body.invite_password)
        .ok_or_else(|| AppError::ValidationError("unknown room or wrong password".into()))?;

    state.store.add_room_member(room.id, account.id).await?;

    info!(room_id = %room.id, user_id = %account.id, "joined room");

    Ok(HttpResponse::Ok().json(RoomResponse {
        room_id: room.id,
        name: room.name,
        created_at: room.created_at.to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PostCreatedResponse {
    pub id: Uuid,
}

/// Room-level checks shared by the post endpoints: the room must exist and
/// the caller must be a member. Failures are a uniform 400.
async fn member_room(state: &AppState, room_id: Uuid, user_id: Uuid) -> Result<Room, AppError> {
    let room = state
        .store
        .find_room_by_id(room_id)
        .await?
        .ok_or_else(|| AppError::ValidationError("unknown room".into()))?;

    if !state.store.is_room_member(room.id, user_id).await? {
        return Err(AppError::ValidationError("not a member of this room".into()));
    }

    Ok(room)
}

/// POST /api/v0/rooms/{room_id}/posts
pub async fn create_post(
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<CreatePostRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let account = authenticate(&req, &state.authority).await?;
    let room = member_room(&state, path.into_inner(), account.id).await?;

    if body.text.is_empty() {
        return Err(AppError::ValidationError("post text is required".into()));
    }

    let post = state.store.create_post(room.id, account.id, &body.text).await?;

    Ok(HttpResponse::Ok().json(PostCreatedResponse { id: post.id }))
}

/// GET /api/v0/rooms/{room_id}/posts
pub async fn list_posts(
    req: HttpRequest,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let account = authenticate(&req, &state.authority).await?;
    let room = member_room(&state, path.into_inner(), account.id).await?;

    let posts = state.store.list_posts(room.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "posts": posts })))
}
