use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use huddle_chat::kanban::{column_bodies, column_body};
use huddle_db::ColumnError;
use huddle_db::models::{BoardColumnRow, BoardRow};
use huddle_types::api::{
    BoardResponse, Claims, ColumnResponse, CreateColumnRequest, RenameColumnRequest,
    ReorderColumnRequest,
};
use huddle_types::events::KanbanEvent;

use crate::AppState;

/// Board mutations are restricted to members of the owning project; the
/// mutation is applied first, then the kanban event fans out.

pub async fn get_board(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let board = board_of_project(&state, project_id, claims.sub).await?;

    let db = state.db.clone();
    let board_id = board.id;
    let columns = tokio::task::spawn_blocking(move || db.list_board_columns(board_id))
        .await
        .map_err(join_error)?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(BoardResponse {
        board_id: board.id,
        project_id,
        columns: columns.iter().map(column_response).collect(),
    }))
}

pub async fn create_column(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateColumnRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let board = board_of_project(&state, project_id, claims.sub).await?;

    let db = state.db.clone();
    let board_id = board.id;
    let column = {
        let name = name.clone();
        tokio::task::spawn_blocking(move || db.create_board_column(board_id, &name))
            .await
            .map_err(join_error)?
            .map_err(column_error_status)?
    };

    state.kanban.emit(
        project_id,
        KanbanEvent::ColumnCreated {
            board_id,
            project_id,
            column: column_body(&column),
        },
    );

    Ok((StatusCode::CREATED, Json(column_response(&column))))
}

pub async fn rename_column(
    State(state): State<AppState>,
    Path(column_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RenameColumnRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let (_, board) = column_and_board(&state, column_id, claims.sub).await?;

    let db = state.db.clone();
    let column = {
        let name = name.clone();
        tokio::task::spawn_blocking(move || db.rename_board_column(column_id, &name))
            .await
            .map_err(join_error)?
            .map_err(column_error_status)?
    };

    state.kanban.emit(
        board.project_id,
        KanbanEvent::ColumnRenamed {
            board_id: board.id,
            project_id: board.project_id,
            column: column_body(&column),
        },
    );

    Ok(Json(column_response(&column)))
}

pub async fn delete_column(
    State(state): State<AppState>,
    Path(column_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let (_, board) = column_and_board(&state, column_id, claims.sub).await?;

    let db = state.db.clone();
    let remaining = tokio::task::spawn_blocking(move || db.delete_board_column(column_id))
        .await
        .map_err(join_error)?
        .map_err(column_error_status)?;

    state.kanban.emit(
        board.project_id,
        KanbanEvent::ColumnDeleted {
            board_id: board.id,
            project_id: board.project_id,
            column_id,
            columns: column_bodies(&remaining),
        },
    );

    let columns: Vec<ColumnResponse> = remaining.iter().map(column_response).collect();
    Ok(Json(columns))
}

pub async fn reorder_column(
    State(state): State<AppState>,
    Path(column_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReorderColumnRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let (_, board) = column_and_board(&state, column_id, claims.sub).await?;

    let db = state.db.clone();
    let board_id = board.id;
    let columns = tokio::task::spawn_blocking(move || {
        db.reorder_board_columns(board_id, column_id, req.new_order)
    })
    .await
    .map_err(join_error)?
    .map_err(column_error_status)?;

    state.kanban.emit(
        board.project_id,
        KanbanEvent::ColumnReordered {
            board_id: board.id,
            project_id: board.project_id,
            columns: column_bodies(&columns),
        },
    );

    let columns: Vec<ColumnResponse> = columns.iter().map(column_response).collect();
    Ok(Json(columns))
}

/// Resolve a project's board, enforcing membership on the way.
async fn board_of_project(
    state: &AppState,
    project_id: i64,
    user_id: i64,
) -> Result<BoardRow, StatusCode> {
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let member = db
            .is_project_member(project_id, user_id)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        if !member {
            return Err(StatusCode::FORBIDDEN);
        }
        db.get_board_by_project(project_id)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::NOT_FOUND)
    })
    .await
    .map_err(join_error)?
}

/// Resolve a column and its board, enforcing membership on the way.
async fn column_and_board(
    state: &AppState,
    column_id: i64,
    user_id: i64,
) -> Result<(BoardColumnRow, BoardRow), StatusCode> {
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let column = db
            .get_board_column(column_id)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::NOT_FOUND)?;
        let board = db
            .get_board(column.board_id)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::NOT_FOUND)?;
        let member = db
            .is_project_member(board.project_id, user_id)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        if !member {
            return Err(StatusCode::FORBIDDEN);
        }
        Ok((column, board))
    })
    .await
    .map_err(join_error)?
}

fn column_response(row: &BoardColumnRow) -> ColumnResponse {
    ColumnResponse {
        id: row.id,
        board_id: row.board_id,
        name: row.name.clone(),
        order: row.ord,
        tasks_count: row.tasks_count,
    }
}

fn column_error_status(err: anyhow::Error) -> StatusCode {
    match err.downcast_ref::<ColumnError>() {
        Some(ColumnError::NotFound) => StatusCode::NOT_FOUND,
        Some(ColumnError::LastColumn | ColumnError::DuplicateName) => StatusCode::CONFLICT,
        None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn join_error(e: tokio::task::JoinError) -> StatusCode {
    error!("spawn_blocking join error: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}
