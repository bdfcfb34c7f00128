//! # Forum handlers
//!
//! Thin adapters: extract, call one service, wrap the result in the envelope.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Query, State};
use axum::Json;
use domains::{CommentId, DomainError, PageSize, ThreadOrder};
use services::{target_from, NewComment, NewThread, ReplyTo, ThreadSummary, ThreadView};

use super::error::ApiError;
use super::forms::{
    Credentials, DeleteCommentRequest, DeleteThreadRequest, DumpQuery, LikeRequest, PostForm,
    PostQuery, UsernameQuery,
};
use super::state::AppState;
use crate::envelope::{CommentsPayload, Success};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn required(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} is required")).into());
    }
    Ok(())
}

pub async fn create_account(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Success> {
    let Json(body) = body?;
    state
        .forum
        .accounts
        .create_account(&body.username, &body.password)
        .await?;
    Ok(Json(Success::new("Account created")))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Success> {
    let Json(body) = body?;
    state.forum.accounts.login(&body.username, &body.password).await?;
    Ok(Json(Success::new("Successfully logged in")))
}

pub async fn logout(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Success> {
    let Json(body) = body?;
    state.forum.accounts.logout(&body.username, &body.password).await?;
    Ok(Json(Success::new("Logged out")))
}

pub async fn is_logged_in(
    State(state): State<AppState>,
    query: Result<Query<UsernameQuery>, QueryRejection>,
) -> ApiResult<bool> {
    let Query(query) = query?;
    Ok(Json(state.forum.accounts.is_logged_in(&query.username).await?))
}

pub async fn create_thread(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Success> {
    let mut form = PostForm::read(multipart).await?;
    let title = state
        .forum
        .threads
        .create_thread(NewThread {
            username: form.text("username"),
            password: form.text("password"),
            title: form.text("title"),
            body: form.text("text"),
            image: form.take_image(),
        })
        .await?;
    Ok(Json(Success::new("Thread Created").with_id(title)))
}

pub async fn create_comment(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Success> {
    let mut form = PostForm::read(multipart).await?;
    let thread_title = form.text("post_id");
    required(&thread_title, "post_id")?;
    let reply_to = ReplyTo::from_request(form.flag("post_parent"), &form.text("parent_id"), &thread_title)?;
    let id = state
        .forum
        .comments
        .create_comment(NewComment {
            username: form.text("username"),
            password: form.text("password"),
            thread_title,
            reply_to,
            text: form.text("text"),
            image: form.take_image(),
        })
        .await?;
    Ok(Json(Success::new("Comment Created").with_id(id.to_transport())))
}

pub async fn get_thread(
    State(state): State<AppState>,
    query: Result<Query<PostQuery>, QueryRejection>,
) -> ApiResult<ThreadView> {
    let Query(query) = query?;
    required(&query.post_id, "post_id")?;
    Ok(Json(state.forum.threads.get_thread(&query.post_id).await?))
}

pub async fn get_comments(
    State(state): State<AppState>,
    query: Result<Query<PostQuery>, QueryRejection>,
) -> ApiResult<CommentsPayload> {
    let Query(query) = query?;
    required(&query.post_id, "post_id")?;
    let comments = state.forum.comments.get_comments(&query.post_id).await?;
    Ok(Json(CommentsPayload { comments }))
}

pub async fn dump_threads(
    State(state): State<AppState>,
    query: Result<Query<DumpQuery>, QueryRejection>,
) -> ApiResult<Vec<ThreadSummary>> {
    let Query(query) = query?;
    let order = match query.order.as_deref().filter(|o| !o.is_empty()) {
        Some(order) => order.parse::<ThreadOrder>()?,
        None => ThreadOrder::default(),
    };
    let size = query
        .amount
        .as_deref()
        .filter(|a| !a.is_empty())
        .map(str::parse::<PageSize>)
        .transpose()?;
    let page = query
        .page
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.trim()
                .parse::<u64>()
                .map_err(|_| DomainError::validation(format!("Invalid page '{p}'")))
        })
        .transpose()?;
    Ok(Json(state.forum.threads.dump(order, page, size).await?))
}

pub async fn num_threads(State(state): State<AppState>) -> ApiResult<u64> {
    Ok(Json(state.forum.threads.total().await?))
}

pub async fn delete_thread(
    State(state): State<AppState>,
    body: Result<Json<DeleteThreadRequest>, JsonRejection>,
) -> ApiResult<Success> {
    let Json(body) = body?;
    required(&body.title, "title")?;
    state
        .forum
        .threads
        .delete_thread(&body.username, &body.password, &body.title)
        .await?;
    Ok(Json(Success::new("Deleted successfully")))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    body: Result<Json<DeleteCommentRequest>, JsonRejection>,
) -> ApiResult<Success> {
    let Json(body) = body?;
    required(&body.comment_id, "commentID")?;
    let id = CommentId::from_transport(&body.comment_id)?;
    state
        .forum
        .comments
        .delete_comment(&body.username, &body.password, &id)
        .await?;
    Ok(Json(Success::new("Comment Deleted")))
}

pub async fn update_like_count(
    State(state): State<AppState>,
    body: Result<Json<LikeRequest>, JsonRejection>,
) -> ApiResult<Success> {
    let Json(body) = body?;
    let target = target_from(body.comment.as_deref(), body.thread.as_deref())?;
    state
        .forum
        .likes
        .update_like_count(&body.username, &body.password, &target)
        .await?;
    Ok(Json(Success::new("Like Count Updated")))
}
