use crate::{
    auth::{AdminUser, AuthError, Principal, TokenCodec, cookie},
    clock::ClockState,
    config::AppConfig,
    error::ApiError,
    models::{
        Announcement, Comment, CountResponse, DeleteResponse, IssueRequest, MembershipUpdate,
        NewAnnouncement, NewComment, NewPost, NewReport, NewTag, PageQuery, Post, Report, Role,
        SuccessResponse, Tag, UpsertUserRequest, User, UserUpdate, VoteUpdate,
    },
    repository::RepositoryState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

/// Membership status a user sets when asking for an upgrade.
pub const STATUS_REQUESTED: &str = "Requested";

type ApiResult<T> = Result<Json<T>, ApiError>;

fn required(value: &str, field: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(value.to_string())
}

// --- Session ---

/// issue_token
///
/// [Public Route] Issues a session credential for an identity already verified by the
/// upstream identity provider and binds it to the client with the session cookie.
/// Only the email is read from the body.
#[utoipa::path(
    post,
    path = "/jwt",
    request_body = IssueRequest,
    responses(
        (status = 200, description = "Session cookie set", body = SuccessResponse),
        (status = 400, description = "Missing email")
    )
)]
pub async fn issue_token(
    State(codec): State<TokenCodec>,
    State(clock): State<ClockState>,
    State(config): State<AppConfig>,
    jar: CookieJar,
    Json(payload): Json<IssueRequest>,
) -> Result<(CookieJar, Json<SuccessResponse>), ApiError> {
    let email = required(&payload.email, "email")?;

    // 1. Sign a credential for the asserted identity
    let principal = codec.principal_for(email, clock.now());
    let token = codec
        .issue(&principal)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(email = %principal.email, expires_at = principal.expires_at, "session issued");

    // 2. Bind it to the client
    let jar = cookie::attach(jar, token, config.env);
    Ok((jar, Json(SuccessResponse { success: true })))
}

/// logout
///
/// [Public Route] Clears the session cookie. Always succeeds.
#[utoipa::path(
    get,
    path = "/logout",
    responses((status = 200, description = "Session cookie cleared", body = SuccessResponse))
)]
pub async fn logout(State(config): State<AppConfig>, jar: CookieJar) -> (CookieJar, Json<SuccessResponse>) {
    tracing::info!("logout");
    (cookie::clear(jar, config.env), Json(SuccessResponse { success: true }))
}

// --- Users ---

/// upsert_user
///
/// [Public Route] Called by the client after each sign-in. New users are stored with
/// the ordinary role; existing users are returned unchanged unless they are requesting
/// a membership, in which case only their status is updated.
#[utoipa::path(
    put,
    path = "/user",
    request_body = UpsertUserRequest,
    responses((status = 200, description = "Stored user", body = User))
)]
pub async fn upsert_user(
    State(repo): State<RepositoryState>,
    Json(payload): Json<UpsertUserRequest>,
) -> ApiResult<User> {
    let email = required(&payload.email, "email")?;

    // 1. Known user: only a membership request changes the record
    if let Some(existing) = repo.find_user(&email).await? {
        if payload.status.as_deref() == Some(STATUS_REQUESTED) {
            let updated = repo
                .set_user_status(&email, payload.status)
                .await?
                .ok_or(ApiError::NotFound)?;
            return Ok(Json(updated));
        }
        return Ok(Json(existing));
    }

    // 2. New user: always the ordinary role
    let mut user = User::new(email, Role::Ordinary);
    user.name = payload.name;
    user.photo = payload.photo;
    user.status = payload.status;

    Ok(Json(repo.insert_user(user).await?))
}

/// update_membership
///
/// [Authenticated Route] Records a membership purchase. A user may only update
/// their own record.
#[utoipa::path(
    patch,
    path = "/user",
    request_body = MembershipUpdate,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 404, description = "No such user")
    )
)]
pub async fn update_membership(
    principal: Principal,
    State(repo): State<RepositoryState>,
    Json(payload): Json<MembershipUpdate>,
) -> ApiResult<User> {
    if payload.email != principal.email {
        tracing::warn!(email = %principal.email, target = %payload.email, "membership update for another user");
        return Err(AuthError::InsufficientPrivilege.into());
    }

    match repo.update_membership(payload).await? {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::NotFound),
    }
}

#[utoipa::path(
    get,
    path = "/user/{email}",
    params(("email" = String, Path, description = "User email")),
    responses((status = 200, description = "User", body = User), (status = 404, description = "No such user"))
)]
pub async fn get_user(
    _principal: Principal,
    State(repo): State<RepositoryState>,
    Path(email): Path<String>,
) -> ApiResult<User> {
    repo
        .find_user(&email)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// [Admin Route] Lists every directory record.
#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "All users", body = [User]))
)]
pub async fn list_users(_admin: AdminUser, State(repo): State<RepositoryState>) -> ApiResult<Vec<User>> {
    Ok(Json(repo.list_users().await?))
}

/// update_user
///
/// [Admin Route] Changes a user's role or status. A role change takes effect on the
/// target's next request, with no need to re-issue their session.
#[utoipa::path(
    patch,
    path = "/users/update/{email}",
    params(("email" = String, Path, description = "User email")),
    request_body = UserUpdate,
    responses((status = 200, description = "Updated user", body = User), (status = 404, description = "No such user"))
)]
pub async fn update_user(
    AdminUser(admin): AdminUser,
    State(repo): State<RepositoryState>,
    Path(email): Path<String>,
    Json(payload): Json<UserUpdate>,
) -> ApiResult<User> {
    tracing::info!(admin = %admin.email, target = %email, role = ?payload.role, "updating user");
    repo
        .update_user(&email, payload)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

#[utoipa::path(
    get,
    path = "/usersCount",
    responses((status = 200, description = "User count", body = CountResponse))
)]
pub async fn count_users(_admin: AdminUser, State(repo): State<RepositoryState>) -> ApiResult<CountResponse> {
    let count = repo.count_users().await?;
    Ok(Json(CountResponse { count }))
}

// --- Tags & Announcements ---

#[utoipa::path(
    post,
    path = "/addTags",
    request_body = NewTag,
    responses((status = 200, description = "Created tag", body = Tag))
)]
pub async fn add_tag(
    _admin: AdminUser,
    State(repo): State<RepositoryState>,
    Json(payload): Json<NewTag>,
) -> ApiResult<Tag> {
    let name = required(&payload.name, "name")?;
    Ok(Json(repo.insert_tag(name).await?))
}

#[utoipa::path(
    get,
    path = "/tags",
    responses((status = 200, description = "All tags", body = [Tag]))
)]
pub async fn list_tags(State(repo): State<RepositoryState>) -> ApiResult<Vec<Tag>> {
    Ok(Json(repo.list_tags().await?))
}

#[utoipa::path(
    post,
    path = "/addAnnouncement",
    request_body = NewAnnouncement,
    responses((status = 200, description = "Created announcement", body = Announcement))
)]
pub async fn add_announcement(
    _admin: AdminUser,
    State(repo): State<RepositoryState>,
    Json(payload): Json<NewAnnouncement>,
) -> ApiResult<Announcement> {
    required(&payload.title, "title")?;
    Ok(Json(repo.insert_announcement(payload).await?))
}

#[utoipa::path(
    get,
    path = "/announcements",
    responses((status = 200, description = "Announcements, newest first", body = [Announcement]))
)]
pub async fn list_announcements(State(repo): State<RepositoryState>) -> ApiResult<Vec<Announcement>> {
    Ok(Json(repo.list_announcements().await?))
}

#[utoipa::path(
    get,
    path = "/announcementsCount",
    responses((status = 200, description = "Announcement count", body = CountResponse))
)]
pub async fn count_announcements(State(repo): State<RepositoryState>) -> ApiResult<CountResponse> {
    let count = repo.count_announcements().await?;
    Ok(Json(CountResponse { count }))
}

// --- Posts ---

/// add_post
///
/// [Authenticated Route] The author is always the session principal, whatever the
/// body says.
#[utoipa::path(
    post,
    path = "/addPost",
    request_body = NewPost,
    responses((status = 200, description = "Created post", body = Post))
)]
pub async fn add_post(
    principal: Principal,
    State(repo): State<RepositoryState>,
    Json(payload): Json<NewPost>,
) -> ApiResult<Post> {
    required(&payload.title, "title")?;
    Ok(Json(repo.insert_post(&principal.email, payload).await?))
}

#[utoipa::path(
    get,
    path = "/posts",
    params(PageQuery),
    responses((status = 200, description = "Posts, newest first", body = [Post]))
)]
pub async fn list_posts(
    State(repo): State<RepositoryState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Vec<Post>> {
    let (offset, limit) = query.window();
    Ok(Json(repo.list_posts(query.tag(), offset, limit).await?))
}

#[utoipa::path(
    get,
    path = "/postsCount",
    responses((status = 200, description = "Post count", body = CountResponse))
)]
pub async fn count_posts(State(repo): State<RepositoryState>) -> ApiResult<CountResponse> {
    let count = repo.count_posts(None).await?;
    Ok(Json(CountResponse { count }))
}

#[utoipa::path(
    get,
    path = "/myPosts/{email}",
    params(("email" = String, Path, description = "Author email"), PageQuery),
    responses((status = 200, description = "The author's posts", body = [Post]))
)]
pub async fn my_posts(
    _principal: Principal,
    State(repo): State<RepositoryState>,
    Path(email): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Vec<Post>> {
    let (offset, limit) = query.window();
    Ok(Json(repo.list_posts_by_author(&email, offset, limit).await?))
}

#[utoipa::path(
    get,
    path = "/myPostsCount/{email}",
    params(("email" = String, Path, description = "Author email")),
    responses((status = 200, description = "The author's post count", body = CountResponse))
)]
pub async fn my_posts_count(
    _principal: Principal,
    State(repo): State<RepositoryState>,
    Path(email): Path<String>,
) -> ApiResult<CountResponse> {
    let count = repo.count_posts(Some(&email)).await?;
    Ok(Json(CountResponse { count }))
}

#[utoipa::path(
    get,
    path = "/post/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses((status = 200, description = "Post", body = Post), (status = 404, description = "No such post"))
)]
pub async fn get_post(State(repo): State<RepositoryState>, Path(id): Path<Uuid>) -> ApiResult<Post> {
    repo.find_post(id).await?.map(Json).ok_or(ApiError::NotFound)
}

/// delete_post
///
/// [Authenticated Route] Owner-only. Deleting someone else's post, or a missing
/// one, reports zero deletions.
#[utoipa::path(
    delete,
    path = "/post/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses((status = 200, description = "Deletion result", body = DeleteResponse))
)]
pub async fn delete_post(
    principal: Principal,
    State(repo): State<RepositoryState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeleteResponse> {
    let deleted_count = repo.delete_post(id, &principal.email).await?;
    Ok(Json(DeleteResponse { deleted_count }))
}

/// [Authenticated Route] Stores the post's new vote totals.
#[utoipa::path(
    patch,
    path = "/post/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = VoteUpdate,
    responses((status = 200, description = "Updated post", body = Post), (status = 404, description = "No such post"))
)]
pub async fn vote_post(
    _principal: Principal,
    State(repo): State<RepositoryState>,
    Path(id): Path<Uuid>,
    Json(votes): Json<VoteUpdate>,
) -> ApiResult<Post> {
    if votes.upvote < 0 || votes.downvote < 0 {
        return Err(ApiError::BadRequest("vote totals cannot be negative".into()));
    }
    repo.set_votes(id, votes).await?.map(Json).ok_or(ApiError::NotFound)
}

// --- Comments & Reports ---

#[utoipa::path(
    post,
    path = "/addComment",
    request_body = NewComment,
    responses((status = 200, description = "Created comment", body = Comment))
)]
pub async fn add_comment(
    principal: Principal,
    State(repo): State<RepositoryState>,
    Json(payload): Json<NewComment>,
) -> ApiResult<Comment> {
    required(&payload.comment, "comment")?;
    Ok(Json(repo.insert_comment(&principal.email, payload).await?))
}

#[utoipa::path(
    get,
    path = "/comment/{title}",
    params(("title" = String, Path, description = "Post title")),
    responses((status = 200, description = "Comments on the post", body = [Comment]))
)]
pub async fn list_comments(
    State(repo): State<RepositoryState>,
    Path(title): Path<String>,
) -> ApiResult<Vec<Comment>> {
    Ok(Json(repo.list_comments(&title).await?))
}

#[utoipa::path(
    get,
    path = "/commentsCount",
    responses((status = 200, description = "Comment count", body = CountResponse))
)]
pub async fn count_comments(State(repo): State<RepositoryState>) -> ApiResult<CountResponse> {
    let count = repo.count_comments(None).await?;
    Ok(Json(CountResponse { count }))
}

#[utoipa::path(
    get,
    path = "/myCommentCount/{title}",
    params(("title" = String, Path, description = "Post title")),
    responses((status = 200, description = "Comment count for the post", body = CountResponse))
)]
pub async fn count_post_comments(
    State(repo): State<RepositoryState>,
    Path(title): Path<String>,
) -> ApiResult<CountResponse> {
    let count = repo.count_comments(Some(&title)).await?;
    Ok(Json(CountResponse { count }))
}

/// [Authenticated Route] Flags a comment for admin review.
#[utoipa::path(
    post,
    path = "/addReport",
    request_body = NewReport,
    responses((status = 200, description = "Created report", body = Report))
)]
pub async fn add_report(
    principal: Principal,
    State(repo): State<RepositoryState>,
    Json(payload): Json<NewReport>,
) -> ApiResult<Report> {
    required(&payload.feedback, "feedback")?;
    Ok(Json(repo.insert_report(&principal.email, payload).await?))
}

#[utoipa::path(
    get,
    path = "/reports",
    responses((status = 200, description = "Reports, newest first", body = [Report]))
)]
pub async fn list_reports(_admin: AdminUser, State(repo): State<RepositoryState>) -> ApiResult<Vec<Report>> {
    Ok(Json(repo.list_reports().await?))
}
