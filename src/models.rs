use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// --- Directory ---

/// Role
///
/// The RBAC attribute of a directory record. Only `Admin` passes the authorization gate.
/// Stored as the Postgres enum `user_role`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Ordinary,
    Admin,
    Pending,
}

/// User
///
/// A directory entry keyed by email. The authorization gate reads `role` from here on
/// every privileged request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub email: String,
    pub name: Option<String>,
    pub photo: Option<String>,
    pub role: Role,
    // Membership workflow marker, e.g. "Requested".
    pub status: Option<String>,
    pub badge: Option<String>,
    pub transaction_id: Option<String>,
    // Milliseconds since the epoch of the last write.
    pub timestamp: i64,
}

impl User {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            name: None,
            photo: None,
            role,
            status: None,
            badge: None,
            transaction_id: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

// --- Content ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    // Author identity, taken from the session principal at creation.
    pub email: String,
    pub author_name: String,
    pub author_image: Option<String>,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub upvote: i64,
    pub downvote: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Comment
///
/// Comments are attached to a post by the post's title, matching how the client
/// fetches them (`GET /comment/{title}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub title: String,
    pub email: String,
    pub comment: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// A user's flag on a comment, reviewed by admins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Report {
    pub id: Uuid,
    pub reporter_email: String,
    pub commenter_email: Option<String>,
    pub comment: String,
    pub feedback: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Announcement {
    pub id: Uuid,
    pub author_name: String,
    pub author_image: Option<String>,
    pub title: String,
    pub description: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads ---

/// IssueRequest
///
/// Body of `POST /jwt`. The identity is trusted as asserted by the upstream identity
/// provider; any other field (including a `role`) is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct IssueRequest {
    pub email: String,
}

/// Body of `PUT /user`, sent by the client after every sign-in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpsertUserRequest {
    pub email: String,
    pub name: Option<String>,
    pub photo: Option<String>,
    pub status: Option<String>,
}

/// Body of `PATCH /user`: membership purchase outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MembershipUpdate {
    pub email: String,
    pub status: Option<String>,
    pub badge: Option<String>,
    pub transaction_id: Option<String>,
}

/// Body of `PATCH /users/update/{email}`. Admin only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserUpdate {
    pub role: Option<Role>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewPost {
    pub author_name: String,
    pub author_image: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body of `PATCH /post/{id}`: the post's new vote totals.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct VoteUpdate {
    pub upvote: i64,
    pub downvote: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NewComment {
    pub title: String,
    pub comment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewReport {
    pub commenter_email: Option<String>,
    pub comment: String,
    pub feedback: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NewTag {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewAnnouncement {
    pub author_name: String,
    pub author_image: Option<String>,
    pub title: String,
    pub description: String,
}

/// PageQuery
///
/// Paging for post listings: `skip = page * size`, `limit = size`. A missing `size`
/// means no limit. `tags=null` is sent by the client when no tag is selected.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub tags: Option<String>,
}

impl PageQuery {
    pub fn tag(&self) -> Option<&str> {
        self.tags
            .as_deref()
            .filter(|t| !t.is_empty() && *t != "null")
    }

    /// (offset, limit)
    pub fn window(&self) -> (i64, Option<i64>) {
        let size = self.size.filter(|s| *s > 0);
        let page = self.page.unwrap_or(0).max(0);
        match size {
            Some(size) => (page.saturating_mul(size), Some(size)),
            None => (0, None),
        }
    }
}

// --- Responses ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DeleteResponse {
    pub deleted_count: u64,
}
