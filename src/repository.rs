use crate::models::{
    Announcement, Comment, MembershipUpdate, NewAnnouncement, NewComment, NewPost, NewReport, Post,
    Report, Tag, User, UserUpdate, VoteUpdate,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable")]
    Unavailable,
}

/// UserDirectory
///
/// The read-only view of the user store consulted by the authorization gate.
/// Implementations must not cache: a role change has to be visible on the next call.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, email: &str) -> Result<Option<User>, RepoError>;
}

/// Repository Trait
///
/// Collection-level persistence used by the handlers. Handlers only ever see this
/// trait, so the Postgres store and the in-memory store are interchangeable.
#[async_trait]
pub trait Repository: UserDirectory {
    // --- Users ---
    /// Inserts `user` unless a record with the same email exists; returns the stored record.
    async fn insert_user(&self, user: User) -> Result<User, RepoError>;
    async fn set_user_status(&self, email: &str, status: Option<String>) -> Result<Option<User>, RepoError>;
    async fn update_membership(&self, update: MembershipUpdate) -> Result<Option<User>, RepoError>;
    /// Admin update; refreshes the record's timestamp.
    async fn update_user(&self, email: &str, update: UserUpdate) -> Result<Option<User>, RepoError>;
    async fn list_users(&self) -> Result<Vec<User>, RepoError>;
    async fn count_users(&self) -> Result<i64, RepoError>;

    // --- Tags & Announcements ---
    async fn insert_tag(&self, name: String) -> Result<Tag, RepoError>;
    async fn list_tags(&self) -> Result<Vec<Tag>, RepoError>;
    async fn insert_announcement(&self, announcement: NewAnnouncement) -> Result<Announcement, RepoError>;
    async fn list_announcements(&self) -> Result<Vec<Announcement>, RepoError>;
    async fn count_announcements(&self) -> Result<i64, RepoError>;

    // --- Posts ---
    async fn insert_post(&self, author_email: &str, post: NewPost) -> Result<Post, RepoError>;
    /// Newest first. `tag` filters on membership in the post's tag list.
    async fn list_posts(&self, tag: Option<&str>, offset: i64, limit: Option<i64>) -> Result<Vec<Post>, RepoError>;
    async fn list_posts_by_author(&self, email: &str, offset: i64, limit: Option<i64>) -> Result<Vec<Post>, RepoError>;
    async fn count_posts(&self, author: Option<&str>) -> Result<i64, RepoError>;
    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError>;
    /// Owner-only delete. Returns the number of removed posts.
    async fn delete_post(&self, id: Uuid, author_email: &str) -> Result<u64, RepoError>;
    async fn set_votes(&self, id: Uuid, votes: VoteUpdate) -> Result<Option<Post>, RepoError>;

    // --- Comments & Reports ---
    async fn insert_comment(&self, author_email: &str, comment: NewComment) -> Result<Comment, RepoError>;
    async fn list_comments(&self, title: &str) -> Result<Vec<Comment>, RepoError>;
    async fn count_comments(&self, title: Option<&str>) -> Result<i64, RepoError>;
    async fn insert_report(&self, reporter_email: &str, report: NewReport) -> Result<Report, RepoError>;
    async fn list_reports(&self) -> Result<Vec<Report>, RepoError>;
}

pub type RepositoryState = Arc<dyn Repository>;
pub type DirectoryState = Arc<dyn UserDirectory>;

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// --- Postgres ---

/// PostgresRepository
///
/// Backed by the schema in `migrations/`. Queries are checked at runtime so the crate
/// builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

const USER_COLUMNS: &str = r#"email, name, photo, role, status, badge, transaction_id, "timestamp""#;
const POST_COLUMNS: &str =
    "id, email, author_name, author_image, title, description, tags, upvote, downvote, created_at";

#[async_trait]
impl UserDirectory for PostgresRepository {
    async fn find_user(&self, email: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn insert_user(&self, user: User) -> Result<User, RepoError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
             RETURNING {USER_COLUMNS}"
        );
        let stored = sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.photo)
            .bind(user.role)
            .bind(&user.status)
            .bind(&user.badge)
            .bind(&user.transaction_id)
            .bind(user.timestamp)
            .fetch_one(&self.pool)
            .await?;
        Ok(stored)
    }

    async fn set_user_status(&self, email: &str, status: Option<String>) -> Result<Option<User>, RepoError> {
        let sql = format!("UPDATE users SET status = $2 WHERE email = $1 RETURNING {USER_COLUMNS}");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_membership(&self, update: MembershipUpdate) -> Result<Option<User>, RepoError> {
        let sql = format!(
            "UPDATE users SET status = COALESCE($2, status), badge = COALESCE($3, badge),
                transaction_id = COALESCE($4, transaction_id)
             WHERE email = $1 RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(&update.email)
            .bind(&update.status)
            .bind(&update.badge)
            .bind(&update.transaction_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_user(&self, email: &str, update: UserUpdate) -> Result<Option<User>, RepoError> {
        let sql = format!(
            "UPDATE users SET role = COALESCE($2, role), status = COALESCE($3, status), \"timestamp\" = $4
             WHERE email = $1 RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(update.role)
            .bind(&update.status)
            .bind(now_millis())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY \"timestamp\" DESC");
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    async fn count_users(&self) -> Result<i64, RepoError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn insert_tag(&self, name: String) -> Result<Tag, RepoError> {
        Ok(sqlx::query_as::<_, Tag>("INSERT INTO tags (id, name) VALUES ($1, $2) RETURNING id, name")
            .bind(Uuid::new_v4())
            .bind(name)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, RepoError> {
        Ok(sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_announcement(&self, a: NewAnnouncement) -> Result<Announcement, RepoError> {
        Ok(sqlx::query_as::<_, Announcement>(
            "INSERT INTO announcements (id, author_name, author_image, title, description, created_at)
             VALUES ($1, $2, $3, $4, $5, NOW())
             RETURNING id, author_name, author_image, title, description, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(a.author_name)
        .bind(a.author_image)
        .bind(a.title)
        .bind(a.description)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_announcements(&self) -> Result<Vec<Announcement>, RepoError> {
        Ok(sqlx::query_as::<_, Announcement>(
            "SELECT id, author_name, author_image, title, description, created_at
             FROM announcements ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_announcements(&self) -> Result<i64, RepoError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM announcements")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn insert_post(&self, author_email: &str, post: NewPost) -> Result<Post, RepoError> {
        let sql = format!(
            "INSERT INTO posts ({POST_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0, NOW())
             RETURNING {POST_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Post>(&sql)
            .bind(Uuid::new_v4())
            .bind(author_email)
            .bind(post.author_name)
            .bind(post.author_image)
            .bind(post.title)
            .bind(post.description)
            .bind(post.tags)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_posts(&self, tag: Option<&str>, offset: i64, limit: Option<i64>) -> Result<Vec<Post>, RepoError> {
        // LIMIT NULL means no limit in Postgres.
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE $1::TEXT IS NULL OR $1 = ANY(tags)
             ORDER BY created_at DESC OFFSET $2 LIMIT $3"
        );
        Ok(sqlx::query_as::<_, Post>(&sql)
            .bind(tag)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_posts_by_author(&self, email: &str, offset: i64, limit: Option<i64>) -> Result<Vec<Post>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE email = $1
             ORDER BY created_at DESC OFFSET $2 LIMIT $3"
        );
        Ok(sqlx::query_as::<_, Post>(&sql)
            .bind(email)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_posts(&self, author: Option<&str>) -> Result<i64, RepoError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE $1::TEXT IS NULL OR email = $1")
            .bind(author)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        Ok(sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_post(&self, id: Uuid, author_email: &str) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND email = $2")
            .bind(id)
            .bind(author_email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn set_votes(&self, id: Uuid, votes: VoteUpdate) -> Result<Option<Post>, RepoError> {
        let sql = format!("UPDATE posts SET upvote = $2, downvote = $3 WHERE id = $1 RETURNING {POST_COLUMNS}");
        Ok(sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .bind(votes.upvote)
            .bind(votes.downvote)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_comment(&self, author_email: &str, c: NewComment) -> Result<Comment, RepoError> {
        Ok(sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (id, title, email, comment, created_at) VALUES ($1, $2, $3, $4, NOW())
             RETURNING id, title, email, comment, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(c.title)
        .bind(author_email)
        .bind(c.comment)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_comments(&self, title: &str) -> Result<Vec<Comment>, RepoError> {
        Ok(sqlx::query_as::<_, Comment>(
            "SELECT id, title, email, comment, created_at FROM comments WHERE title = $1 ORDER BY created_at ASC",
        )
        .bind(title)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_comments(&self, title: Option<&str>) -> Result<i64, RepoError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE $1::TEXT IS NULL OR title = $1")
            .bind(title)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn insert_report(&self, reporter_email: &str, r: NewReport) -> Result<Report, RepoError> {
        Ok(sqlx::query_as::<_, Report>(
            "INSERT INTO reports (id, reporter_email, commenter_email, comment, feedback, created_at)
             VALUES ($1, $2, $3, $4, $5, NOW())
             RETURNING id, reporter_email, commenter_email, comment, feedback, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(reporter_email)
        .bind(r.commenter_email)
        .bind(r.comment)
        .bind(r.feedback)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_reports(&self) -> Result<Vec<Report>, RepoError> {
        Ok(sqlx::query_as::<_, Report>(
            "SELECT id, reporter_email, commenter_email, comment, feedback, created_at
             FROM reports ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?)
    }
}

// --- In-memory ---

#[derive(Default)]
struct MemoryStore {
    users: HashMap<String, User>,
    tags: Vec<Tag>,
    announcements: Vec<Announcement>,
    // Kept in insertion order; listings reverse it for newest-first.
    posts: Vec<Post>,
    comments: Vec<Comment>,
    reports: Vec<Report>,
}

/// MemoryRepository
///
/// Process-local store used for local runs without `DATABASE_URL` and by the test
/// suite. `new_failing()` builds one whose every call fails, simulating an
/// unreachable database.
#[derive(Default)]
pub struct MemoryRepository {
    store: RwLock<MemoryStore>,
    failing: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            store: RwLock::default(),
            failing: true,
        }
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.failing {
            Err(RepoError::Unavailable)
        } else {
            Ok(())
        }
    }
}

fn page(posts: impl Iterator<Item = Post>, offset: i64, limit: Option<i64>) -> Vec<Post> {
    let skipped = posts.skip(usize::try_from(offset).unwrap_or(0));
    match limit {
        Some(limit) => skipped.take(usize::try_from(limit).unwrap_or(0)).collect(),
        None => skipped.collect(),
    }
}

#[async_trait]
impl UserDirectory for MemoryRepository {
    async fn find_user(&self, email: &str) -> Result<Option<User>, RepoError> {
        self.check()?;
        Ok(self.store.read().await.users.get(email).cloned())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn insert_user(&self, user: User) -> Result<User, RepoError> {
        self.check()?;
        let mut store = self.store.write().await;
        Ok(store.users.entry(user.email.clone()).or_insert(user).clone())
    }

    async fn set_user_status(&self, email: &str, status: Option<String>) -> Result<Option<User>, RepoError> {
        self.check()?;
        let mut store = self.store.write().await;
        Ok(store.users.get_mut(email).map(|u| {
            u.status = status;
            u.clone()
        }))
    }

    async fn update_membership(&self, update: MembershipUpdate) -> Result<Option<User>, RepoError> {
        self.check()?;
        let mut store = self.store.write().await;
        Ok(store.users.get_mut(&update.email).map(|u| {
            if update.status.is_some() {
                u.status = update.status;
            }
            if update.badge.is_some() {
                u.badge = update.badge;
            }
            if update.transaction_id.is_some() {
                u.transaction_id = update.transaction_id;
            }
            u.clone()
        }))
    }

    async fn update_user(&self, email: &str, update: UserUpdate) -> Result<Option<User>, RepoError> {
        self.check()?;
        let mut store = self.store.write().await;
        Ok(store.users.get_mut(email).map(|u| {
            if let Some(role) = update.role {
                u.role = role;
            }
            if update.status.is_some() {
                u.status = update.status;
            }
            u.timestamp = now_millis();
            u.clone()
        }))
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        self.check()?;
        let mut users: Vec<User> = self.store.read().await.users.values().cloned().collect();
        users.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(users)
    }

    async fn count_users(&self) -> Result<i64, RepoError> {
        self.check()?;
        Ok(self.store.read().await.users.len() as i64)
    }

    async fn insert_tag(&self, name: String) -> Result<Tag, RepoError> {
        self.check()?;
        let tag = Tag { id: Uuid::new_v4(), name };
        self.store.write().await.tags.push(tag.clone());
        Ok(tag)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, RepoError> {
        self.check()?;
        let mut tags = self.store.read().await.tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn insert_announcement(&self, a: NewAnnouncement) -> Result<Announcement, RepoError> {
        self.check()?;
        let announcement = Announcement {
            id: Uuid::new_v4(),
            author_name: a.author_name,
            author_image: a.author_image,
            title: a.title,
            description: a.description,
            created_at: Utc::now(),
        };
        self.store.write().await.announcements.push(announcement.clone());
        Ok(announcement)
    }

    async fn list_announcements(&self) -> Result<Vec<Announcement>, RepoError> {
        self.check()?;
        Ok(self.store.read().await.announcements.iter().rev().cloned().collect())
    }

    async fn count_announcements(&self) -> Result<i64, RepoError> {
        self.check()?;
        Ok(self.store.read().await.announcements.len() as i64)
    }

    async fn insert_post(&self, author_email: &str, p: NewPost) -> Result<Post, RepoError> {
        self.check()?;
        let post = Post {
            id: Uuid::new_v4(),
            email: author_email.to_string(),
            author_name: p.author_name,
            author_image: p.author_image,
            title: p.title,
            description: p.description,
            tags: p.tags,
            upvote: 0,
            downvote: 0,
            created_at: Utc::now(),
        };
        self.store.write().await.posts.push(post.clone());
        Ok(post)
    }

    async fn list_posts(&self, tag: Option<&str>, offset: i64, limit: Option<i64>) -> Result<Vec<Post>, RepoError> {
        self.check()?;
        let store = self.store.read().await;
        let matching = store
            .posts
            .iter()
            .rev()
            .filter(|p| tag.is_none_or(|t| p.tags.iter().any(|pt| pt == t)))
            .cloned();
        Ok(page(matching, offset, limit))
    }

    async fn list_posts_by_author(&self, email: &str, offset: i64, limit: Option<i64>) -> Result<Vec<Post>, RepoError> {
        self.check()?;
        let store = self.store.read().await;
        let mine = store.posts.iter().rev().filter(|p| p.email == email).cloned();
        Ok(page(mine, offset, limit))
    }

    async fn count_posts(&self, author: Option<&str>) -> Result<i64, RepoError> {
        self.check()?;
        let store = self.store.read().await;
        Ok(store
            .posts
            .iter()
            .filter(|p| author.is_none_or(|a| p.email == a))
            .count() as i64)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        self.check()?;
        Ok(self.store.read().await.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn delete_post(&self, id: Uuid, author_email: &str) -> Result<u64, RepoError> {
        self.check()?;
        let mut store = self.store.write().await;
        let before = store.posts.len();
        store.posts.retain(|p| !(p.id == id && p.email == author_email));
        Ok((before - store.posts.len()) as u64)
    }

    async fn set_votes(&self, id: Uuid, votes: VoteUpdate) -> Result<Option<Post>, RepoError> {
        self.check()?;
        let mut store = self.store.write().await;
        Ok(store.posts.iter_mut().find(|p| p.id == id).map(|p| {
            p.upvote = votes.upvote;
            p.downvote = votes.downvote;
            p.clone()
        }))
    }

    async fn insert_comment(&self, author_email: &str, c: NewComment) -> Result<Comment, RepoError> {
        self.check()?;
        let comment = Comment {
            id: Uuid::new_v4(),
            title: c.title,
            email: author_email.to_string(),
            comment: c.comment,
            created_at: Utc::now(),
        };
        self.store.write().await.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, title: &str) -> Result<Vec<Comment>, RepoError> {
        self.check()?;
        let store = self.store.read().await;
        Ok(store.comments.iter().filter(|c| c.title == title).cloned().collect())
    }

    async fn count_comments(&self, title: Option<&str>) -> Result<i64, RepoError> {
        self.check()?;
        let store = self.store.read().await;
        Ok(store
            .comments
            .iter()
            .filter(|c| title.is_none_or(|t| c.title == t))
            .count() as i64)
    }

    async fn insert_report(&self, reporter_email: &str, r: NewReport) -> Result<Report, RepoError> {
        self.check()?;
        let report = Report {
            id: Uuid::new_v4(),
            reporter_email: reporter_email.to_string(),
            commenter_email: r.commenter_email,
            comment: r.comment,
            feedback: r.feedback,
            created_at: Utc::now(),
        };
        self.store.write().await.reports.push(report.clone());
        Ok(report)
    }

    async fn list_reports(&self) -> Result<Vec<Report>, RepoError> {
        self.check()?;
        Ok(self.store.read().await.reports.iter().rev().cloned().collect())
    }
}
