use anyhow::Context;
use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{CommentKind, ReviewerComment};

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn add_comment(
    pool: &PgPool,
    candidate_id: &str,
    author: &str,
    kind: CommentKind,
    content: &str,
) -> anyhow::Result<ReviewerComment> {
    let comment = ReviewerComment {
        id: Uuid::new_v4(),
        candidate_id: candidate_id.to_string(),
        author: author.to_string(),
        content: content.to_string(),
        kind,
        resolved: false,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO recruiter_funnel.reviewer_comments
        (id, candidate_id, author, content, kind, resolved, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(comment.id)
    .bind(&comment.candidate_id)
    .bind(&comment.author)
    .bind(&comment.content)
    .bind(comment.kind.as_str())
    .bind(comment.resolved)
    .bind(comment.created_at)
    .execute(pool)
    .await
    .context("failed to insert comment")?;

    Ok(comment)
}

pub async fn fetch_comments(
    pool: &PgPool,
    candidate_id: Option<&str>,
) -> anyhow::Result<Vec<ReviewerComment>> {
    let mut query = String::from(
        "SELECT id, candidate_id, author, content, kind, resolved, created_at \
         FROM recruiter_funnel.reviewer_comments",
    );
    if candidate_id.is_some() {
        query.push_str(" WHERE candidate_id = $1");
    }
    query.push_str(" ORDER BY created_at ASC");

    let mut rows = sqlx::query(&query);
    if let Some(value) = candidate_id {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    records.iter().map(comment_from_row).collect()
}

/// Returns false when no comment has that id.
pub async fn resolve_comment(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "UPDATE recruiter_funnel.reviewer_comments SET resolved = TRUE WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns false when no comment has that id.
pub async fn delete_comment(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM recruiter_funnel.reviewer_comments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn comment_from_row(row: &PgRow) -> anyhow::Result<ReviewerComment> {
    let kind: String = row.get("kind");
    Ok(ReviewerComment {
        id: row.get("id"),
        candidate_id: row.get("candidate_id"),
        author: row.get("author"),
        content: row.get("content"),
        kind: CommentKind::parse(&kind).with_context(|| format!("unknown comment kind {kind:?}"))?,
        resolved: row.get("resolved"),
        created_at: row.get("created_at"),
    })
}
