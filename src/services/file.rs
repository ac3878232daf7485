use bytes::Bytes;
use chrono::Utc;
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::classify::{self, Category};
use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{DownloadLinkResponse, FileRecord, ListFilesQuery, SortOrder};
use crate::storage::{signer, StorageProvider};
use crate::usage::{self, UsageSummary};

/// File repository. Every operation is scoped by the authenticated owner so
/// cross-owner access is impossible at the query layer.
pub struct FileService;

impl FileService {
    /// Upload a file: blob first, record second.
    ///
    /// If the blob write fails no record is created. If the record insert
    /// fails after the blob was written, the blob is orphaned; that is
    /// tolerated and logged rather than rolled back.
    pub async fn upload(
        db: &Database,
        storage: &dyn StorageProvider,
        owner_id: &str,
        name: String,
        content_type: Option<String>,
        data: Bytes,
    ) -> Result<FileRecord> {
        // Validate file name
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(AppError::BadRequest("Invalid file name".to_string()));
        }

        let mime = content_type
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(&name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
        let category = classify::classify(&mime);

        // Fresh unique key: owner + millis + name
        let storage_key = format!("{}/{}-{}", owner_id, Utc::now().timestamp_millis(), name);
        let size = data.len() as i64;

        storage
            .put(&storage_key, data)
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))?;

        let file_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let inserted = sqlx::query(
            r#"
            INSERT INTO files (id, owner_id, name, storage_key, size, type, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&file_id)
        .bind(owner_id)
        .bind(&name)
        .bind(&storage_key)
        .bind(size)
        .bind(category.as_str())
        .bind(&now)
        .execute(db.pool())
        .await;

        if let Err(e) = inserted {
            tracing::warn!(
                storage_key = %storage_key,
                "Record insert failed, blob is orphaned"
            );
            return Err(AppError::RecordInsert(e.to_string()));
        }

        let record: FileRecord = sqlx::query_as("SELECT * FROM files WHERE id = ?")
            .bind(&file_id)
            .fetch_one(db.pool())
            .await?;

        Ok(record)
    }

    /// List the owner's files with optional category filter, name search,
    /// sort and limit. Returns an empty vec when nothing matches.
    pub async fn list(
        db: &Database,
        owner_id: &str,
        query: &ListFilesQuery,
    ) -> Result<Vec<FileRecord>> {
        let categories: Vec<Category> = query
            .types
            .as_deref()
            .map(classify::expand_groups)
            .unwrap_or_default();
        let order = SortOrder::parse(query.sort.as_deref());

        let mut qb: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("SELECT * FROM files WHERE owner_id = ");
        qb.push_bind(owner_id);

        if !categories.is_empty() {
            qb.push(" AND type IN (");
            let mut separated = qb.separated(", ");
            for category in &categories {
                separated.push_bind(category.as_str());
            }
            separated.push_unseparated(")");
        }

        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            // SQLite LIKE is case-insensitive for ASCII. LIKE metacharacters
            // in the search text are escaped so `100%` means the literal
            // substring, not a wildcard.
            let escaped = search
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            qb.push(" AND name LIKE ");
            qb.push_bind(format!("%{}%", escaped));
            qb.push(" ESCAPE '\\'");
        }

        // Column and direction come from a whitelist, never from raw input
        qb.push(format!(
            " ORDER BY {} {}",
            order.field.column(),
            if order.ascending { "ASC" } else { "DESC" }
        ));

        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit as i64);
        }

        let records = qb
            .build_query_as::<FileRecord>()
            .fetch_all(db.pool())
            .await?;

        Ok(records)
    }

    /// Rename a file. Only the name changes; everything else is immutable.
    pub async fn rename(db: &Database, owner_id: &str, id: &str, new_name: &str) -> Result<()> {
        if new_name.is_empty() || new_name.contains('/') || new_name.contains('\\') {
            return Err(AppError::BadRequest("Invalid name".to_string()));
        }

        let result = sqlx::query("UPDATE files SET name = ? WHERE id = ? AND owner_id = ?")
            .bind(new_name)
            .bind(id)
            .bind(owner_id)
            .execute(db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("File not found".to_string()));
        }

        Ok(())
    }

    /// Delete a file: blob first (best-effort), record second.
    ///
    /// A failed blob delete never blocks record removal, so records cannot
    /// get stuck pointing at storage the owner can no longer reach.
    pub async fn delete(
        db: &Database,
        storage: &dyn StorageProvider,
        owner_id: &str,
        id: &str,
    ) -> Result<()> {
        let record: FileRecord =
            sqlx::query_as("SELECT * FROM files WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(db.pool())
                .await?
                .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        if let Err(e) = storage.delete(&record.storage_key).await {
            tracing::warn!(
                storage_key = %record.storage_key,
                "Blob delete failed, removing record anyway: {}",
                e
            );
        }

        sqlx::query("DELETE FROM files WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(db.pool())
            .await?;

        Ok(())
    }

    /// Issue a time-limited signed URL for a blob the owner holds a record
    /// for. Fails with `NotFound` when no scoped record references the key.
    pub async fn download_link(
        db: &Database,
        config: &Config,
        owner_id: &str,
        storage_key: &str,
    ) -> Result<DownloadLinkResponse> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM files WHERE storage_key = ? AND owner_id = ?")
                .bind(storage_key)
                .bind(owner_id)
                .fetch_one(db.pool())
                .await?;

        if count == 0 {
            return Err(AppError::NotFound("File not found".to_string()));
        }

        let expires = Utc::now().timestamp() + config.storage.download_ttl_secs as i64;
        let signature = signer::sign(&config.jwt.secret, storage_key, expires);
        let url = signer::signed_url(&config.storage.public_url, storage_key, expires, &signature);

        Ok(DownloadLinkResponse {
            url,
            expires_at: expires,
        })
    }

    /// Storage usage summary, computed from the owner's records only.
    pub async fn usage(db: &Database, owner_id: &str) -> Result<UsageSummary> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT type, size FROM files WHERE owner_id = ?")
                .bind(owner_id)
                .fetch_all(db.pool())
                .await?;

        Ok(usage::aggregate(rows.into_iter().map(|(file_type, size)| {
            (Category::from_str(&file_type), size.max(0) as u64)
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListFilesQuery;
    use crate::storage::LocalStorage;
    use std::sync::Arc;

    async fn test_env() -> (Database, Arc<dyn StorageProvider>) {
        let suffix = Uuid::new_v4();
        let db_path = std::env::temp_dir().join(format!("skyvault_test_{}.db", suffix));
        let store_path = std::env::temp_dir().join(format!("skyvault_test_store_{}", suffix));

        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        db.run_migrations().await.unwrap();

        for (id, email) in [("u1", "u1@example.com"), ("u2", "u2@example.com")] {
            sqlx::query(
                "INSERT INTO users (id, email, password_hash, created_at, updated_at) \
                 VALUES (?, ?, 'x', '2026-01-01', '2026-01-01')",
            )
            .bind(id)
            .bind(email)
            .execute(db.pool())
            .await
            .unwrap();
        }

        let storage: Arc<dyn StorageProvider> = Arc::new(LocalStorage::new(store_path));
        (db, storage)
    }

    async fn upload(
        db: &Database,
        storage: &dyn StorageProvider,
        owner: &str,
        name: &str,
        mime: &str,
        size: usize,
    ) -> FileRecord {
        FileService::upload(
            db,
            storage,
            owner,
            name.to_string(),
            Some(mime.to_string()),
            Bytes::from(vec![0u8; size]),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn upload_classifies_and_reports_usage() {
        let (db, storage) = test_env().await;

        let record = upload(&db, storage.as_ref(), "u1", "notes.txt", "text/plain", 1200).await;
        assert_eq!(record.file_type, "document");
        assert_eq!(record.size, 1200);
        assert_eq!(record.owner_id, "u1");
        assert!(record.storage_key.starts_with("u1/"));
        assert!(storage.exists(&record.storage_key).await.unwrap());

        let summary = FileService::usage(&db, "u1").await.unwrap();
        assert_eq!(summary.documents, 1200);
        assert_eq!(summary.images, 0);
        assert_eq!(summary.media, 0);
        assert_eq!(summary.others, 0);
        assert_eq!(summary.used, 1200);
        // Visibility floor: tiny but non-zero usage still shows 1%
        assert_eq!(summary.percent, 1);
    }

    #[tokio::test]
    async fn usage_collapses_video_and_audio_into_media() {
        let (db, storage) = test_env().await;

        upload(&db, storage.as_ref(), "u1", "photo.png", "image/png", 2000).await;
        upload(&db, storage.as_ref(), "u1", "clip.mp4", "video/mp4", 3000).await;

        let summary = FileService::usage(&db, "u1").await.unwrap();
        assert_eq!(summary.images, 2000);
        assert_eq!(summary.media, 3000);
        assert_eq!(summary.used, 5000);
    }

    #[tokio::test]
    async fn usage_is_scoped_by_owner() {
        let (db, storage) = test_env().await;

        upload(&db, storage.as_ref(), "u1", "a.txt", "text/plain", 100).await;
        upload(&db, storage.as_ref(), "u2", "b.txt", "text/plain", 900).await;

        let summary = FileService::usage(&db, "u1").await.unwrap();
        assert_eq!(summary.used, 100);
    }

    #[tokio::test]
    async fn list_filters_by_category_group() {
        let (db, storage) = test_env().await;

        upload(&db, storage.as_ref(), "u1", "a.txt", "text/plain", 10).await;
        upload(&db, storage.as_ref(), "u1", "b.png", "image/png", 10).await;
        upload(&db, storage.as_ref(), "u1", "c.mp3", "audio/mpeg", 10).await;
        upload(&db, storage.as_ref(), "u1", "d.mp4", "video/mp4", 10).await;

        let query = ListFilesQuery {
            types: Some("images".to_string()),
            ..Default::default()
        };
        let records = FileService::list(&db, "u1", &query).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "b.png");

        let query = ListFilesQuery {
            types: Some("media".to_string()),
            ..Default::default()
        };
        let records = FileService::list(&db, "u1", &query).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.file_type == "audio" || r.file_type == "video"));
    }

    #[tokio::test]
    async fn list_defaults_to_newest_first() {
        let (db, storage) = test_env().await;

        upload(&db, storage.as_ref(), "u1", "first.txt", "text/plain", 10).await;
        upload(&db, storage.as_ref(), "u1", "second.txt", "text/plain", 10).await;

        let records = FileService::list(&db, "u1", &ListFilesQuery::default())
            .await
            .unwrap();
        assert_eq!(records[0].name, "second.txt");
        assert_eq!(records[1].name, "first.txt");
    }

    #[tokio::test]
    async fn list_sorts_searches_and_limits() {
        let (db, storage) = test_env().await;

        upload(&db, storage.as_ref(), "u1", "banana.txt", "text/plain", 30).await;
        upload(&db, storage.as_ref(), "u1", "Apple.txt", "text/plain", 20).await;
        upload(&db, storage.as_ref(), "u1", "cherry.txt", "text/plain", 10).await;

        let query = ListFilesQuery {
            sort: Some("size-asc".to_string()),
            ..Default::default()
        };
        let records = FileService::list(&db, "u1", &query).await.unwrap();
        let sizes: Vec<i64> = records.iter().map(|r| r.size).collect();
        assert_eq!(sizes, vec![10, 20, 30]);

        // Case-insensitive substring match
        let query = ListFilesQuery {
            search: Some("apple".to_string()),
            ..Default::default()
        };
        let records = FileService::list(&db, "u1", &query).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Apple.txt");

        let query = ListFilesQuery {
            limit: Some(2),
            ..Default::default()
        };
        let records = FileService::list(&db, "u1", &query).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn search_treats_like_metacharacters_as_literals() {
        let (db, storage) = test_env().await;

        upload(&db, storage.as_ref(), "u1", "100% done.txt", "text/plain", 10).await;
        upload(&db, storage.as_ref(), "u1", "progress.txt", "text/plain", 10).await;
        upload(&db, storage.as_ref(), "u1", "a_b.txt", "text/plain", 10).await;
        upload(&db, storage.as_ref(), "u1", "axb.txt", "text/plain", 10).await;

        let query = ListFilesQuery {
            search: Some("100%".to_string()),
            ..Default::default()
        };
        let records = FileService::list(&db, "u1", &query).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "100% done.txt");

        let query = ListFilesQuery {
            search: Some("a_b".to_string()),
            ..Default::default()
        };
        let records = FileService::list(&db, "u1", &query).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "a_b.txt");
    }

    #[tokio::test]
    async fn list_never_crosses_owners() {
        let (db, storage) = test_env().await;

        upload(&db, storage.as_ref(), "u1", "mine.txt", "text/plain", 10).await;
        upload(&db, storage.as_ref(), "u2", "theirs.txt", "text/plain", 10).await;

        let records = FileService::list(&db, "u1", &ListFilesQuery::default())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "mine.txt");
    }

    #[tokio::test]
    async fn rename_is_scoped_and_leaves_foreign_records_untouched() {
        let (db, storage) = test_env().await;

        let record = upload(&db, storage.as_ref(), "u1", "old.txt", "text/plain", 10).await;

        let err = FileService::rename(&db, "u2", &record.id, "stolen.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let records = FileService::list(&db, "u1", &ListFilesQuery::default())
            .await
            .unwrap();
        assert_eq!(records[0].name, "old.txt");

        FileService::rename(&db, "u1", &record.id, "new.txt")
            .await
            .unwrap();
        let records = FileService::list(&db, "u1", &ListFilesQuery::default())
            .await
            .unwrap();
        assert_eq!(records[0].name, "new.txt");
    }

    #[tokio::test]
    async fn delete_removes_record_and_blob() {
        let (db, storage) = test_env().await;

        let record = upload(&db, storage.as_ref(), "u1", "gone.txt", "text/plain", 10).await;

        FileService::delete(&db, storage.as_ref(), "u1", &record.id)
            .await
            .unwrap();

        let records = FileService::list(&db, "u1", &ListFilesQuery::default())
            .await
            .unwrap();
        assert!(records.is_empty());
        assert!(!storage.exists(&record.storage_key).await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_scoped_by_owner() {
        let (db, storage) = test_env().await;

        let record = upload(&db, storage.as_ref(), "u1", "keep.txt", "text/plain", 10).await;

        let err = FileService::delete(&db, storage.as_ref(), "u2", &record.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let records = FileService::list(&db, "u1", &ListFilesQuery::default())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn download_link_requires_a_scoped_record() {
        let (db, storage) = test_env().await;
        let config = Config::default();

        let record = upload(&db, storage.as_ref(), "u1", "share.txt", "text/plain", 10).await;

        let link = FileService::download_link(&db, &config, "u1", &record.storage_key)
            .await
            .unwrap();
        assert!(link.url.contains("/api/files/raw/"));
        assert!(link.url.contains("signature="));
        assert!(link.expires_at > Utc::now().timestamp());

        let err = FileService::download_link(&db, &config, "u2", &record.storage_key)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = FileService::download_link(&db, &config, "u1", "u1/0-missing.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn upload_rejects_bad_names() {
        let (db, storage) = test_env().await;

        let err = FileService::upload(
            &db,
            storage.as_ref(),
            "u1",
            "../escape.txt".to_string(),
            None,
            Bytes::from_static(b"x"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn upload_falls_back_to_extension_when_mime_missing() {
        let (db, storage) = test_env().await;

        let record = FileService::upload(
            &db,
            storage.as_ref(),
            "u1",
            "photo.png".to_string(),
            None,
            Bytes::from_static(b"not really a png"),
        )
        .await
        .unwrap();
        assert_eq!(record.file_type, "image");
    }
}
