//! Scratch storage for uploaded attachments.
//!
//! An upload is written to the scratch directory as
//! `<unix-millis>-<sanitized-name>`, handed to the mailer by path, and then
//! discarded. Each request only ever touches the file it staged.

use std::fmt::Display;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use time::OffsetDateTime;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Attempts at finding a free name before giving up.
const MAX_NAME_ATTEMPTS: u32 = 32;

/// Longest sanitized name, leaving room for the timestamp and counter
/// within the usual 255-byte filename limit.
const MAX_NAME_BYTES: usize = 200;

/// Extensions longer than this are treated as part of the stem when truncating.
const MAX_EXTENSION_BYTES: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload interrupted: {0}")]
    Interrupted(String),
}

/// An upload that currently exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    /// Name as sent by the client, minus any directory components.
    pub original_filename: String,
}

#[derive(Debug, Clone)]
pub struct Stager {
    dir: Arc<PathBuf>,
}

impl Stager {
    /// Create the scratch directory if needed. Safe to call when it already exists.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::Io {
                path: dir.clone(),
                source,
            })?;
        Ok(Stager { dir: Arc::new(dir) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stream an upload to disk.
    ///
    /// On any failure the partially written file is removed before returning.
    pub async fn stage<S, E>(
        &self,
        original_filename: &str,
        body: S,
    ) -> Result<StagedFile, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let received_at = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let safe_name = sanitize_filename(original_filename);
        let (path, file) = self.create_unique(received_at, &safe_name).await?;

        if let Err(err) = write_body(&path, file, body).await {
            if let Err(cleanup) = fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove partial upload");
            }
            return Err(err);
        }

        tracing::debug!(path = %path.display(), "staged upload");
        Ok(StagedFile {
            path,
            original_filename: base_name(original_filename).to_string(),
        })
    }

    /// Delete a staged file. A file that is already gone is only logged.
    pub async fn discard(&self, staged: &StagedFile) {
        match fs::remove_file(&staged.path).await {
            Ok(()) => tracing::debug!(path = %staged.path.display(), "discarded staged upload"),
            Err(err) => tracing::warn!(
                path = %staged.path.display(),
                error = %err,
                "failed to discard staged upload"
            ),
        }
    }

    async fn create_unique(
        &self,
        received_at: i128,
        name: &str,
    ) -> Result<(PathBuf, File), StorageError> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = match attempt {
                0 => format!("{received_at}-{name}"),
                n => format!("{received_at}-{n}-{name}"),
            };
            let path = self.dir.join(file_name);

            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(StorageError::Io { path, source }),
            }
        }

        Err(StorageError::Io {
            path: self.dir.join(format!("{received_at}-{name}")),
            source: std::io::Error::new(ErrorKind::AlreadyExists, "no free staging name"),
        })
    }
}

async fn write_body<S, E>(path: &Path, mut file: File, body: S) -> Result<(), StorageError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut body = std::pin::pin!(body);
    let io_err = |source: std::io::Error| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };

    while let Some(chunk) = body
        .try_next()
        .await
        .map_err(|e| StorageError::Interrupted(e.to_string()))?
    {
        file.write_all(&chunk).await.map_err(io_err)?;
    }
    file.flush().await.map_err(io_err)?;
    Ok(())
}

/// Last path component of a client-supplied name, whichever separator it uses.
fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Make a client-supplied filename safe to join onto the scratch directory.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = base_name(name)
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' | ' ' => c,
            _ => '_',
        })
        .collect();

    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        truncate_name(cleaned, MAX_NAME_BYTES)
    }
}

/// Cut `name` to at most `max` bytes on a char boundary, keeping a short extension.
fn truncate_name(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= MAX_EXTENSION_BYTES => name.split_at(dot),
        _ => (name, ""),
    };

    let mut end = max - extension.len();
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &stem[..end], extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn body(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        let chunks: Vec<_> = parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect();
        stream::iter(chunks)
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\ada\\cv.pdf"), "cv.pdf");
        assert_eq!(sanitize_filename("resume (final).pdf"), "resume _final_.pdf");
    }

    #[test]
    fn sanitize_never_yields_hidden_or_empty_names() {
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("dir/"), "upload");
        assert_eq!(sanitize_filename(".bashrc"), "bashrc");
    }

    #[test]
    fn long_names_are_truncated_keeping_the_extension() {
        let name = format!("{}.pdf", "a".repeat(246));
        let cleaned = sanitize_filename(&name);
        assert_eq!(cleaned.len(), MAX_NAME_BYTES);
        assert!(cleaned.ends_with(".pdf"));

        let no_extension = "b".repeat(300);
        assert_eq!(sanitize_filename(&no_extension), "b".repeat(MAX_NAME_BYTES));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let name = format!("{}.txt", "\u{e9}".repeat(150));
        let cut = truncate_name(&name, 101);
        assert!(cut.len() <= 101);
        assert!(cut.ends_with(".txt"));
        assert!(cut.trim_end_matches(".txt").chars().all(|c| c == '\u{e9}'));
    }

    #[tokio::test]
    async fn long_filename_is_staged() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::create(dir.path()).await.unwrap();
        let name = format!("{}.pdf", "a".repeat(246));

        let staged = stager.stage(&name, body(&["%PDF"])).await.unwrap();

        assert_eq!(staged.original_filename, name);
        let file_name = staged.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.len() < 255);
        assert!(file_name.ends_with(".pdf"));
        assert_eq!(tokio::fs::read(&staged.path).await.unwrap(), b"%PDF");
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("uploads");
        Stager::create(&target).await.unwrap();
        Stager::create(&target).await.unwrap();
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn stage_then_discard() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::create(dir.path()).await.unwrap();

        let staged = stager.stage("cv.pdf", body(&["%PDF", "-1.4"])).await.unwrap();
        assert_eq!(staged.original_filename, "cv.pdf");
        assert!(staged.path.starts_with(dir.path()));
        let name = staged.path.file_name().unwrap().to_string_lossy().into_owned();
        let (stamp, rest) = name.split_once('-').unwrap();
        assert!(stamp.parse::<i128>().is_ok());
        assert_eq!(rest, "cv.pdf");
        assert_eq!(tokio::fs::read(&staged.path).await.unwrap(), b"%PDF-1.4");

        stager.discard(&staged).await;
        assert!(!staged.path.exists());

        // A second discard only logs.
        stager.discard(&staged).await;
    }

    #[tokio::test]
    async fn traversal_names_stay_inside_the_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::create(dir.path().join("uploads")).await.unwrap();

        let staged = stager.stage("../../escape.txt", body(&["x"])).await.unwrap();
        assert_eq!(staged.path.parent().unwrap(), stager.dir());
        assert_eq!(staged.original_filename, "escape.txt");
    }

    #[tokio::test]
    async fn same_name_uploads_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::create(dir.path()).await.unwrap();

        let (a, b) = tokio::join!(
            stager.stage("cv.pdf", body(&["first"])),
            stager.stage("cv.pdf", body(&["second"])),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.path, b.path);
        assert_eq!(tokio::fs::read(&a.path).await.unwrap(), b"first");
        assert_eq!(tokio::fs::read(&b.path).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn concurrent_distinct_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::create(dir.path()).await.unwrap();

        let (a, b) = tokio::join!(
            stager.stage("alice.pdf", body(&["a"])),
            stager.stage("bob.pdf", body(&["b"])),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.path, b.path);
        stager.discard(&a).await;
        assert!(b.path.exists());
    }

    #[tokio::test]
    async fn interrupted_upload_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::create(dir.path()).await.unwrap();

        let broken = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(ErrorKind::ConnectionReset, "client went away")),
        ]);
        let err = stager.stage("cv.pdf", broken).await.unwrap_err();

        assert!(matches!(err, StorageError::Interrupted(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
