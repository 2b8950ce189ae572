use crate::error::StageError;
use crate::utils::validation::sanitize_filename;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// A file persisted in the local scratch directory. Owned exclusively by
/// the pipeline from creation until cleanup deletes it; its path is never
/// handed to callers as a durable reference.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    pub original_name: String,
    pub size: u64,
}

/// Writes incoming byte streams to the local scratch directory under
/// collision-free names. The directory is shared across all concurrent
/// requests; the naming scheme is the sole collision guard, no locking.
#[derive(Debug, Clone)]
pub struct Stager {
    dir: PathBuf,
}

impl Stager {
    /// Creates the scratch directory if it does not exist yet.
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self, StageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// `basename-timestamp-random.ext`, derived from the sanitized original
    /// name. Two concurrent uploads with identical names get distinct paths.
    fn staged_name(original_name: &str) -> String {
        let safe = sanitize_filename(original_name);
        let path = Path::new(&safe);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("upload");
        let millis = chrono::Utc::now().timestamp_millis();
        let nonce = rand::random::<u32>();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}-{millis}-{nonce}.{ext}"),
            None => format!("{stem}-{millis}-{nonce}"),
        }
    }

    /// Persists the stream to the scratch directory, enforcing `max_bytes`
    /// while the bytes are still arriving. The data is written to a `.part`
    /// path and renamed into place, so a partially written file is never
    /// observable as a staged file; on any failure the partial is removed
    /// best-effort and nothing is left on disk.
    pub async fn stage<R>(
        &self,
        reader: R,
        original_name: &str,
        max_bytes: u64,
    ) -> Result<StagedFile, StageError>
    where
        R: AsyncRead + Unpin,
    {
        let name = Self::staged_name(original_name);
        let final_path = self.dir.join(&name);
        let part_path = self.dir.join(format!("{name}.part"));

        let size = match write_capped(reader, &part_path, max_bytes).await {
            Ok(size) => size,
            Err(err) => {
                let _ = fs::remove_file(&part_path).await;
                return Err(err);
            }
        };

        if let Err(err) = fs::rename(&part_path, &final_path).await {
            let _ = fs::remove_file(&part_path).await;
            return Err(StageError::Io(err));
        }

        tracing::debug!(
            path = %final_path.display(),
            size,
            "upload staged"
        );

        Ok(StagedFile {
            path: final_path,
            original_name: original_name.to_string(),
            size,
        })
    }
}

/// Streams the reader to `path`, aborting before the overflowing chunk is
/// written once `max_bytes` is exceeded. Oversized uploads terminate early
/// instead of being buffered fully and rejected afterwards.
async fn write_capped<R>(mut reader: R, path: &Path, max_bytes: u64) -> Result<u64, StageError>
where
    R: AsyncRead + Unpin,
{
    let mut file = fs::File::create(path).await?;
    let mut buf = vec![0u8; 64 * 1024];
    let mut written: u64 = 0;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        written += n as u64;
        if written > max_bytes {
            return Err(StageError::TooLarge { limit: max_bytes });
        }
        file.write_all(&buf[..n]).await?;
    }

    file.flush().await?;
    Ok(written)
}
