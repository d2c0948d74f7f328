use rand::distributions::Alphanumeric;
use rand::Rng;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

const SUFFIX_LEN: usize = 7;
const MAX_ATTEMPTS: usize = 100;

/// Local filesystem store for uploaded images.
///
/// Files keep their (sanitised) original name; a name that is already taken gets
/// a random `_xxxxxxx` suffix before the extension, so stored files are never
/// overwritten.
#[derive(Clone, Debug)]
pub struct MediaStorage {
    root: PathBuf,
    url_prefix: String,
}

impl MediaStorage {
    pub fn new(root: impl AsRef<Path>, url_prefix: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `bytes` and return the name it was stored under.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> std::io::Result<String> {
        fs::create_dir_all(&self.root).await?;

        let name = sanitize_file_name(original_name);
        let mut candidate = name.clone();
        for _ in 0..MAX_ATTEMPTS {
            let path = self.root.join(&candidate);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    file.flush().await?;
                    debug!("Stored upload as {}", candidate);
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = alternative_name(&name);
                }
                Err(e) => return Err(e),
            }
        }
        Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("Could not find a free name for '{}'", name),
        ))
    }

    /// Filesystem path of a stored file.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Public URL of a stored file.
    pub fn url(&self, name: &str) -> String {
        format!("{}/{}", self.url_prefix, name)
    }
}

/// Keep only the final path component and a conservative character set.
fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

fn alternative_name(name: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, suffix, ext),
        _ => format!("{}_{}", name, suffix),
    }
}
