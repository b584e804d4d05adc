use crate::app::ports::{ObjectStorePort, StoredObject};
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::info;
use uuid::Uuid;

/// Objects live at `<root>/<bucket>/<key>`.
pub struct FsObjectStore {
    bucket_dir: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl AsRef<Path>, bucket: &str) -> Self {
        Self {
            bucket_dir: root.as_ref().join(bucket),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        let safe = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(IngestError::InvalidInput(format!("object key '{}' is not a relative path", key)));
        }
        Ok(self.bucket_dir.join(rel))
    }
}

#[async_trait]
impl ObjectStorePort for FsObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => {
                crate::metrics::store::error(self.backend_name(), "exists");
                Err(IngestError::StorageUnavailable(format!("stat {}: {}", path.display(), e)))
            }
        }
    }

    async fn store(&self, object: &StoredObject) -> Result<()> {
        let path = self.path_for(&object.key)?;
        let write = async {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            // write-then-rename so readers never see a partial payload. Temp
            // names are per write so concurrent writers of one key only race on rename.
            let mut tmp = path.clone().into_os_string();
            tmp.push(format!(".{}.partial", Uuid::new_v4().simple()));
            fs::write(&tmp, &object.payload).await?;
            fs::rename(&tmp, &path).await
        };
        if let Err(e) = write.await {
            crate::metrics::store::error(self.backend_name(), "store");
            return Err(IngestError::StorageUnavailable(format!("write {}: {}", path.display(), e)));
        }

        crate::metrics::store::write(self.backend_name(), object.size());
        info!(
            bucket_dir = %self.bucket_dir.display(),
            key = %object.key,
            byte_count = object.size(),
            sha256 = %object.sha256_hex(),
            "stored object"
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "fs"
    }
}
