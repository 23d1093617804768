use crate::config::AppConfig;
use crate::services::storage::LocalStorageService;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Creates `path` if needed and proves it accepts writes by round-tripping a probe file.
pub async fn ensure_writable_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("create_dir_all({})", path.display()))?;

    let probe = path.join(format!(".write-probe-{}", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&probe, b"probe")
        .await
        .with_context(|| format!("write({})", probe.display()))?;
    tokio::fs::remove_file(&probe)
        .await
        .with_context(|| format!("remove_file({})", probe.display()))?;

    Ok(())
}

pub async fn setup_storage(config: &AppConfig) -> anyhow::Result<Arc<LocalStorageService>> {
    for dir in [
        config.upload_dir.clone(),
        config.thumbnail_dir(),
        config.case_image_dir(),
    ] {
        ensure_writable_dir(&dir)
            .await
            .with_context(|| format!("upload directory {} is not writable", dir.display()))?;
    }

    info!("🗂️  Upload storage ready at {}", config.upload_dir.display());

    Ok(Arc::new(LocalStorageService::new(config.upload_dir.clone())))
}
