//! ダウンロードファイルの配置
//!
//! Chromeはジョブごとのステージングディレクトリに GUID 名で保存するので、
//! 完了後に提案ファイル名で downloads ディレクトリへ移動する。

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ExportError;

/// ステージングディレクトリ名（downloads 配下）
pub const STAGING_DIR: &str = ".staging";

/// 提案ファイル名から最後のパス要素だけを取り出す
///
/// 空・パス区切りのみ・ステージングディレクトリと同名の場合は `<job_id>.xlsx` にする。
pub fn sanitize_filename(suggested: &str, job_id: Uuid) -> String {
    let name = suggested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." || name == STAGING_DIR {
        format!("{}.xlsx", job_id)
    } else {
        name.to_string()
    }
}

/// ジョブのステージングディレクトリ
pub fn staging_dir(download_dir: &Path, job_id: Uuid) -> PathBuf {
    download_dir.join(STAGING_DIR).join(job_id.to_string())
}

/// ステージング済みファイルを downloads/<提案ファイル名> へ移動
pub fn store_download(
    staged: &Path,
    download_dir: &Path,
    suggested: &str,
    job_id: Uuid,
) -> Result<PathBuf, ExportError> {
    let size = std::fs::metadata(staged)
        .map_err(|e| ExportError::Download(format!("downloaded file missing {:?}: {}", staged, e)))?
        .len();
    if size == 0 {
        return Err(ExportError::Download(format!(
            "downloaded file is empty: {}",
            suggested
        )));
    }

    // 既存なら再利用
    std::fs::create_dir_all(download_dir)?;

    let target = download_dir.join(sanitize_filename(suggested, job_id));
    if std::fs::rename(staged, &target).is_err() {
        std::fs::copy(staged, &target)?;
        std::fs::remove_file(staged)?;
    }

    info!("Saved download: {:?} ({} bytes)", target, size);
    Ok(target)
}

/// ディレクトリを削除（存在しなければ何もしない）
pub fn remove_dir_quietly(dir: &Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {:?}: {}", dir, e),
    }
}
