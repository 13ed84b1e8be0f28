//! 外部協作者介面
//!
//! 路徑解析、建立資料夾、匯入素材庫都由宿主注入；此處提供檔案系統與 no-op 的預設實作。

use crate::component::scene_extractor::Artifact;
use crate::tools::path_validator::{ensure_directory_exists, validate_file_exists};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// 將素材代號轉成絕對路徑
pub trait PathResolver: Send + Sync {
    fn resolve(&self, handle: &str) -> Result<PathBuf>;
}

/// 確保資料夾存在
pub trait DirectoryProvider: Send + Sync {
    fn ensure_dir(&self, path: &Path) -> Result<()>;
}

/// 將完成的檔案交給外部素材庫
pub trait LibraryImporter: Send + Sync {
    fn import(&self, artifact: &Artifact) -> Result<()>;
}

/// 代號本身就是檔案路徑
#[derive(Debug, Default, Clone, Copy)]
pub struct FsPathResolver;

impl PathResolver for FsPathResolver {
    fn resolve(&self, handle: &str) -> Result<PathBuf> {
        let path = Path::new(handle.trim());
        validate_file_exists(path)?;
        path.canonicalize()
            .with_context(|| format!("無法取得絕對路徑: {}", path.display()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsDirectoryProvider;

impl DirectoryProvider for FsDirectoryProvider {
    fn ensure_dir(&self, path: &Path) -> Result<()> {
        ensure_directory_exists(path)
    }
}

/// 不做任何匯入
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopImporter;

impl LibraryImporter for NoopImporter {
    fn import(&self, _artifact: &Artifact) -> Result<()> {
        Ok(())
    }
}
