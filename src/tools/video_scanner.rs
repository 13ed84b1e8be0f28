use crate::config::is_video_file;
use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct VideoFileInfo {
    pub path: PathBuf,
    pub size: u64,
}

/// 遞迴掃描資料夾中的影片，依檔案大小排序（由小到大）
pub fn scan_video_files(directory: &Path) -> Result<Vec<VideoFileInfo>> {
    let mut video_files: Vec<VideoFileInfo> = WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_video_file(entry.path()))
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            Some(VideoFileInfo {
                path: entry.into_path(),
                size: metadata.len(),
            })
        })
        .collect();

    video_files.sort_by_key(|file| file.size);
    Ok(video_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_video_files_sorted_by_size() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("big.mp4"), vec![0u8; 300]).unwrap();
        fs::write(nested.join("small.mkv"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("mid.MOV"), vec![0u8; 100]).unwrap();
        fs::write(dir.path().join("notes.txt"), vec![0u8; 5]).unwrap();

        let files = scan_video_files(dir.path()).unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].size, 10);
        assert_eq!(files[1].size, 100);
        assert_eq!(files[2].size, 300);
        assert!(files[0].path.ends_with("small.mkv"));
    }
}
