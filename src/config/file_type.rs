use std::path::Path;

/// 可處理的影片副檔名（小寫，不含點）
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "mov", "avi", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ts", "m2ts", "3gp",
];

#[must_use]
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("/a/b.mp4")));
        assert!(is_video_file(Path::new("/a/B.MKV")));
        assert!(!is_video_file(Path::new("/a/b.txt")));
        assert!(!is_video_file(Path::new("/a/noext")));
    }
}
