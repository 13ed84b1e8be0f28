pub mod file_type;
pub mod load;
pub mod types;

pub use file_type::{VIDEO_EXTENSIONS, is_video_file};
pub use load::SETTINGS_FILE;
pub use types::{
    ArtifactKind, ClipFormat, Config, ExtractionSettings, ExtractionStrategy, ImageFormat,
    MAX_HANDLE_FRAMES, NamingMode, OutputSettings, SceneSettings, ToolPaths, UserSettings,
};
