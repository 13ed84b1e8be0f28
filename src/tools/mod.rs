mod collaborators;
mod concurrency;
mod ffprobe_info;
mod path_validator;
mod process_runner;
mod video_scanner;

pub use collaborators::{
    DirectoryProvider, FsDirectoryProvider, FsPathResolver, LibraryImporter, NoopImporter,
    PathResolver,
};
pub use concurrency::{concurrency_limit, logical_core_count, tiered_concurrency};
pub use ffprobe_info::{FrameRate, VideoInfo, VideoInfoProbe, parse_probe_output};
pub use path_validator::{ensure_directory_exists, validate_directory_exists, validate_file_exists};
pub use process_runner::{
    Invocation, ProcessOutput, ProcessRunner, SystemProcessRunner, locate_program,
};
pub use video_scanner::{VideoFileInfo, scan_video_files};
