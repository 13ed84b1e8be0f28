//! 外部程序執行介面
//!
//! 每次呼叫 ffmpeg / ffprobe 都包裝成一次阻塞呼叫，回傳結束碼、stdout 與 stderr。
//! stderr 會逐行回呼，供場景偵測即時解析。

use log::{debug, warn};
use std::env;
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// 等待 stderr 時檢查取消訊號的間隔
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 一次外部程序呼叫
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// 參數中是否包含指定字串
    #[must_use]
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    /// 最後一個參數（ffmpeg 的輸出路徑）
    #[must_use]
    pub fn last_arg(&self) -> Option<&OsString> {
        self.args.last()
    }

    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// 程序執行結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// 外部程序執行能力
///
/// 系統實作使用真正的子程序；測試可注入腳本化的實作。
pub trait ProcessRunner: Send + Sync {
    /// 執行並等待程序結束，stderr 每一行（以 `\n` 或 `\r` 分隔）都會回呼一次
    fn run(
        &self,
        invocation: &Invocation,
        on_stderr_line: &mut dyn FnMut(&str),
    ) -> io::Result<ProcessOutput>;

    /// 工具是否可用
    fn is_available(&self, program: &Path) -> bool;
}

/// 使用 `std::process` 的實作
pub struct SystemProcessRunner {
    shutdown_signal: Arc<AtomicBool>,
    kill_on_cancel: bool,
}

impl SystemProcessRunner {
    #[must_use]
    pub const fn new(shutdown_signal: Arc<AtomicBool>, kill_on_cancel: bool) -> Self {
        Self {
            shutdown_signal,
            kill_on_cancel,
        }
    }
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)), false)
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn run(
        &self,
        invocation: &Invocation,
        on_stderr_line: &mut dyn FnMut(&str),
    ) -> io::Result<ProcessOutput> {
        debug!("執行: {}", invocation.command_line());

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout_reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut buffer = Vec::new();
                let _ = stdout.read_to_end(&mut buffer);
                String::from_utf8_lossy(&buffer).into_owned()
            })
        });

        let (line_tx, line_rx) = mpsc::channel::<String>();
        let stderr_reader = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let mut splitter = LineSplitter::default();
                let mut stderr = stderr;
                let mut chunk = [0u8; 4096];
                loop {
                    match stderr.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            for line in splitter.push(&chunk[..n]) {
                                if line_tx.send(line).is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
                if let Some(line) = splitter.finish() {
                    let _ = line_tx.send(line);
                }
            })
        });

        let mut stderr_text = String::new();
        let mut killed = false;
        loop {
            match line_rx.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(line) => {
                    on_stderr_line(&line);
                    stderr_text.push_str(&line);
                    stderr_text.push('\n');
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if self.kill_on_cancel && !killed && self.shutdown_signal.load(Ordering::SeqCst) {
                warn!("收到中斷信號，終止程序 [{}]", child.id());
                let _ = child.kill();
                killed = true;
            }
        }

        let status = child.wait()?;
        if let Some(handle) = stderr_reader {
            let _ = handle.join();
        }
        let stdout = stdout_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        Ok(ProcessOutput {
            exit_code: status.code(),
            success: status.success() && !killed,
            stdout,
            stderr: stderr_text,
        })
    }

    fn is_available(&self, program: &Path) -> bool {
        locate_program(program).is_some()
    }
}

/// 在 PATH 中尋找工具；含路徑分隔符的設定值直接檢查檔案
#[must_use]
pub fn locate_program(program: &Path) -> Option<PathBuf> {
    if program.as_os_str().is_empty() {
        return None;
    }

    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = candidate.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

/// 將位元組串流切成行，`\r` 與 `\n` 都視為換行（ffmpeg 進度列以 `\r` 結尾）
#[derive(Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    fn finish(self) -> Option<String> {
        (!self.pending.is_empty()).then(|| String::from_utf8_lossy(&self.pending).into_owned())
    }
}
