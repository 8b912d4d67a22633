use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::Path,
    sync::Mutex,
};

use chrono::{DateTime, Local};

/// Receives exactly one line per dispatched message.
pub trait ChatLogSink: Send + Sync {
    fn append(&self, line: &str) -> io::Result<()>;
}

/// Formats one chat log line. Newlines in the body are flattened so every
/// message occupies a single line.
pub fn format_line(
    at: DateTime<Local>,
    room_id: &str,
    sender: &str,
    recipient: &str,
    body: &str,
) -> String {
    format!(
        "{}: [S{room_id}] From({sender}) To ({recipient}) Msg({})",
        at.format("%Y-%m-%d %H:%M:%S"),
        body.replace('\n', " "),
    )
}

pub struct FileChatLog {
    file: Mutex<File>,
}

impl FileChatLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        Ok(Self { file: Mutex::new(file) })
    }
}

impl ChatLogSink for FileChatLog {
    fn append(&self, line: &str) -> io::Result<()> {
        tracing::info!(target: "chat", "{line}");

        let mut file = self.file.lock()
            .map_err(|_| io::Error::other("chat log lock poisoned"))?;
        writeln!(file, "{line}")
    }
}

#[derive(Default)]
pub struct MemoryChatLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }
}

impl ChatLogSink for MemoryChatLog {
    fn append(&self, line: &str) -> io::Result<()> {
        self.lines.lock()
            .map_err(|_| io::Error::other("chat log lock poisoned"))?
            .push(line.to_owned());
        Ok(())
    }
}
