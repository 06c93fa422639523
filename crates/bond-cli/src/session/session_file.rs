use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use bond::models::message::Message;

pub fn ensure_session_dir() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    let session_dir = home_dir.join(".config").join("bond").join("sessions");

    if !session_dir.exists() {
        fs::create_dir_all(&session_dir)
            .with_context(|| format!("Failed to create {}", session_dir.display()))?;
    }

    Ok(session_dir)
}

/// A fresh, timestamped session file name inside `dir`
pub fn new_session_file(dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{}.jsonl", stamp))
}

/// Rewrite the session file with the full conversation, one JSON message per line
pub fn persist_messages(session_file: &Path, messages: &[Message]) -> Result<()> {
    let file = File::create(session_file)
        .with_context(|| format!("Failed to write {}", session_file.display()))?;
    persist_messages_internal(file, messages)
}

fn persist_messages_internal(session_file: File, messages: &[Message]) -> Result<()> {
    let mut writer = std::io::BufWriter::new(session_file);

    for message in messages {
        serde_json::to_writer(&mut writer, &message)?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

/// Read a conversation back from a session file
pub fn read_messages(session_file: &Path) -> Result<Vec<Message>> {
    let file = File::open(session_file)
        .with_context(|| format!("Failed to open {}", session_file.display()))?;

    BufReader::new(file)
        .lines()
        .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
        .map(|line| Ok(serde_json::from_str(&line?)?))
        .collect()
}
