//! User-facing status reporting.
//!
//! Every phase of a run narrates what it is doing through a [`StatusSink`]:
//! messages go to the registered callback (the GUI shell's status line), to
//! the diagnostic log, and to a session log file. The sink is cheap to clone
//! and owned by the run, not a process-wide singleton.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct StatusSink {
    callback: Option<StatusCallback>,
    log_path: Option<PathBuf>,
}

impl StatusSink {
    pub fn new(callback: Option<StatusCallback>, log_path: Option<PathBuf>) -> Self {
        Self { callback, log_path }
    }

    /// Emits one status line to callback, log and session file.
    pub fn emit(&self, message: &str) {
        log::info!("{}", message);

        if let Some(path) = &self.log_path {
            let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
            let line = format!("[{}] {}\n", timestamp, message);
            if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(path)
            {
                let _ = file.write_all(line.as_bytes());
            }
        }

        if let Some(callback) = &self.callback {
            callback(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn callback_receives_messages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink = StatusSink::new(
            Some(Arc::new(move |msg: &str| {
                seen_clone.lock().unwrap().push(msg.to_string());
            })),
            None,
        );

        sink.emit("Phase 1: waiting");
        sink.emit("Phase 2: placing");
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Phase 1: waiting".to_string(), "Phase 2: placing".to_string()]
        );
    }

    #[test]
    fn session_file_accumulates_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        let sink = StatusSink::new(None, Some(path.clone()));

        sink.emit("started");
        sink.emit("stopped");

        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("started"));
        assert!(contents.contains("stopped"));
        assert_eq!(contents.lines().count(), 2);
    }
}
