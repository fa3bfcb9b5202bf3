//! paradox-macro
//!
//! Automates repetitive stage play in a Roblox tower-defense game by reading
//! the screen (template matching + OCR) and issuing hardware-level input.
//! This binary is a thin console launcher around [`engine::MacroEngine`];
//! the GUI shell, hotkeys and editors live outside this crate.

mod capture;
mod config;
mod engine;
mod input;
mod landmarks;
mod notify;
mod paths;
mod placements;
mod status;
mod vision;
mod window;

use std::io::BufRead;
use std::sync::Arc;

use anyhow::Result;

use engine::MacroEngine;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Panics in the worker thread must reach the log file, not just stderr.
    std::panic::set_hook(Box::new(|panic_info| {
        let message = format!("[PANIC] {}", panic_info);
        eprintln!("{}", message);
        let log_path = paths::logs_dir().join("panic.log");
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
        {
            use std::io::Write;
            let _ = writeln!(file, "{}", message);
        }
    }));

    paths::ensure_directories()?;

    if let Err(e) = vision::ocr::ensure_language_data() {
        log::warn!("Tesseract language data unavailable: {:#}", e);
        log::warn!("Text landmarks will be disabled for this session.");
    }

    let config = config::Config::load_default();
    log::info!(
        "Loaded config: mode={}, location={}, act={}",
        config.mode.label(),
        config.location,
        config.act
    );

    let mut engine = MacroEngine::new(config);
    engine.set_status_callback(Arc::new(|message: &str| {
        println!("[MACRO] {}", message);
    }));

    println!("Commands: start | stop | pause | resume | status | quit");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match line.trim() {
            "start" => engine.start(),
            "stop" => engine.stop(),
            "pause" => engine.pause(),
            "resume" => engine.resume(),
            "status" => {
                let state = if !engine.is_running() {
                    "idle"
                } else if engine.is_paused() {
                    "paused"
                } else {
                    "running"
                };
                println!("[MACRO] {}", state);
            }
            "quit" | "exit" => break,
            "" => {}
            other => println!("[MACRO] Unknown command: {}", other),
        }
    }

    engine.stop();
    engine.join();
    Ok(())
}
