//! Soundboard Console
//!
//! Interactive front end for the audio engine: pick an output device,
//! start the microphone, and fire sound files into the mix.

use std::path::Path;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soundboard_core::config::AppConfig;
use soundboard_core::AudioEngine;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Soundboard");

    let config = AppConfig::load();
    let mut engine = AudioEngine::new(config)?;

    print_devices(&engine);
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(&mut engine, line.trim()) {
                    break;
                }
            }
        }
    }

    engine.stop_capture();
    tracing::info!("Soundboard stopped");
    Ok(())
}

/// Returns false when the user asked to quit
fn handle_command(engine: &mut AudioEngine, line: &str) -> bool {
    let mut parts = line.splitn(2, ' ');
    let command = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();

    match command {
        "" => {}
        "help" => print_help(),
        "devices" => print_devices(engine),
        "refresh" => match engine.refresh_devices() {
            Ok(()) => print_devices(engine),
            Err(e) => eprintln!("Refresh failed: {}", e),
        },
        "use" => {
            let target = resolve_device_id(engine, arg);
            match target {
                Some(id) => {
                    if let Err(e) = engine.select_output_device(&id) {
                        eprintln!("Device selection failed: {}", e);
                    }
                }
                None => eprintln!("Unknown device: {}", arg),
            }
        }
        "start" => {
            let monitor = arg == "monitor";
            match engine.start_capture(monitor) {
                Ok(()) => println!("Capturing. Mix is routed to the selected output."),
                Err(e) => eprintln!("Start failed: {}", e),
            }
        }
        "stop" => engine.stop_capture(),
        "play" => {
            if arg.is_empty() {
                eprintln!("Usage: play <file>");
            } else {
                match engine.play_sound_file(Path::new(arg)) {
                    Ok(Some(_)) => {}
                    Ok(None) => eprintln!("No capture session; 'start' first"),
                    Err(e) => eprintln!("Playback failed: {}", e),
                }
            }
        }
        "stop-sounds" => engine.stop_all_sounds(),
        "monitor" => {
            let enabled = match arg {
                "on" => true,
                "off" => false,
                _ => {
                    eprintln!("Usage: monitor on|off");
                    return true;
                }
            };
            if let Err(e) = engine.set_local_monitoring(enabled) {
                eprintln!("Monitor toggle failed: {}", e);
            }
        }
        "level" => print_level(engine),
        "status" => print_status(engine),
        "quit" | "exit" => return false,
        other => eprintln!("Unknown command: {} (try 'help')", other),
    }

    if let Some(e) = engine.capture_error() {
        eprintln!("Capture stream reported: {}", e);
    }
    true
}

/// Accept either a 1-based index into the device listing or an endpoint id
fn resolve_device_id(engine: &AudioEngine, arg: &str) -> Option<String> {
    if let Ok(index) = arg.parse::<usize>() {
        return engine
            .output_devices()
            .get(index.checked_sub(1)?)
            .map(|e| e.id.clone());
    }
    engine
        .output_devices()
        .iter()
        .find(|e| e.id == arg)
        .map(|e| e.id.clone())
}

fn print_devices(engine: &AudioEngine) {
    println!("\n=== Output Devices ===");
    let selected = engine.selected_device().map(|e| e.id.clone());
    for (i, device) in engine.output_devices().iter().enumerate() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        let selected_marker = if selected.as_deref() == Some(&device.id) {
            " [SELECTED]"
        } else {
            ""
        };
        println!("  {}. {}{}{}", i + 1, device.name, default_marker, selected_marker);
    }
    if engine.output_devices().is_empty() {
        println!("  (none found)");
    }
    println!();
}

fn print_level(engine: &AudioEngine) {
    let rx = engine.level_receiver();
    let mut latest = None;
    while let Ok(level) = rx.try_recv() {
        latest = Some(level);
    }
    match latest {
        Some(level) => {
            let bars = (level * 40.0) as usize;
            println!("mic [{:<40}] {:.3}", "#".repeat(bars.min(40)), level);
        }
        None => println!("mic (no readings; is capture running?)"),
    }
}

fn print_status(engine: &AudioEngine) {
    println!(
        "capturing: {}  monitoring: {}  active sources: {}  output: {}",
        engine.is_capturing(),
        engine.is_monitoring(),
        engine.active_sources(),
        engine
            .selected_device()
            .map(|e| e.name.clone())
            .unwrap_or_else(|| "(none)".to_string()),
    );
}

fn print_help() {
    println!("Commands:");
    println!("  devices          list output devices");
    println!("  refresh          re-enumerate devices");
    println!("  use <n|id>       route the mix to a device");
    println!("  start [monitor]  start the microphone (optionally monitoring locally)");
    println!("  stop             stop capture and all sounds");
    println!("  play <file>      mix a sound file in (.wav, .mp3, ...)");
    println!("  stop-sounds      stop all sounds, keep the microphone");
    println!("  monitor on|off   toggle local monitoring");
    println!("  level            show the latest microphone level");
    println!("  status           show engine state");
    println!("  quit             exit");
}
