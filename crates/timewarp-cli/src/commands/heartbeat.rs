//! Interactive heartbeat simulation.
//!
//! Registers a single task on the scheduler whose callback prints a
//! heartbeat with its current BPM and appends a record to a log file, then
//! serves a small command loop on stdin. Pure consumer of the engine API
//! and event feed; no scheduling logic lives here.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use clap::Args;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use timewarp_core::{Curve, Event, Scheduler, TaskError, TaskOptions};

use crate::config::HeartbeatConfig;

/// The demo registers exactly one task, so it always gets id 0.
const HEARTBEAT_TASK_ID: usize = 0;

#[derive(Args)]
pub struct HeartbeatArgs {
    /// Config file (defaults to ~/.config/timewarp/config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Heartbeat log file (overrides the config value)
    #[arg(long)]
    log: Option<PathBuf>,
}

pub async fn run(args: HeartbeatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = HeartbeatConfig::load(args.config.as_deref())?;
    if let Some(log) = args.log {
        config.log_path = log;
    }
    let curve: Curve = config.curve.parse()?;

    let scheduler = Scheduler::new();

    let mut events = scheduler.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(&event);
        }
    });

    let beat_scheduler = scheduler.clone();
    let log_path = config.log_path.clone();
    let task_id = scheduler.register_task(
        move || {
            let scheduler = beat_scheduler.clone();
            let log_path = log_path.clone();
            async move { heartbeat(&scheduler, &log_path).await }
        },
        TaskOptions {
            curve,
            duration: config.duration_ms,
            amplitude: config.amplitude_ms,
            scale: config.scale,
            custom_curve: None,
        },
    )?;

    println!("Heartbeat simulation started.");
    println!(
        "Commands: stress (speed up), rest (slow down), rewind (replay), \
         pause, resume, cancel, status, stop"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim().to_lowercase().as_str() {
            "stress" => {
                scheduler.apply_distortion(|| 2.0)?;
                println!("stress mode activated");
            }
            "rest" => {
                scheduler.apply_distortion(|| 0.5)?;
                println!("rest mode activated");
            }
            "rewind" => {
                if let Err(e) = scheduler.rewind(task_id, 0).await {
                    eprintln!("rewind failed: {e}");
                }
            }
            "pause" => scheduler.pause(),
            "resume" => scheduler.resume(),
            "cancel" => {
                if let Err(e) = scheduler.cancel_task(task_id) {
                    eprintln!("cancel failed: {e}");
                }
            }
            "status" => match scheduler.task_status(task_id) {
                Some(status) => println!("task {task_id}: {status:?}"),
                None => println!("task {task_id}: not registered"),
            },
            "stop" => {
                scheduler.stop();
                println!("Heartbeat history:\n{}", scheduler.export_history()?);
                break;
            }
            "" => {}
            other => println!(
                "unknown command: {other}. Use stress, rest, rewind, pause, resume, \
                 cancel, status, stop"
            ),
        }
    }

    Ok(())
}

async fn heartbeat(scheduler: &Scheduler, log_path: &Path) -> Result<(), TaskError> {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let bpm = (60_000.0 / scheduler.next_interval(HEARTBEAT_TASK_ID)?).round() as i64;
    println!("❤ heartbeat at {timestamp} ({bpm} BPM)");
    append_record(log_path, &timestamp, bpm).await?;
    Ok(())
}

async fn append_record(log_path: &Path, timestamp: &str, bpm: i64) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .await?;
    file.write_all(format!("Heartbeat at {timestamp}, BPM: {bpm}\n").as_bytes())
        .await
}

fn print_event(event: &Event) {
    match event {
        Event::TaskAdded { task_id } => println!("task {task_id} added"),
        Event::TaskExecuted { task_id, time } => {
            println!("task {task_id} executed at {}", format_time(*time));
        }
        Event::DistortionChanged { factor } => println!("heartbeat rate changed: {factor}x"),
        Event::TaskRewound { task_id, execution_index } => {
            println!("rewound task {task_id} to execution {execution_index}");
        }
        Event::TaskCancelled { task_id } => println!("task {task_id} cancelled"),
        Event::TaskFailed { task_id, error } => eprintln!("error in task {task_id}: {error}"),
        Event::Paused => println!("scheduler paused"),
        Event::Resumed => println!("scheduler resumed"),
        Event::Stopped => println!("scheduler stopped"),
        Event::HistoryImported => println!("history imported"),
    }
}

fn format_time(epoch_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| epoch_ms.to_string())
}
