//! Delivery Sequencer - single-vehicle stop sequencing and ETA scheduling
//!
//! Reads orders or a cost matrix from JSON files, plans the visiting order
//! and prints the result as JSON on stdout. Logs go to stderr and a daily
//! rotating file.

mod cli;
mod config;
mod defaults;
mod services;
mod types;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::services::delivery::DeliveryPlanner;
use crate::services::eta_schedule::compute_etas;
use crate::services::routing::{
    create_routing_service, fill_unreachable, CostMatrix, RouteLeg, TimeUnit,
};
use crate::services::sequencing::optimize_route;
use crate::types::{DeliveryJob, PlanDeliveryRequest};

/// Cost matrix as read from a file; `null` cells are unreachable pairs
#[derive(Debug, Deserialize)]
struct MatrixFile {
    durations: Vec<Vec<Option<f64>>>,
    distances: Vec<Vec<Option<f64>>>,
    #[serde(default)]
    unit: TimeUnit,
}

impl MatrixFile {
    fn into_cost_matrix(self) -> Result<CostMatrix> {
        Ok(CostMatrix::with_unit(
            fill_unreachable("duration", self.durations),
            fill_unreachable("distance", self.distances),
            self.unit,
        )?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ./logs
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "delivery-sequencer.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let json_logs = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let (file_text, file_json) = if json_logs {
        (None, Some(tracing_subscriber::fmt::layer().json().with_writer(non_blocking)))
    } else {
        (
            Some(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)),
            None,
        )
    };

    // Initialize logging - stderr (stdout carries the JSON result) and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,delivery_sequencer=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_text)
        .with(file_json)
        .init();

    let config = Config::from_env()?;
    info!("Configuration loaded");

    match run(cli.command, &config).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            Err(e)
        }
    }
}

/// Execute one command and return its JSON output
async fn run(command: Command, config: &Config) -> Result<String> {
    match command {
        Command::Optimize {
            matrix,
            start,
            freeze_first,
            max_sweeps,
            include_return_edge,
        } => {
            let matrix = read_json::<MatrixFile>(&matrix)?.into_cost_matrix()?;
            let mut optimizer = config
                .optimizer_config()
                .with_start_index(start)
                .with_freeze_first(freeze_first);
            if let Some(sweeps) = max_sweeps {
                optimizer = optimizer.with_max_sweeps(sweeps);
            }
            if include_return_edge {
                optimizer = optimizer.with_return_edge(true);
            }

            let result = optimize_route(&matrix, &optimizer)?;
            to_json(&result)
        }
        Command::Plan {
            input,
            freeze_first,
            start_time,
        } => {
            let request: PlanDeliveryRequest = read_json(&input)?;
            let start_time = start_time.or(request.start_time).unwrap_or_else(Utc::now);

            let job = planner(config)?
                .create_job(
                    request.depot,
                    &request.orders,
                    freeze_first || request.freeze_first,
                    start_time,
                )
                .await?;
            info!("Planned job {} with {} stops", job.id, job.stops.len());
            to_json(&job)
        }
        Command::Recompute {
            job,
            freeze_first,
            start_time,
        } => {
            let job: DeliveryJob = read_json(&job)?;
            let updated = planner(config)?
                .recompute_job(&job, freeze_first, start_time.unwrap_or_else(Utc::now))
                .await?;
            to_json(&updated)
        }
        Command::Deliver { job, stop } => {
            let mut job: DeliveryJob = read_json(&job)?;
            job.mark_delivered(stop)?;
            info!("Stop {} delivered, job {} is {:?}", stop, job.id, job.status);
            to_json(&job)
        }
        Command::Eta {
            legs,
            start_time,
            service_minutes,
        } => {
            let legs: Vec<RouteLeg> = read_json(&legs)?;
            let service = match service_minutes {
                Some(minutes) => Duration::try_minutes(minutes)
                    .with_context(|| format!("Service time of {} minutes is out of range", minutes))?,
                None => config.service_duration(),
            };

            let etas = compute_etas(&legs, start_time.unwrap_or_else(Utc::now), service);
            to_json(&etas)
        }
    }
}

fn planner(config: &Config) -> Result<DeliveryPlanner> {
    let routing = create_routing_service(config.mapbox_config())?;
    Ok(DeliveryPlanner::new(
        routing,
        config.optimizer_config(),
        config.service_duration(),
    ))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}
