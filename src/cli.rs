//! CLI argument parsing for the delivery-sequencer binary.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "delivery-sequencer", about = "Single-vehicle delivery stop sequencing")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sequence a precomputed cost matrix and print the tour with its totals
    Optimize {
        /// JSON file with `durations`, `distances` and optional `unit`
        #[arg(long)]
        matrix: PathBuf,
        /// Matrix position of the depot
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// Keep the depot at the front of the tour
        #[arg(long)]
        freeze_first: bool,
        /// Override TWO_OPT_MAX_SWEEPS
        #[arg(long)]
        max_sweeps: Option<usize>,
        /// Report and optimize the closed cycle back to the depot
        #[arg(long)]
        include_return_edge: bool,
    },
    /// Plan a delivery job from a depot and a list of orders
    Plan {
        /// JSON file with `depot`, `orders` and optional `freezeFirst` / `startTime`
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        freeze_first: bool,
        /// Departure time (RFC 3339), defaults to now
        #[arg(long)]
        start_time: Option<DateTime<Utc>>,
    },
    /// Re-sequence the undelivered stops of a planned job
    Recompute {
        /// JSON file with a delivery job
        #[arg(long)]
        job: PathBuf,
        #[arg(long)]
        freeze_first: bool,
        #[arg(long)]
        start_time: Option<DateTime<Utc>>,
    },
    /// Mark one stop of a job as delivered
    Deliver {
        #[arg(long)]
        job: PathBuf,
        #[arg(long)]
        stop: Uuid,
    },
    /// Compute arrival times for an ordered list of legs
    Eta {
        /// JSON array of legs (`durationSec`, optional `distanceMeters` / `geometry`)
        #[arg(long)]
        legs: PathBuf,
        #[arg(long)]
        start_time: Option<DateTime<Utc>>,
        /// Override SERVICE_DURATION_MINUTES
        #[arg(long)]
        service_minutes: Option<i64>,
    },
}
