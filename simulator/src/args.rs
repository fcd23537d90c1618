use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deterministic sql-driver-core workload simulator")]
pub(crate) struct Args {
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) duration: Option<Duration>,
    #[arg(long)]
    pub(crate) iterations: Option<u64>,
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Independent sessions, each over its own scripted engine.
    #[arg(long, default_value_t = 4)]
    pub(crate) sessions: usize,
    #[arg(long, default_value_t = 0.25)]
    pub(crate) batch_rate: f64,
    #[arg(long, default_value_t = 0.15)]
    pub(crate) lob_rate: f64,
    #[arg(long, default_value_t = 0.10)]
    pub(crate) escape_rate: f64,
    #[arg(long, default_value_t = 0.05)]
    pub(crate) sleep_rate: f64,
    /// Batch entry at which the engine stops, if any.
    #[arg(long)]
    pub(crate) fail_batch_at: Option<usize>,
    #[arg(long, default_value_t = 8)]
    pub(crate) max_batch: usize,
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    #[arg(long)]
    pub(crate) quick: bool,
    #[arg(long)]
    pub(crate) stress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimConfig {
    pub(crate) duration_ms: Option<u64>,
    pub(crate) iterations: Option<u64>,
    pub(crate) seed: u64,
    pub(crate) sessions: usize,
    pub(crate) batch_rate: f64,
    pub(crate) lob_rate: f64,
    pub(crate) escape_rate: f64,
    pub(crate) sleep_rate: f64,
    pub(crate) fail_batch_at: Option<usize>,
    pub(crate) max_batch: usize,
    pub(crate) log: Option<PathBuf>,
    pub(crate) preset: Option<String>,
    pub(crate) first_steps: usize,
    pub(crate) tail_steps: usize,
}

impl SimConfig {
    pub(crate) fn from_args(args: Args) -> Self {
        let mut config = SimConfig {
            duration_ms: args.duration.map(|d| d.as_millis() as u64),
            iterations: args.iterations,
            seed: args.seed.unwrap_or_else(random_seed),
            sessions: args.sessions.max(1),
            batch_rate: clamp_rate(args.batch_rate),
            lob_rate: clamp_rate(args.lob_rate),
            escape_rate: clamp_rate(args.escape_rate),
            sleep_rate: clamp_rate(args.sleep_rate),
            fail_batch_at: args.fail_batch_at,
            max_batch: args.max_batch.max(1),
            log: args.log,
            preset: None,
            first_steps: 30,
            tail_steps: 80,
        };

        if args.quick {
            config.apply_quick();
        }
        if args.stress {
            config.apply_stress();
        }

        config
    }

    fn apply_quick(&mut self) {
        self.preset = Some("quick".to_string());
        self.iterations = Some(5_000);
        self.duration_ms = None;
        self.sessions = 2;
        self.batch_rate = 0.2;
        self.lob_rate = 0.1;
        self.max_batch = 4;
    }

    fn apply_stress(&mut self) {
        self.preset = Some("stress".to_string());
        self.iterations = Some(200_000);
        self.duration_ms = None;
        self.sessions = 16;
        self.batch_rate = 0.35;
        self.lob_rate = 0.25;
        self.escape_rate = 0.2;
        self.fail_batch_at = self.fail_batch_at.or(Some(5));
        self.max_batch = 12;
    }
}

fn clamp_rate(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    now.as_secs() ^ (now.subsec_nanos() as u64)
}
