//! Application-level configuration loading for the engine tuning knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PROMPT_PARTY_CONFIG_PATH";

/// Immutable engine tuning shared across the application.
#[derive(Debug, Clone)]
pub struct GameTuning {
    /// Length of the image-generation phase.
    pub generating_phase: Duration,
    /// Length of the results phase.
    pub results_phase: Duration,
    /// Minimum time a round must have spent in its current phase before a
    /// transition is taken. Anything earlier is treated as a duplicate
    /// trigger of a transition that already happened.
    pub min_phase_dwell: Duration,
    /// Pause between the last recorded image and the jump to voting, so
    /// final writes settle before clients load the gallery.
    pub generation_settle: Duration,
    /// Grace period between a completed round and the start of the next.
    pub next_round_delay: Duration,
    /// Shortened voting deadline used when a round enters voting with no
    /// votable images.
    pub empty_voting_grace: Duration,
    /// How many times the generation verification step looks for prompts
    /// before failing the round open.
    pub verify_max_attempts: u32,
    /// Base wait of the verification retry; attempt `n` waits `n × base`.
    pub verify_backoff_base: Duration,
    /// Point budget split across the winning images' owners each round.
    pub win_points: i64,
    /// Points every distinct voter receives once per round.
    pub participation_points: i64,
}

impl GameTuning {
    /// Load the tuning from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawTuning>(&contents) {
                Ok(raw) => {
                    let tuning: Self = raw.into();
                    info!(path = %path.display(), "loaded engine tuning from config");
                    tuning
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for GameTuning {
    fn default() -> Self {
        RawTuning::default().into()
    }
}

/// JSON representation of the tuning file located at [`DEFAULT_CONFIG_PATH`].
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawTuning {
    generating_phase_secs: u64,
    results_phase_secs: u64,
    min_phase_dwell_ms: u64,
    generation_settle_ms: u64,
    next_round_delay_secs: u64,
    empty_voting_grace_secs: u64,
    verify_max_attempts: u32,
    verify_backoff_base_ms: u64,
    win_points: i64,
    participation_points: i64,
}

impl Default for RawTuning {
    fn default() -> Self {
        Self {
            generating_phase_secs: 45,
            results_phase_secs: 12,
            min_phase_dwell_ms: 1_000,
            generation_settle_ms: 2_000,
            next_round_delay_secs: 5,
            empty_voting_grace_secs: 3,
            verify_max_attempts: 3,
            verify_backoff_base_ms: 2_000,
            win_points: 100,
            participation_points: 10,
        }
    }
}

impl From<RawTuning> for GameTuning {
    fn from(value: RawTuning) -> Self {
        Self {
            generating_phase: Duration::from_secs(value.generating_phase_secs),
            results_phase: Duration::from_secs(value.results_phase_secs),
            min_phase_dwell: Duration::from_millis(value.min_phase_dwell_ms),
            generation_settle: Duration::from_millis(value.generation_settle_ms),
            next_round_delay: Duration::from_secs(value.next_round_delay_secs),
            empty_voting_grace: Duration::from_secs(value.empty_voting_grace_secs),
            verify_max_attempts: value.verify_max_attempts,
            verify_backoff_base: Duration::from_millis(value.verify_backoff_base_ms),
            win_points: value.win_points,
            participation_points: value.participation_points,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
