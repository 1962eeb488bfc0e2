use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use arit_core::ConfigError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::staircase::{SsdController, StaircaseBounds, StaircaseState};

/// Task parameters as written in a config file. Every field has a default,
/// so an empty JSON object is a valid file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub participant_id: String,
    /// "staircase" or "fixed"
    pub method: String,
    /// "random" or "sequential"
    pub trial_order: String,
    pub practice_trials: bool,
    pub test_go_block: bool,
    pub test_mixed_blocks: usize,
    pub count_down: bool,
    pub trial_feedback: bool,

    pub step_size: f64,
    pub lowest_ssd: f64,
    pub highest_ssd: f64,
    pub initial_ssd: f64,

    pub trial_length: f64,
    /// Target line position as a fraction of the bar (and of the trial).
    pub target_fraction: f64,
    pub inter_trial_interval: f64,
    pub jitter_min: f64,
    pub jitter_max: f64,
    pub jitter_step: f64,
    pub countdown_secs: f64,
    pub block_break_min_secs: f64,

    pub bar_height_cm: f64,
    pub bar_width_cm: f64,
    pub pixels_per_cm: f64,
    pub color_blind_palette: bool,
    pub response_key: String,
    pub full_screen: bool,
    pub font_path: Option<PathBuf>,

    pub conditions_dir: PathBuf,
    pub output_dir: PathBuf,
    /// "tsv" or "csv"
    pub output_format: String,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            participant_id: "0000".to_string(),
            method: "staircase".to_string(),
            trial_order: "random".to_string(),
            practice_trials: true,
            test_go_block: true,
            test_mixed_blocks: 3,
            count_down: false,
            trial_feedback: true,
            step_size: 0.025,
            lowest_ssd: 0.05,
            highest_ssd: 0.775,
            initial_ssd: 0.5,
            trial_length: 1.0,
            target_fraction: 0.8,
            inter_trial_interval: 2.0,
            jitter_min: 0.5,
            jitter_max: 1.0,
            jitter_step: 0.05,
            countdown_secs: 3.0,
            block_break_min_secs: 3.0,
            bar_height_cm: 15.0,
            bar_width_cm: 3.0,
            pixels_per_cm: 37.8,
            color_blind_palette: false,
            response_key: "space".to_string(),
            full_screen: true,
            font_path: None,
            conditions_dir: PathBuf::from("conditions"),
            output_dir: PathBuf::from("data"),
            output_format: "tsv".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode config: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TaskConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the parameters as pretty JSON that [`TaskConfig::load`] reads back.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigFileError> {
        let path = path.as_ref();
        let write_err = |source| ConfigFileError::Write {
            path: path.to_path_buf(),
            source,
        };
        let text = serde_json::to_string_pretty(self).map_err(ConfigFileError::Encode)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, text).map_err(write_err)
    }

    /// Checks every parameter and resolves the named options.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let method = self.method.parse::<SsdMethod>()?;
        let order = self.trial_order.parse::<TrialOrder>()?;
        let output_format = self.output_format.parse::<OutputFormat>()?;

        let bounds = StaircaseBounds::new(self.lowest_ssd, self.highest_ssd, self.step_size)?;
        // Checked under both methods.
        let staircase = StaircaseState::new(self.initial_ssd, bounds)?;

        if !(self.trial_length > 0.0) {
            return Err(ConfigError::NonPositiveTrialLength(self.trial_length));
        }
        if self.highest_ssd >= self.trial_length {
            return Err(ConfigError::StopDelayOutsideTrial {
                upper: self.highest_ssd,
                trial_length: self.trial_length,
            });
        }
        let target_time = self.target_fraction * self.trial_length;
        if !(target_time > 0.0 && target_time <= self.trial_length) {
            return Err(ConfigError::TargetOutsideTrial {
                target: target_time,
                trial_length: self.trial_length,
            });
        }
        for (field, value) in [
            ("inter_trial_interval", self.inter_trial_interval),
            ("countdown_secs", self.countdown_secs),
            ("block_break_min_secs", self.block_break_min_secs),
            ("jitter_min", self.jitter_min),
        ] {
            if value < 0.0 {
                return Err(ConfigError::NegativeDuration { field, value });
            }
        }
        let jitter_choices = jitter_choices(self.jitter_min, self.jitter_max, self.jitter_step);
        if jitter_choices.is_empty() {
            return Err(ConfigError::EmptyJitterRange);
        }
        if self.test_mixed_blocks == 0 {
            return Err(ConfigError::NoTestBlocks);
        }

        Ok(ValidatedConfig {
            participant_id: self.participant_id.clone(),
            method,
            order,
            plan: BlockPlan {
                practice: self.practice_trials,
                test_go: self.test_go_block,
                test_mixed_reps: self.test_mixed_blocks,
            },
            count_down: self.count_down,
            trial_feedback: self.trial_feedback,
            staircase,
            timing: TaskTiming {
                trial_length: self.trial_length,
                target_time,
                inter_trial_interval: self.inter_trial_interval,
                jitter_choices,
                countdown: self.countdown_secs,
                block_break_min: self.block_break_min_secs,
            },
            presentation: Presentation {
                bar_height_cm: self.bar_height_cm,
                bar_width_cm: self.bar_width_cm,
                target_cm: self.target_fraction * self.bar_height_cm,
                pixels_per_cm: self.pixels_per_cm,
                palette: if self.color_blind_palette {
                    Palette::COLOR_BLIND
                } else {
                    Palette::STANDARD
                },
                response_key: self.response_key.clone(),
                full_screen: self.full_screen,
                font_path: self.font_path.clone(),
            },
            conditions_dir: self.conditions_dir.clone(),
            output_dir: self.output_dir.clone(),
            output_format,
        })
    }
}

// Same grid as a half-open arange: min, min + step, ... while < max.
fn jitter_choices(min: f64, max: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || !(min <= max) {
        return Vec::new();
    }
    let count = ((max - min) / step - 1e-9).ceil().max(0.0) as usize;
    let choices: Vec<f64> = (0..count).map(|i| min + i as f64 * step).collect();
    if choices.is_empty() {
        vec![min]
    } else {
        choices
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsdMethod {
    Staircase,
    Fixed,
}

impl FromStr for SsdMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staircase" | "adaptive" => Ok(SsdMethod::Staircase),
            "fixed" => Ok(SsdMethod::Fixed),
            _ => Err(ConfigError::UnknownMethod(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOrder {
    Random,
    Sequential,
}

impl FromStr for TrialOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(TrialOrder::Random),
            "sequential" => Ok(TrialOrder::Sequential),
            _ => Err(ConfigError::UnknownOrder(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Tsv,
    Csv,
}

impl OutputFormat {
    pub fn delimiter(self) -> u8 {
        match self {
            OutputFormat::Tsv => b'\t',
            OutputFormat::Csv => b',',
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Tsv => "txt",
            OutputFormat::Csv => "csv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tsv" | "txt" => Ok(OutputFormat::Tsv),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(ConfigError::UnknownOutputFormat(s.to_string())),
        }
    }
}

/// Which blocks run, before the mandatory test mixed blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    pub practice: bool,
    pub test_go: bool,
    pub test_mixed_reps: usize,
}

/// Durations in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTiming {
    pub trial_length: f64,
    pub target_time: f64,
    pub inter_trial_interval: f64,
    pub jitter_choices: Vec<f64>,
    pub countdown: f64,
    pub block_break_min: f64,
}

/// Four feedback colours, from on-target to off-target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette(pub [[u8; 4]; 4]);

impl Palette {
    pub const STANDARD: Palette = Palette([
        [0, 128, 0, 255],
        [255, 255, 0, 255],
        [255, 165, 0, 255],
        [255, 0, 0, 255],
    ]);
    pub const COLOR_BLIND: Palette = Palette([
        [0x00, 0x9E, 0x73, 255],
        [0xF0, 0xE4, 0x42, 255],
        [0xE6, 0x9F, 0x00, 255],
        [0xD5, 0x5E, 0x00, 255],
    ]);
    pub const NEUTRAL: [u8; 4] = [128, 128, 128, 255];

    pub fn best(&self) -> [u8; 4] {
        self.0[0]
    }

    pub fn worst(&self) -> [u8; 4] {
        self.0[3]
    }

    pub fn get(&self, index: usize) -> [u8; 4] {
        self.0[index.min(3)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub bar_height_cm: f64,
    pub bar_width_cm: f64,
    pub target_cm: f64,
    pub pixels_per_cm: f64,
    pub palette: Palette,
    pub response_key: String,
    pub full_screen: bool,
    pub font_path: Option<PathBuf>,
}

/// Configuration that passed [`TaskConfig::validate`]
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub participant_id: String,
    pub method: SsdMethod,
    pub order: TrialOrder,
    pub plan: BlockPlan,
    pub count_down: bool,
    pub trial_feedback: bool,
    pub staircase: StaircaseState,
    pub timing: TaskTiming,
    pub presentation: Presentation,
    pub conditions_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_format: OutputFormat,
}

impl ValidatedConfig {
    pub fn controller(&self) -> SsdController {
        match self.method {
            SsdMethod::Fixed => SsdController::Fixed,
            SsdMethod::Staircase => SsdController::Adaptive(self.staircase.clone()),
        }
    }
}
