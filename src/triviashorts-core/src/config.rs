//! Configuration module for loading TOML config files.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the stock behaviour: five multiple-choice questions from a random
//! category, rendered as a 1080x1920 short at 5 fps.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::TriviaError;
use crate::retry::RetryPolicy;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub voice: VoiceConfig,
    pub paths: PathsConfig,
    pub video: VideoConfig,
    pub style: StyleConfig,
}

/// Trivia API endpoint and retry settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Questions per video.
    pub amount: u32,
    pub question_type: String,
    /// Inclusive range of category ids the selector draws from.
    pub category_min: u32,
    pub category_max: u32,
    /// Pin the category instead of drawing one at random.
    pub category: Option<u32>,
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    pub probe_max_attempts: u32,
    pub probe_max_backoff_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://opentdb.com/api.php".to_string(),
            amount: 5,
            question_type: "multiple".to_string(),
            category_min: 9,
            category_max: 32,
            category: None,
            max_attempts: 5,
            initial_backoff_secs: 1,
            probe_max_attempts: 10,
            probe_max_backoff_secs: 30,
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Backoff used by the trivia fetcher.
    pub fn fetch_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.initial_backoff_secs),
        )
    }

    /// Backoff used while probing for a usable category.
    pub fn probe_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.probe_max_attempts,
            Duration::from_secs(self.initial_backoff_secs),
        )
        .with_max_delay(Duration::from_secs(self.probe_max_backoff_secs))
    }
}

/// Voice configuration for TTS.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub voice: String,
    /// Playback rate applied to synthesized speech (1.0 = unchanged).
    pub speed: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice: "bf_emma".to_string(),
            speed: 1.0,
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub output_dir: PathBuf,
    pub ticking_sound: Option<PathBuf>,
    pub end_credit: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            ticking_sound: None,
            end_credit: None,
        }
    }
}

impl PathsConfig {
    pub fn audio_dir(&self) -> PathBuf {
        self.output_dir.join("audio")
    }

    pub fn video_dir(&self) -> PathBuf {
        self.output_dir.join("videos")
    }

    pub fn ticking_sound(&self) -> PathBuf {
        self.ticking_sound
            .clone()
            .unwrap_or_else(|| self.output_dir.join("ticking.mp3"))
    }

    pub fn end_credit(&self) -> PathBuf {
        self.end_credit
            .clone()
            .unwrap_or_else(|| self.output_dir.join("YoutubeTriviaEndCredit.mp4"))
    }
}

/// Output encoding settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub ticking_volume: f32,
    /// Leading part of the output file name.
    pub output_stem: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 5,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            ticking_volume: 0.8,
            output_stem: "trivia_video".to_string(),
        }
    }
}

/// Colours, fonts and banner geometry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Font family resolved through fontconfig.
    pub font: String,
    /// Explicit font file, takes precedence over `font`.
    pub font_file: Option<PathBuf>,
    pub scene_background: Color,
    pub answer_background: Color,
    pub caption_color: Color,
    pub answer_caption_color: Color,
    pub caption_font_size: u32,
    pub banner_height: u32,
    pub banner_font_size: u32,
    pub banner_color: Color,
    pub banner_text_color: Color,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            font: "Arial".to_string(),
            font_file: None,
            scene_background: Color::rgb(224, 247, 250),
            answer_background: Color::rgb(120, 120, 255),
            caption_color: Color::rgb(0x00, 0x33, 0x66),
            answer_caption_color: Color::rgb(255, 255, 255),
            caption_font_size: 70,
            banner_height: 100,
            banner_font_size: 80,
            banner_color: Color::rgb(0x00, 0x33, 0x66),
            banner_text_color: Color::rgb(255, 255, 255),
        }
    }
}

/// An opaque RGB colour, written as `#RRGGBB` in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Colour literal understood by ffmpeg filters.
    pub fn to_ffmpeg(&self) -> String {
        format!("0x{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid colour '{}', expected #RRGGBB", value));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| format!("invalid colour '{}': {}", value, e))
        };
        Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TriviaError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| TriviaError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, TriviaError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| TriviaError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), TriviaError> {
        let fail = |msg: &str| Err(TriviaError::ConfigError(msg.to_string()));

        if self.api.amount == 0 {
            return fail("api.amount must be at least 1");
        }
        if self.api.category_min > self.api.category_max {
            return fail("api.category_min must not exceed api.category_max");
        }
        if self.api.max_attempts == 0 || self.api.probe_max_attempts == 0 {
            return fail("api attempt limits must be at least 1");
        }
        if self.api.timeout_secs == 0 {
            return fail("api.timeout_secs must be at least 1");
        }
        if self.voice.speed.is_nan() || self.voice.speed <= 0.0 {
            return fail("voice.speed must be positive");
        }
        if self.voice.voice.trim().is_empty() {
            return fail("voice.voice cannot be empty");
        }
        if self.video.fps == 0 {
            return fail("video.fps must be non-zero");
        }
        if self.video.width == 0
            || self.video.height == 0
            || self.video.width % 2 != 0
            || self.video.height % 2 != 0
        {
            return fail("video width/height must be non-zero and even");
        }
        if !self.video.ticking_volume.is_finite() || self.video.ticking_volume < 0.0 {
            return fail("video.ticking_volume must be a non-negative number");
        }
        if self.style.caption_font_size == 0 || self.style.banner_font_size == 0 {
            return fail("style font sizes must be non-zero");
        }
        if self.style.banner_height >= self.video.height {
            return fail("style.banner_height must be smaller than the frame");
        }
        Ok(())
    }
}
