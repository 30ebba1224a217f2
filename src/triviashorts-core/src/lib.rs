//! TriviaShorts Core Library
//!
//! Fetches trivia questions, narrates them with a TTS model and renders a
//! vertical short-form quiz video.

pub mod api;
pub mod category;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod item;
pub mod media;
pub mod pipeline;
pub mod render;
pub mod retry;
pub mod scene;
pub mod text;
pub mod tts;

pub use api::{HttpTransport, TriviaQuery, TriviaTransport};
pub use config::Config;
pub use error::TriviaError;
pub use item::TriviaItem;
pub use media::{FfprobeProbe, MediaProbe};
pub use pipeline::{PipelineEvent, RunSummary, Stage, TriviaPipeline};
pub use render::{FfmpegBackend, VideoBackend};
pub use tts::{KokoroEngine, SpeechEngine};
