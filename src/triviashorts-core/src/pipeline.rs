//! Pipeline orchestration.
//!
//! Runs the stages strictly in order: fetch, synthesize, compose, render,
//! cleanup. The only early exit is after fetching: no questions, no video.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::api::{TriviaQuery, TriviaTransport};
use crate::category::CategorySelector;
use crate::cleanup::cleanup_audio_files;
use crate::config::Config;
use crate::error::TriviaError;
use crate::fetcher::TriviaFetcher;
use crate::item::TriviaItem;
use crate::media::MediaProbe;
use crate::render::{EncodeSettings, RenderedVideo, VideoBackend, VideoRenderer, unix_timestamp};
use crate::scene::SceneComposer;
use crate::tts::{AudioTriple, SpeechEngine, SpeechSynthesizer};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Synthesize,
    Compose,
    Render,
    Cleanup,
}

impl Stage {
    pub fn display_name(&self) -> &str {
        match self {
            Stage::Fetch => "Fetching trivia",
            Stage::Synthesize => "Synthesizing narration",
            Stage::Compose => "Composing scenes",
            Stage::Render => "Rendering video",
            Stage::Cleanup => "Cleaning up",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Events emitted while the pipeline runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A stage is starting.
    StageStarted(Stage),
    /// The category probe settled on a category.
    CategorySelected {
        label: String,
        category_id: u32,
        url: String,
    },
    /// Questions are ready.
    TriviaFetched { count: usize },
    /// Narration files were written.
    AudioSynthesized { files: usize },
    /// The scene list is complete.
    SegmentsComposed { count: usize },
    /// The final video is on disk.
    VideoSaved { path: PathBuf },
    /// An intermediate narration file was removed.
    AudioDeleted { path: PathBuf },
    /// All stages completed.
    Finished,
}

/// Callback for pipeline events.
pub type PipelineCallback = Box<dyn Fn(PipelineEvent) + Send + Sync>;

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub category: String,
    pub video_path: PathBuf,
    pub item_count: usize,
    pub segment_count: usize,
    pub deleted_audio: Vec<PathBuf>,
}

/// Drives one trivia video from API query to MP4.
///
/// The heavy resources (TTS model, encoder) are created by the caller and
/// lent to the pipeline.
pub struct TriviaPipeline<'a> {
    config: Config,
    transport: Arc<dyn TriviaTransport>,
    speech: &'a mut dyn SpeechEngine,
    probe: &'a dyn MediaProbe,
    video: &'a dyn VideoBackend,
    callback: Option<PipelineCallback>,
}

impl<'a> TriviaPipeline<'a> {
    pub fn new(
        config: Config,
        transport: Arc<dyn TriviaTransport>,
        speech: &'a mut dyn SpeechEngine,
        probe: &'a dyn MediaProbe,
        video: &'a dyn VideoBackend,
    ) -> Self {
        Self {
            config,
            transport,
            speech,
            probe,
            video,
            callback: None,
        }
    }

    /// Set a callback for pipeline events.
    pub fn with_callback(mut self, callback: PipelineCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Run every stage once.
    ///
    /// Narration files are removed whether or not compose and render succeed.
    pub async fn run(&mut self) -> Result<RunSummary, TriviaError> {
        self.prepare()?;

        self.emit_event(PipelineEvent::StageStarted(Stage::Fetch));
        let query = CategorySelector::new(self.transport.clone(), &self.config.api)
            .select()
            .await?;
        self.emit_event(PipelineEvent::CategorySelected {
            label: query.label.clone(),
            category_id: query.category_id,
            url: query.url(),
        });

        let items = TriviaFetcher::new(self.transport.clone(), self.config.api.fetch_retry())
            .fetch(&query)
            .await;
        if items.is_empty() {
            return Err(TriviaError::NoTrivia);
        }
        self.emit_event(PipelineEvent::TriviaFetched { count: items.len() });

        self.emit_event(PipelineEvent::StageStarted(Stage::Synthesize));
        let mut synthesizer = SpeechSynthesizer::new(
            &mut *self.speech,
            self.config.voice.clone(),
            self.config.paths.audio_dir(),
        );
        let audio_files = match synthesizer.synthesize_all(&items) {
            Ok(files) => files,
            Err(e) => {
                // Files written before the failure are not tracked; sweep by name.
                let partial: Vec<_> = (0..items.len())
                    .map(|i| AudioTriple::for_index(&self.config.paths.audio_dir(), i))
                    .collect();
                cleanup_audio_files(&partial);
                return Err(e);
            }
        };
        self.emit_event(PipelineEvent::AudioSynthesized {
            files: audio_files.len() * 3,
        });

        let rendered = self.compose_and_render(&query, &items, &audio_files);

        self.emit_event(PipelineEvent::StageStarted(Stage::Cleanup));
        let deleted_audio = cleanup_audio_files(&audio_files);
        for path in &deleted_audio {
            self.emit_event(PipelineEvent::AudioDeleted { path: path.clone() });
        }
        let rendered = rendered?;

        self.emit_event(PipelineEvent::Finished);
        Ok(RunSummary {
            category: query.label,
            video_path: rendered.path,
            item_count: items.len(),
            segment_count: rendered.segment_count,
            deleted_audio,
        })
    }

    fn compose_and_render(
        &self,
        query: &TriviaQuery,
        items: &[TriviaItem],
        audio_files: &[AudioTriple],
    ) -> Result<RenderedVideo, TriviaError> {
        self.emit_event(PipelineEvent::StageStarted(Stage::Compose));
        let segments = SceneComposer::new(
            self.probe,
            &self.config.style,
            query.label.as_str(),
            self.config.paths.ticking_sound(),
            self.config.video.ticking_volume,
        )
        .compose_all(items, audio_files)?;
        self.emit_event(PipelineEvent::SegmentsComposed {
            count: segments.len(),
        });

        self.emit_event(PipelineEvent::StageStarted(Stage::Render));
        let rendered = VideoRenderer::new(
            self.video,
            self.probe,
            EncodeSettings::from(&self.config.video),
            self.config.paths.video_dir(),
            self.config.paths.end_credit(),
            self.config.video.output_stem.as_str(),
        )
        .render(segments, &query.label, unix_timestamp())?;
        info!(path = %rendered.path.display(), "Video saved");
        self.emit_event(PipelineEvent::VideoSaved {
            path: rendered.path.clone(),
        });
        Ok(rendered)
    }

    /// Check the configuration, create output directories and make sure the
    /// fixed assets exist.
    fn prepare(&self) -> Result<(), TriviaError> {
        self.config.validate()?;

        let paths = &self.config.paths;
        std::fs::create_dir_all(paths.audio_dir())?;
        std::fs::create_dir_all(paths.video_dir())?;

        for asset in [paths.ticking_sound(), paths.end_credit()] {
            if !asset.is_file() {
                return Err(TriviaError::MissingAsset(asset));
            }
        }
        Ok(())
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: PipelineEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}
