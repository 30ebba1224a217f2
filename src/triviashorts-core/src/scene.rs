//! Scene composition: turns questions and their narration into timed segments.
//!
//! Every segment takes its length from its audio track, so picture and sound
//! never drift apart. The category banner is rebuilt for each segment with
//! that segment's duration.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{Color, StyleConfig};
use crate::error::TriviaError;
use crate::item::TriviaItem;
use crate::media::MediaProbe;
use crate::tts::AudioTriple;

/// Segments produced per question.
pub const SEGMENTS_PER_ITEM: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Question,
    Options,
    Timer,
    Answer,
    EndCredit,
}

/// Something drawn on top of a scene background.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    /// Full-width bar pinned to the top of the frame.
    Banner {
        text: String,
        height: u32,
        font_size: u32,
        color: Color,
        background: Color,
    },
    /// Centred caption covering the frame.
    Caption {
        text: String,
        font_size: u32,
        color: Color,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub layer: Layer,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub path: PathBuf,
    /// Gain applied on mix-down (1.0 = unchanged).
    pub volume: f32,
}

/// A flat background with overlays and a single audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub background: Color,
    pub overlays: Vec<Overlay>,
    pub audio: AudioTrack,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentSource {
    Scene(Scene),
    /// A pre-rendered video file used as is.
    Clip { path: PathBuf, has_audio: bool },
}

/// One renderable unit of the final video.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Question this segment belongs to; `None` for the end credit.
    pub item_index: Option<usize>,
    pub duration: f64,
    pub source: SegmentSource,
}

impl Segment {
    pub fn scene(&self) -> Option<&Scene> {
        match &self.source {
            SegmentSource::Scene(scene) => Some(scene),
            SegmentSource::Clip { .. } => None,
        }
    }
}

/// Builds the question, options, timer and answer segments.
pub struct SceneComposer<'a> {
    probe: &'a dyn MediaProbe,
    style: &'a StyleConfig,
    category: String,
    ticking_sound: PathBuf,
    ticking_volume: f32,
}

impl<'a> SceneComposer<'a> {
    pub fn new(
        probe: &'a dyn MediaProbe,
        style: &'a StyleConfig,
        category: impl Into<String>,
        ticking_sound: impl Into<PathBuf>,
        ticking_volume: f32,
    ) -> Self {
        Self {
            probe,
            style,
            category: category.into(),
            ticking_sound: ticking_sound.into(),
            ticking_volume,
        }
    }

    /// Segments for every question, in question order.
    pub fn compose_all(
        &self,
        items: &[TriviaItem],
        audio_files: &[AudioTriple],
    ) -> Result<Vec<Segment>, TriviaError> {
        if items.len() != audio_files.len() {
            return Err(TriviaError::MediaError(format!(
                "{} questions but {} narration sets",
                items.len(),
                audio_files.len()
            )));
        }

        let timer_duration = self.probe.duration(&self.ticking_sound)?;
        let mut segments = Vec::with_capacity(items.len() * SEGMENTS_PER_ITEM);

        for (index, (item, audio)) in items.iter().zip(audio_files).enumerate() {
            segments.extend(self.compose_item(index, item, audio, timer_duration)?);
        }

        debug!(count = segments.len(), "Composed segments");
        Ok(segments)
    }

    fn compose_item(
        &self,
        index: usize,
        item: &TriviaItem,
        audio: &AudioTriple,
        timer_duration: f64,
    ) -> Result<[Segment; SEGMENTS_PER_ITEM], TriviaError> {
        let style = self.style;
        let options_caption = item.options_caption();

        let question = self.segment(
            SegmentKind::Question,
            index,
            style.scene_background,
            &item.question,
            style.caption_color,
            self.narration(&audio.question),
            self.probe.duration(&audio.question)?,
        );
        let options = self.segment(
            SegmentKind::Options,
            index,
            style.scene_background,
            &options_caption,
            style.caption_color,
            self.narration(&audio.options),
            self.probe.duration(&audio.options)?,
        );
        let timer = self.segment(
            SegmentKind::Timer,
            index,
            style.scene_background,
            &options_caption,
            style.caption_color,
            AudioTrack {
                path: self.ticking_sound.clone(),
                volume: self.ticking_volume,
            },
            timer_duration,
        );
        let answer = self.segment(
            SegmentKind::Answer,
            index,
            style.answer_background,
            &item.answer_caption(),
            style.answer_caption_color,
            self.narration(&audio.answer),
            self.probe.duration(&audio.answer)?,
        );

        Ok([question, options, timer, answer])
    }

    #[allow(clippy::too_many_arguments)]
    fn segment(
        &self,
        kind: SegmentKind,
        index: usize,
        background: Color,
        caption: &str,
        caption_color: Color,
        audio: AudioTrack,
        duration: f64,
    ) -> Segment {
        let caption = Overlay {
            layer: Layer::Caption {
                text: caption.to_string(),
                font_size: self.style.caption_font_size,
                color: caption_color,
            },
            duration,
        };

        Segment {
            kind,
            item_index: Some(index),
            duration,
            source: SegmentSource::Scene(Scene {
                background,
                overlays: vec![self.category_banner(duration), caption],
                audio,
            }),
        }
    }

    /// The category bar, sized to a single segment.
    pub fn category_banner(&self, duration: f64) -> Overlay {
        Overlay {
            layer: Layer::Banner {
                text: self.category.clone(),
                height: self.style.banner_height,
                font_size: self.style.banner_font_size,
                color: self.style.banner_text_color,
                background: self.style.banner_color,
            },
            duration,
        }
    }

    fn narration(&self, path: &Path) -> AudioTrack {
        AudioTrack {
            path: path.to_path_buf(),
            volume: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::testing::TableProbe;

    fn item(n: usize) -> TriviaItem {
        TriviaItem {
            question: format!("Question {}?", n),
            correct_answer: "B".to_string(),
            answer_options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_index: 1,
        }
    }

    #[test]
    fn test_four_segments_in_order_with_audio_driven_durations() {
        let style = StyleConfig::default();
        let dir = Path::new("out/audio");
        let audio = vec![AudioTriple::for_index(dir, 0)];
        let probe = TableProbe::new(1.0)
            .with(&audio[0].question, 2.5)
            .with(&audio[0].options, 4.0)
            .with(&audio[0].answer, 1.75)
            .with("out/ticking.mp3", 5.0);
        let composer = SceneComposer::new(&probe, &style, "Science", "out/ticking.mp3", 0.8);

        let segments = composer.compose_all(&[item(0)], &audio).unwrap();

        let kinds: Vec<_> = segments.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SegmentKind::Question,
                SegmentKind::Options,
                SegmentKind::Timer,
                SegmentKind::Answer
            ]
        );
        let durations: Vec<_> = segments.iter().map(|s| s.duration).collect();
        assert_eq!(durations, vec![2.5, 4.0, 5.0, 1.75]);

        let timer = segments[2].scene().unwrap();
        assert_eq!(timer.audio.path, PathBuf::from("out/ticking.mp3"));
        assert_eq!(timer.audio.volume, 0.8);
        assert_eq!(
            segments[1].scene().unwrap().overlays[1],
            Overlay {
                layer: timer.overlays[1].layer.clone(),
                duration: 4.0
            }
        );
    }

    #[test]
    fn test_banner_matches_each_segment_duration() {
        let style = StyleConfig::default();
        let audio: Vec<_> = (0..3).map(|i| AudioTriple::for_index(Path::new("a"), i)).collect();
        let mut probe = TableProbe::new(3.0).with("tick.mp3", 6.0);
        for (i, triple) in audio.iter().enumerate() {
            probe = probe.with(&triple.question, 1.0 + i as f64);
        }
        let composer = SceneComposer::new(&probe, &style, "History", "tick.mp3", 0.8);

        let items: Vec<_> = (0..3).map(item).collect();
        let segments = composer.compose_all(&items, &audio).unwrap();
        assert_eq!(segments.len(), 3 * SEGMENTS_PER_ITEM);

        for segment in &segments {
            let scene = segment.scene().unwrap();
            match &scene.overlays[0].layer {
                Layer::Banner { text, height, .. } => {
                    assert_eq!(text, "History");
                    assert_eq!(*height, 100);
                }
                other => panic!("expected banner first, got {:?}", other),
            }
            for overlay in &scene.overlays {
                assert_eq!(overlay.duration, segment.duration);
            }
        }
    }

    #[test]
    fn test_answer_scene_style() {
        let style = StyleConfig::default();
        let audio = vec![AudioTriple::for_index(Path::new("a"), 0)];
        let probe = TableProbe::new(2.0);
        let composer = SceneComposer::new(&probe, &style, "Art", "tick.mp3", 0.8);

        let segments = composer.compose_all(&[item(0)], &audio).unwrap();
        let answer = segments[3].scene().unwrap();

        assert_eq!(answer.background, style.answer_background);
        assert_eq!(answer.audio.path, audio[0].answer);
        match &answer.overlays[1].layer {
            Layer::Caption { text, color, .. } => {
                assert_eq!(text, "The correct answer is:\n\nB\n(Option 2)");
                assert_eq!(*color, style.answer_caption_color);
            }
            other => panic!("expected caption, got {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_inputs_rejected() {
        let style = StyleConfig::default();
        let probe = TableProbe::new(1.0);
        let composer = SceneComposer::new(&probe, &style, "Art", "tick.mp3", 0.8);
        assert!(composer.compose_all(&[item(0)], &[]).is_err());
    }
}
