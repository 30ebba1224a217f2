//! Video rendering: concatenate all segments plus the end credit into one MP4.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::config::{StyleConfig, VideoConfig};
use crate::error::TriviaError;
use crate::media::MediaProbe;
use crate::scene::{Layer, Scene, Segment, SegmentKind, SegmentSource};
use crate::text::wrap_caption;

/// Sample rate every segment's audio is resampled to before concatenation.
const MIX_SAMPLE_RATE: u32 = 44_100;

/// Frame geometry and codecs of the final file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub audio_codec: String,
}

impl EncodeSettings {
    pub fn validate(&self) -> Result<(), TriviaError> {
        if self.width == 0 || self.height == 0 {
            return Err(TriviaError::MediaError(
                "encode width/height must be non-zero".to_string(),
            ));
        }
        if self.fps == 0 {
            return Err(TriviaError::MediaError("encode fps must be non-zero".to_string()));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            // yuv420p output needs even dimensions
            return Err(TriviaError::MediaError(
                "encode width/height must be even".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&VideoConfig> for EncodeSettings {
    fn from(config: &VideoConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
        }
    }
}

/// Turns an ordered timeline into a video file.
pub trait VideoBackend {
    fn encode(
        &self,
        timeline: &[Segment],
        settings: &EncodeSettings,
        out_path: &Path,
    ) -> Result<(), TriviaError>;
}

/// Result of a successful render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedVideo {
    pub path: PathBuf,
    pub segment_count: usize,
    pub duration: f64,
}

/// Appends the end credit, names the output and hands the timeline to a backend.
pub struct VideoRenderer<'a> {
    backend: &'a dyn VideoBackend,
    probe: &'a dyn MediaProbe,
    settings: EncodeSettings,
    video_dir: PathBuf,
    end_credit: PathBuf,
    output_stem: String,
}

impl<'a> VideoRenderer<'a> {
    pub fn new(
        backend: &'a dyn VideoBackend,
        probe: &'a dyn MediaProbe,
        settings: EncodeSettings,
        video_dir: impl Into<PathBuf>,
        end_credit: impl Into<PathBuf>,
        output_stem: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            probe,
            settings,
            video_dir: video_dir.into(),
            end_credit: end_credit.into(),
            output_stem: output_stem.into(),
        }
    }

    /// The segments followed by the end credit clip.
    pub fn timeline(&self, mut segments: Vec<Segment>) -> Result<Vec<Segment>, TriviaError> {
        segments.push(Segment {
            kind: SegmentKind::EndCredit,
            item_index: None,
            duration: self.probe.duration(&self.end_credit)?,
            source: SegmentSource::Clip {
                path: self.end_credit.clone(),
                has_audio: self.probe.has_audio(&self.end_credit)?,
            },
        });
        Ok(segments)
    }

    /// Where the video for `category` rendered at `timestamp` is written.
    pub fn output_path(&self, category: &str, timestamp: u64) -> PathBuf {
        self.video_dir
            .join(output_file_name(&self.output_stem, category, timestamp))
    }

    pub fn render(
        &self,
        segments: Vec<Segment>,
        category: &str,
        timestamp: u64,
    ) -> Result<RenderedVideo, TriviaError> {
        self.settings.validate()?;
        let timeline = self.timeline(segments)?;
        let path = self.output_path(category, timestamp);

        info!(
            path = %path.display(),
            segments = timeline.len(),
            "Rendering video"
        );
        self.backend.encode(&timeline, &self.settings, &path)?;

        Ok(RenderedVideo {
            segment_count: timeline.len(),
            duration: timeline.iter().map(|s| s.duration).sum(),
            path,
        })
    }
}

/// `{stem}_{category}_{timestamp}.mp4`; anything after the first dot of
/// `stem` is dropped.
pub fn output_file_name(stem: &str, category: &str, timestamp: u64) -> String {
    let stem = stem.split('.').next().unwrap_or(stem);
    format!("{}_{}_{}.mp4", stem, category, timestamp)
}

/// Seconds since the Unix epoch.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Backend driving the system `ffmpeg` binary.
///
/// Each scene is encoded to its own file in a temporary directory, then all
/// files are scaled/padded to the frame size and concatenated.
pub struct FfmpegBackend {
    style: StyleConfig,
}

/// One input of the final concatenation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatInput {
    pub path: PathBuf,
    pub duration: f64,
    pub has_audio: bool,
}

impl FfmpegBackend {
    pub fn new(style: StyleConfig) -> Result<Self, TriviaError> {
        if !is_ffmpeg_on_path() {
            return Err(TriviaError::MediaError(
                "ffmpeg is required for MP4 encoding, but was not found on PATH".to_string(),
            ));
        }
        Ok(Self::with_style(style))
    }

    /// Skip the PATH check; used when only building command lines.
    pub fn with_style(style: StyleConfig) -> Self {
        Self { style }
    }

    fn render_scene(
        &self,
        scene: &Scene,
        duration: f64,
        settings: &EncodeSettings,
        work_dir: &Path,
        index: usize,
    ) -> Result<PathBuf, TriviaError> {
        let lines = scene_lines(scene, settings);
        let mut text_files = Vec::with_capacity(lines.len());
        for (layer, layer_lines) in lines.iter().enumerate() {
            let mut files = Vec::with_capacity(layer_lines.len());
            for (line, text) in layer_lines.iter().enumerate() {
                let path = work_dir.join(format!("seg_{:03}_{}_{}.txt", index, layer, line));
                std::fs::write(&path, text)?;
                files.push(path);
            }
            text_files.push(files);
        }

        let out = work_dir.join(format!("seg_{:03}.mp4", index));
        let args = self.scene_args(scene, duration, settings, &lines, &text_files, &out);
        run_ffmpeg(&args)?;
        Ok(out)
    }

    /// Command line encoding one scene.
    pub fn scene_args(
        &self,
        scene: &Scene,
        duration: f64,
        settings: &EncodeSettings,
        lines: &[Vec<String>],
        text_files: &[Vec<PathBuf>],
        out: &Path,
    ) -> Vec<String> {
        let seconds = format_seconds(duration);
        let color_source = format!(
            "color=c={}:s={}x{}:r={}:d={}",
            scene.background.to_ffmpeg(),
            settings.width,
            settings.height,
            settings.fps,
            seconds
        );
        let filter = format!(
            "[0:v]{}[v];[1:a]volume={},apad,atrim=0:{}[a]",
            self.scene_video_filter(scene, settings, lines, text_files),
            scene.audio.volume,
            seconds
        );

        let mut args: Vec<String> = vec!["-y".into(), "-loglevel".into(), "error".into()];
        args.extend(["-f".into(), "lavfi".into(), "-i".into(), color_source]);
        args.extend(["-i".into(), path_arg(&scene.audio.path)]);
        args.extend(["-filter_complex".into(), filter]);
        args.extend(["-map".into(), "[v]".into(), "-map".into(), "[a]".into()]);
        args.extend(["-t".into(), seconds]);
        args.extend(["-c:v".into(), settings.video_codec.clone()]);
        args.extend(["-pix_fmt".into(), "yuv420p".into()]);
        args.extend(["-c:a".into(), settings.audio_codec.clone()]);
        args.extend(["-ar".into(), MIX_SAMPLE_RATE.to_string(), "-ac".into(), "2".into()]);
        args.push(path_arg(out));
        args
    }

    fn scene_video_filter(
        &self,
        scene: &Scene,
        settings: &EncodeSettings,
        lines: &[Vec<String>],
        text_files: &[Vec<PathBuf>],
    ) -> String {
        let mut filters = Vec::new();

        for ((overlay, layer_lines), files) in scene.overlays.iter().zip(lines).zip(text_files) {
            match &overlay.layer {
                Layer::Banner {
                    height,
                    font_size,
                    color,
                    background,
                    ..
                } => {
                    filters.push(format!(
                        "drawbox=x=0:y=0:w={}:h={}:color={}:t=fill",
                        settings.width,
                        height,
                        background.to_ffmpeg()
                    ));
                    if let Some(file) = files.first() {
                        filters.push(self.drawtext(
                            file,
                            *font_size,
                            &color.to_ffmpeg(),
                            &format!("({}-text_h)/2", height),
                        ));
                    }
                }
                Layer::Caption {
                    font_size, color, ..
                } => {
                    let line_height = (*font_size as f64 * 1.2).round() as i64;
                    let block = line_height * layer_lines.len() as i64;
                    let top = (settings.height as i64 - block) / 2;
                    for (i, (text, file)) in layer_lines.iter().zip(files).enumerate() {
                        if text.is_empty() {
                            continue;
                        }
                        let y = top + line_height * i as i64;
                        filters.push(self.drawtext(
                            file,
                            *font_size,
                            &color.to_ffmpeg(),
                            &y.to_string(),
                        ));
                    }
                }
            }
        }

        if filters.is_empty() {
            "null".to_string()
        } else {
            filters.join(",")
        }
    }

    fn drawtext(&self, text_file: &Path, font_size: u32, color: &str, y: &str) -> String {
        let font = match &self.style.font_file {
            Some(file) => format!("fontfile={}", escape_filter_value(&file.to_string_lossy())),
            None => format!("font={}", escape_filter_value(&self.style.font)),
        };
        format!(
            "drawtext=textfile={}:expansion=none:{}:fontsize={}:fontcolor={}:x=(w-text_w)/2:y={}",
            escape_filter_value(&text_file.to_string_lossy()),
            font,
            font_size,
            color,
            y
        )
    }

    /// Command line joining all inputs into the final file.
    pub fn concat_args(
        &self,
        inputs: &[ConcatInput],
        settings: &EncodeSettings,
        out: &Path,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-loglevel".into(), "error".into()];
        for input in inputs {
            args.extend(["-i".into(), path_arg(&input.path)]);
        }

        // Clips without sound get a silent track so every concat slot has audio.
        let mut next_input = inputs.len();
        let mut audio_sources = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.iter().enumerate() {
            if input.has_audio {
                audio_sources.push(i);
            } else {
                args.extend([
                    "-f".into(),
                    "lavfi".into(),
                    "-t".into(),
                    format_seconds(input.duration),
                    "-i".into(),
                    format!("anullsrc=r={}:cl=stereo", MIX_SAMPLE_RATE),
                ]);
                audio_sources.push(next_input);
                next_input += 1;
            }
        }

        let (w, h) = (settings.width, settings.height);
        let mut chains = Vec::with_capacity(inputs.len() * 2 + 1);
        let mut pairs = String::new();
        for (k, audio) in audio_sources.iter().enumerate() {
            chains.push(format!(
                "[{k}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
                 pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p[v{k}]",
                fps = settings.fps
            ));
            chains.push(format!(
                "[{audio}:a]aresample={MIX_SAMPLE_RATE},\
                 aformat=sample_fmts=fltp:channel_layouts=stereo[a{k}]"
            ));
            pairs.push_str(&format!("[v{k}][a{k}]"));
        }
        chains.push(format!("{}concat=n={}:v=1:a=1[v][a]", pairs, inputs.len()));

        args.extend(["-filter_complex".into(), chains.join(";")]);
        args.extend(["-map".into(), "[v]".into(), "-map".into(), "[a]".into()]);
        args.extend(["-r".into(), settings.fps.to_string()]);
        args.extend(["-c:v".into(), settings.video_codec.clone()]);
        args.extend(["-pix_fmt".into(), "yuv420p".into()]);
        args.extend(["-c:a".into(), settings.audio_codec.clone()]);
        args.extend(["-movflags".into(), "+faststart".into()]);
        args.push(path_arg(out));
        args
    }
}

impl VideoBackend for FfmpegBackend {
    fn encode(
        &self,
        timeline: &[Segment],
        settings: &EncodeSettings,
        out_path: &Path,
    ) -> Result<(), TriviaError> {
        settings.validate()?;
        if timeline.is_empty() {
            return Err(TriviaError::MediaError("nothing to render".to_string()));
        }

        let work_dir = tempfile::Builder::new().prefix("triviashorts-").tempdir()?;
        let mut inputs = Vec::with_capacity(timeline.len());

        for (index, segment) in timeline.iter().enumerate() {
            let input = match &segment.source {
                SegmentSource::Scene(scene) => {
                    debug!(index, kind = ?segment.kind, "Encoding scene");
                    ConcatInput {
                        path: self.render_scene(
                            scene,
                            segment.duration,
                            settings,
                            work_dir.path(),
                            index,
                        )?,
                        duration: segment.duration,
                        has_audio: true,
                    }
                }
                SegmentSource::Clip { path, has_audio } => ConcatInput {
                    path: path.clone(),
                    duration: segment.duration,
                    has_audio: *has_audio,
                },
            };
            inputs.push(input);
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        run_ffmpeg(&self.concat_args(&inputs, settings, out_path))
    }
}

/// Caption/banner text of a scene split into display lines, one list per overlay.
pub fn scene_lines(scene: &Scene, settings: &EncodeSettings) -> Vec<Vec<String>> {
    scene
        .overlays
        .iter()
        .map(|overlay| match &overlay.layer {
            Layer::Banner { text, .. } => vec![text.clone()],
            Layer::Caption {
                text, font_size, ..
            } => wrap_caption(text, *font_size, settings.width),
        })
        .collect()
}

/// Escape a value for a drawtext option inside a filtergraph. Two levels:
/// the option parser, then the graph parser.
fn escape_filter_value(value: &str) -> String {
    let mut option_level = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option_level.push('\\');
        }
        option_level.push(c);
    }

    let mut graph_level = String::with_capacity(option_level.len());
    for c in option_level.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph_level.push('\\');
        }
        graph_level.push(c);
    }
    graph_level
}

fn format_seconds(seconds: f64) -> String {
    format!("{:.3}", seconds.max(0.0))
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn run_ffmpeg(args: &[String]) -> Result<(), TriviaError> {
    let output = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            TriviaError::MediaError(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {}",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(TriviaError::MediaError(format!(
            "ffmpeg exited with status {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Backend that records the timeline instead of encoding it.
    #[derive(Default)]
    pub struct RecordingBackend {
        pub encoded: RefCell<Vec<(Vec<Segment>, PathBuf)>>,
    }

    impl VideoBackend for RecordingBackend {
        fn encode(
            &self,
            timeline: &[Segment],
            _settings: &EncodeSettings,
            out_path: &Path,
        ) -> Result<(), TriviaError> {
            self.encoded
                .borrow_mut()
                .push((timeline.to_vec(), out_path.to_path_buf()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingBackend;
    use super::*;
    use crate::config::Color;
    use crate::media::testing::TableProbe;
    use crate::scene::{AudioTrack, Overlay};

    fn settings() -> EncodeSettings {
        EncodeSettings::from(&VideoConfig::default())
    }

    fn caption_scene(text: &str) -> Scene {
        let style = StyleConfig::default();
        Scene {
            background: style.scene_background,
            overlays: vec![
                Overlay {
                    layer: Layer::Banner {
                        text: "Science".to_string(),
                        height: 100,
                        font_size: 80,
                        color: Color::rgb(255, 255, 255),
                        background: style.banner_color,
                    },
                    duration: 2.0,
                },
                Overlay {
                    layer: Layer::Caption {
                        text: text.to_string(),
                        font_size: 70,
                        color: style.caption_color,
                    },
                    duration: 2.0,
                },
            ],
            audio: AudioTrack {
                path: PathBuf::from("output/ticking.mp3"),
                volume: 0.8,
            },
        }
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name("trivia_video.mp4", "Science", 1_700_000_000),
            "trivia_video_Science_1700000000.mp4"
        );
        assert_eq!(output_file_name("clip", "Art", 7), "clip_Art_7.mp4");
    }

    #[test]
    fn test_renderer_appends_end_credit() {
        let backend = RecordingBackend::default();
        let probe = TableProbe::new(4.0).with("output/end.mp4", 9.0);
        let renderer = VideoRenderer::new(
            &backend,
            &probe,
            settings(),
            "output/videos",
            "output/end.mp4",
            "trivia_video",
        );

        let rendered = renderer.render(Vec::new(), "Art", 42).unwrap();

        assert_eq!(rendered.segment_count, 1);
        assert_eq!(rendered.duration, 9.0);
        assert_eq!(rendered.path, PathBuf::from("output/videos/trivia_video_Art_42.mp4"));
        let encoded = backend.encoded.borrow();
        assert_eq!(encoded[0].0[0].kind, SegmentKind::EndCredit);
        assert_eq!(encoded[0].1, rendered.path);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut bad = settings();
        bad.width = 1081;
        assert!(bad.validate().is_err());
        bad.width = 1080;
        bad.fps = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_scene_args() {
        let backend = FfmpegBackend::with_style(StyleConfig::default());
        let scene = caption_scene("Question?\n\n1) A");
        let lines = scene_lines(&scene, &settings());
        assert_eq!(lines, vec![vec!["Science".to_string()], vec!["Question?".into(), "".into(), "1) A".into()]]);

        let files: Vec<Vec<PathBuf>> = lines
            .iter()
            .enumerate()
            .map(|(l, ls)| (0..ls.len()).map(|i| PathBuf::from(format!("/w/t_{}_{}.txt", l, i))).collect())
            .collect();
        let args = backend.scene_args(&scene, 2.0, &settings(), &lines, &files, Path::new("/w/seg.mp4"));

        assert!(args.contains(&"color=c=0xE0F7FA:s=1080x1920:r=5:d=2.000".to_string()));
        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.starts_with("[0:v]drawbox=x=0:y=0:w=1080:h=100:color=0x003366:t=fill,"));
        assert!(filter.contains("textfile=/w/t_0_0.txt"));
        assert!(filter.contains("textfile=/w/t_1_2.txt"));
        // the blank line gets no drawtext
        assert!(!filter.contains("t_1_1.txt"));
        assert!(filter.ends_with("[1:a]volume=0.8,apad,atrim=0:2.000[a]"));
        assert_eq!(args.last().unwrap(), "/w/seg.mp4");
    }

    #[test]
    fn test_concat_args_pad_silent_clip() {
        let backend = FfmpegBackend::with_style(StyleConfig::default());
        let inputs = vec![
            ConcatInput {
                path: PathBuf::from("a.mp4"),
                duration: 1.0,
                has_audio: true,
            },
            ConcatInput {
                path: PathBuf::from("end.mp4"),
                duration: 3.0,
                has_audio: false,
            },
        ];
        let args = backend.concat_args(&inputs, &settings(), Path::new("out.mp4"));

        assert!(args.contains(&"anullsrc=r=44100:cl=stereo".to_string()));
        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.contains("[0:a]aresample"));
        assert!(filter.contains("[2:a]aresample"));
        assert!(filter.contains("[1:v]scale=1080:1920"));
        assert!(filter.ends_with("[v0][a0][v1][a1]concat=n=2:v=1:a=1[v][a]"));
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libx264"));
        assert!(args.windows(2).any(|w| w[0] == "-c:a" && w[1] == "aac"));
        assert!(args.windows(2).any(|w| w[0] == "-r" && w[1] == "5"));
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("/tmp/a.txt"), "/tmp/a.txt");
        assert_eq!(escape_filter_value("C:/f,1.txt"), "C\\\\:/f\\,1.txt");
        assert_eq!(escape_filter_value("it's"), "it\\\\\\'s");
    }
}
