//! TTS module: narration for each question using kokoro-tiny.

use kokoro_tiny::TtsEngine;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::VoiceConfig;
use crate::error::TriviaError;
use crate::item::TriviaItem;
use crate::text::normalize_text;

/// Output rate of the kokoro model.
pub const SAMPLE_RATE: u32 = 24_000;

/// Anything that can turn text into an audio file.
pub trait SpeechEngine {
    fn synthesize_to_file(
        &mut self,
        text: &str,
        voice_id: &str,
        out_path: &Path,
        speed: f32,
    ) -> Result<(), TriviaError>;
}

/// kokoro-tiny backed engine. Load once and share by reference.
pub struct KokoroEngine {
    engine: TtsEngine,
    available_voices: Vec<String>,
}

impl KokoroEngine {
    /// Initialize the TTS engine (downloads model on first run).
    pub async fn new() -> Result<Self, TriviaError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| TriviaError::TtsError(format!("Failed to initialize TTS: {}", e)))?;

        let available_voices = engine.voices();

        Ok(Self {
            engine,
            available_voices,
        })
    }

    /// Get list of available voice IDs.
    pub fn available_voices(&self) -> &[String] {
        &self.available_voices
    }

    /// Validate that a voice ID exists.
    pub fn validate_voice(&self, voice_id: &str) -> Result<(), TriviaError> {
        if voice_id.is_empty() {
            return Err(TriviaError::TtsError(format!(
                "Voice ID cannot be empty. Available voices:\n{}",
                self.format_available_voices()
            )));
        }

        if !self.available_voices.iter().any(|v| v == voice_id) {
            return Err(TriviaError::TtsError(format!(
                "Unknown voice '{}'. Available voices:\n{}",
                voice_id,
                self.format_available_voices()
            )));
        }

        Ok(())
    }

    /// English voices, one per line, for display.
    pub fn format_available_voices(&self) -> String {
        format_english_voices(&self.available_voices)
    }

    /// Synthesize text in chunks; kokoro-tiny rejects long inputs.
    fn synthesize(&mut self, text: &str, voice_id: &str) -> Result<Vec<f32>, TriviaError> {
        let mut all_samples = Vec::new();

        for chunk in split_into_chunks(text, 200) {
            if chunk.trim().is_empty() {
                continue;
            }

            let samples = self
                .engine
                .synthesize(&chunk, Some(voice_id))
                .map_err(|e| TriviaError::TtsError(format!("Synthesis failed: {}", e)))?;

            all_samples.extend(samples);

            // 0.3s pause between chunks
            all_samples.extend(vec![0.0; 7200]);
        }

        // 0.5s trailing padding so the last word is not clipped
        all_samples.extend(vec![0.0; 12000]);

        Ok(all_samples)
    }
}

impl SpeechEngine for KokoroEngine {
    fn synthesize_to_file(
        &mut self,
        text: &str,
        voice_id: &str,
        out_path: &Path,
        speed: f32,
    ) -> Result<(), TriviaError> {
        self.validate_voice(voice_id)?;
        let samples = adjust_audio_speed(self.synthesize(text, voice_id)?, speed);
        write_wav(out_path, &samples, SAMPLE_RATE)
    }
}

/// The three narration files for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTriple {
    pub question: PathBuf,
    pub options: PathBuf,
    pub answer: PathBuf,
}

impl AudioTriple {
    /// File names for question `index` inside `dir`.
    pub fn for_index(dir: &Path, index: usize) -> Self {
        Self {
            question: dir.join(format!("trivia_q_{}.wav", index)),
            options: dir.join(format!("trivia_options_{}.wav", index)),
            answer: dir.join(format!("trivia_a_{}.wav", index)),
        }
    }

    pub fn paths(&self) -> [&Path; 3] {
        [&self.question, &self.options, &self.answer]
    }
}

/// Produces the narration files for a list of questions.
pub struct SpeechSynthesizer<'a> {
    engine: &'a mut dyn SpeechEngine,
    voice: VoiceConfig,
    audio_dir: PathBuf,
}

impl<'a> SpeechSynthesizer<'a> {
    pub fn new(engine: &'a mut dyn SpeechEngine, voice: VoiceConfig, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            voice,
            audio_dir: audio_dir.into(),
        }
    }

    /// Write question, options and answer narration for every item.
    pub fn synthesize_all(&mut self, items: &[TriviaItem]) -> Result<Vec<AudioTriple>, TriviaError> {
        let mut audio_files = Vec::with_capacity(items.len());

        for (i, item) in items.iter().enumerate() {
            let triple = AudioTriple::for_index(&self.audio_dir, i);
            info!(index = i, "Synthesizing narration");

            self.speak(&item.question, &triple.question)?;
            self.speak(&item.options_narration(), &triple.options)?;
            self.speak(&item.answer_narration(), &triple.answer)?;

            audio_files.push(triple);
        }

        Ok(audio_files)
    }

    fn speak(&mut self, text: &str, out_path: &Path) -> Result<(), TriviaError> {
        let text = normalize_text(text);
        debug!(path = %out_path.display(), %text, "Writing narration");
        self.engine
            .synthesize_to_file(&text, &self.voice.voice, out_path, self.voice.speed)
    }
}

/// Write mono samples as 16-bit PCM.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), TriviaError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

fn format_english_voices(voices: &[String]) -> String {
    let mut english_voices: Vec<&String> = voices
        .iter()
        .filter(|v| {
            v.starts_with("af_") || v.starts_with("am_") || v.starts_with("bf_") || v.starts_with("bm_")
        })
        .collect();
    english_voices.sort();

    english_voices
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split text into chunks that are safe for TTS synthesis.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current_chunk.len() + sentence.len() > max_chars {
            if !current_chunk.is_empty() {
                chunks.push(current_chunk.trim().to_string());
                current_chunk = String::new();
            }

            // A single overlong sentence is split on commas
            if sentence.len() > max_chars {
                for part in sentence.split_inclusive(',') {
                    if current_chunk.len() + part.len() > max_chars && !current_chunk.is_empty() {
                        chunks.push(current_chunk.trim().to_string());
                        current_chunk = String::new();
                    }
                    current_chunk.push_str(part);
                    current_chunk.push(' ');
                }
                continue;
            }
        }

        current_chunk.push_str(sentence);
        current_chunk.push(' ');
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}

/// Adjust audio playback speed using linear interpolation.
/// Rate < 1.0 = slower (e.g., 0.75 = 75% speed), Rate > 1.0 = faster.
pub fn adjust_audio_speed(samples: Vec<f32>, rate: f32) -> Vec<f32> {
    if (rate - 1.0).abs() < 0.001 || rate <= 0.0 {
        return samples;
    }

    let new_len = (samples.len() as f32 / rate) as usize;
    let mut result = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f32 * rate;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f32;

        if src_idx + 1 < samples.len() {
            result.push(samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac);
        } else if src_idx < samples.len() {
            result.push(samples[src_idx]);
        }
    }

    result
}
