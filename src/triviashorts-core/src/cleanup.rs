//! Removal of intermediate narration files.

use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::tts::AudioTriple;

/// Delete every narration file and return the ones actually removed.
///
/// A file that is already gone is not an error, so calling this twice is a
/// no-op the second time. Other failures are logged and skipped.
pub fn cleanup_audio_files(audio_files: &[AudioTriple]) -> Vec<PathBuf> {
    let mut deleted = Vec::new();

    for path in audio_files.iter().flat_map(|triple| triple.paths()) {
        match std::fs::remove_file(path) {
            Ok(()) => {
                info!("Deleted audio file: {}", path.display());
                deleted.push(path.to_path_buf());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Could not delete {}: {}", path.display(), e),
        }
    }

    deleted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_removes_all_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let triples: Vec<_> = (0..2).map(|i| AudioTriple::for_index(dir.path(), i)).collect();
        for triple in &triples {
            for path in triple.paths() {
                std::fs::write(path, b"RIFF").unwrap();
            }
        }

        let deleted = cleanup_audio_files(&triples);
        assert_eq!(deleted.len(), 6);
        for triple in &triples {
            assert!(triple.paths().iter().all(|p| !p.exists()));
        }

        assert!(cleanup_audio_files(&triples).is_empty());
    }

    #[test]
    fn test_cleanup_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let triple = AudioTriple::for_index(dir.path(), 0);
        std::fs::write(&triple.options, b"RIFF").unwrap();

        assert_eq!(cleanup_audio_files(&[triple.clone()]), vec![triple.options.clone()]);
    }

    #[test]
    fn test_cleanup_continues_past_undeletable_path() {
        let dir = tempfile::tempdir().unwrap();
        let triple = AudioTriple::for_index(dir.path(), 0);
        std::fs::create_dir(&triple.question).unwrap();
        std::fs::write(&triple.options, b"RIFF").unwrap();
        std::fs::write(&triple.answer, b"RIFF").unwrap();

        let deleted = cleanup_audio_files(&[triple.clone()]);

        assert_eq!(deleted, vec![triple.options.clone(), triple.answer.clone()]);
        assert!(triple.question.is_dir());
    }
}

