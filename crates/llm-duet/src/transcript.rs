//! Append-only display log of a duet session.

use crate::config::ParticipantConfig;
use crate::message::TranscriptEntry;

/// Ordered display records used for export and for the referee prompt.
///
/// # Design Notes
///
/// - Entries are never modified or removed once pushed
/// - Independent of both agent contexts; nothing here reaches a gateway
/// - Seeded with one configuration record per participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transcript holding the configuration record of each participant.
    pub fn seeded(a: &ParticipantConfig, b: &ParticipantConfig) -> Self {
        let mut transcript = Self::new();
        transcript.push(config_record(a));
        transcript.push(config_record(b));
        transcript
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders every entry as a `"<label>: <content>"` line.
    pub fn render_lines(&self) -> String {
        self.entries
            .iter()
            .map(TranscriptEntry::render_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn config_record(participant: &ParticipantConfig) -> TranscriptEntry {
    let seed = participant
        .params
        .seed
        .map(|s| s.to_string())
        .unwrap_or_else(|| "None".to_string());

    TranscriptEntry::new(
        format!("config for {}:", participant.name),
        format!(
            "System prompt: {}\nMax tokens: {}\nSeed: {}",
            participant.system_prompt, participant.params.max_output_tokens, seed
        ),
    )
}
