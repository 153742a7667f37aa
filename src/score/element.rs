/// Integer unit of musical time at a fixed pulses-per-quarter resolution.
pub type Tick = u64;

/// Whether a timed element sounds, decided once when the score is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// A pitched note; `pitch` is a MIDI-style pitch number.
    Note { pitch: i32 },
    Rest,
}

/// One note or rest of a timing-annotated score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreElement {
    pub identifier: String,
    pub kind: ElementKind,
    /// Absolute onset from the start of the score.
    pub onset: Tick,
    /// Elements without a duration (grace notes, unannotated elements) are
    /// carried along but never enter the chromagram.
    pub duration: Option<Tick>,
}

impl ScoreElement {
    pub fn note(identifier: impl Into<String>, pitch: i32, onset: Tick, duration: Tick) -> Self {
        Self {
            identifier: identifier.into(),
            kind: ElementKind::Note { pitch },
            onset,
            duration: Some(duration),
        }
    }

    pub fn rest(identifier: impl Into<String>, onset: Tick, duration: Tick) -> Self {
        Self {
            identifier: identifier.into(),
            kind: ElementKind::Rest,
            onset,
            duration: Some(duration),
        }
    }

    /// Drop the duration, e.g. for grace notes.
    pub fn without_duration(mut self) -> Self {
        self.duration = None;
        self
    }

    pub fn pitch(&self) -> Option<i32> {
        match self.kind {
            ElementKind::Note { pitch } => Some(pitch),
            ElementKind::Rest => None,
        }
    }

    /// Pitch class 0 (C) through 11 (B); `None` for rests.
    pub fn pitch_class(&self) -> Option<usize> {
        self.pitch().map(|p| p.rem_euclid(12) as usize)
    }

    /// `onset + duration`, if the element has a duration.
    pub fn end(&self) -> Option<Tick> {
        self.duration.map(|d| self.onset + d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_class_wraps_negative_pitches() {
        assert_eq!(ScoreElement::note("n1", 61, 0, 10).pitch_class(), Some(1));
        assert_eq!(ScoreElement::note("n2", -1, 0, 10).pitch_class(), Some(11));
        assert_eq!(ScoreElement::rest("r1", 0, 10).pitch_class(), None);
    }

    #[test]
    fn end_requires_duration() {
        let note = ScoreElement::note("n1", 60, 480, 240);
        assert_eq!(note.end(), Some(720));
        assert_eq!(note.without_duration().end(), None);
    }
}
