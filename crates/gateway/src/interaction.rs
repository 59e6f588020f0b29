//! Lifecycle of a single upload, from file selection to what the page shows.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    FileReceived,
    Normalizing,
    Inferring,
    Displaying,
    Warning,
    Fatal,
}

impl InteractionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionState::Idle => "idle",
            InteractionState::FileReceived => "file_received",
            InteractionState::Normalizing => "normalizing",
            InteractionState::Inferring => "inferring",
            InteractionState::Displaying => "displaying",
            InteractionState::Warning => "warning",
            InteractionState::Fatal => "fatal",
        }
    }

    /// States the page can sit in while waiting for the next upload.
    pub fn is_rest(&self) -> bool {
        matches!(
            self,
            InteractionState::Idle | InteractionState::Displaying | InteractionState::Warning
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionEvent {
    /// A file was selected and posted
    Upload,
    /// The file name has an accepted extension
    Accepted,
    /// The upload was refused before the detector ran
    Rejected,
    /// The image was decoded and resized for display
    Normalized,
    /// The detector wrote an annotated image
    OutputFound,
    /// The detector ran but no annotated image exists
    OutputMissing,
    /// Decoding, the detector, or disk I/O failed
    Failed,
}

pub struct Interaction {
    current_state: InteractionState,
}

impl Default for Interaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Interaction {
    pub fn new() -> Self {
        Self {
            current_state: InteractionState::Idle,
        }
    }

    /// Apply an event and return the new state if it changed.
    pub fn update(&mut self, event: InteractionEvent) -> Option<InteractionState> {
        use InteractionEvent as E;
        use InteractionState as S;

        let old_state = self.current_state;

        let next = match (self.current_state, event) {
            (S::Idle | S::Displaying | S::Warning, E::Upload) => S::FileReceived,
            (S::FileReceived, E::Accepted) => S::Normalizing,
            (S::FileReceived | S::Normalizing, E::Rejected) => S::Idle,
            (S::Normalizing, E::Normalized) => S::Inferring,
            (S::Inferring, E::OutputFound) => S::Displaying,
            (S::Inferring, E::OutputMissing) => S::Warning,
            (S::FileReceived | S::Normalizing | S::Inferring, E::Failed) => S::Fatal,
            (state, _) => state,
        };
        self.current_state = next;

        if old_state != self.current_state {
            tracing::debug!(
                from = old_state.as_str(),
                to = next.as_str(),
                "Interaction state changed"
            );
            Some(self.current_state)
        } else {
            None
        }
    }

    pub fn current_state(&self) -> InteractionState {
        self.current_state
    }
}
