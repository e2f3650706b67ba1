use quiz_core::model::QuestionView;

/// Where the flow currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Session is open but no question is held (a fetch failed and may be retried).
    Loading,
    /// A question is shown and may still be answered.
    Answering,
    /// Educational only: the correct answer is shown and the choice is locked.
    Revealed,
    Finished,
    /// Left without finishing; nothing more is sent.
    Abandoned,
}

impl Phase {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Abandoned)
    }
}

/// Result of a transition that may end the quiz.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowOutcome {
    Continue,
    Finished,
}

/// Which user actions are currently allowed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Controls {
    pub next: bool,
    pub reveal: bool,
    pub finish: bool,
    pub report: bool,
}

#[derive(Debug)]
pub(super) struct ActiveQuestion {
    pub(super) question: QuestionView,
    pub(super) selected: Option<String>,
    pub(super) submitted: bool,
    pub(super) revealed: bool,
    pub(super) reveal_loaded: bool,
    pub(super) reported: bool,
}

impl ActiveQuestion {
    pub(super) fn new(question: QuestionView) -> Self {
        Self {
            question,
            selected: None,
            submitted: false,
            revealed: false,
            reveal_loaded: false,
            reported: false,
        }
    }

    /// Selected but not yet recorded by the service.
    pub(super) fn has_pending_answer(&self) -> bool {
        self.selected.is_some() && !self.submitted && !self.revealed
    }
}

#[derive(Debug)]
pub(super) enum FlowState {
    Loading,
    Active(ActiveQuestion),
    Finished { confirmed: bool },
    Abandoned,
}
