use anyhow::Result;
use serde::Serialize;

/// Lifecycle of one section inside the generate/review loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionState {
    Pending,
    Generating,
    Reviewing,
    Retry,
    Accepted,
    Exhausted,
    BestEffort,
    Placeholder,
    Cancelled,
}

impl SectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SectionState::Accepted
                | SectionState::BestEffort
                | SectionState::Placeholder
                | SectionState::Cancelled
        )
    }
}

/// Tracks the state of a single section and the number of attempts started.
#[derive(Debug, Clone)]
pub struct SectionRun {
    key: String,
    state: SectionState,
    attempts: u32,
}

impl SectionRun {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            state: SectionState::Pending,
            attempts: 0,
        }
    }

    pub fn state(&self) -> SectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn transition(&mut self, to: SectionState) -> Result<()> {
        let valid = matches!(
            (&self.state, &to),
            (SectionState::Pending, SectionState::Generating)
                | (SectionState::Retry, SectionState::Generating)
                | (SectionState::Generating, SectionState::Reviewing)
                | (SectionState::Generating, SectionState::Retry)
                | (SectionState::Generating, SectionState::Exhausted)
                | (SectionState::Reviewing, SectionState::Accepted)
                | (SectionState::Reviewing, SectionState::Retry)
                | (SectionState::Reviewing, SectionState::Exhausted)
                | (SectionState::Exhausted, SectionState::BestEffort)
                | (SectionState::Exhausted, SectionState::Placeholder)
                | (SectionState::Pending, SectionState::Cancelled)
                | (SectionState::Retry, SectionState::Cancelled)
        );

        if valid {
            if to == SectionState::Generating {
                self.attempts += 1;
            }
            self.state = to;
            Ok(())
        } else {
            anyhow::bail!(
                "Invalid transition for section '{}' from {:?} to {:?}",
                self.key,
                self.state,
                to
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut run = SectionRun::new("ci_cd");
        run.transition(SectionState::Generating).unwrap();
        run.transition(SectionState::Reviewing).unwrap();
        run.transition(SectionState::Accepted).unwrap();
        assert_eq!(run.state(), SectionState::Accepted);
        assert_eq!(run.attempts(), 1);
        assert!(run.state().is_terminal());
    }

    #[test]
    fn test_retry_counts_attempts() {
        let mut run = SectionRun::new("ci_cd");
        run.transition(SectionState::Generating).unwrap();
        run.transition(SectionState::Retry).unwrap();
        run.transition(SectionState::Generating).unwrap();
        run.transition(SectionState::Reviewing).unwrap();
        run.transition(SectionState::Exhausted).unwrap();
        run.transition(SectionState::BestEffort).unwrap();
        assert_eq!(run.attempts(), 2);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut run = SectionRun::new("ci_cd");
        assert!(run.transition(SectionState::Accepted).is_err());
        assert!(run.transition(SectionState::BestEffort).is_err());
        run.transition(SectionState::Generating).unwrap();
        assert!(run.transition(SectionState::Cancelled).is_err());
        assert!(run.transition(SectionState::Generating).is_err());
        assert_eq!(run.state(), SectionState::Generating);
    }

    #[test]
    fn test_cancel_only_between_attempts() {
        let mut run = SectionRun::new("ci_cd");
        run.transition(SectionState::Generating).unwrap();
        run.transition(SectionState::Retry).unwrap();
        run.transition(SectionState::Cancelled).unwrap();
        assert!(run.state().is_terminal());
        assert!(run.transition(SectionState::Generating).is_err());
    }
}
