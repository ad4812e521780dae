use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_yellow};

/// The three phases of a tracking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Processing,
    Reporting,
}

impl Phase {
    fn number(self) -> usize {
        match self {
            Self::Loading => 1,
            Self::Processing => 2,
            Self::Reporting => 3,
        }
    }

    fn running(self) -> &'static str {
        match self {
            Self::Loading => "Loading template catalog and target scope",
            Self::Processing => "Processing pipelines",
            Self::Reporting => "Building compliance report",
        }
    }
}

/// Spinner for one phase, drawn on stderr unless hidden.
pub struct PhaseProgress {
    pb: ProgressBar,
    phase: Phase,
}

impl PhaseProgress {
    pub fn start(phase: Phase, visible: bool) -> Self {
        if !visible {
            return Self {
                pb: ProgressBar::hidden(),
                phase,
            };
        }

        if phase == Phase::Loading {
            eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        }
        let pb = create_spinner(
            bright_yellow(format!("Phase {}/3: {}", phase.number(), phase.running())).to_string(),
        );
        Self { pb, phase }
    }

    pub fn finish(self, detail: &str) {
        self.pb.finish_with_message(
            bright_green(format!("Phase {}/3: {detail} ✓", self.phase.number())).to_string(),
        );
        if self.phase == Phase::Reporting && !self.pb.is_hidden() {
            eprintln!();
        }
    }

    /// Clears the spinner without a completion message.
    pub fn abandon(self) {
        self.pb.finish_and_clear();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_progress_draws_nothing() {
        let progress = PhaseProgress::start(Phase::Loading, false);
        assert!(progress.pb.is_hidden());
        progress.finish("Loaded 3 templates");
    }

    #[test]
    fn test_phase_numbers() {
        assert_eq!(Phase::Loading.number(), 1);
        assert_eq!(Phase::Processing.number(), 2);
        assert_eq!(Phase::Reporting.number(), 3);
    }
}
