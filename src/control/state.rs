use crate::engine::{Gates, ReleaseGate};
use crate::types::Phase;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Launch,
    Begin,
    End,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Launch => "launch",
            Command::Begin => "begin",
            Command::End => "end",
        }
    }

    fn precondition(&self) -> Phase {
        match self {
            Command::Launch => Phase::Initializing,
            Command::Begin => Phase::CreatingConnections,
            Command::End => Phase::StartingTraffic,
        }
    }

    fn target(&self) -> Phase {
        match self {
            Command::Launch => Phase::CreatingConnections,
            Command::Begin => Phase::StartingTraffic,
            Command::End => Phase::RetractingConnections,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The phase is already at or past the command's target.
    AlreadyApplied,
    /// The command's precondition has not been reached yet.
    OutOfOrder { current: Phase },
}

/// Maps operator commands to phase transitions and gate releases.
pub struct Controller {
    phase_tx: watch::Sender<Phase>,
    gates: Gates,
}

impl Controller {
    pub fn new(gates: Gates) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Initializing);
        Self { phase_tx, gates }
    }

    pub fn gates(&self) -> &Gates {
        &self.gates
    }

    pub fn phase(&self) -> Phase {
        *self.phase_tx.borrow()
    }

    #[cfg(test)]
    pub fn phase_rx(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    pub fn apply(&self, command: Command) -> Transition {
        let gate = self.gate_for(command);
        let mut transition = Transition::AlreadyApplied;

        // Gate and phase change together under the watch lock.
        self.phase_tx.send_if_modified(|phase| {
            if *phase == command.precondition() {
                gate.open();
                *phase = command.target();
                transition = Transition::Applied;
                true
            } else {
                if *phase < command.precondition() {
                    transition = Transition::OutOfOrder { current: *phase };
                }
                false
            }
        });

        match transition {
            Transition::Applied => {
                tracing::info!(
                    "{} command applied, phase is now '{}'",
                    command.as_str(),
                    command.target()
                );
            }
            Transition::AlreadyApplied => {
                tracing::debug!("{} command repeated, ignoring", command.as_str());
            }
            Transition::OutOfOrder { current } => {
                tracing::warn!(
                    "{} command rejected: phase is still '{}'",
                    command.as_str(),
                    current
                );
            }
        }
        transition
    }

    fn gate_for(&self, command: Command) -> &ReleaseGate {
        match command {
            Command::Launch => self.gates.launch.as_ref(),
            Command::Begin => self.gates.begin.as_ref(),
            Command::End => self.gates.end.as_ref(),
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(Gates::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn commands_advance_phase_in_order() {
        let controller = Controller::default();
        assert_eq!(controller.phase(), Phase::Initializing);

        assert_eq!(controller.apply(Command::Launch), Transition::Applied);
        assert_eq!(controller.phase(), Phase::CreatingConnections);
        assert!(controller.gates().launch.is_open());
        assert!(!controller.gates().begin.is_open());

        assert_eq!(controller.apply(Command::Begin), Transition::Applied);
        assert_eq!(controller.phase(), Phase::StartingTraffic);
        assert!(controller.gates().begin.is_open());

        assert_eq!(controller.apply(Command::End), Transition::Applied);
        assert_eq!(controller.phase(), Phase::RetractingConnections);
        assert!(controller.gates().end.is_open());
    }

    #[test]
    fn begin_before_launch_is_rejected() {
        let controller = Controller::default();

        assert_eq!(
            controller.apply(Command::Begin),
            Transition::OutOfOrder {
                current: Phase::Initializing
            }
        );
        assert_eq!(controller.phase(), Phase::Initializing);
        assert!(!controller.gates().begin.is_open());

        assert_eq!(
            controller.apply(Command::End),
            Transition::OutOfOrder {
                current: Phase::Initializing
            }
        );
        assert!(!controller.gates().end.is_open());
    }

    #[test]
    fn repeated_commands_never_move_phase_backward() {
        let controller = Controller::default();
        controller.apply(Command::Launch);
        controller.apply(Command::Begin);

        assert_eq!(controller.apply(Command::Launch), Transition::AlreadyApplied);
        assert_eq!(controller.apply(Command::Begin), Transition::AlreadyApplied);
        assert_eq!(controller.phase(), Phase::StartingTraffic);
    }

    #[tokio::test]
    async fn phase_watchers_see_transitions() {
        let controller = Controller::default();
        let mut rx = controller.phase_rx();

        controller.apply(Command::Launch);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Phase::CreatingConnections);

        // A rejected command does not notify.
        controller.apply(Command::End);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_launches_apply_once() {
        let controller = Arc::new(Controller::default());
        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let controller = controller.clone();
                tokio::spawn(async move { controller.apply(Command::Launch) })
            })
            .collect();

        let mut applied = 0;
        for task in tasks {
            if task.await.unwrap() == Transition::Applied {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(controller.phase(), Phase::CreatingConnections);
    }
}
