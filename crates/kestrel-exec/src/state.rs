use std::time::Duration;

use tokio::sync::watch;

use kestrel_model::TaskState;

/// Create the publishing and observing ends of a task's lifecycle, starting in `Running`.
pub(crate) fn channel() -> (StateTx, StateRx) {
    let (tx, rx) = watch::channel(TaskState::Running);
    (StateTx(tx), StateRx(rx))
}

/// Publishing end, owned by whatever reaps the process.
#[derive(Debug)]
pub(crate) struct StateTx(watch::Sender<TaskState>);

impl StateTx {
    /// Publish the terminal state. Later calls are ignored so the state never moves backwards.
    pub(crate) fn terminate(&self, state: TaskState) {
        debug_assert!(state.is_terminal());
        self.0.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            *current = state;
            true
        });
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StateRx(watch::Receiver<TaskState>);

impl StateRx {
    pub(crate) fn current(&self) -> TaskState {
        self.0.borrow().clone()
    }

    pub(crate) async fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut rx = self.0.clone();
        let terminated = async move {
            // A closed channel means the reaper is gone; whatever it last published is final.
            let observed = rx.wait_for(TaskState::is_terminal).await.is_ok();
            observed || rx.borrow().is_terminal()
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, terminated)
                .await
                .unwrap_or(false),
            None => terminated.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_model::ExitOutcome;

    #[tokio::test]
    async fn wait_times_out_while_running() {
        let (_tx, rx) = channel();
        assert!(!rx.wait(Some(Duration::from_millis(20))).await);
        assert!(rx.current().is_running());
    }

    #[tokio::test]
    async fn first_terminal_state_wins() {
        let (tx, rx) = channel();
        tx.terminate(TaskState::Terminated(ExitOutcome::Exited(0)));
        tx.terminate(TaskState::Terminated(ExitOutcome::Exited(1)));

        assert!(rx.wait(None).await);
        assert_eq!(rx.current().exit_code(), Some(0));
    }

    #[tokio::test]
    async fn dropped_publisher_without_terminal_state_is_not_terminated() {
        let (tx, rx) = channel();
        drop(tx);
        assert!(!rx.wait(None).await);
    }
}
