use kestrel_model::Command;

use crate::utils::shell;
use crate::{Decorator, ExecError, ExecResult};

/// Adjust scheduling priority with `nice -n`.
#[derive(Debug, Clone, Copy)]
pub struct Nice {
    adjustment: i8,
}

impl Nice {
    /// `adjustment` must be within `-20..=19`.
    pub fn new(adjustment: i32) -> ExecResult<Self> {
        if !(-20..=19).contains(&adjustment) {
            return Err(ExecError::InvalidDecorator(format!(
                "niceness {adjustment} outside -20..=19"
            )));
        }
        Ok(Self {
            adjustment: adjustment as i8,
        })
    }
}

impl Decorator for Nice {
    fn name(&self) -> &'static str {
        "nice"
    }

    fn decorate(&self, command: Command) -> Command {
        let prefix = format!("nice -n {}", self.adjustment);
        command.map_line(|line| shell::wrap(&prefix, &line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_with_adjustment() {
        let cmd = Nice::new(-5).unwrap().decorate(Command::new("sleep 1"));
        assert_eq!(cmd.line(), "nice -n -5 sleep 1");
    }

    #[test]
    fn out_of_range_is_rejected() {
        assert!(Nice::new(25).is_err());
        assert!(Nice::new(-21).is_err());
    }
}
