use super::{Fields, PayloadError, PayloadValidator};
use crate::task::{Domain, Task};

const DOMAIN: Domain = Domain::Finance;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinanceCommand {
    pub command: String,
}

/// `taskData.fin`: only `command` is required; its value is interpreted at execution
#[derive(Debug, Clone, Copy, Default)]
pub struct FinanceValidator;

impl PayloadValidator for FinanceValidator {
    type Command = FinanceCommand;

    fn domain(&self) -> Domain {
        DOMAIN
    }

    fn validate(&self, task: &Task) -> Result<FinanceCommand, PayloadError> {
        let fields = Fields::of(task, DOMAIN)?;

        Ok(FinanceCommand {
            command: fields.string("command")?,
        })
    }
}
