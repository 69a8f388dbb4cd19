use super::{Fields, PayloadError, PayloadValidator};
use crate::task::{Domain, Task};

const DOMAIN: Domain = Domain::Ytdl;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtdlCommand {
    pub link: String,
    pub user_name: String,
}

/// `taskData.ytdl`: `link`, then `userName`
#[derive(Debug, Clone, Copy, Default)]
pub struct YtdlValidator;

impl PayloadValidator for YtdlValidator {
    type Command = YtdlCommand;

    fn domain(&self) -> Domain {
        DOMAIN
    }

    fn validate(&self, task: &Task) -> Result<YtdlCommand, PayloadError> {
        let fields = Fields::of(task, DOMAIN)?;

        Ok(YtdlCommand {
            link: fields.string("link")?,
            user_name: fields.string("userName")?,
        })
    }
}
