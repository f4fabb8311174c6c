use std::io;

use anyhow::{Result, bail};

use super::Session;
use super::chat::TerminalSink;
use crate::chat::TurnOutcome;

pub async fn run(session: &Session, message: &str) -> Result<()> {
    let mut sink = TerminalSink::new(io::stdout());
    match session.send(message, &mut sink).await {
        TurnOutcome::Completed(_) => Ok(()),
        TurnOutcome::Ignored => bail!("Nothing to send"),
        TurnOutcome::Failed(err) => Err(err.into()),
        outcome => bail!("Turn did not complete: {:?}", outcome),
    }
}
