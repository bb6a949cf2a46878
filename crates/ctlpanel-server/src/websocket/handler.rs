//! Text message dispatch: classifies the frame and routes it through the
//! `CommandTable`.

use ctlpanel_core::{CommandResponse, CommandTable, Inbound};
use metrics::counter;
use tracing::{debug, warn};

use crate::metrics::COMMANDS_TOTAL;

/// Handle one inbound text frame and build the reply.
///
/// Never fails: untagged input gets the sentinel, unknown ids and rejected
/// data get an error reply carrying the requested id.
pub fn handle_text(commands: &CommandTable, text: &str) -> CommandResponse {
    let (id, data) = match Inbound::parse(text) {
        Inbound::Command { id, data } => (id, data),
        Inbound::Untagged => {
            debug!(len = text.len(), "untagged text message");
            counter!(COMMANDS_TOTAL, "command" => "untagged", "outcome" => "sentinel").increment(1);
            return CommandResponse::sentinel();
        }
    };

    let label = id.to_string();
    match commands.dispatch(id, &data) {
        Ok(result) => {
            debug!(command = id, name = commands.name(id), "command handled");
            counter!(COMMANDS_TOTAL, "command" => label, "outcome" => "ok").increment(1);
            CommandResponse::success(id, result)
        }
        Err(err) => {
            warn!(command = id, code = err.code(), error = %err, "command failed");
            counter!(COMMANDS_TOTAL, "command" => label, "outcome" => err.code()).increment(1);
            CommandResponse::failure(id, &err)
        }
    }
}
