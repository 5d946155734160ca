//! Sub-agent model marker embedded in the second system block.
//!
//! A parent agent can pin the model of a sub-agent by starting the sub-agent's
//! system text with `<CCR-SUBAGENT-MODEL>provider,model</CCR-SUBAGENT-MODEL>`.

use ccr_core::{ChatRequest, SystemPrompt};
use serde_json::Value;

pub const SUBAGENT_OPEN_TAG: &str = "<CCR-SUBAGENT-MODEL>";
pub const SUBAGENT_CLOSE_TAG: &str = "</CCR-SUBAGENT-MODEL>";

/// Extract the pinned model and strip the marker from the system text.
///
/// Only the second system block is inspected, and only when its text starts
/// with the opening tag and a closing tag follows. Otherwise the request is
/// left untouched and `None` is returned.
pub fn take_subagent_model(request: &mut ChatRequest) -> Option<String> {
    let Some(SystemPrompt::Blocks(blocks)) = request.system.as_mut() else {
        return None;
    };
    let block = blocks.get_mut(1)?;
    let Value::String(text) = &mut block.text else {
        return None;
    };
    let rest = text.strip_prefix(SUBAGENT_OPEN_TAG)?;
    let close = rest.find(SUBAGENT_CLOSE_TAG)?;
    let model = rest[..close].to_string();

    let marker_len = SUBAGENT_OPEN_TAG.len() + close + SUBAGENT_CLOSE_TAG.len();
    text.replace_range(..marker_len, "");
    Some(model)
}
