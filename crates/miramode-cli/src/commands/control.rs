//! Commands that operate the shower.

use anyhow::{Context, Result};
use miramode_core::{ClientIdentity, ShowerState};

use super::Target;
use crate::format::{FormatOptions, format_state_text};
use crate::util::{disconnect, write_output};

pub async fn cmd_control(
    target: &Target<'_>,
    identity: ClientIdentity,
    outlet1: bool,
    outlet2: bool,
    temperature: f64,
    opts: &FormatOptions,
) -> Result<()> {
    let (_, mut session) = target.open(Some(identity)).await?;
    let result = session.control_outlets(outlet1, outlet2, temperature).await;
    disconnect(session).await;

    let state = result.context("Failed to control outlets")?;
    write_output(&render_outcome(state.as_ref(), opts)?)
}

pub async fn cmd_preset_start(
    target: &Target<'_>,
    identity: ClientIdentity,
    slot: u8,
    opts: &FormatOptions,
) -> Result<()> {
    let (_, mut session) = target.open(Some(identity)).await?;
    let result = session.start_preset(slot).await;
    disconnect(session).await;

    let state = result.with_context(|| format!("Failed to start preset {}", slot))?;
    write_output(&render_outcome(state.as_ref(), opts)?)
}

/// Controllers either echo the new state or just acknowledge.
fn render_outcome(state: Option<&ShowerState>, opts: &FormatOptions) -> Result<String> {
    match (state, opts.json) {
        (Some(state), true) => opts.as_json(state),
        (Some(state), false) => Ok(format_state_text(state, opts)),
        (None, true) => opts.as_json(&serde_json::json!({ "success": true })),
        (None, false) => Ok("The command completed successfully\n".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_acknowledgement() {
        let text = render_outcome(None, &FormatOptions::new(true, false)).unwrap();
        assert_eq!(text, "The command completed successfully\n");

        let json = render_outcome(None, &FormatOptions::new(true, true)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["success"], true);
    }

    #[test]
    fn test_render_echoed_state() {
        let state = ShowerState {
            timer_state: 1,
            target_temperature: 40.0,
            actual_temperature: 22.5,
            outlet1: true,
            outlet2: false,
            remaining_seconds: 1200,
            update_counter: 9,
        };
        let text = render_outcome(Some(&state), &FormatOptions::new(true, false)).unwrap();
        assert!(text.contains("40.0°C"));
        assert!(text.contains("20m 00s"));
    }
}
