//! Read-only queries against a paired controller.

use anyhow::{Context, Result};
use miramode_core::{
    ClientIdentity, Device, DeviceSettings, OutletSettings, PresetDetails, Session, ShowerState,
    TechnicalInformation,
};
use serde::Serialize;

use super::Target;
use crate::format::{
    FormatOptions, format_outlets_text, format_presets_text, format_settings_text,
    format_state_text, format_technical_text,
};
use crate::util::{disconnect, write_output};

/// Which query to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusQuery {
    State,
    Settings,
    Outlets,
    Technical,
    Nickname,
    Presets,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Report {
    State(ShowerState),
    Settings(DeviceSettings),
    Outlets(OutletSettings),
    Technical(TechnicalInformation),
    Nickname { nickname: String },
    Presets(Vec<PresetDetails>),
}

impl Report {
    fn render(&self, opts: &FormatOptions) -> Result<String> {
        if opts.json {
            return opts.as_json(self);
        }
        Ok(match self {
            Report::State(state) => format_state_text(state, opts),
            Report::Settings(settings) => format_settings_text(settings, opts),
            Report::Outlets(outlets) => format_outlets_text(outlets, opts),
            Report::Technical(info) => format_technical_text(info, opts),
            Report::Nickname { nickname } => format!("{}\n", nickname),
            Report::Presets(presets) => format_presets_text(presets, opts),
        })
    }
}

pub async fn cmd_status(
    target: &Target<'_>,
    identity: ClientIdentity,
    query: StatusQuery,
    opts: &FormatOptions,
) -> Result<()> {
    let (_, mut session) = target.open(Some(identity)).await?;
    let result = run_query(&mut session, query).await;
    disconnect(session).await;

    let report = result?;
    write_output(&report.render(opts)?)
}

async fn run_query(session: &mut Session<Device>, query: StatusQuery) -> Result<Report> {
    let report = match query {
        StatusQuery::State => Report::State(
            session
                .device_state()
                .await
                .context("Failed to read device state")?,
        ),
        StatusQuery::Settings => Report::Settings(
            session
                .device_settings()
                .await
                .context("Failed to read device settings")?,
        ),
        StatusQuery::Outlets => Report::Outlets(
            session
                .outlet_settings()
                .await
                .context("Failed to read outlet settings")?,
        ),
        StatusQuery::Technical => Report::Technical(
            session
                .technical_info()
                .await
                .context("Failed to read technical information")?,
        ),
        StatusQuery::Nickname => Report::Nickname {
            nickname: session
                .nickname()
                .await
                .context("Failed to read nickname")?,
        },
        StatusQuery::Presets => {
            let slots = session
                .preset_slots()
                .await
                .context("Failed to read preset slots")?;
            let mut presets = Vec::with_capacity(slots.len());
            for slot in slots {
                presets.push(
                    session
                        .preset_details(slot)
                        .await
                        .with_context(|| format!("Failed to read preset {}", slot))?,
                );
            }
            Report::Presets(presets)
        }
    };
    Ok(report)
}
