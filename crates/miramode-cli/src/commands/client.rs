//! Client pairing commands.

use anyhow::{Context, Result};
use miramode_core::ClientIdentity;
use rand::Rng;
use serde::Serialize;

use super::Target;
use crate::config::Config;
use crate::format::{ClientEntry, FormatOptions, format_clients_text};
use crate::util::{disconnect, write_output};

/// Range for generated client ids.
const RANDOM_CLIENT_ID: std::ops::RangeInclusive<u32> = 10_000..=65_535;

pub async fn cmd_client_list(
    target: &Target<'_>,
    identity: ClientIdentity,
    opts: &FormatOptions,
) -> Result<()> {
    let (_, mut session) = target.open(Some(identity)).await?;

    let result = async {
        let slots = session
            .client_slots()
            .await
            .context("Failed to read client slots")?;
        let mut clients = Vec::with_capacity(slots.len());
        for slot in slots {
            let name = session
                .client_details(slot)
                .await
                .with_context(|| format!("Failed to read client {}", slot))?;
            clients.push(ClientEntry { slot, name });
        }
        anyhow::Ok(clients)
    }
    .await;

    disconnect(session).await;
    let clients = result?;

    let content = if opts.json {
        opts.as_json(&clients)?
    } else {
        format_clients_text(&clients, opts)
    };
    write_output(&content)
}

pub async fn cmd_client_pair(
    target: &Target<'_>,
    client_id: Option<u32>,
    client_name: &str,
    save: bool,
    opts: &FormatOptions,
) -> Result<()> {
    #[derive(Serialize)]
    struct Paired<'a> {
        client_id: u32,
        client_slot: u8,
        name: &'a str,
    }

    let client_id = client_id.unwrap_or_else(|| rand::rng().random_range(RANDOM_CLIENT_ID));
    let (identifier, mut session) = target.open(None).await?;

    if !target.quiet {
        eprintln!("Pairing new client id {}...", client_id);
    }
    let result = session.pair_client(client_id, client_name).await;
    disconnect(session).await;
    let identity = result.context(
        "Pairing failed. Put the controller in pairing mode and try again",
    )?;

    let content = if opts.json {
        opts.as_json(&Paired {
            client_id: identity.client_id(),
            client_slot: identity.client_slot(),
            name: client_name,
        })?
    } else {
        format!(
            "Paired \"{}\"\n  Client id:   {}\n  Client slot: {}\n",
            client_name,
            identity.client_id(),
            identity.client_slot()
        )
    };
    write_output(&content)?;

    if save {
        let mut config = target.config.clone();
        remember_pairing(&mut config, &identifier, identity);
        config.save()?;
        if !target.quiet {
            eprintln!("Saved client to {}", Config::path().display());
        }
    }
    Ok(())
}

pub async fn cmd_client_unpair(
    target: &Target<'_>,
    identity: ClientIdentity,
    slot: u8,
) -> Result<()> {
    let (_, mut session) = target.open(Some(identity)).await?;
    let result = session.unpair_client(slot).await;
    disconnect(session).await;
    result.with_context(|| format!("Failed to unpair client {}", slot))?;

    if !target.quiet {
        eprintln!("Unpaired client slot {}", slot);
    }
    Ok(())
}

/// Store a fresh pairing as the default identity.
fn remember_pairing(config: &mut Config, identifier: &str, identity: ClientIdentity) {
    config.device = Some(identifier.to_string());
    config.client_id = Some(identity.client_id());
    config.client_slot = Some(identity.client_slot());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remember_pairing_overwrites_previous_identity() {
        let mut config = Config {
            device: Some("old".to_string()),
            client_id: Some(111),
            client_slot: Some(0),
            timeout: Some(20),
            ..Default::default()
        };
        let identity = ClientIdentity::new(4242, 3).unwrap();

        remember_pairing(&mut config, "Mira Shower", identity);

        assert_eq!(config.device.as_deref(), Some("Mira Shower"));
        assert_eq!(config.client_id, Some(4242));
        assert_eq!(config.client_slot, Some(3));
        assert_eq!(config.timeout, Some(20));
    }

    #[test]
    fn test_random_client_ids_are_valid() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let id = rng.random_range(RANDOM_CLIENT_ID);
            assert!(miramode_types::types::is_valid_client_id(id));
        }
    }
}
