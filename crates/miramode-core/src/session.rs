//! Request/response session over a [`Transport`].
//!
//! A session owns the client identity and a single background pump task.
//! The transport callback only enqueues raw fragments; the pump is the sole
//! owner of the [`Reassembler`] and feeds completed payloads through the
//! [`PayloadDecoder`] into a one-slot response channel.
//!
//! Correlation is positional: [`Session::request`] takes `&mut self`, writes
//! one frame and waits for exactly one notification. Before writing, a
//! flush marker is pushed through the fragment queue; fragments and
//! notifications that arrived ahead of it are discarded, so an unsolicited
//! notification is never taken as the answer.
//!
//! ```text
//! request() ── FrameEncoder ── transport.write(chunks)
//!                                   ...
//! callback ── fragment queue ── pump(Reassembler, PayloadDecoder) ── response slot ── request()
//! ```

use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use miramode_types::{
    ClientIdentity, DeviceInfo, DeviceSettings, Event, Notification, OutletSettings,
    ParseResult, PayloadDecoder, PresetDetails, STATUS_FAILURE, STATUS_SUCCESS, ShowerState,
    TechnicalInformation, TemperatureMapping,
};

use crate::commands::Command;
use crate::error::{Error, Result};
use crate::frame::{FrameEncoder, MTU, validate_chunk_size};
use crate::reassembly::Reassembler;
use crate::transport::{CharacteristicId, Transport};

/// Fragments the callback may queue before the pump catches up.
pub const FRAGMENT_QUEUE_CAPACITY: usize = 256;

/// Default time to wait for a response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Session tuning.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use miramode_core::{SessionConfig, TemperatureMapping};
///
/// let config = SessionConfig::default()
///     .response_timeout(Duration::from_secs(10))
///     .temperature_mapping(TemperatureMapping::Legacy);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a request waits for its response.
    pub response_timeout: Duration,
    /// Maximum bytes per transport write.
    pub chunk_size: usize,
    /// Temperature encoding spoken by the controller.
    pub temperature_mapping: TemperatureMapping,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            chunk_size: MTU,
            temperature_mapping: TemperatureMapping::default(),
        }
    }
}

impl SessionConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response timeout.
    #[must_use]
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the chunk size.
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the temperature mapping.
    #[must_use]
    pub fn temperature_mapping(mut self, mapping: TemperatureMapping) -> Self {
        self.temperature_mapping = mapping;
        self
    }

    /// Check the config is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero timeout or a chunk size
    /// outside `1..=MTU`.
    pub fn validate(&self) -> Result<()> {
        if self.response_timeout.is_zero() {
            return Err(Error::invalid_config("response timeout must be non-zero"));
        }
        validate_chunk_size(self.chunk_size)
    }
}

#[derive(Debug)]
enum PumpInput {
    Fragment(Vec<u8>),
    Reset,
    /// Drop everything queued ahead of this marker, then acknowledge.
    Flush(oneshot::Sender<()>),
}

type Response = ParseResult<Notification>;

/// A client session with one controller.
pub struct Session<T: Transport> {
    transport: T,
    identity: Option<ClientIdentity>,
    config: SessionConfig,
    encoder: FrameEncoder,
    input: mpsc::Sender<PumpInput>,
    responses: mpsc::Receiver<Response>,
    pump: JoinHandle<()>,
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Session<T> {
    /// Open a session and subscribe to the transport's notifications.
    ///
    /// Pass `None` as identity to pair a new client; every other request
    /// needs one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an invalid config, or the
    /// transport's error if subscribing fails.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn open(
        transport: T,
        identity: Option<ClientIdentity>,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (input, input_rx) = mpsc::channel(FRAGMENT_QUEUE_CAPACITY);
        let (response_tx, responses) = mpsc::channel(1);
        let decoder = PayloadDecoder::new(config.temperature_mapping);
        let pump = tokio::spawn(run_pump(input_rx, response_tx, decoder));

        let session = Self {
            transport,
            identity,
            encoder: FrameEncoder::new(config.temperature_mapping),
            config,
            input: input.clone(),
            responses,
            pump,
        };

        session
            .transport
            .subscribe(Box::new(move |data: &[u8]| {
                match input.try_send(PumpInput::Fragment(data.to_vec())) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!("Fragment queue full, notification lost");
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("Session closed, ignoring notification");
                    }
                }
            }))
            .await?;

        debug!("Session open");
        Ok(session)
    }

    /// The identity used for credentialed requests.
    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    /// Replace the identity, e.g. after pairing.
    pub fn set_identity(&mut self, identity: Option<ClientIdentity>) {
        self.identity = identity;
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Discard any partially reassembled notification.
    pub async fn reset(&self) {
        if self.input.send(PumpInput::Reset).await.is_err() {
            debug!("Pump already stopped, nothing to reset");
        }
    }

    /// Wait for the pump to drain everything received so far, then drop
    /// any notification it produced.
    async fn flush(&mut self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.input
            .send(PumpInput::Flush(ack))
            .await
            .map_err(|_| Error::Cancelled)?;
        done.await.map_err(|_| Error::Cancelled)?;

        while let Ok(stale) = self.responses.try_recv() {
            match stale {
                Ok(n) => debug!("Discarding unsolicited {} notification", n.event.kind()),
                Err(e) => debug!("Discarding unsolicited undecodable notification: {}", e),
            }
        }
        Ok(())
    }

    /// Send one request and wait for the notification that answers it.
    ///
    /// # Errors
    ///
    /// - encoding preconditions ([`Error::NotPaired`], [`Error::InvalidArgument`])
    ///   before anything is written;
    /// - transport write errors;
    /// - [`Error::InvalidData`] if the response could not be decoded;
    /// - [`Error::Timeout`] if nothing arrives in time. Reassembly is reset
    ///   so a late partial response is not attributed to the next request.
    /// - [`Error::Cancelled`] if the pump task has stopped.
    pub async fn request(&mut self, command: &Command) -> Result<Notification> {
        let frame = self.encoder.encode(self.identity.as_ref(), command)?;

        self.flush().await?;

        for chunk in frame.chunks(self.config.chunk_size)? {
            self.transport.write(chunk).await?;
        }

        match timeout(self.config.response_timeout, self.responses.recv()).await {
            Ok(Some(Ok(notification))) => {
                debug!(
                    "{} answered with {}",
                    command.name(),
                    notification.event.kind()
                );
                Ok(notification)
            }
            Ok(Some(Err(e))) => Err(e.into()),
            Ok(None) => Err(Error::Cancelled),
            Err(_) => {
                warn!(
                    "No response to {} within {:?}",
                    command.name(),
                    self.config.response_timeout
                );
                self.reset().await;
                Err(Error::timeout(command.name(), self.config.response_timeout))
            }
        }
    }

    /// Occupied client slots.
    pub async fn client_slots(&mut self) -> Result<Vec<u8>> {
        match self.request(&Command::ClientSlots).await?.event {
            Event::Slots { slots } => Ok(slots),
            other => Err(unexpected("slots", &other)),
        }
    }

    /// Name of the client paired in `slot`.
    pub async fn client_details(&mut self, slot: u8) -> Result<String> {
        match self.request(&Command::ClientDetails { slot }).await?.event {
            Event::ClientDetails { name } => Ok(name),
            other => Err(unexpected("client_details", &other)),
        }
    }

    /// Outlet and controller settings.
    pub async fn device_settings(&mut self) -> Result<DeviceSettings> {
        match self.request(&Command::DeviceSettings).await?.event {
            Event::DeviceSettings(settings) => Ok(settings),
            other => Err(unexpected("device_settings", &other)),
        }
    }

    /// Current timer and outlet state.
    pub async fn device_state(&mut self) -> Result<ShowerState> {
        match self.request(&Command::DeviceState).await?.event {
            Event::DeviceState(state) => Ok(state),
            other => Err(unexpected("device_state", &other)),
        }
    }

    /// Controller nickname.
    pub async fn nickname(&mut self) -> Result<String> {
        match self.request(&Command::Nickname).await?.event {
            Event::Nickname { name } => Ok(name),
            other => Err(unexpected("nickname", &other)),
        }
    }

    /// Outlet limits.
    pub async fn outlet_settings(&mut self) -> Result<OutletSettings> {
        match self.request(&Command::OutletSettings).await?.event {
            Event::OutletSettings(settings) => Ok(settings),
            other => Err(unexpected("outlet_settings", &other)),
        }
    }

    /// Preset stored in `slot`.
    pub async fn preset_details(&mut self, slot: u8) -> Result<PresetDetails> {
        match self.request(&Command::PresetDetails { slot }).await?.event {
            Event::PresetDetails(preset) => Ok(preset),
            other => Err(unexpected("preset_details", &other)),
        }
    }

    /// Occupied preset slots.
    pub async fn preset_slots(&mut self) -> Result<Vec<u8>> {
        match self.request(&Command::PresetSlots).await?.event {
            Event::Slots { slots } => Ok(slots),
            other => Err(unexpected("slots", &other)),
        }
    }

    /// Hardware and firmware revisions.
    pub async fn technical_info(&mut self) -> Result<TechnicalInformation> {
        match self.request(&Command::TechnicalInfo).await?.event {
            Event::TechnicalInformation(info) => Ok(info),
            other => Err(unexpected("technical_information", &other)),
        }
    }

    /// Pair a new client, returning its identity.
    ///
    /// The device answers with the newly assigned slot, or the failure
    /// status if it refuses (typically because pairing mode is not active
    /// on the controller).
    #[tracing::instrument(level = "info", skip(self, name))]
    pub async fn pair_client(&mut self, client_id: u32, name: &str) -> Result<ClientIdentity> {
        let command = Command::PairClient {
            client_id,
            name: name.to_string(),
        };
        match self.request(&command).await?.event {
            Event::SuccessOrFailure {
                status: STATUS_FAILURE,
            } => Err(Error::command_failed(command.name())),
            Event::SuccessOrFailure { status } => {
                info!("Paired as client slot {}", status);
                Ok(ClientIdentity::new(client_id, status)?)
            }
            other => Err(unexpected("success_or_failure", &other)),
        }
    }

    /// Remove the client paired in `slot`.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn unpair_client(&mut self, slot: u8) -> Result<()> {
        let command = Command::UnpairClient { slot };
        match self.request(&command).await?.event {
            Event::SuccessOrFailure { status } => check_status(&command, status),
            other => Err(unexpected("success_or_failure", &other)),
        }
    }

    /// Switch outlets and set the target temperature.
    ///
    /// Returns the echoed state when the controller reports one.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn control_outlets(
        &mut self,
        outlet1: bool,
        outlet2: bool,
        temperature: f64,
    ) -> Result<Option<ShowerState>> {
        let command = Command::ControlOutlets {
            outlet1,
            outlet2,
            temperature,
        };
        let event = self.request(&command).await?.event;
        operated(&command, event)
    }

    /// Start the preset stored in `slot`.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn start_preset(&mut self, slot: u8) -> Result<Option<ShowerState>> {
        let command = Command::StartPreset { slot };
        let event = self.request(&command).await?.event;
        operated(&command, event)
    }

    /// Read the identification strings.
    ///
    /// Goes straight to the transport; no identity needed.
    pub async fn device_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo {
            name: self.read_string(CharacteristicId::DeviceName).await?,
            model: self.read_string(CharacteristicId::ModelNumber).await?,
            manufacturer: self.read_string(CharacteristicId::Manufacturer).await?,
        })
    }

    async fn read_string(&self, id: CharacteristicId) -> Result<String> {
        let data = self.transport.read_characteristic(id).await?;
        let s = std::str::from_utf8(&data)
            .map_err(|e| Error::InvalidData(format!("{:?} is not UTF-8: {}", id, e)))?;
        Ok(s.trim_end_matches('\0').to_string())
    }

    /// Stop the pump. Notifications arriving afterwards are ignored.
    pub fn close(self) {
        debug!("Session closed");
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn run_pump(
    mut input: mpsc::Receiver<PumpInput>,
    responses: mpsc::Sender<Response>,
    decoder: PayloadDecoder,
) {
    let mut reassembler = Reassembler::new();
    while let Some(message) = input.recv().await {
        let payload = match message {
            PumpInput::Fragment(fragment) => reassembler.push(&fragment),
            PumpInput::Reset => {
                reassembler.reset();
                continue;
            }
            PumpInput::Flush(ack) => {
                if !reassembler.is_idle() {
                    debug!("Discarding partial notification ahead of request");
                }
                reassembler.reset();
                // The requester may have given up waiting.
                let _ = ack.send(());
                continue;
            }
        };
        let Some(payload) = payload else { continue };

        let response = match decoder.decode(payload.client_slot, &payload.data) {
            Ok(Some(notification)) => Ok(notification),
            Ok(None) => continue,
            Err(e) => {
                warn!("Failed to decode payload: {}", e);
                Err(e)
            }
        };

        match responses.try_send(response) {
            Ok(()) => {}
            Err(TrySendError::Full(lost)) => {
                warn!("No request waiting, dropping notification: {:?}", lost);
            }
            Err(TrySendError::Closed(_)) => break,
        }
    }
}

fn unexpected(expected: &'static str, actual: &Event) -> Error {
    Error::UnexpectedResponse {
        expected,
        actual: actual.kind(),
    }
}

fn check_status(command: &Command, status: u8) -> Result<()> {
    match status {
        STATUS_SUCCESS => Ok(()),
        STATUS_FAILURE => Err(Error::command_failed(command.name())),
        other => Err(Error::UnknownStatus(other)),
    }
}

/// Interpret the answer to a control request.
fn operated(command: &Command, event: Event) -> Result<Option<ShowerState>> {
    match event {
        Event::SuccessOrFailure { status } => check_status(command, status).map(|()| None),
        Event::ControlsOperated {
            change_made: true,
            state,
        } => Ok(Some(state)),
        Event::ControlsOperated {
            change_made: false, ..
        } => Err(Error::command_failed(command.name())),
        other => Err(unexpected("controls_operated", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    const SLOT: u8 = 1;

    fn identity() -> ClientIdentity {
        ClientIdentity::new(12345, SLOT).unwrap()
    }

    /// Single-fragment notification addressed to `SLOT`.
    fn reply(payload: &[u8]) -> Vec<u8> {
        let mut fragment = vec![0x40 + SLOT, 0x00, payload.len() as u8];
        fragment.extend_from_slice(payload);
        fragment
    }

    async fn open(mock: &MockTransport) -> Session<MockTransport> {
        let config = SessionConfig::default().response_timeout(Duration::from_millis(200));
        Session::open(mock.clone(), Some(identity()), config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_subscribes() {
        let mock = MockTransport::new();
        let _session = open(&mock).await;
        assert!(mock.is_subscribed());
        assert_eq!(mock.subscribe_count(), 1);
    }

    #[tokio::test]
    async fn test_open_rejects_bad_config() {
        let mock = MockTransport::new();
        let err = Session::open(mock.clone(), None, SessionConfig::default().chunk_size(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = Session::open(
            mock.clone(),
            None,
            SessionConfig::default().response_timeout(Duration::ZERO),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(!mock.is_subscribed());
    }

    #[tokio::test]
    async fn test_open_propagates_subscribe_failure() {
        let mock = MockTransport::new();
        mock.set_fail_subscribe(true);
        let result = Session::open(mock.clone(), None, SessionConfig::default()).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_device_state() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;
        mock.queue_reply(vec![reply(&[
            0x01, 0x00, 0x32, 0x00, 0x28, 0x64, 0x00, 0x00, 0x1E, 0x05,
        ])]);

        let state = session.device_state().await.unwrap();
        assert!(state.outlet1);
        assert!(!state.outlet2);
        assert_eq!(state.remaining_seconds, 30);
        assert_eq!(state.update_counter, 5);
        assert_eq!(mock.writes(), vec![vec![0x01, 0x07, 0x00, 0x23, 0x01]]);
    }

    #[tokio::test]
    async fn test_fragmented_response() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;

        let mut name = b"Kitchen".to_vec();
        name.resize(20, 0);
        let full = reply(&name);
        mock.queue_reply(vec![full[..10].to_vec(), full[10..].to_vec()]);

        assert_eq!(session.client_details(2).await.unwrap(), "Kitchen");
    }

    #[tokio::test]
    async fn test_client_and_preset_slots() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;

        mock.queue_reply(vec![reply(&[0x00, 0x03])]);
        assert_eq!(session.client_slots().await.unwrap(), vec![0, 1]);

        mock.queue_reply(vec![reply(&[0x00, 0x05])]);
        assert_eq!(session.preset_slots().await.unwrap(), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_pair_client_multi_chunk() {
        let mock = MockTransport::new();
        let config = SessionConfig::default().response_timeout(Duration::from_millis(200));
        let mut session = Session::open(mock.clone(), None, config).await.unwrap();

        mock.queue_reply(vec![reply(&[0x03])]);
        let identity = session.pair_client(40000, "Rust client").await.unwrap();
        assert_eq!(identity.client_id(), 40000);
        assert_eq!(identity.client_slot(), 3);

        let writes = mock.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].len(), MTU);
        assert_eq!(writes.concat().len(), 29);
    }

    #[tokio::test]
    async fn test_pair_client_refused() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;
        mock.queue_reply(vec![reply(&[STATUS_FAILURE])]);
        let err = session.pair_client(40000, "Rust client").await.unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_pair_name_too_long_writes_nothing() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;
        let err = session
            .pair_client(40000, "a name that is far too long")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(mock.writes().is_empty());
    }

    #[tokio::test]
    async fn test_request_without_identity() {
        let mock = MockTransport::new();
        let mut session = Session::open(mock.clone(), None, SessionConfig::default())
            .await
            .unwrap();
        assert!(matches!(
            session.device_state().await,
            Err(Error::NotPaired)
        ));
        assert!(mock.writes().is_empty());

        session.set_identity(Some(identity()));
        assert_eq!(session.identity().map(|i| i.client_slot()), Some(SLOT));
    }

    #[tokio::test]
    async fn test_status_handling() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;

        mock.queue_reply(vec![reply(&[STATUS_SUCCESS])]);
        session.unpair_client(4).await.unwrap();

        mock.queue_reply(vec![reply(&[STATUS_FAILURE])]);
        assert!(matches!(
            session.unpair_client(4).await,
            Err(Error::CommandFailed { .. })
        ));

        mock.queue_reply(vec![reply(&[0x42])]);
        assert!(matches!(
            session.unpair_client(4).await,
            Err(Error::UnknownStatus(0x42))
        ));
    }

    #[tokio::test]
    async fn test_control_outlets_echo() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;

        mock.queue_reply(vec![reply(&[
            0x01, 0x01, 0x00, 0x7C, 0x00, 0x7A, 0x64, 0x00, 0x01, 0x2C, 0x02,
        ])]);
        let state = session
            .control_outlets(true, false, 38.0)
            .await
            .unwrap()
            .unwrap();
        assert!(state.outlet1);
        assert_eq!(state.remaining_seconds, 300);

        mock.queue_reply(vec![reply(&[STATUS_SUCCESS])]);
        assert!(session.start_preset(0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unexpected_response() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;
        mock.queue_reply(vec![reply(&[0x00, 0x03])]);
        let err = session.device_state().await.unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedResponse {
                expected: "device_state",
                actual: "slots"
            }
        ));
    }

    #[tokio::test]
    async fn test_decode_error_surfaces() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;
        let mut payload = [b'a'; 16];
        payload[3] = 0xFF;
        mock.queue_reply(vec![reply(&payload)]);
        let err = session.nickname().await.unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_timeout_resets_reassembly() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;

        // Header promises 10 bytes, only 2 arrive.
        mock.queue_reply(vec![vec![0x41, 0x00, 0x0A, 0x01, 0x00]]);
        let err = session.device_state().await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));

        // A fresh header is parsed as a header, not appended to the stale buffer.
        mock.queue_reply(vec![reply(&[STATUS_SUCCESS])]);
        session.unpair_client(2).await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_notification_not_attributed() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;

        // Unsolicited notification with no request waiting.
        assert!(mock.notify(&reply(&[0x00, 0x03])));
        tokio::time::sleep(Duration::from_millis(20)).await;

        mock.queue_reply(vec![reply(&[
            0x01, 0x00, 0x32, 0x00, 0x28, 0x64, 0x00, 0x00, 0x1E, 0x05,
        ])]);
        assert!(session.device_state().await.is_ok());
    }

    #[tokio::test]
    async fn test_queued_unsolicited_fragment_not_attributed() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;

        // Still sitting in the fragment queue when the request starts.
        assert!(mock.notify(&reply(&[0x00, 0x03])));
        mock.queue_reply(vec![reply(&[
            0x01, 0x00, 0x32, 0x00, 0x28, 0x64, 0x00, 0x00, 0x1E, 0x05,
        ])]);

        let state = session.device_state().await.unwrap();
        assert_eq!(state.update_counter, 5);

        // Nothing left over for the next request either.
        mock.queue_reply(vec![reply(&[0x00, 0x05])]);
        assert_eq!(session.preset_slots().await.unwrap(), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_unsolicited_partial_discarded_before_request() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;

        // Header promises 10 bytes, the rest never comes.
        assert!(mock.notify(&[0x41, 0x00, 0x0A, 0x01, 0x00]));
        mock.queue_reply(vec![reply(&[0x00, 0x03])]);

        assert_eq!(session.client_slots().await.unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_unrecognized_payload_ignored() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;
        mock.queue_reply(vec![reply(&[0; 7]), reply(&[0x00, 0x01])]);
        assert_eq!(session.client_slots().await.unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let mock = MockTransport::new();
        let mut session = open(&mock).await;
        mock.set_fail_writes(true);
        assert!(matches!(
            session.device_state().await,
            Err(Error::WriteFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_small_chunk_size() {
        let mock = MockTransport::new();
        let config = SessionConfig::default()
            .chunk_size(2)
            .response_timeout(Duration::from_millis(200));
        let mut session = Session::open(mock.clone(), Some(identity()), config)
            .await
            .unwrap();
        mock.queue_reply(vec![reply(b"Shower\0\0\0\0\0\0\0\0\0\0")]);
        assert_eq!(session.nickname().await.unwrap(), "Shower");
        let writes = mock.writes();
        assert_eq!(writes.len(), 3);
        assert!(writes.iter().all(|w| w.len() <= 2));
        assert_eq!(&writes.concat()[..3], &[0x01, 0x44, 0x00]);
    }

    #[tokio::test]
    async fn test_device_info() {
        let mock = MockTransport::new();
        mock.set_characteristic(CharacteristicId::ModelNumber, b"Mode Dual\0\0".to_vec());
        let session = open(&mock).await;
        let info = session.device_info().await.unwrap();
        assert_eq!(info.name, "Mira Mode");
        assert_eq!(info.model, "Mode Dual");
        assert_eq!(info.manufacturer, "Kohler Mira Ltd");

        mock.set_characteristic(CharacteristicId::DeviceName, vec![0xFF]);
        assert!(matches!(
            session.device_info().await,
            Err(Error::InvalidData(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_session_ignores_notifications() {
        let mock = MockTransport::new();
        let session = open(&mock).await;
        session.close();
        tokio::task::yield_now().await;
        // Callback still registered but must not panic.
        assert!(mock.notify(&reply(&[0x01])));
    }
}
