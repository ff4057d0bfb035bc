//! The satellite state machine.
//!
//! One async driver task walks OFF → IDLE → LISTENING → THINKING →
//! SPEAKING → IDLE, emitting an LED effect on every state entry. Audio
//! work happens on the listener worker; playback runs on a blocking task.
//! Within one utterance the sequence wake → capture → transcribe → ask →
//! speak is strictly sequential, and exactly one core request and one
//! playback (or canned error phrase) happen per accepted utterance.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::client::AskReply;
use crate::error::{Result, SatelliteError};
use crate::leds::{Lantern, LedEffect};
use crate::listener::{ListenCommand, ListenEvent, ListenerHandle};

pub const CONNECTION_TROUBLE_REPLY: &str = "Sorry, I'm having trouble connecting right now.";
pub const EMPTY_REPLY_FALLBACK: &str = "I'm not sure how to respond to that.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Off,
    Idle,
    Listening,
    Thinking,
    Speaking,
}

pub fn effect_for_state(state: State) -> LedEffect {
    match state {
        State::Off => LedEffect::Off,
        State::Idle => LedEffect::AlwaysOn,
        State::Listening => LedEffect::Listen,
        State::Thinking => LedEffect::Think,
        State::Speaking => LedEffect::Speak,
    }
}

#[async_trait]
pub trait AskBackend: Send + Sync {
    async fn ask(&self, text: &str, user_id: &str, device_id: &str) -> Result<AskReply>;
}

/// Blocking synthesis-and-playback of one reply; invoked via
/// `spawn_blocking`.
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, text: &str) -> Result<()>;
}

pub struct Satellite {
    state: State,
    lantern: Lantern,
    listener: ListenerHandle,
    backend: Arc<dyn AskBackend>,
    speech: Arc<dyn SpeechOutput>,
    user_id: String,
    device_id: String,
}

impl Satellite {
    pub fn new(
        lantern: Lantern,
        listener: ListenerHandle,
        backend: Arc<dyn AskBackend>,
        speech: Arc<dyn SpeechOutput>,
        device_id: impl Into<String>,
    ) -> Self {
        Satellite {
            state: State::Off,
            lantern,
            listener,
            backend,
            speech,
            user_id: "default".to_string(),
            device_id: device_id.into(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn set_state(&mut self, state: State) {
        self.state = state;
        self.lantern.set(effect_for_state(state));
        log::debug!("State -> {:?}", state);
    }

    /// Drive utterance cycles until cancelled. Transient failures log and
    /// return to IDLE; only a dead worker propagates an error so the outer
    /// runner can restart.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                self.set_state(State::Off);
                return Ok(());
            }
            self.run_cycle(cancel).await?;
        }
    }

    async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.set_state(State::Idle);
        self.listener.send(ListenCommand::AwaitWake)?;

        let event = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            event = self.listener.next_event() => event,
        };

        match event {
            Some(ListenEvent::Wake(wake)) => {
                log::info!("Awake on '{}' ({:.2})", wake.model, wake.score);
                self.lantern.set(LedEffect::Wakeup);
            }
            Some(ListenEvent::Failed(reason)) => {
                log::error!("Wake detection failed: {}", reason);
                return Ok(());
            }
            Some(other) => {
                log::warn!("Unexpected listener event: {:?}", other);
                return Ok(());
            }
            None => {
                return Err(SatelliteError::Wake("listener events closed".to_string()));
            }
        }

        self.set_state(State::Listening);
        self.listener.send(ListenCommand::Capture)?;

        let event = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            event = self.listener.next_event() => event,
        };

        let text = match event {
            Some(ListenEvent::Utterance { text, samples }) => {
                if text.is_empty() {
                    // Recoverable: heard silence or noise, skip the core.
                    log::info!("Heard nothing usable in {} samples", samples);
                    return Ok(());
                }
                text
            }
            Some(ListenEvent::Failed(reason)) => {
                log::error!("Capture failed: {}", reason);
                return Ok(());
            }
            Some(other) => {
                log::warn!("Unexpected listener event: {:?}", other);
                return Ok(());
            }
            None => {
                return Err(SatelliteError::Vad("listener events closed".to_string()));
            }
        };

        log::info!("Heard: \"{}\"", text);
        self.set_state(State::Thinking);

        let reply_text = match self
            .backend
            .ask(&text, &self.user_id, &self.device_id)
            .await
        {
            Ok(reply) => {
                log::info!(
                    "Core replied (intent: {}, confidence: {:.2})",
                    reply.intent.as_deref().unwrap_or("?"),
                    reply.confidence.unwrap_or(0.0)
                );
                reply
                    .response
                    .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string())
            }
            Err(e) => {
                log::error!("Core request failed: {}", e);
                CONNECTION_TROUBLE_REPLY.to_string()
            }
        };

        self.set_state(State::Speaking);

        let speech = Arc::clone(&self.speech);
        match tokio::task::spawn_blocking(move || speech.speak(&reply_text)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Playback failed: {}", e),
            Err(e) => log::error!("Playback task panicked: {}", e),
        }

        Ok(())
    }

    /// Final LED state on the way out.
    pub fn shutdown(mut self) {
        self.set_state(State::Off);
        self.lantern.shutdown();
    }
}

/// Outer runner: restarts the loop after a 1-second backoff on failure.
pub async fn run_forever(mut satellite: Satellite, cancel: CancellationToken) {
    while !cancel.is_cancelled() {
        match satellite.run(&cancel).await {
            Ok(()) => break,
            Err(e) => {
                log::error!("Satellite loop failed: {}. Restarting in 1s.", e);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
            }
        }
    }

    satellite.shutdown();
    log::info!("Satellite stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::config::{Color, LedSchedule};
    use crate::leds::driver::MockLedDriver;
    use crate::listener::ListenerHandle;
    use crate::wake::WakeEvent;

    struct MockBackend {
        replies: Mutex<Vec<Result<AskReply>>>,
        asked: Mutex<Vec<String>>,
    }

    impl MockBackend {
        fn with_reply(text: &str) -> Arc<Self> {
            Arc::new(MockBackend {
                replies: Mutex::new(vec![Ok(AskReply {
                    status: Some("ok".to_string()),
                    intent: Some("get_time".to_string()),
                    confidence: Some(0.95),
                    response: Some(text.to_string()),
                    action: None,
                })]),
                asked: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(MockBackend {
                replies: Mutex::new(vec![Err(SatelliteError::Network(
                    "connection refused".to_string(),
                ))]),
                asked: Mutex::new(Vec::new()),
            })
        }

        fn asked(&self) -> Vec<String> {
            self.asked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AskBackend for MockBackend {
        async fn ask(&self, text: &str, _user_id: &str, _device_id: &str) -> Result<AskReply> {
            self.asked.lock().unwrap().push(text.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(SatelliteError::Network("no scripted reply".to_string())))
        }
    }

    /// Records spoken text and cancels the loop after the first utterance.
    struct MockSpeech {
        spoken: Mutex<Vec<String>>,
        cancel: CancellationToken,
    }

    impl MockSpeech {
        fn new(cancel: CancellationToken) -> Arc<Self> {
            Arc::new(MockSpeech {
                spoken: Mutex::new(Vec::new()),
                cancel,
            })
        }

        fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }
    }

    impl SpeechOutput for MockSpeech {
        fn speak(&self, text: &str) -> Result<()> {
            self.spoken.lock().unwrap().push(text.to_string());
            self.cancel.cancel();
            Ok(())
        }
    }

    fn lantern() -> Lantern {
        Lantern::with_driver(
            Box::new(MockLedDriver::new(1)),
            Color::default(),
            LedSchedule {
                enabled: false,
                start_hour: 0,
                end_hour: 0,
            },
        )
    }

    /// A listener that replays scripted events, one per command.
    fn scripted_listener(events: Vec<ListenEvent>) -> ListenerHandle {
        let (command_tx, command_rx) = crossbeam_channel::bounded::<ListenCommand>(8);
        let (event_tx, event_rx) = tokio::sync::mpsc::channel(8);

        std::thread::spawn(move || {
            let mut events = events.into_iter();
            while command_rx.recv().is_ok() {
                match events.next() {
                    Some(event) => {
                        if event_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        });

        ListenerHandle::from_channels(command_tx, event_rx)
    }

    fn wake_event() -> ListenEvent {
        ListenEvent::Wake(WakeEvent {
            model: "hey_ember".to_string(),
            score: 0.7,
        })
    }

    fn utterance(text: &str) -> ListenEvent {
        ListenEvent::Utterance {
            text: text.to_string(),
            samples: 16_000,
        }
    }

    #[test]
    fn every_state_maps_to_its_effect() {
        assert_eq!(effect_for_state(State::Off), LedEffect::Off);
        assert_eq!(effect_for_state(State::Idle), LedEffect::AlwaysOn);
        assert_eq!(effect_for_state(State::Listening), LedEffect::Listen);
        assert_eq!(effect_for_state(State::Thinking), LedEffect::Think);
        assert_eq!(effect_for_state(State::Speaking), LedEffect::Speak);
    }

    #[tokio::test]
    async fn one_utterance_asks_once_and_speaks_once() {
        let cancel = CancellationToken::new();
        let backend = MockBackend::with_reply("It's 2 PM.");
        let speech = MockSpeech::new(cancel.clone());

        let listener = scripted_listener(vec![wake_event(), utterance("what time is it")]);
        let mut satellite = Satellite::new(
            lantern(),
            listener,
            backend.clone(),
            speech.clone(),
            "test-device",
        );

        satellite.run(&cancel).await.unwrap();

        assert_eq!(backend.asked(), vec!["what time is it".to_string()]);
        assert_eq!(speech.spoken(), vec!["It's 2 PM.".to_string()]);
        assert_eq!(satellite.state(), State::Off);
    }

    #[tokio::test]
    async fn network_failure_speaks_the_canned_phrase() {
        let cancel = CancellationToken::new();
        let backend = MockBackend::failing();
        let speech = MockSpeech::new(cancel.clone());

        let listener = scripted_listener(vec![wake_event(), utterance("what time is it")]);
        let mut satellite =
            Satellite::new(lantern(), listener, backend.clone(), speech.clone(), "dev");

        satellite.run(&cancel).await.unwrap();

        assert_eq!(speech.spoken(), vec![CONNECTION_TROUBLE_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn empty_transcription_skips_the_core() {
        let cancel = CancellationToken::new();
        let backend = MockBackend::with_reply("never spoken");
        let speech = MockSpeech::new(cancel.clone());

        // After the empty utterance the scripted listener runs dry, which
        // surfaces as a worker failure ending the run.
        let listener = scripted_listener(vec![wake_event(), utterance("")]);
        let mut satellite =
            Satellite::new(lantern(), listener, backend.clone(), speech.clone(), "dev");

        let result = satellite.run(&cancel).await;
        assert!(result.is_err());

        assert!(backend.asked().is_empty());
        assert!(speech.spoken().is_empty());
    }

    #[tokio::test]
    async fn wake_failure_returns_to_idle_without_capture() {
        let cancel = CancellationToken::new();
        let backend = MockBackend::with_reply("never spoken");
        let speech = MockSpeech::new(cancel.clone());

        let listener = scripted_listener(vec![ListenEvent::Failed("model exploded".to_string())]);
        let mut satellite =
            Satellite::new(lantern(), listener, backend.clone(), speech.clone(), "dev");

        // The failed wake is swallowed, then the dry listener ends the run.
        let result = satellite.run(&cancel).await;
        assert!(result.is_err());
        assert!(backend.asked().is_empty());
    }
}
