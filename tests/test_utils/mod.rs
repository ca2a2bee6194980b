//! Harness for driving the engine without a window.

#![allow(dead_code)]

pub mod scripted_backend;

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::time::timeout;

use utopia_dystopia::config::{AnimationMode, EngineConfig, FeatureSet};
use utopia_dystopia::engine::backend::GenerationBackend;
use utopia_dystopia::engine::credentials::{CredentialProvider, SharedCredential};
use utopia_dystopia::engine::engine::Engine;
use utopia_dystopia::engine::playback::{ActivePlayback, AudioOutput, FinishedCallback, PcmClip};
use utopia_dystopia::engine::protocol::{EngineCommand, EngineResponse, StorySnapshot};
use utopia_dystopia::error::PlaybackError;
use utopia_dystopia::minigame::MiniGameKind;

pub use scripted_backend::{Call, ScriptedBackend};

/// Longest virtual wait for a single engine step.
const STEP_LIMIT: Duration = Duration::from_secs(3_600);
const MAX_STEPS: usize = 500;

#[derive(Default)]
pub struct OutputLog {
    pub started: usize,
    pub stopped: usize,
    pub callbacks: Vec<FinishedCallback>,
}

/// Audio output that records starts and stops instead of playing.
pub struct FakeOutput {
    pub log: Arc<Mutex<OutputLog>>,
}

struct FakePlayback {
    log: Arc<Mutex<OutputLog>>,
}

impl AudioOutput for FakeOutput {
    fn start(
        &mut self,
        _clip: PcmClip,
        on_finished: FinishedCallback,
    ) -> Result<Box<dyn ActivePlayback>, PlaybackError> {
        let mut log = self.log.lock().unwrap();
        log.started += 1;
        log.callbacks.push(on_finished);
        Ok(Box::new(FakePlayback {
            log: Arc::clone(&self.log),
        }))
    }
}

impl ActivePlayback for FakePlayback {
    fn stop(&mut self) {
        self.log.lock().unwrap().stopped += 1;
    }
}

pub fn config(mini_game: MiniGameKind, animation: AnimationMode) -> EngineConfig {
    EngineConfig {
        features: FeatureSet {
            narration: true,
            scene_images: true,
            animation,
            mini_game,
        }
        .normalized(),
        ..EngineConfig::default()
    }
}

pub struct Harness {
    pub engine: Engine,
    pub commands: UnboundedSender<EngineCommand>,
    pub responses: mpsc::Receiver<EngineResponse>,
    pub backend: Arc<ScriptedBackend>,
    pub credentials: Arc<SharedCredential>,
    pub output: Arc<Mutex<OutputLog>>,
}

impl Harness {
    pub fn new(backend: ScriptedBackend, config: EngineConfig) -> Self {
        let credentials = Arc::new(SharedCredential::new(Some("test-key".into())));
        Self::with_credentials(backend, config, credentials)
    }

    pub fn with_credentials(
        backend: ScriptedBackend,
        config: EngineConfig,
        credentials: Arc<SharedCredential>,
    ) -> Self {
        let backend = Arc::new(backend);
        let output = Arc::new(Mutex::new(OutputLog::default()));
        let (commands, command_rx) = unbounded_channel();
        let (response_tx, responses) = mpsc::channel();

        let engine = Engine::new(
            Arc::clone(&backend) as Arc<dyn GenerationBackend>,
            Arc::clone(&credentials) as Arc<dyn CredentialProvider>,
            Box::new(FakeOutput {
                log: Arc::clone(&output),
            }),
            config,
            command_rx,
            response_tx,
        );

        Self {
            engine,
            commands,
            responses,
            backend,
            credentials,
            output,
        }
    }

    pub fn send(&self, command: EngineCommand) {
        self.commands.send(command).expect("engine receiver dropped");
    }

    pub fn snapshot(&self) -> StorySnapshot {
        self.engine.snapshot()
    }

    pub async fn step(&mut self) -> bool {
        timeout(STEP_LIMIT, self.engine.step())
            .await
            .expect("engine stalled")
    }

    /// Steps until `done` holds for the current state.
    pub async fn step_until(&mut self, mut done: impl FnMut(&StorySnapshot) -> bool) -> StorySnapshot {
        for _ in 0..MAX_STEPS {
            self.step().await;
            let snapshot = self.snapshot();
            if done(&snapshot) {
                return snapshot;
            }
        }
        panic!("condition not reached after {MAX_STEPS} steps: {:#?}", self.snapshot());
    }

    /// Processes every event that arrives within `window` of virtual time.
    pub async fn drain(&mut self, window: Duration) -> StorySnapshot {
        while let Ok(running) = timeout(window, self.engine.step()).await {
            assert!(running, "engine stopped while draining");
        }
        self.snapshot()
    }

    /// Sends `Start` and waits for the opening segment.
    pub async fn open_story(&mut self) -> StorySnapshot {
        self.send(EngineCommand::Start);
        self.step_until(|s| !s.loading && !s.segments.is_empty()).await
    }

    /// Fires the completion callback of the most recent playback.
    pub fn finish_latest_playback(&self) {
        let callback = self.output.lock().unwrap().callbacks.pop();
        if let Some(callback) = callback {
            callback();
        }
    }
}
