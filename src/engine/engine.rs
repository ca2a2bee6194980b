use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::config::{AnimationMode, EngineConfig};
use crate::engine::animation::{run_animation_job, PollPolicy};
use crate::engine::backend::{GenerationBackend, SegmentRequest};
use crate::engine::credentials::CredentialProvider;
use crate::engine::gate::ProgressionGate;
use crate::engine::playback::{AudioOutput, PlaybackController, PlaybackTicket};
use crate::engine::protocol::{EngineCommand, EngineResponse, StorySnapshot};
use crate::error::{is_authorization_message, GenerationError, UserFacingError};
use crate::minigame::hidden_object::{HiddenZone, SearchOutcome};
use crate::minigame::jigsaw::PlacementOutcome;
use crate::minigame::{MiniGame, MiniGameKind};
use crate::model::history::{HistoryLog, SegmentPatch};
use crate::model::media::{AudioClip, SceneImage};
use crate::model::response::NarrativeResponse;
use crate::model::segment::{
    AnimationState, ChoiceKey, MediaPrompts, MediaSlot, NarrativeSegment, PathTone, SegmentId,
    SegmentMedia, TurnOrigin,
};
use crate::model::turn::ActiveTurn;

pub const INITIAL_WORLD_SUMMARY: &str =
    "The world is a blank canvas, poised at a crucial turning point. The future is unwritten.";

const ANIMATION_ABORTED: &str = "Animation job stopped unexpectedly.";

/// Results of spawned backend work, applied by the engine loop.
enum TaskEvent {
    SegmentResolved {
        epoch: u64,
        origin: Option<TurnOrigin>,
        tone: PathTone,
        result: Result<NarrativeResponse, GenerationError>,
    },
    ImageResolved {
        segment: SegmentId,
        result: Result<SceneImage, GenerationError>,
    },
    NarrationResolved {
        segment: SegmentId,
        result: Result<AudioClip, GenerationError>,
    },
    Animation {
        segment: SegmentId,
        state: AnimationState,
    },
    GateElapsed(SegmentId),
    PlaybackFinished(PlaybackTicket),
}

pub type RepaintHook = Arc<dyn Fn() + Send + Sync>;

/// Owns the story state. Runs on its own thread; the UI only sees snapshots.
pub struct Engine {
    backend: Arc<dyn GenerationBackend>,
    credentials: Arc<dyn CredentialProvider>,
    config: EngineConfig,
    gate: ProgressionGate,

    history: HistoryLog,
    world_summary: String,
    turn: Option<ActiveTurn>,
    loading: bool,
    error: Option<UserFacingError>,
    has_credential: bool,
    playback: PlaybackController,
    animations_in_flight: HashSet<SegmentId>,

    /// Never reset, so ids stay unique across restarts.
    next_segment: u64,
    /// Bumped on every restart to drop text responses of the old story.
    epoch: u64,
    rng: StdRng,

    commands: UnboundedReceiver<EngineCommand>,
    tasks_tx: UnboundedSender<TaskEvent>,
    tasks_rx: UnboundedReceiver<TaskEvent>,
    responses: Sender<EngineResponse>,
    repaint: Option<RepaintHook>,
}

impl Engine {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        credentials: Arc<dyn CredentialProvider>,
        output: Box<dyn AudioOutput>,
        config: EngineConfig,
        commands: UnboundedReceiver<EngineCommand>,
        responses: Sender<EngineResponse>,
    ) -> Self {
        let config = config.normalized();
        let (tasks_tx, tasks_rx) = unbounded_channel();

        let finished_tx = tasks_tx.clone();
        let playback = PlaybackController::new(
            output,
            Arc::new(move |ticket: PlaybackTicket| {
                let _ = finished_tx.send(TaskEvent::PlaybackFinished(ticket));
            }),
        );

        let has_credential = credentials.has_credential();
        if !has_credential {
            warn!("no API key configured");
        }

        Self {
            backend,
            gate: ProgressionGate::new(&config),
            config,
            history: HistoryLog::new(),
            world_summary: INITIAL_WORLD_SUMMARY.to_string(),
            turn: None,
            loading: false,
            error: None,
            has_credential,
            credentials,
            playback,
            animations_in_flight: HashSet::new(),
            next_segment: 0,
            epoch: 0,
            rng: StdRng::from_entropy(),
            commands,
            tasks_tx,
            tasks_rx,
            responses,
            repaint: None,
        }
    }

    /// Called after every published snapshot, e.g. to wake the UI.
    pub fn with_repaint(mut self, repaint: RepaintHook) -> Self {
        self.repaint = Some(repaint);
        self
    }

    pub async fn run(mut self) {
        info!("engine started");
        while self.step().await {}
        self.playback.stop();
        info!("engine stopped");
    }

    /// Handles one command or task result and publishes a snapshot.
    /// Returns `false` once the engine should stop.
    pub async fn step(&mut self) -> bool {
        let keep_running = tokio::select! {
            command = self.commands.recv() => match command {
                Some(command) => self.handle_command(command),
                None => false,
            },
            Some(event) = self.tasks_rx.recv() => {
                self.handle_task(event);
                true
            }
        };

        self.publish();
        keep_running
    }

    pub fn snapshot(&self) -> StorySnapshot {
        StorySnapshot {
            segments: self.history.segments().to_vec(),
            turn: self.turn.clone(),
            loading: self.loading,
            error: self.error.clone(),
            active_playback: self.playback.active_segment().cloned(),
            has_credential: self.has_credential,
            features: self.config.features,
            animations_in_flight: self.animations_in_flight.iter().cloned().collect(),
        }
    }

    fn publish(&self) {
        let _ = self
            .responses
            .send(EngineResponse::Snapshot(Box::new(self.snapshot())));
        if let Some(repaint) = &self.repaint {
            repaint();
        }
    }

    fn handle_command(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::Start => self.start(),
            EngineCommand::Choose(key) => self.choose(key),
            EngineCommand::RequestAnimation(segment) => self.request_animation(&segment),
            EngineCommand::AttemptHiddenObject { segment, zone } => {
                self.attempt_hidden_object(&segment, zone)
            }
            EngineCommand::PlacePuzzlePiece {
                segment,
                piece,
                row,
                col,
            } => self.place_puzzle_piece(&segment, piece, row, col),
            EngineCommand::PuzzleHint(segment) => self.puzzle_hint(&segment),
            EngineCommand::TogglePlayback(segment) => self.toggle_playback(&segment),
            EngineCommand::ProvideCredential(key) => self.provide_credential(key),
            EngineCommand::Shutdown => {
                self.playback.stop();
                return false;
            }
        }
        true
    }

    fn handle_task(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::SegmentResolved {
                epoch,
                origin,
                tone,
                result,
            } => self.segment_resolved(epoch, origin, tone, result),
            TaskEvent::ImageResolved { segment, result } => self.image_resolved(segment, result),
            TaskEvent::NarrationResolved { segment, result } => {
                self.narration_resolved(segment, result)
            }
            TaskEvent::Animation { segment, state } => self.animation_progress(segment, state),
            TaskEvent::GateElapsed(segment) => self.open_follow_up(&segment),
            TaskEvent::PlaybackFinished(ticket) => {
                self.playback.finished(&ticket);
            }
        }
    }

    fn start(&mut self) {
        self.epoch += 1;
        self.history.reset();
        self.playback.stop();
        self.animations_in_flight.clear();
        self.world_summary = INITIAL_WORLD_SUMMARY.to_string();
        self.turn = None;
        self.error = None;
        self.has_credential = self.credentials.has_credential();
        self.loading = true;

        let tone = PathTone::following(None, self.config.starting_tone);
        info!(epoch = self.epoch, %tone, "starting a new story");
        self.request_segment(None, tone);
    }

    fn choose(&mut self, key: ChoiceKey) {
        let Some(turn) = self.turn.as_mut() else {
            debug!(%key, "no question to answer");
            return;
        };
        if turn.in_flight || self.loading {
            debug!(%key, "a choice is already being resolved");
            return;
        }
        turn.in_flight = true;

        let origin = TurnOrigin {
            question: turn.question.clone(),
            choices: turn.choices.clone(),
            chosen: key,
        };
        self.loading = true;
        self.error = None;

        let tone = PathTone::following(
            self.history.last().map(|segment| segment.tone),
            self.config.starting_tone,
        );
        info!(%key, %tone, "player chose");
        self.request_segment(Some(origin), tone);
    }

    fn request_segment(&self, origin: Option<TurnOrigin>, tone: PathTone) {
        let request = SegmentRequest {
            prior_summary: self.world_summary.clone(),
            chosen_option: origin
                .as_ref()
                .map(|origin| origin.chosen_text().to_string()),
            tone,
            hidden_object: self.config.features.mini_game == MiniGameKind::HiddenObject,
        };

        let backend = Arc::clone(&self.backend);
        let tasks = self.tasks_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = backend.request_segment(&request).await;
            let _ = tasks.send(TaskEvent::SegmentResolved {
                epoch,
                origin,
                tone,
                result,
            });
        });
    }

    fn segment_resolved(
        &mut self,
        epoch: u64,
        origin: Option<TurnOrigin>,
        tone: PathTone,
        result: Result<NarrativeResponse, GenerationError>,
    ) {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "dropping story text from a previous run");
            return;
        }
        self.loading = false;

        match result {
            Ok(response) => self.commit(response, origin, tone),
            Err(err) => {
                error!(%err, "story generation failed");
                if err.is_authorization_failure() {
                    self.downgrade_credential();
                }
                self.error = Some(UserFacingError::turn_failed(&err));
                if let Some(turn) = self.turn.as_mut() {
                    turn.in_flight = false;
                }
            }
        }
    }

    fn commit(&mut self, response: NarrativeResponse, origin: Option<TurnOrigin>, tone: PathTone) {
        let summary = response.new_world_summary.trim();
        if !summary.is_empty() {
            self.world_summary = summary.to_string();
        }

        let id = SegmentId::new(self.next_segment);
        self.next_segment += 1;

        let features = self.config.features;
        let mini_game = self
            .gate
            .attach(&response, self.history.len() + 1, &mut self.rng);

        let segment = NarrativeSegment {
            id: id.clone(),
            tone,
            narrative_text: response.story_result.trim().to_string(),
            origin,
            follow_up_question: response.new_question.trim().to_string(),
            follow_up_choices: response.choices(),
            prompts: MediaPrompts {
                narration: response.narration_text().to_string(),
                image: response.image_prompt().to_string(),
                animation: response.animation_prompt().to_string(),
            },
            media: SegmentMedia {
                image: initial_slot(features.scene_images),
                narration: initial_slot(features.narration),
                animation: AnimationState::NotStarted,
            },
            mini_game,
        };

        let opens_now = self.gate.opens_immediately(&segment);
        let next_turn = ActiveTurn::new(
            segment.follow_up_question.clone(),
            segment.follow_up_choices.clone(),
        );
        let prompts = segment.prompts.clone();

        if !self.history.append(segment) {
            warn!(%id, "segment id already in history");
            return;
        }
        info!(%id, %tone, gated = !opens_now, "segment committed");

        self.turn = opens_now.then_some(next_turn);

        if features.scene_images {
            self.spawn_image(id.clone(), prompts.image);
        }
        if features.narration {
            self.spawn_narration(id, prompts.narration);
        }
    }

    fn spawn_image(&self, segment: SegmentId, prompt: String) {
        let backend = Arc::clone(&self.backend);
        let tasks = self.tasks_tx.clone();
        tokio::spawn(async move {
            let result = backend.request_scene_image(&prompt).await;
            let _ = tasks.send(TaskEvent::ImageResolved { segment, result });
        });
    }

    fn spawn_narration(&self, segment: SegmentId, text: String) {
        let backend = Arc::clone(&self.backend);
        let tasks = self.tasks_tx.clone();
        tokio::spawn(async move {
            let result = backend.request_narration_audio(&text).await;
            let _ = tasks.send(TaskEvent::NarrationResolved { segment, result });
        });
    }

    fn image_resolved(&mut self, segment: SegmentId, result: Result<SceneImage, GenerationError>) {
        if let Err(err) = &result {
            self.note_media_failure(err);
        }
        if !self.history.contains(&segment) {
            debug!(%segment, "dropping image for a discarded segment");
            return;
        }

        match result {
            Ok(image) => {
                debug!(%segment, bytes = image.bytes.len(), "scene image ready");
                self.history
                    .patch(&segment, SegmentPatch::Image(MediaSlot::Ready(image)));
                if let Some(game) = self.history.mini_game_mut(&segment) {
                    game.reveal();
                }
                self.maybe_auto_animate(&segment);
            }
            Err(err) => {
                warn!(%segment, %err, "scene image failed");
                self.history
                    .patch(&segment, SegmentPatch::Image(MediaSlot::Failed(err.to_string())));
                // Nothing to play on, so the game cannot hold the story back.
                self.open_follow_up(&segment);
            }
        }
    }

    fn narration_resolved(&mut self, segment: SegmentId, result: Result<AudioClip, GenerationError>) {
        if let Err(err) = &result {
            self.note_media_failure(err);
        }
        if !self.history.contains(&segment) {
            debug!(%segment, "dropping narration for a discarded segment");
            return;
        }

        match result {
            Ok(clip) => {
                debug!(%segment, bytes = clip.pcm.len(), "narration ready");
                self.history
                    .patch(&segment, SegmentPatch::Narration(MediaSlot::Ready(clip.clone())));

                let already_playing = self.playback.active_segment() == Some(&segment);
                if self.config.autoplay_narration && self.history.is_latest(&segment) && !already_playing {
                    self.playback.toggle(&segment, &clip);
                }
            }
            Err(err) => {
                warn!(%segment, %err, "narration failed");
                self.history
                    .patch(&segment, SegmentPatch::Narration(MediaSlot::Failed(err.to_string())));
            }
        }
    }

    fn toggle_playback(&mut self, segment: &SegmentId) {
        let Some(clip) = self
            .history
            .get(segment)
            .and_then(|s| s.media.narration.ready())
            .cloned()
        else {
            debug!(%segment, "no narration to play");
            return;
        };
        self.playback.toggle(segment, &clip);
    }

    fn request_animation(&mut self, segment: &SegmentId) {
        if self.config.features.animation == AnimationMode::Off {
            debug!(%segment, "animation is switched off");
            return;
        }
        if !self.has_credential {
            self.error = Some(UserFacingError::credential_required());
            return;
        }
        self.start_animation(segment);
    }

    fn start_animation(&mut self, id: &SegmentId) {
        let Some(segment) = self.history.get(id) else {
            debug!(segment = %id, "animation requested for unknown segment");
            return;
        };
        let Some(image) = segment.media.image.ready().cloned() else {
            debug!(segment = %id, "animation needs a scene image");
            return;
        };
        if segment.media.animation.is_running() || self.animations_in_flight.contains(id) {
            debug!(segment = %id, "animation already running");
            return;
        }

        let prompt = segment.prompts.animation.clone();
        self.animations_in_flight.insert(id.clone());
        // A new attempt replaces whatever the last one left behind.
        self.history
            .patch(id, SegmentPatch::Animation(AnimationState::NotStarted));

        let policy = PollPolicy {
            interval: self.config.poll_interval,
            max_checks: self.config.max_poll_checks,
        };
        let backend = Arc::clone(&self.backend);
        let tasks = self.tasks_tx.clone();
        let segment = id.clone();
        let report_to = id.clone();
        let job = tokio::spawn(async move {
            run_animation_job(backend, segment, image, prompt, policy, move |state| {
                let _ = tasks.send(TaskEvent::Animation {
                    segment: report_to.clone(),
                    state,
                });
            })
            .await;
        });

        // A job that dies before its terminal report must still leave the in-flight set.
        let tasks = self.tasks_tx.clone();
        let segment = id.clone();
        tokio::spawn(async move {
            if let Err(err) = job.await {
                error!(%segment, %err, "animation job stopped unexpectedly");
                let _ = tasks.send(TaskEvent::Animation {
                    segment,
                    state: AnimationState::Failed(ANIMATION_ABORTED.to_string()),
                });
            }
        });
    }

    fn animation_progress(&mut self, segment: SegmentId, state: AnimationState) {
        if matches!(state, AnimationState::Done(_) | AnimationState::Failed(_)) {
            self.animations_in_flight.remove(&segment);
        }
        // A refused key stays refused even if its segment was discarded.
        if let Some(message) = state.error() {
            if is_authorization_message(message) {
                self.downgrade_credential();
                self.error = Some(UserFacingError::credential_required());
            }
        }
        if !self.history.contains(&segment) {
            debug!(%segment, "dropping animation update for a discarded segment");
            return;
        }

        self.history.patch(&segment, SegmentPatch::Animation(state));
    }

    fn maybe_auto_animate(&mut self, id: &SegmentId) {
        if self.config.features.animation != AnimationMode::AfterImage
            || !self.has_credential
            || !self.history.is_latest(id)
        {
            return;
        }
        let ready = self.history.get(id).is_some_and(|segment| {
            !segment.is_gated()
                && segment.media.image.ready().is_some()
                && segment.media.animation == AnimationState::NotStarted
        });
        if ready {
            self.start_animation(id);
        }
    }

    fn attempt_hidden_object(&mut self, segment: &SegmentId, zone: HiddenZone) {
        let Some(MiniGame::HiddenObject(game)) = self.history.mini_game_mut(segment) else {
            debug!(%segment, "no hidden object game on segment");
            return;
        };

        match game.attempt(zone) {
            SearchOutcome::Found => {
                info!(%segment, %zone, "hidden object found");
                self.schedule_release(segment);
            }
            SearchOutcome::Missed => debug!(%segment, %zone, "hidden object not here"),
            SearchOutcome::AlreadySolved => {}
        }
    }

    fn place_puzzle_piece(&mut self, segment: &SegmentId, piece: usize, row: usize, col: usize) {
        let Some(MiniGame::Jigsaw(game)) = self.history.mini_game_mut(segment) else {
            debug!(%segment, "no puzzle on segment");
            return;
        };

        let outcome = game.place(piece, row, col);
        debug!(%segment, piece, row, col, ?outcome, "puzzle placement");
        if outcome == PlacementOutcome::Completed {
            info!(%segment, "puzzle solved");
            self.schedule_release(segment);
        }
    }

    fn puzzle_hint(&mut self, segment: &SegmentId) {
        let Some(MiniGame::Jigsaw(game)) = self.history.mini_game_mut(segment) else {
            debug!(%segment, "no puzzle on segment");
            return;
        };

        if let Some((piece, outcome)) = game.hint(&mut self.rng) {
            debug!(%segment, piece, ?outcome, "hint placed a piece");
            if outcome == PlacementOutcome::Completed {
                info!(%segment, "puzzle solved");
                self.schedule_release(segment);
            }
        }
    }

    /// Opens the follow-up question after the game's pacing delay.
    fn schedule_release(&self, segment: &SegmentId) {
        if !self.history.is_latest(segment) {
            debug!(%segment, "solved an older segment; turn unaffected");
            return;
        }
        let delay = self
            .history
            .get(segment)
            .and_then(|s| s.mini_game.as_ref())
            .map(|game| self.gate.release_delay(game))
            .unwrap_or(Duration::ZERO);

        let tasks = self.tasks_tx.clone();
        let segment = segment.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tasks.send(TaskEvent::GateElapsed(segment));
        });
    }

    /// Makes the follow-up of `segment` the active turn if it is still the
    /// latest segment and nothing else has been offered since.
    fn open_follow_up(&mut self, segment: &SegmentId) {
        if self.loading || self.turn.is_some() || !self.history.is_latest(segment) {
            return;
        }
        let Some(latest) = self.history.get(segment) else {
            return;
        };

        info!(%segment, "follow-up question released");
        self.turn = Some(ActiveTurn::new(
            latest.follow_up_question.clone(),
            latest.follow_up_choices.clone(),
        ));
        self.maybe_auto_animate(segment);
    }

    fn provide_credential(&mut self, key: String) {
        self.credentials.store(key);
        self.has_credential = self.credentials.has_credential();
        if !self.has_credential {
            self.error = Some(UserFacingError::credential_required());
            return;
        }

        info!("API key updated");
        let waiting_on_key = self
            .error
            .as_ref()
            .is_some_and(|error| error.kind == crate::error::FailureKind::Authorization);
        if waiting_on_key {
            self.error = None;
        }

        // The opening call failed for want of a key: try it again.
        if self.history.is_empty() && !self.loading {
            self.start();
        }
    }

    fn note_media_failure(&mut self, err: &GenerationError) {
        if err.is_authorization_failure() {
            self.downgrade_credential();
            self.error = Some(UserFacingError::credential_required());
        }
    }

    fn downgrade_credential(&mut self) {
        if self.has_credential {
            warn!("API key was refused; asking for a new one");
        }
        self.credentials.invalidate();
        self.has_credential = false;
    }
}

fn initial_slot<T>(enabled: bool) -> MediaSlot<T> {
    if enabled {
        MediaSlot::Pending
    } else {
        MediaSlot::Disabled
    }
}
