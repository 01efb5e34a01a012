use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};

use crate::bridge::chunk_bridge::{ChunkBridge, ListenerToken};
use crate::bridge::types::{ChunkStatus, StreamChunk};
use crate::errors::{RelayError, RelayResult};
use crate::page::controlled::UploadFile;
use crate::page::session::PageSession;
use crate::pipeline::assembler::ResponseAssembler;
use crate::pipeline::detector;
use crate::pipeline::state::{LoopState, ResponseEvent, SubmitMessage};
use crate::skills::engine;
use crate::skills::manifest::render_manifest;
use crate::skills::registry::SkillRegistry;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Handle to one in-flight conversation run.
pub struct ResponseStream {
    events: mpsc::Receiver<ResponseEvent>,
    cancel: Arc<Notify>,
    driver: tokio::task::JoinHandle<()>,
}

impl ResponseStream {
    pub async fn next(&mut self) -> Option<ResponseEvent> {
        self.events.recv().await
    }

    /// Caller-disconnect semantics: stops the run, unsubscribes from the
    /// bridge and frees the page buffer before returning, so an immediate
    /// new request cannot collide with stale state.
    pub async fn cancel(self) {
        self.cancel.notify_one();
        let _ = self.driver.await;
    }
}

/// Orchestrates assembler, detector and skill engine across possibly many
/// round-trips to the model, and decides the terminal outcome.
pub struct ConversationController {
    session: Arc<PageSession>,
    bridge: Arc<ChunkBridge>,
    registry: Arc<SkillRegistry>,
    assembler: Arc<ResponseAssembler>,
    upload_timeout: Duration,
}

impl ConversationController {
    pub fn new(
        session: Arc<PageSession>,
        bridge: Arc<ChunkBridge>,
        registry: Arc<SkillRegistry>,
        upload_timeout_secs: u64,
    ) -> Self {
        Self {
            session,
            bridge,
            registry,
            assembler: Arc::new(ResponseAssembler::new()),
            upload_timeout: Duration::from_secs(upload_timeout_secs),
        }
    }

    /// Starts one conversation run. Rejects with `ConcurrentRequest` while
    /// another run holds the page; the page is never queued behind an
    /// active request.
    pub async fn submit(&self, message: SubmitMessage) -> RelayResult<ResponseStream> {
        self.session.acquire()?;
        if let Err(e) = self.assembler.begin() {
            self.session.release();
            return Err(e);
        }

        tracing::info!(
            mode = ?message.mode,
            tab = ?message.tab_id,
            chars = message.message.len(),
            "conversation run starting"
        );

        if let Err(e) = self.prepare_page().await {
            self.assembler.reset();
            self.session.release();
            return Err(e);
        }

        let (token, chunk_rx) = self.bridge.subscribe();
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = Arc::new(Notify::new());

        let driver = tokio::spawn(drive(
            Arc::clone(&self.session),
            Arc::clone(&self.bridge),
            Arc::clone(&self.registry),
            Arc::clone(&self.assembler),
            token,
            chunk_rx,
            events_tx,
            Arc::clone(&cancel),
            message.message,
        ));

        Ok(ResponseStream {
            events: events_rx,
            cancel,
            driver,
        })
    }

    /// Attaches interception (idempotent) and uploads the skills manifest
    /// once per session, under a bounded wait.
    async fn prepare_page(&self) -> RelayResult<()> {
        self.bridge.attach(self.session.page()).await?;

        if self.session.manifest_uploaded() {
            return Ok(());
        }

        let manifest = render_manifest(&self.registry);
        let files = [UploadFile::markdown("skills.md", manifest)];
        match tokio::time::timeout(self.upload_timeout, self.session.page().upload_files(&files))
            .await
        {
            Ok(Ok(())) => {
                self.session.set_manifest_uploaded();
                tracing::info!("skills manifest uploaded");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RelayError::Page(format!(
                "skills manifest upload timed out after {}s",
                self.upload_timeout.as_secs()
            ))),
        }
    }
}

fn enter(state: &mut LoopState, next: LoopState) {
    tracing::debug!(from = ?state, to = ?next, "loop transition");
    *state = next;
}

/// The iterative loop over the exchange state machine. `outbound` is the
/// accumulator holding the latest text to send, so loop-back rounds never
/// grow the call stack.
#[allow(clippy::too_many_arguments)]
async fn drive(
    session: Arc<PageSession>,
    bridge: Arc<ChunkBridge>,
    registry: Arc<SkillRegistry>,
    assembler: Arc<ResponseAssembler>,
    token: ListenerToken,
    mut chunk_rx: mpsc::UnboundedReceiver<StreamChunk>,
    events_tx: mpsc::Sender<ResponseEvent>,
    cancel: Arc<Notify>,
    initial: String,
) {
    let mut state = LoopState::Idle;
    let mut outbound = initial;

    'run: loop {
        // ── Sending ───────────────────────────────────────────────────────
        enter(&mut state, LoopState::Sending);
        if let Err(e) = session.page().submit_text(&outbound).await {
            tracing::error!(error = %e, "failed to reach controlled page");
            let _ = events_tx
                .send(ResponseEvent::Error {
                    message: e.to_string(),
                })
                .await;
            break 'run;
        }

        // ── Streaming ─────────────────────────────────────────────────────
        enter(&mut state, LoopState::Streaming);
        loop {
            tokio::select! {
                maybe = chunk_rx.recv() => {
                    let Some(chunk) = maybe else {
                        tracing::warn!("chunk bridge closed mid-stream");
                        break 'run;
                    };
                    let Some(snapshot) = assembler.on_chunk(&chunk) else {
                        continue;
                    };
                    let finished = snapshot.status.is_finished();
                    if events_tx
                        .send(ResponseEvent::Chunk {
                            data: snapshot.data,
                            status: snapshot.status,
                            response_id: snapshot.response_id,
                        })
                        .await
                        .is_err()
                    {
                        tracing::info!("caller went away mid-stream");
                        break 'run;
                    }
                    if finished {
                        break;
                    }
                }
                _ = cancel.notified() => {
                    tracing::info!("request cancelled mid-stream");
                    break 'run;
                }
                _ = events_tx.closed() => {
                    tracing::info!("caller disconnected mid-stream");
                    break 'run;
                }
            }
        }

        let text = assembler.text().unwrap_or_default();
        if !detector::is_task(&text) {
            enter(&mut state, LoopState::Finalized);
            break 'run;
        }

        // ── TaskDetected → Executing ──────────────────────────────────────
        let task = match detector::parse_task(&text) {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(error = %e, "embedded task rejected");
                let _ = events_tx
                    .send(ResponseEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                break 'run;
            }
        };

        enter(
            &mut state,
            LoopState::Executing {
                task_id: task.task_id.clone(),
            },
        );
        let outcome = engine::run_task(&registry, &task).await;
        let outputs_json =
            serde_json::to_string(&outcome.outputs).unwrap_or_else(|_| "{}".into());

        if outcome.return_to_model {
            // Loop back: feed the results into the model as a new turn.
            outbound = format!("Here is the result of the previous steps: {outputs_json}");
            let response_id = assembler.response_id().unwrap_or_default();
            tracing::info!(
                task = %task.task_id,
                response = %response_id,
                "routing step results back to the model"
            );
            assembler.reset();
            if let Err(e) = assembler.begin() {
                tracing::error!(error = %e, "could not re-arm buffer for loop-back round");
                break 'run;
            }
            continue 'run;
        }

        // Self-contained task: deliver the user message plus the output
        // store directly to the caller.
        let response_id = assembler.response_id().unwrap_or_default();
        let data = format!("{}\n```json\n{}\n```", task.user_message, outputs_json);
        let _ = events_tx
            .send(ResponseEvent::Chunk {
                data,
                status: ChunkStatus::Finished,
                response_id,
            })
            .await;
        enter(&mut state, LoopState::Finalized);
        break 'run;
    }

    // Always leave the page clean: no listener, no buffer, no busy flag.
    bridge.unsubscribe(token);
    assembler.reset();
    session.release();
    tracing::info!(state = ?state, "conversation run ended");
}
