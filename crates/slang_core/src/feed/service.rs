//! Single-task runtime for a feed controller.
//!
//! # Responsibility
//! - Own one `FeedController` on one task and serialize every command.
//! - Marshal background fetch results onto that task.
//! - Drive the periodic refresh until cancelled.
//!
//! # Invariants
//! - The controller is only touched by the service task.
//! - The refresh timer never overlaps an in-flight load (see
//!   `FeedController::schedule_refresh`).
//! - The task exits on `FeedHandle::shutdown` or when every handle is dropped.

use crate::auth::Identity;
use crate::feed::controller::{FeedController, FeedError, FeedEvent, FeedState, VoteOutcome};
use crate::model::word::{VoteField, Word};
use crate::store::WordStore;
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum FeedServiceError {
    /// The service task has stopped.
    Closed,
    Feed(FeedError),
}

impl Display for FeedServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "feed service is not running"),
            Self::Feed(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FeedServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Closed => None,
            Self::Feed(err) => Some(err),
        }
    }
}

impl From<FeedError> for FeedServiceError {
    fn from(value: FeedError) -> Self {
        Self::Feed(value)
    }
}

/// Read-only view of controller state for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub current: Option<Word>,
    pub state: FeedState,
    pub deck_len: usize,
    pub cursor: usize,
    pub last_error: Option<String>,
}

type Reply<T> = oneshot::Sender<T>;

enum FeedCommand {
    Snapshot(Reply<FeedSnapshot>),
    Subscribe(Reply<broadcast::Receiver<FeedEvent>>),
    LoadAll(Reply<Result<usize, FeedError>>),
    LoadTop(u32, Reply<Vec<Word>>),
    LoadUserWords(Reply<Result<Vec<Word>, FeedError>>),
    Vote(VoteField, Reply<Result<VoteOutcome, FeedError>>),
    Submit {
        word: String,
        definition: String,
        reply: Reply<Result<Word, FeedError>>,
    },
    CheckForNew(i64, Reply<Result<usize, FeedError>>),
    SetIdentity(Option<Identity>, Reply<()>),
    TakeError(Reply<Option<String>>),
    TakeRefreshFlag(Reply<bool>),
    Refresh(Reply<bool>),
}

/// Cloneable command handle to a running feed service.
#[derive(Clone)]
pub struct FeedHandle {
    commands: mpsc::UnboundedSender<FeedCommand>,
    cancel: CancellationToken,
}

impl FeedHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> FeedCommand,
    ) -> Result<T, FeedServiceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| FeedServiceError::Closed)?;
        response.await.map_err(|_| FeedServiceError::Closed)
    }

    pub async fn snapshot(&self) -> Result<FeedSnapshot, FeedServiceError> {
        self.request(FeedCommand::Snapshot).await
    }

    pub async fn subscribe(&self) -> Result<broadcast::Receiver<FeedEvent>, FeedServiceError> {
        self.request(FeedCommand::Subscribe).await
    }

    pub async fn load_all(&self) -> Result<usize, FeedServiceError> {
        Ok(self.request(FeedCommand::LoadAll).await??)
    }

    pub async fn load_top(&self, limit: u32) -> Result<Vec<Word>, FeedServiceError> {
        self.request(|reply| FeedCommand::LoadTop(limit, reply))
            .await
    }

    pub async fn load_user_words(&self) -> Result<Vec<Word>, FeedServiceError> {
        Ok(self.request(FeedCommand::LoadUserWords).await??)
    }

    pub async fn upvote(&self) -> Result<VoteOutcome, FeedServiceError> {
        Ok(self
            .request(|reply| FeedCommand::Vote(VoteField::Upvotes, reply))
            .await??)
    }

    pub async fn downvote(&self) -> Result<VoteOutcome, FeedServiceError> {
        Ok(self
            .request(|reply| FeedCommand::Vote(VoteField::Downvotes, reply))
            .await??)
    }

    pub async fn submit(
        &self,
        word: impl Into<String>,
        definition: impl Into<String>,
    ) -> Result<Word, FeedServiceError> {
        let word = word.into();
        let definition = definition.into();
        Ok(self
            .request(|reply| FeedCommand::Submit {
                word,
                definition,
                reply,
            })
            .await??)
    }

    pub async fn check_for_new(&self, since_ms: i64) -> Result<usize, FeedServiceError> {
        Ok(self
            .request(|reply| FeedCommand::CheckForNew(since_ms, reply))
            .await??)
    }

    pub async fn set_identity(&self, identity: Option<Identity>) -> Result<(), FeedServiceError> {
        self.request(|reply| FeedCommand::SetIdentity(identity, reply))
            .await
    }

    pub async fn take_error(&self) -> Result<Option<String>, FeedServiceError> {
        self.request(FeedCommand::TakeError).await
    }

    pub async fn take_refresh_flag(&self) -> Result<bool, FeedServiceError> {
        self.request(FeedCommand::TakeRefreshFlag).await
    }

    /// Runs one refresh tick immediately. Returns `false` when skipped.
    pub async fn refresh_now(&self) -> Result<bool, FeedServiceError> {
        self.request(FeedCommand::Refresh).await
    }

    /// Stops the service task and its refresh timer.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.commands.is_closed()
    }
}

/// Service task state. Created by [`FeedService::spawn`].
pub struct FeedService<S: WordStore> {
    controller: FeedController<S>,
    commands: mpsc::UnboundedReceiver<FeedCommand>,
    cancel: CancellationToken,
}

impl<S: WordStore> FeedService<S> {
    /// Initializes `controller` and runs it on a new Tokio task.
    ///
    /// The deck is seeded before this returns, so the first snapshot already
    /// has a current word.
    pub fn spawn(controller: FeedController<S>) -> (FeedHandle, JoinHandle<()>) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let mut service = Self {
            controller,
            commands,
            cancel: cancel.clone(),
        };
        service.controller.initialize();

        let join_handle = tokio::spawn(service.run());
        (
            FeedHandle {
                commands: commands_tx,
                cancel,
            },
            join_handle,
        )
    }

    async fn run(self) {
        let Self {
            mut controller,
            mut commands,
            cancel,
        } = self;

        let period = controller.config().refresh_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "event=feed_service module=service status=start refresh_interval_secs={}",
            period.as_secs()
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => handle_command(&mut controller, command).await,
                    None => break,
                },
                Some(inbound) = controller.recv_inbound() => controller.apply_inbound(inbound),
                _ = ticker.tick() => {
                    let scheduled = controller.schedule_refresh();
                    debug!("event=feed_tick module=service status=ok scheduled={scheduled}");
                }
            }
        }

        controller.flush_writes().await;
        info!("event=feed_service module=service status=stopped");
    }
}

async fn handle_command<S: WordStore>(controller: &mut FeedController<S>, command: FeedCommand) {
    // A dropped reply receiver means the caller gave up; nothing to report.
    match command {
        FeedCommand::Snapshot(reply) => {
            controller.apply_pending();
            let _ = reply.send(FeedSnapshot {
                current: controller.current().cloned(),
                state: controller.state(),
                deck_len: controller.deck().len(),
                cursor: controller.deck().cursor(),
                last_error: controller.last_error().map(str::to_string),
            });
        }
        FeedCommand::Subscribe(reply) => {
            let _ = reply.send(controller.subscribe());
        }
        FeedCommand::LoadAll(reply) => {
            let _ = reply.send(controller.load_all().await);
        }
        FeedCommand::LoadTop(limit, reply) => {
            let _ = reply.send(controller.load_top(limit).await);
        }
        FeedCommand::LoadUserWords(reply) => {
            let _ = reply.send(controller.load_user_words().await);
        }
        FeedCommand::Vote(field, reply) => {
            let outcome = match field {
                VoteField::Upvotes => controller.upvote().await,
                VoteField::Downvotes => controller.downvote().await,
            };
            let _ = reply.send(outcome);
        }
        FeedCommand::Submit {
            word,
            definition,
            reply,
        } => {
            let _ = reply.send(controller.submit(&word, &definition).await);
        }
        FeedCommand::CheckForNew(since_ms, reply) => {
            let _ = reply.send(controller.check_for_new(since_ms).await);
        }
        FeedCommand::SetIdentity(identity, reply) => {
            controller.set_identity(identity).await;
            let _ = reply.send(());
        }
        FeedCommand::TakeError(reply) => {
            let _ = reply.send(controller.take_error());
        }
        FeedCommand::TakeRefreshFlag(reply) => {
            let _ = reply.send(controller.take_refresh_flag());
        }
        FeedCommand::Refresh(reply) => {
            let _ = reply.send(controller.schedule_refresh());
        }
    }
}
