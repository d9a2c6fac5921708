//! Session Registry: the single authority over the set of live sessions.
//!
//! The registry runs as one task that owns the session table. Every
//! create/close/list goes through its command queue, so mutations are
//! serialized and surfaces never touch the table directly. After each
//! successful mutation the roster is rebroadcast.
//!
//! Acquiring a source can be slow, so `open` only reserves an id and
//! spawns the acquisition. The finished session comes back as a
//! [`Commit`] and is inserted by the registry task itself.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use pipview_capture_engine::{CaptureBackend, ProviderConfig};
use pipview_common::config::AppConfig;
use pipview_common::error::{PipError, PipResult};
use pipview_platform_core::WindowHost;
use pipview_render_engine::{SurfaceConfig, SurfaceControl, SurfaceExit, SurfaceNotice};
use pipview_session_model::{ControlPush, Roster, SessionId, SessionInfo, ValidOpen};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::channel::ControlChannel;
use crate::host::LiveSession;

/// Pending pushes a slow observer may fall behind by before losing some.
const PUSH_CAPACITY: usize = 64;

/// Registry tuning.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub provider: ProviderConfig,
    pub surface: SurfaceConfig,
    /// How long a close waits for a surface to stop before aborting it.
    pub shutdown_timeout: Duration,
}

impl From<&AppConfig> for RegistryConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            provider: ProviderConfig::from(&config.capture),
            surface: SurfaceConfig::from(&config.render),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

pub(crate) enum RegistryCommand {
    Open {
        request: ValidOpen,
        reply: oneshot::Sender<PipResult<SessionId>>,
    },
    Close {
        session_id: SessionId,
        reply: oneshot::Sender<PipResult<()>>,
    },
    CloseAll {
        reply: oneshot::Sender<PipResult<()>>,
    },
    List {
        reply: oneshot::Sender<PipResult<Vec<SessionInfo>>>,
    },
    Surface {
        session_id: SessionId,
        reply: oneshot::Sender<PipResult<SurfaceControl>>,
    },
}

/// Result of an acquisition started by `open`.
struct Commit {
    id: SessionId,
    result: PipResult<LiveSession>,
    reply: oneshot::Sender<PipResult<SessionId>>,
}

pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, LiveSession>,
    next_id: u64,
    backend: Arc<dyn CaptureBackend>,
    host: Arc<dyn WindowHost>,
    config: RegistryConfig,
    roster: watch::Sender<Roster>,
    pushes: broadcast::Sender<ControlPush>,
    notices: mpsc::UnboundedSender<SurfaceNotice>,
    commits: mpsc::UnboundedSender<Commit>,
    /// Ids whose acquisition is still running.
    pending: BTreeSet<SessionId>,
    /// Exits reported by surfaces whose session is not committed yet.
    early_exits: BTreeSet<SessionId>,
}

impl SessionRegistry {
    /// Start the registry task and return a channel to it. The task runs
    /// until every [`ControlChannel`] clone is dropped, then closes all
    /// sessions.
    pub fn spawn(
        backend: Arc<dyn CaptureBackend>,
        host: Arc<dyn WindowHost>,
        config: RegistryConfig,
    ) -> ControlChannel {
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        let (commits_tx, commits_rx) = mpsc::unbounded_channel();
        let (roster_tx, roster_rx) = watch::channel(Roster::default());
        let (pushes_tx, _) = broadcast::channel(PUSH_CAPACITY);

        let registry = Self {
            sessions: BTreeMap::new(),
            next_id: 1,
            backend,
            host,
            config,
            roster: roster_tx,
            pushes: pushes_tx.clone(),
            notices: notices_tx,
            commits: commits_tx,
            pending: BTreeSet::new(),
            early_exits: BTreeSet::new(),
        };
        tokio::spawn(registry.run(commands_rx, notices_rx, commits_rx));

        ControlChannel::new(commands_tx, roster_rx, pushes_tx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<RegistryCommand>,
        mut notices: mpsc::UnboundedReceiver<SurfaceNotice>,
        mut commits: mpsc::UnboundedReceiver<Commit>,
    ) {
        tracing::info!(backend = self.backend.name(), "Session registry started");

        // Exits are applied before any request that could still see them.
        loop {
            tokio::select! {
                biased;
                Some(notice) = notices.recv() => self.on_notice(notice).await,
                Some(commit) = commits.recv() => self.commit(commit).await,
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }

        self.close_all().await;
        commits.close();
        while let Some(commit) = commits.recv().await {
            if let Ok(session) = commit.result {
                session.stop(self.config.shutdown_timeout).await;
            }
            let _ = commit
                .reply
                .send(Err(PipError::channel_closed("session registry stopped")));
        }
        tracing::info!("Session registry stopped");
    }

    async fn handle(&mut self, command: RegistryCommand) {
        match command {
            RegistryCommand::Open { request, reply } => self.open(request, reply),
            RegistryCommand::Close { session_id, reply } => {
                let _ = reply.send(self.close(session_id).await);
            }
            RegistryCommand::CloseAll { reply } => {
                self.close_all().await;
                let _ = reply.send(Ok(()));
            }
            RegistryCommand::List { reply } => {
                let _ = reply.send(Ok(self.list()));
            }
            RegistryCommand::Surface { session_id, reply } => {
                let control = self
                    .sessions
                    .get(&session_id)
                    .map(LiveSession::control)
                    .ok_or_else(|| unknown(session_id));
                let _ = reply.send(control);
            }
        }
    }

    /// Reserve an id and acquire the source off the registry task.
    fn open(&mut self, request: ValidOpen, reply: oneshot::Sender<PipResult<SessionId>>) {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.pending.insert(id);

        let backend = Arc::clone(&self.backend);
        let host = Arc::clone(&self.host);
        let config = self.config.clone();
        let notices = self.notices.clone();
        let commits = self.commits.clone();
        tokio::spawn(async move {
            let result = LiveSession::start(id, request, backend, host, &config, notices).await;
            if let Err(mpsc::error::SendError(commit)) = commits.send(Commit { id, result, reply }) {
                if let Ok(session) = commit.result {
                    session.stop(config.shutdown_timeout).await;
                }
                let _ = commit
                    .reply
                    .send(Err(PipError::channel_closed("session registry stopped")));
            }
        });
    }

    async fn commit(&mut self, commit: Commit) {
        let Commit { id, result, reply } = commit;
        self.pending.remove(&id);
        let session = match result {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Open failed");
                let _ = reply.send(Err(e));
                return;
            }
        };

        let info = session.info();
        self.sessions.insert(id, session);
        tracing::info!(session_id = %id, source_id = %info.source_id, "Session opened");

        self.push(ControlPush::Init {
            session_id: id,
            source_id: info.source_id,
            source_name: info.source_name,
            crop: info.crop,
            view: info.view,
        });
        self.broadcast();
        let _ = reply.send(Ok(id));

        if self.early_exits.remove(&id) {
            if let Err(e) = self.close(id).await {
                tracing::debug!(error = %e, "Autonomous close skipped");
            }
        }
    }

    async fn close(&mut self, id: SessionId) -> PipResult<()> {
        let session = self.sessions.remove(&id).ok_or_else(|| unknown(id))?;
        session.stop(self.config.shutdown_timeout).await;
        tracing::info!(session_id = %id, "Session closed");
        self.broadcast();
        Ok(())
    }

    async fn close_all(&mut self) {
        if self.sessions.is_empty() {
            self.broadcast();
            return;
        }
        let sessions = std::mem::take(&mut self.sessions);
        let count = sessions.len();
        for (_, session) in sessions {
            session.stop(self.config.shutdown_timeout).await;
        }
        tracing::info!(count, "All sessions closed");
        self.broadcast();
    }

    fn list(&self) -> Vec<SessionInfo> {
        self.sessions.values().map(LiveSession::info).collect()
    }

    async fn on_notice(&mut self, notice: SurfaceNotice) {
        if !self.sessions.contains_key(&notice.session_id) {
            // The surface can exit before its session is committed.
            if self.pending.contains(&notice.session_id) {
                self.early_exits.insert(notice.session_id);
            }
            return;
        }
        match &notice.exit {
            SurfaceExit::SourceLost { reason } => {
                tracing::info!(session_id = %notice.session_id, %reason, "Closing session after source loss");
            }
            SurfaceExit::UserClosed => {
                tracing::debug!(session_id = %notice.session_id, "Surface closed by user");
            }
        }
        if let Err(e) = self.close(notice.session_id).await {
            tracing::debug!(error = %e, "Autonomous close skipped");
        }
    }

    fn push(&self, push: ControlPush) {
        if self.pushes.send(push).is_err() {
            tracing::trace!("No push observers");
        }
    }

    fn broadcast(&self) {
        let roster = Roster::new(self.list());
        tracing::debug!(count = roster.count, "Roster changed");
        self.push(ControlPush::PipsCount {
            count: roster.count,
        });
        self.push(ControlPush::PipsList {
            list: roster.list.clone(),
        });
        self.roster.send_replace(roster);
    }
}

fn unknown(id: SessionId) -> PipError {
    PipError::not_found(format!("no session with id {id}"))
}
