//! The API strand: a single task that owns the world
//!
//! Worker threads service HTTP I/O concurrently, but every operation that
//! touches the world is funneled through one mpsc channel into the task
//! spawned here. Commands are processed strictly in arrival order, so no
//! request can ever observe a partially applied tick. The channel is the
//! lock; the model itself has none.

use std::path::PathBuf;
use std::time::Duration;

use log::{error, info};
use shared::Direction;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::app::{
    AppError, Application, GameStateView, JoinInfo, MapShortView, MapView, PlayersView,
};
use crate::state;

const COMMAND_QUEUE_DEPTH: usize = 256;

/// Work submitted to the strand
enum Command {
    Join {
        user_name: String,
        map_id: String,
        reply: oneshot::Sender<Result<JoinInfo, AppError>>,
    },
    GetPlayers {
        token: String,
        reply: oneshot::Sender<Result<PlayersView, AppError>>,
    },
    GetState {
        token: String,
        reply: oneshot::Sender<Result<GameStateView, AppError>>,
    },
    GetMaps {
        reply: oneshot::Sender<Vec<MapShortView>>,
    },
    GetMap {
        map_id: String,
        reply: oneshot::Sender<Result<MapView, AppError>>,
    },
    Action {
        token: String,
        direction: Option<Direction>,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    Tick {
        delta: Duration,
        /// The periodic ticker does not wait; the manual endpoint does.
        reply: Option<oneshot::Sender<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable submitter for strand commands
#[derive(Clone)]
pub struct StrandHandle {
    tx: mpsc::Sender<Command>,
}

impl StrandHandle {
    pub async fn join_game(&self, user_name: String, map_id: String) -> Result<JoinInfo, AppError> {
        self.call(|reply| Command::Join { user_name, map_id, reply }).await?
    }

    pub async fn get_players(&self, token: String) -> Result<PlayersView, AppError> {
        self.call(|reply| Command::GetPlayers { token, reply }).await?
    }

    pub async fn get_game_state(&self, token: String) -> Result<GameStateView, AppError> {
        self.call(|reply| Command::GetState { token, reply }).await?
    }

    pub async fn get_maps(&self) -> Result<Vec<MapShortView>, AppError> {
        self.call(|reply| Command::GetMaps { reply }).await
    }

    pub async fn get_map(&self, map_id: String) -> Result<MapView, AppError> {
        self.call(|reply| Command::GetMap { map_id, reply }).await?
    }

    pub async fn action(
        &self,
        token: String,
        direction: Option<Direction>,
    ) -> Result<(), AppError> {
        self.call(|reply| Command::Action { token, direction, reply }).await?
    }

    /// Advances the world and waits for the tick to be applied
    pub async fn tick(&self, delta: Duration) -> Result<(), AppError> {
        self.call(|reply| Command::Tick { delta, reply: Some(reply) }).await
    }

    /// Submits a tick without waiting; used by the periodic ticker
    pub async fn tick_detached(&self, delta: Duration) -> Result<(), AppError> {
        self.tx
            .send(Command::Tick { delta, reply: None })
            .await
            .map_err(|_| AppError::Internal("api strand is gone".to_string()))
    }

    /// Stops the strand after a final snapshot, waiting for completion
    pub async fn shutdown(&self) {
        let _ = self.call(|reply| Command::Shutdown { reply }).await;
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, AppError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| AppError::Internal("api strand is gone".to_string()))?;
        reply_rx
            .await
            .map_err(|_| AppError::Internal("api strand dropped the request".to_string()))
    }
}

/// Spawns the strand task that owns `app`
///
/// If `final_state_path` is set, a snapshot is written when the strand shuts
/// down, whether by [`StrandHandle::shutdown`] or by every handle dropping.
pub fn spawn_strand(
    app: Application,
    final_state_path: Option<PathBuf>,
) -> (StrandHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let task = tokio::spawn(run_strand(app, rx, final_state_path));
    (StrandHandle { tx }, task)
}

async fn run_strand(
    mut app: Application,
    mut rx: mpsc::Receiver<Command>,
    final_state_path: Option<PathBuf>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Join { user_name, map_id, reply } => {
                let _ = reply.send(app.join_game(&user_name, &map_id));
            }
            Command::GetPlayers { token, reply } => {
                let _ = reply.send(app.get_players(&token));
            }
            Command::GetState { token, reply } => {
                let _ = reply.send(app.get_game_state(&token));
            }
            Command::GetMaps { reply } => {
                let _ = reply.send(app.get_maps_short_info());
            }
            Command::GetMap { map_id, reply } => {
                let _ = reply.send(app.get_map_info(&map_id));
            }
            Command::Action { token, direction, reply } => {
                let _ = reply.send(app.action(&token, direction));
            }
            Command::Tick { delta, reply } => {
                app.tick(delta);
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
                break;
            }
        }
    }

    if let Some(path) = &final_state_path {
        match state::save_state(&app, path) {
            Ok(()) => info!("final state saved to {}", path.display()),
            Err(err) => error!("final state save failed: {err}"),
        }
    }
}
