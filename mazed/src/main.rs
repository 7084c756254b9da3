//! Maze Daemon - keeps a maze, a game session and a solver alive for clients
//!
//! This daemon runs in the background, managing:
//! - Maze generation and the current maze document
//! - One interactive game session
//! - A dynamic-programming solver over the current maze
//! - IPC server for UI clients (newline-delimited JSON over TCP)
//!
//! Storage locations:
//! - Linux: ~/.local/share/mazeplay/
//! - Windows: %APPDATA%\mazeplay\
//! - MacOS: ~/Library/Application Support/mazeplay/

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mazeplay::config::ConfigParams;
use mazeplay::document::MazeDocument;
use mazeplay::dp::{MazeDp, RewardConfig, SolveMethod, DEFAULT_GAMMA};
use mazeplay::game::{place_random_exit, GameSave, MazeGame};
use mazeplay::generator::MazeGenerator;
use mazeplay::grid::{CellType, Grid};
use mazeplay::observer::{GameAdapter, SolverAdapter};
use mazeplay::protocol::{Request, Response, StateSnapshot, DEFAULT_ADDR};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time;
use tracing::{error, info, warn};

mod error;
mod paths;

use error::DaemonError;
use paths::AppPaths;

const DEFAULT_MAX_ITERATIONS: usize = 100;
const DEFAULT_THETA: f64 = 1e-4;

// ═══════════════════════════════════════════════════════════════════════════
// Session Persistence
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSession {
    document: Option<MazeDocument>,
    game: GameSave,
    #[serde(default)]
    rewards: RewardConfig,
}

// ═══════════════════════════════════════════════════════════════════════════
// Daemon State
// ═══════════════════════════════════════════════════════════════════════════

struct CurrentMaze {
    document: MazeDocument,
    /// Pristine layout; the game and solver work on copies.
    grid: Grid,
}

struct DaemonState {
    paths: AppPaths,
    maze: Option<CurrentMaze>,
    game: MazeGame,
    solver: Option<MazeDp>,
    /// Bumped whenever the layout a solver would run on changes.
    layout_epoch: u64,
    rewards: RewardConfig,
    rng: StdRng,
}

/// Inputs for a solve running outside the state lock.
struct SolveJob {
    grid: Grid,
    rewards: RewardConfig,
    epoch: u64,
}

impl DaemonState {
    fn new(paths: AppPaths) -> Self {
        Self {
            paths,
            maze: None,
            game: MazeGame::new(),
            solver: None,
            layout_epoch: 0,
            rewards: RewardConfig::default(),
            rng: StdRng::from_entropy(),
        }
    }

    fn current(&self) -> Result<&CurrentMaze, DaemonError> {
        self.maze.as_ref().ok_or(DaemonError::NoMaze)
    }

    fn install_maze(&mut self, document: MazeDocument, grid: Grid) -> Result<(), DaemonError> {
        self.game.load(grid.clone())?;
        self.invalidate_solver();
        info!("Current maze: {}", document.file_stem());
        self.maze = Some(CurrentMaze { document, grid });
        Ok(())
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            maze: self.maze.as_ref().map(|m| m.document.file_stem()),
            generation: self.maze.as_ref().map(|m| m.document.statistics),
            game: GameAdapter::new(&self.game).snapshot(),
            solver: self
                .solver
                .as_ref()
                .map(|dp| SolverAdapter::new(dp).snapshot()),
            rewards: self.rewards.clone(),
        }
    }

    fn maze_response(&self) -> Result<Response, DaemonError> {
        let m = self.current()?;
        Ok(Response::Maze {
            name: m.document.file_stem(),
            cells: m.document.maze.clone(),
            stats: m.document.statistics,
        })
    }

    fn save_maze(&self) -> Result<PathBuf, DaemonError> {
        let m = self.current()?;
        Ok(m.document.save_to_dir(&self.paths.mazes_dir())?)
    }

    fn load_maze(&mut self, name: &str) -> Result<(), DaemonError> {
        let path = self.paths.maze_file(name)?;
        if !path.exists() {
            return Err(DaemonError::MazeNotFound(name.to_string()));
        }
        let document = MazeDocument::load(&path)?;
        let grid = document.grid()?;
        self.install_maze(document, grid)
    }

    /// Moves the exit of the current maze; the game restarts on the new
    /// layout and the solver is dropped.
    fn new_exit(&mut self) -> Result<(), DaemonError> {
        let m = self.maze.as_mut().ok_or(DaemonError::NoMaze)?;
        let exit = place_random_exit(&mut m.grid, &mut self.rng).ok_or(DaemonError::NoRooms)?;
        m.document.maze = m.grid.to_codes();
        let grid = m.grid.clone();
        self.game.load(grid)?;
        self.invalidate_solver();
        info!("New exit at {:?}", exit);
        Ok(())
    }

    fn invalidate_solver(&mut self) {
        self.solver = None;
        self.layout_epoch += 1;
    }

    fn prepare_solve(&mut self) -> Result<SolveJob, DaemonError> {
        let grid = self.solver_grid()?;
        Ok(SolveJob {
            grid,
            rewards: self.rewards.clone(),
            epoch: self.layout_epoch,
        })
    }

    /// Installs a finished solver unless the maze changed while it ran.
    fn commit_solver(&mut self, epoch: u64, dp: MazeDp) -> Result<(), DaemonError> {
        if epoch != self.layout_epoch {
            warn!("Discarding solver for a maze that is no longer current");
            return Err(DaemonError::MazeChanged);
        }
        self.solver = Some(dp);
        Ok(())
    }

    /// Pristine maze carrying the game's exit, or the maze's own exit.
    fn solver_grid(&mut self) -> Result<Grid, DaemonError> {
        let mut grid = self.current()?.grid.clone();
        if let Some(exit) = self.game.exit() {
            grid.replace_all(CellType::Exit, CellType::Room);
            grid.set(exit, CellType::Exit);
        } else if grid.count(CellType::Exit) == 0 {
            self.new_exit()?;
            grid = self.current()?.grid.clone();
        }
        Ok(grid)
    }

    fn save_session(&self) -> Result<(), DaemonError> {
        let session = PersistedSession {
            document: self.maze.as_ref().map(|m| m.document.clone()),
            game: self.game.save_state(),
            rewards: self.rewards.clone(),
        };
        let path = self.paths.session_file();
        let json = serde_json::to_vec_pretty(&session)?;
        std::fs::write(&path, json).map_err(|source| DaemonError::Io {
            path: path.clone(),
            source,
        })?;
        info!("Session saved to {:?}", path);
        Ok(())
    }

    fn load_session(&mut self) -> Result<(), DaemonError> {
        let path = self.paths.session_file();
        let text = std::fs::read_to_string(&path).map_err(|source| DaemonError::Io {
            path: path.clone(),
            source,
        })?;
        let session: PersistedSession = serde_json::from_str(&text)?;
        if let Some(document) = session.document {
            let grid = document.grid()?;
            self.install_maze(document, grid)?;
        }
        self.game.restore_state(session.game)?;
        self.rewards = session.rewards;
        info!("Session restored from {:?}", path);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Request Dispatch
// ═══════════════════════════════════════════════════════════════════════════

async fn handle_request(
    state: &Arc<RwLock<DaemonState>>,
    request: Request,
) -> Result<Response, DaemonError> {
    let response = match request {
        Request::GetState => Response::State(state.read().await.snapshot()),
        Request::Generate {
            preset,
            params,
            seed,
            start,
        } => {
            let params = match (params, preset) {
                (Some(params), _) => params,
                (None, Some(name)) => ConfigParams::preset(&name)?,
                (None, None) => ConfigParams::default(),
            };
            let config = params.build()?;
            let worker_config = config.clone();
            let generated = tokio::task::spawn_blocking(move || {
                let mut generator = match seed {
                    Some(seed) => MazeGenerator::with_seed(worker_config, seed),
                    None => MazeGenerator::new(worker_config),
                };
                generator.generate(start.map(|p| p.0), start.map(|p| p.1))
            })
            .await??;

            let document = MazeDocument::from_generated(&generated, &config);
            let mut s = state.write().await;
            s.install_maze(document, generated.grid)?;
            s.maze_response()?
        }
        Request::LoadMaze { name } => {
            let mut s = state.write().await;
            s.load_maze(&name)?;
            s.maze_response()?
        }
        Request::SaveMaze => {
            let path = state.read().await.save_maze()?;
            Response::Success {
                message: format!("Maze saved to {}", path.display()),
            }
        }
        Request::ListMazes => Response::Mazes {
            names: state.read().await.paths.list_mazes()?,
        },
        Request::StartGame {
            player,
            min_exit_distance,
        } => {
            let mut s = state.write().await;
            s.current()?;
            s.game.start_game(player, min_exit_distance)?;
            s.invalidate_solver();
            Response::State(s.snapshot())
        }
        Request::Move { direction } => {
            let mut s = state.write().await;
            let event = s.game.step(direction);
            Response::Moved {
                event,
                game: GameAdapter::new(&s.game).snapshot(),
            }
        }
        Request::ValidMoves => Response::Moves {
            moves: state.read().await.game.valid_moves(),
        },
        Request::NewExit => {
            let mut s = state.write().await;
            s.new_exit()?;
            s.maze_response()?
        }
        Request::Solve {
            method,
            gamma,
            max_iterations,
            theta,
        } => {
            let SolveJob {
                grid,
                rewards,
                epoch,
            } = state.write().await.prepare_solve()?;
            let gamma = gamma.unwrap_or(DEFAULT_GAMMA);
            let max_iterations = max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS);
            let theta = theta.unwrap_or(DEFAULT_THETA);

            let (dp, result) = tokio::task::spawn_blocking(move || -> Result<_, DaemonError> {
                let mut dp = MazeDp::new(grid, gamma)?;
                dp.update_rewards(rewards);
                let result = match method {
                    SolveMethod::ValueIteration => dp.value_iteration(max_iterations, theta),
                    SolveMethod::PolicyIteration => dp.policy_iteration(max_iterations),
                };
                Ok((dp, result))
            })
            .await??;

            let stats = dp.stats();
            state.write().await.commit_solver(epoch, dp)?;
            Response::Solved { result, stats }
        }
        Request::SetRewards { preset, rewards } => {
            let rewards = match (rewards, preset) {
                (Some(rewards), _) => rewards,
                (None, Some(name)) => RewardConfig::preset(&name)?,
                (None, None) => return Err(DaemonError::MissingRewards),
            };
            let mut s = state.write().await;
            if let Some(dp) = s.solver.as_mut() {
                dp.update_rewards(rewards.clone());
            }
            s.rewards = rewards;
            Response::Success {
                message: "Rewards updated".to_string(),
            }
        }
        Request::ResetSolver => {
            let mut s = state.write().await;
            s.solver.as_mut().ok_or(DaemonError::NoSolver)?.reset();
            Response::Success {
                message: "Solver reset".to_string(),
            }
        }
        Request::PolicyAt { row, col } => {
            let s = state.read().await;
            let dp = s.solver.as_ref().ok_or(DaemonError::NoSolver)?;
            Response::Policy {
                row,
                col,
                action: dp.policy_at(row, col),
                value: dp.value((row, col)),
            }
        }
        Request::Shutdown => {
            state.read().await.save_session()?;
            info!("Shutdown requested; session saved");
            tokio::spawn(async {
                // Give the response a moment to flush before exiting.
                time::sleep(Duration::from_millis(50)).await;
                std::process::exit(0);
            });
            Response::Success {
                message: "Shutting down".to_string(),
            }
        }
    };
    Ok(response)
}

// ═══════════════════════════════════════════════════════════════════════════
// Client Handler
// ═══════════════════════════════════════════════════════════════════════════

async fn handle_client(
    stream: TcpStream,
    state: Arc<RwLock<DaemonState>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => match handle_request(&state, request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Request failed: {}", e);
                    Response::Error {
                        message: e.to_string(),
                    }
                }
            },
            Err(e) => Response::Error {
                message: format!("Invalid request: {}", e),
            },
        };

        writer
            .write_all(serde_json::to_string(&response)?.as_bytes())
            .await?;
        writer.write_all(b"\n").await?;
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let paths = AppPaths::new()?;
    info!("Data directory: {:?}", paths.data_dir());
    info!("Maze directory: {:?}", paths.mazes_dir());

    let state = Arc::new(RwLock::new(DaemonState::new(paths)));

    // Save on Ctrl-C so the session survives an abrupt stop.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let s = state.read().await;
                if let Err(e) = s.save_session() {
                    error!("Ctrl-C save failed: {}", e);
                } else {
                    info!("Ctrl-C: session saved");
                }
                std::process::exit(0);
            }
        });
    }

    {
        let mut s = state.write().await;
        if s.paths.session_file().exists() {
            if let Err(e) = s.load_session() {
                warn!("Could not restore session: {}", e);
                info!("Starting with an empty session");
            }
        }
    }

    let addr = std::env::var("MAZED_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!("Maze daemon listening on {}", addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Client connected: {}", peer);
        let state_clone = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, state_clone).await {
                error!("Client handler error: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mazeplay::game::MoveEvent;
    use mazeplay::grid::{Direction, Position};

    fn test_state(tag: &str) -> Arc<RwLock<DaemonState>> {
        let root = std::env::temp_dir().join(format!("mazed-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let paths = AppPaths::at(root).unwrap();
        Arc::new(RwLock::new(DaemonState::new(paths)))
    }

    fn generate(seed: u64) -> Request {
        Request::Generate {
            preset: Some("small".into()),
            params: None,
            seed: Some(seed),
            start: Some((0, 0)),
        }
    }

    fn direction_between(from: Position, to: Position) -> Direction {
        let delta = (
            to.0 as isize - from.0 as isize,
            to.1 as isize - from.1 as isize,
        );
        Direction::ACTIONS
            .into_iter()
            .find(|d| d.delta() == delta)
            .unwrap()
    }

    #[tokio::test]
    async fn generate_play_and_solve() {
        let state = test_state("flow");

        match handle_request(&state, generate(3)).await.unwrap() {
            Response::Maze { cells, stats, .. } => {
                assert_eq!(cells.len(), 10);
                assert!(stats.rooms > 0);
            }
            other => panic!("unexpected {other:?}"),
        }

        let start = Request::StartGame {
            player: None,
            min_exit_distance: None,
        };
        match handle_request(&state, start).await.unwrap() {
            Response::State(s) => {
                assert!(s.game.info.playing);
                assert!(s.game.info.exit.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }

        let solve = Request::Solve {
            method: SolveMethod::ValueIteration,
            gamma: None,
            max_iterations: Some(1000),
            theta: Some(1e-9),
        };
        match handle_request(&state, solve).await.unwrap() {
            Response::Solved { result, stats } => {
                assert!(result.converged);
                assert_eq!(stats.terminal_states, 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        let (path, exit) = {
            let s = state.read().await;
            let player = s.game.player().unwrap();
            let path = s.solver.as_ref().unwrap().greedy_path(player, 500);
            (path, s.game.exit().unwrap())
        };
        assert_eq!(path.last(), Some(&exit));

        let mut last = MoveEvent::Inactive;
        for pair in path.windows(2) {
            let direction = direction_between(pair[0], pair[1]);
            match handle_request(&state, Request::Move { direction }).await.unwrap() {
                Response::Moved { event, .. } => last = event,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(last, MoveEvent::ReachedExit);
        assert!(state.read().await.game.is_won());
    }

    #[tokio::test]
    async fn save_list_and_load_mazes() {
        let state = test_state("docs");
        let name = match handle_request(&state, generate(5)).await.unwrap() {
            Response::Maze { name, .. } => name,
            other => panic!("unexpected {other:?}"),
        };

        assert!(matches!(
            handle_request(&state, Request::SaveMaze).await.unwrap(),
            Response::Success { .. }
        ));
        match handle_request(&state, Request::ListMazes).await.unwrap() {
            Response::Mazes { names } => assert!(names.contains(&name)),
            other => panic!("unexpected {other:?}"),
        }
        match handle_request(&state, Request::LoadMaze { name: name.clone() })
            .await
            .unwrap()
        {
            Response::Maze { name: loaded, .. } => assert_eq!(loaded, name),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            handle_request(&state, Request::LoadMaze { name: "missing".into() }).await,
            Err(DaemonError::MazeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn requests_without_prerequisites_fail() {
        let state = test_state("errors");
        let start = Request::StartGame {
            player: None,
            min_exit_distance: None,
        };
        assert!(matches!(
            handle_request(&state, start).await,
            Err(DaemonError::NoMaze)
        ));
        assert!(matches!(
            handle_request(&state, Request::PolicyAt { row: 0, col: 0 }).await,
            Err(DaemonError::NoSolver)
        ));
        assert!(matches!(
            handle_request(
                &state,
                Request::SetRewards {
                    preset: None,
                    rewards: None
                }
            )
            .await,
            Err(DaemonError::MissingRewards)
        ));
        assert!(matches!(
            handle_request(&state, Request::LoadMaze { name: "../x".into() }).await,
            Err(DaemonError::InvalidName(_))
        ));

        let mut params = ConfigParams::default();
        params.width = 1;
        let bad = Request::Generate {
            preset: None,
            params: Some(params),
            seed: None,
            start: None,
        };
        assert!(matches!(
            handle_request(&state, bad).await,
            Err(DaemonError::Config(_))
        ));
    }

    #[tokio::test]
    async fn new_exit_and_rewards_update_solver() {
        let state = test_state("exit");
        handle_request(&state, generate(8)).await.unwrap();
        handle_request(&state, Request::NewExit).await.unwrap();
        assert_eq!(
            state
                .read()
                .await
                .current()
                .unwrap()
                .grid
                .count(CellType::Exit),
            1
        );

        let solve = Request::Solve {
            method: SolveMethod::PolicyIteration,
            gamma: Some(0.95),
            max_iterations: None,
            theta: None,
        };
        handle_request(&state, solve).await.unwrap();

        let rewards = Request::SetRewards {
            preset: Some("goal_focused".into()),
            rewards: None,
        };
        handle_request(&state, rewards).await.unwrap();
        let s = state.read().await;
        assert_eq!(s.rewards.goal, 50.0);
        assert_eq!(s.solver.as_ref().unwrap().reward_config().goal, 50.0);
    }

    #[tokio::test]
    async fn solver_for_a_replaced_maze_is_discarded() {
        let state = test_state("stale");
        handle_request(&state, generate(2)).await.unwrap();
        let job = state.write().await.prepare_solve().unwrap();

        let replacement = Request::Generate {
            preset: Some("tiny".into()),
            params: None,
            seed: Some(4),
            start: Some((0, 0)),
        };
        handle_request(&state, replacement).await.unwrap();

        let mut dp = MazeDp::new(job.grid, DEFAULT_GAMMA).unwrap();
        dp.value_iteration(10, 1e-4);
        let mut s = state.write().await;
        assert!(matches!(
            s.commit_solver(job.epoch, dp),
            Err(DaemonError::MazeChanged)
        ));
        assert!(s.solver.is_none());

        let fresh = s.prepare_solve().unwrap();
        assert_eq!(fresh.grid.rows(), 5);
        let dp = MazeDp::new(fresh.grid, DEFAULT_GAMMA).unwrap();
        s.commit_solver(fresh.epoch, dp).unwrap();
        assert_eq!(s.solver.as_ref().unwrap().grid().rows(), 5);
    }

    #[tokio::test]
    async fn new_exit_then_start_keeps_a_single_exit() {
        let state = test_state("one-exit");
        handle_request(&state, generate(6)).await.unwrap();
        handle_request(&state, Request::NewExit).await.unwrap();
        handle_request(
            &state,
            Request::StartGame {
                player: None,
                min_exit_distance: None,
            },
        )
        .await
        .unwrap();

        let s = state.read().await;
        let grid = s.game.grid().unwrap();
        assert_eq!(grid.count(CellType::Exit), 1);
        assert_eq!(grid.get(s.game.exit().unwrap()), CellType::Exit);
    }

    #[tokio::test]
    async fn session_survives_restart() {
        let state = test_state("session");
        handle_request(&state, generate(11)).await.unwrap();
        handle_request(
            &state,
            Request::StartGame {
                player: None,
                min_exit_distance: None,
            },
        )
        .await
        .unwrap();
        let (paths, player) = {
            let s = state.read().await;
            s.save_session().unwrap();
            (s.paths.clone(), s.game.player())
        };

        let mut restored = DaemonState::new(paths);
        restored.load_session().unwrap();
        assert_eq!(restored.game.player(), player);
        assert!(restored.game.is_playing());
        assert!(restored.maze.is_some());
    }
}
