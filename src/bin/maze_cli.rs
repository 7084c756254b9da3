//! CLI client for the `mazed` daemon.
//!
//! Examples:
//!   maze-cli generate small 7
//!   maze-cli start
//!   maze-cli move r r d
//!   maze-cli solve pi 0.95
//!   maze-cli policy 3 4
//!   maze-cli save
//!
//! By default it talks to 127.0.0.1:9877; override with `--addr host:port`
//! or the `MAZED_ADDR` environment variable.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process;
use std::time::Duration;

use mazeplay::dp::{RewardConfig, SolveMethod};
use mazeplay::grid::{Direction, Grid};
use mazeplay::protocol::{Request, Response, StateSnapshot, DEFAULT_ADDR};

fn usage() -> ! {
    eprintln!("maze-cli (talks to mazed @ {DEFAULT_ADDR} by default)");
    eprintln!("Usage: maze-cli [--addr host:port] <command> [args]\n");
    eprintln!("Commands:");
    eprintln!("  status                          Show daemon state and board");
    eprintln!("  generate [preset] [seed]        Generate a new maze");
    eprintln!("  load <name> | save | list       Maze documents");
    eprintln!("  start [min_exit_distance]       Start a game on the current maze");
    eprintln!("  move <dir>...                   Move (up/down/left/right or w/a/s/d)");
    eprintln!("  moves                           List valid moves");
    eprintln!("  new-exit                        Move the exit somewhere else");
    eprintln!("  solve [vi|pi] [gamma]           Solve the current maze");
    eprintln!("  rewards <preset>                Select a reward preset");
    eprintln!("  rewards <step> <goal> <wall>    Set rewards explicitly");
    eprintln!("  reset-solver                    Zero values and policy");
    eprintln!("  policy <row> <col>              Show the policy at a cell");
    eprintln!("  shutdown                        Save the session and stop");
    process::exit(1);
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    let mut addr = std::env::var("MAZED_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    if args.len() >= 2 && args[0] == "--addr" {
        addr = args[1].clone();
        args.drain(0..2);
    }

    if args.is_empty() {
        usage();
    }

    (addr, args)
}

fn send_request(addr: &str, req: &Request) -> Result<Response, String> {
    let mut stream = TcpStream::connect(addr).map_err(|e| format!("connect: {e}"))?;
    stream
        .set_read_timeout(Some(Duration::from_secs(30)))
        .map_err(|e| format!("set_read_timeout: {e}"))?;
    let mut reader = BufReader::new(stream.try_clone().map_err(|e| format!("clone: {e}"))?);

    let line = serde_json::to_string(req).map_err(|e| format!("serialize: {e}"))?;
    stream
        .write_all(line.as_bytes())
        .and_then(|_| stream.write_all(b"\n"))
        .map_err(|e| format!("send: {e}"))?;

    let mut resp_line = String::new();
    reader
        .read_line(&mut resp_line)
        .map_err(|e| format!("recv: {e}"))?;
    serde_json::from_str(&resp_line).map_err(|e| format!("parse response: {e}"))
}

fn print_board(cells: &[Vec<i32>]) {
    match Grid::from_codes(cells) {
        Ok(grid) => print!("{grid}"),
        Err(e) => eprintln!("unreadable board: {e}"),
    }
}

fn print_state(s: StateSnapshot) {
    let info = &s.game.info;
    println!(
        "maze={} playing={} won={} moves={} player={:?} exit={:?}",
        s.maze.as_deref().unwrap_or("-"),
        info.playing,
        info.won,
        info.moves_count,
        info.player,
        info.exit,
    );
    if let Some(g) = s.generation {
        println!(
            "generation: rooms={} walls={} room%={:.1}",
            g.rooms, g.walls, g.room_percentage
        );
    }
    if let Some(solver) = &s.solver {
        println!(
            "solver: gamma={} states={} max={:.3} min={:.3} mean={:.3}",
            solver.stats.gamma,
            solver.stats.valid_states,
            solver.stats.max_value,
            solver.stats.min_value,
            solver.stats.mean_value,
        );
    }
    println!(
        "rewards: step={} goal={} wall={}",
        s.rewards.step, s.rewards.goal, s.rewards.wall
    );
    print_board(&s.game.cells);
}

fn main() {
    let (addr, args) = parse_args();
    let cmd = &args[0];

    let make_error = |msg: &str| -> ! {
        eprintln!("{}", msg);
        process::exit(1);
    };

    let reqs: Vec<Request> = match cmd.as_str() {
        "status" => vec![Request::GetState],
        "generate" => {
            let preset = args.get(1).cloned();
            let seed = args.get(2).map(|s| {
                s.parse()
                    .unwrap_or_else(|_| make_error("seed must be a number"))
            });
            vec![Request::Generate {
                preset,
                params: None,
                seed,
                start: None,
            }]
        }
        "load" => {
            let name = args.get(1).cloned().unwrap_or_else(|| usage());
            vec![Request::LoadMaze { name }]
        }
        "save" => vec![Request::SaveMaze],
        "list" => vec![Request::ListMazes],
        "start" => {
            let min_exit_distance = args.get(1).map(|s| {
                s.parse()
                    .unwrap_or_else(|_| make_error("min_exit_distance must be a number"))
            });
            vec![Request::StartGame {
                player: None,
                min_exit_distance,
            }]
        }
        "move" => {
            if args.len() < 2 {
                usage();
            }
            args[1..]
                .iter()
                .map(|d| Request::Move {
                    direction: Direction::parse(d)
                        .unwrap_or_else(|| make_error("direction must be up/down/left/right")),
                })
                .collect()
        }
        "moves" => vec![Request::ValidMoves],
        "new-exit" => vec![Request::NewExit],
        "solve" => {
            let method = match args.get(1) {
                Some(m) => SolveMethod::parse(m).unwrap_or_else(|| make_error("method must be vi or pi")),
                None => SolveMethod::ValueIteration,
            };
            let gamma = args.get(2).map(|g| {
                g.parse()
                    .unwrap_or_else(|_| make_error("gamma must be a number in (0, 1]"))
            });
            vec![Request::Solve {
                method,
                gamma,
                max_iterations: None,
                theta: None,
            }]
        }
        "rewards" => match args.len() {
            2 => vec![Request::SetRewards {
                preset: Some(args[1].clone()),
                rewards: None,
            }],
            4 => {
                let num = |s: &String| -> f64 {
                    s.parse()
                        .unwrap_or_else(|_| make_error("rewards must be numbers"))
                };
                vec![Request::SetRewards {
                    preset: None,
                    rewards: Some(RewardConfig::new(num(&args[1]), num(&args[2]), num(&args[3]))),
                }]
            }
            _ => usage(),
        },
        "reset-solver" => vec![Request::ResetSolver],
        "policy" => {
            if args.len() < 3 {
                usage();
            }
            let row = args[1]
                .parse()
                .unwrap_or_else(|_| make_error("row must be a number"));
            let col = args[2]
                .parse()
                .unwrap_or_else(|_| make_error("col must be a number"));
            vec![Request::PolicyAt { row, col }]
        }
        "shutdown" => vec![Request::Shutdown],
        _ => usage(),
    };

    for req in &reqs {
        match send_request(&addr, req) {
            Ok(Response::State(s)) => print_state(s),
            Ok(Response::Maze { name, cells, stats }) => {
                println!(
                    "{name}: rooms={} walls={} room%={:.1}",
                    stats.rooms, stats.walls, stats.room_percentage
                );
                print_board(&cells);
            }
            Ok(Response::Moved { event, game }) => {
                println!("{} (moves={})", event.as_str(), game.info.moves_count);
                if game.info.won {
                    print_board(&game.cells);
                    println!("exit reached!");
                }
            }
            Ok(Response::Moves { moves }) => {
                let names: Vec<&str> = moves.iter().map(|d| d.name()).collect();
                println!("{}", names.join(" "));
            }
            Ok(Response::Solved { result, stats }) => {
                println!(
                    "{}: iterations={} converged={} max={:.3} min={:.3} mean={:.3}",
                    result.method.as_str(),
                    result.iterations,
                    result.converged,
                    stats.max_value,
                    stats.min_value,
                    stats.mean_value,
                );
            }
            Ok(Response::Policy {
                row,
                col,
                action,
                value,
            }) => {
                println!(
                    "({row}, {col}) action={} value={}",
                    action.map_or("-", Direction::name),
                    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}")),
                );
            }
            Ok(Response::Mazes { names }) => {
                for name in names {
                    println!("{name}");
                }
            }
            Ok(Response::Success { message }) => println!("{message}"),
            Ok(Response::Error { message }) => {
                eprintln!("Error: {message}");
                process::exit(1);
            }
            Err(e) => {
                eprintln!("Failed: {e}");
                process::exit(1);
            }
        }
    }
}
