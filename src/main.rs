use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use mazeplay::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" || args[1] == "help" {
        print_help();
        return Ok(());
    }

    let opts = Options::parse(&args[2..])?;
    match args[1].as_str() {
        "presets" => {
            println!("generation presets: {}", PRESETS.join(", "));
            println!("reward presets:     {}", mazeplay::dp::REWARD_PRESETS.join(", "));
        }
        "generate" => run_generate(&opts)?,
        "solve" => run_solve(&opts)?,
        "play" => run_play(&opts)?,
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(2);
        }
    }
    Ok(())
}

fn print_help() {
    println!("mazeplay - generate, play and solve mazes offline");
    println!();
    println!("Usage: mazeplay <command> [preset] [options]");
    println!();
    println!("Commands:");
    println!("  presets                 List generation and reward presets");
    println!("  generate [preset]       Generate a maze and print it");
    println!("  solve [preset]          Generate a maze, add an exit and solve it");
    println!("  play [preset]           Play in the terminal (w/a/s/d, q to quit)");
    println!();
    println!("Options:");
    println!("  --seed <n>              Seed every random source");
    println!("  --size <W>x<H>          Override the preset size");
    println!("  --save <dir>            Write the maze document into <dir> (generate)");
    println!("  --method <vi|pi>        Solver method (solve, default vi)");
    println!("  --gamma <g>             Discount factor (solve, default 0.9)");
    println!("  --rewards <preset>      Reward preset (solve, default balanced)");
}

#[derive(Debug, Default)]
struct Options {
    preset: Option<String>,
    seed: Option<u64>,
    size: Option<(usize, usize)>,
    save: Option<PathBuf>,
    method: Option<SolveMethod>,
    gamma: Option<f64>,
    rewards: Option<String>,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut opts = Options::default();
        let mut it = args.iter();
        while let Some(arg) = it.next() {
            let mut value = |flag: &str| {
                it.next()
                    .cloned()
                    .ok_or_else(|| format!("{flag} needs a value"))
            };
            match arg.as_str() {
                "--seed" => {
                    let v = value("--seed")?;
                    opts.seed = Some(v.parse().map_err(|_| format!("bad seed '{v}'"))?);
                }
                "--size" => {
                    let v = value("--size")?;
                    let (w, h) = v
                        .split_once('x')
                        .ok_or_else(|| format!("size must look like 20x15, got '{v}'"))?;
                    let w = w.parse().map_err(|_| format!("bad width '{w}'"))?;
                    let h = h.parse().map_err(|_| format!("bad height '{h}'"))?;
                    opts.size = Some((w, h));
                }
                "--save" => opts.save = Some(PathBuf::from(value("--save")?)),
                "--method" => {
                    let v = value("--method")?;
                    opts.method =
                        Some(SolveMethod::parse(&v).ok_or_else(|| format!("unknown method '{v}'"))?);
                }
                "--gamma" => {
                    let v = value("--gamma")?;
                    opts.gamma = Some(v.parse().map_err(|_| format!("bad gamma '{v}'"))?);
                }
                "--rewards" => opts.rewards = Some(value("--rewards")?),
                flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
                preset => opts.preset = Some(preset.to_string()),
            }
        }
        Ok(opts)
    }

    fn config(&self) -> Result<GenerationConfig, ConfigError> {
        let mut params = match &self.preset {
            Some(name) => ConfigParams::preset(name)?,
            None => ConfigParams::default(),
        };
        if let Some((w, h)) = self.size {
            params.width = w;
            params.height = h;
        }
        params.build()
    }

    fn generate(&self) -> Result<(GenerationConfig, Generated), Box<dyn std::error::Error>> {
        let config = self.config()?;
        let mut generator = match self.seed {
            Some(seed) => MazeGenerator::with_seed(config.clone(), seed),
            None => MazeGenerator::new(config.clone()),
        };
        let generated = generator.generate(None, None)?;
        Ok((config, generated))
    }

    fn game(&self) -> MazeGame {
        match self.seed {
            Some(seed) => MazeGame::with_seed(seed),
            None => MazeGame::new(),
        }
    }
}

fn print_stats(stats: &GenerationStats) {
    println!(
        "rooms={} walls={} room%={:.1}",
        stats.rooms, stats.walls, stats.room_percentage
    );
}

fn run_generate(opts: &Options) -> Result<(), Box<dyn std::error::Error>> {
    let (config, generated) = opts.generate()?;
    print!("{}", generated.grid);
    print_stats(&generated.stats);

    if let Some(dir) = &opts.save {
        let doc = MazeDocument::from_generated(&generated, &config);
        let path = doc.save_to_dir(dir)?;
        println!("saved {}", path.display());
    }
    Ok(())
}

fn run_solve(opts: &Options) -> Result<(), Box<dyn std::error::Error>> {
    let (_, generated) = opts.generate()?;
    let mut grid = generated.grid;
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let exit = place_random_exit(&mut grid, &mut rng).ok_or("maze has no rooms")?;
    info!("Exit at {:?}", exit);

    let mut solver = MazeDp::new(grid, opts.gamma.unwrap_or(mazeplay::dp::DEFAULT_GAMMA))?;
    if let Some(name) = &opts.rewards {
        solver.update_rewards(RewardConfig::preset(name)?);
    }
    let result = match opts.method.unwrap_or(SolveMethod::ValueIteration) {
        SolveMethod::ValueIteration => solver.value_iteration(100, 1e-4),
        SolveMethod::PolicyIteration => solver.policy_iteration(100),
    };

    print!("{}", SolverAdapter::new(&solver).render_policy());
    let stats = solver.stats();
    println!(
        "{}: iterations={} converged={} final_delta={}",
        result.method.as_str(),
        result.iterations,
        result.converged,
        result
            .final_delta
            .map_or_else(|| "-".to_string(), |d| format!("{d:.2e}")),
    );
    println!(
        "values: max={:.3} min={:.3} mean={:.3} over {} states",
        stats.max_value, stats.min_value, stats.mean_value, stats.valid_states
    );
    Ok(())
}

fn run_play(opts: &Options) -> Result<(), Box<dyn std::error::Error>> {
    let (_, generated) = opts.generate()?;
    let mut game = opts.game();
    game.load(generated.grid)?;
    let placement = game.start_game(None, None)?;
    println!(
        "exit is {} cells away (Manhattan); w/a/s/d to move, q to quit",
        placement.distance
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print!("{}", GameAdapter::new(&game).render());
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let input = line.trim();
        if input == "q" {
            break;
        }
        for ch in input.chars() {
            let Some(dir) = Direction::parse(&ch.to_string()) else {
                println!("unknown key '{ch}'");
                continue;
            };
            match game.step(dir) {
                MoveEvent::Bump => println!("bump"),
                MoveEvent::OutOfBounds => println!("edge of the maze"),
                _ => {}
            }
        }
        print!("{}", GameAdapter::new(&game).render());
        stdout.flush()?;

        if game.is_won() {
            let info = game.info();
            println!(
                "reached the exit in {} moves ({:.1}s)",
                info.moves_count,
                info.duration_secs.unwrap_or(0.0)
            );
            break;
        }
    }
    Ok(())
}
