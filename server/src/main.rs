use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use tron_server::{shutdown, Server, ServerConfig};
use tron_shared::{DEFAULT_BOARD_HEIGHT, DEFAULT_BOARD_WIDTH, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(author, version, about = "Lockstep Tron game server")]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Number of players to wait for before the game starts
    #[arg(short = 'n', long)]
    players: usize,
    /// Board width in cells
    #[arg(long, default_value_t = DEFAULT_BOARD_WIDTH)]
    width: usize,
    /// Board height in cells
    #[arg(long, default_value_t = DEFAULT_BOARD_HEIGHT)]
    height: usize,
    /// Board file with spawn points, overrides width and height
    #[arg(short, long)]
    board: Option<PathBuf>,
    /// Seed for start positions and directions
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        players: args.players,
        board_width: args.width,
        board_height: args.height,
        board_file: args.board,
        seed: args.seed,
    };

    let game = match config.build_game() {
        Ok(game) => game,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    let server = Server::bind(&config.bind_addr(), game).await?;

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            trigger.trigger();
        }
    });

    let end = server.run(shutdown).await?;
    info!("Server finished: {}", end);

    Ok(())
}
