use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tron_client::input::Steering;
use tron_client::{Client, ClientError};
use tron_shared::{ServerUpdate, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bot client for the lockstep Tron server", long_about = None)]
struct Args {
    /// Server host to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1")]
    server: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Pause between moves in milliseconds
    #[arg(short, long, default_value = "100")]
    delay: u64,

    /// Seed for the bot's steering
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    info!("Connecting to {}:{}", args.server, args.port);

    let mut client = Client::connect((args.server.as_str(), args.port)).await?;
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut steering = Steering::new(rng);
    let delay = Duration::from_millis(args.delay);
    let mut tick: u64 = 0;

    loop {
        // The game over line follows the crash snapshot without a new move
        let update = match client.try_receive_update().await {
            Ok(Some(update)) => Ok(update),
            Ok(None) => client.step(steering.next_direction()).await,
            Err(e) => Err(e),
        };

        match update {
            Ok(ServerUpdate::Snapshot(snapshot)) => {
                tick += 1;
                let positions: Vec<String> = snapshot
                    .players
                    .iter()
                    .map(|p| format!("{} {}", p.position, p.direction))
                    .collect();
                info!("Tick {}: {}", tick, positions.join(", "));
            }
            Ok(ServerUpdate::GameOver {
                crashed_player,
                tick,
            }) => {
                info!("Game over: player {} crashed on tick {}", crashed_player, tick);
                break;
            }
            Err(ClientError::Closed) => {
                info!("Server closed the connection");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        tokio::time::sleep(delay).await;
    }

    Ok(())
}
