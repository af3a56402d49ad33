use callcentrum::config::SessionConfig;
use callcentrum::media::SleepClipPlayer;
use callcentrum::session::SessionController;
use callcentrum::types::events::{ButtonRole, UiEvent};
use chrono::Local;
use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Interactive virtual-call client. Dials the control server, prints every
/// UI event, and forwards keyboard input as in-call actions:
/// a single character is a dialpad press, `pad` toggles the dialpad,
/// `shake` simulates device motion, `end` hangs up.
#[derive(Parser, Debug)]
#[command(name = "callcentrum")]
struct Args {
    /// Control server, host:port
    #[arg(long)]
    server: String,

    /// Party name sent in the handshake
    #[arg(long, default_value = "druzinka")]
    party: String,

    /// Provider name shown in the provider-info panel
    #[arg(long, default_value = "KSP Mobile")]
    provider: String,

    /// Number to dial
    number: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{:<5}] [{}] - {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    rt.block_on(run(args))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = SessionConfig {
        server_address: Some(args.server),
        party_name: args.party,
        provider_name: args.provider,
    };
    let player = Arc::new(SleepClipPlayer::new(Duration::from_secs(2)));
    let (controller, mut events) =
        SessionController::start(config, Some(args.number), player);
    let controller = Arc::new(controller);

    let input_controller = controller.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match line.trim() {
                "" => {}
                "end" => input_controller.on_button_click(ButtonRole::EndCall),
                "pad" => input_controller.on_button_click(ButtonRole::ToggleDialpad),
                "shake" => input_controller.on_shake(),
                key if key.chars().count() == 1 => {
                    input_controller.on_dialer_click(key.chars().next().unwrap());
                }
                other => info!("Unknown input: {other}"),
            }
        }
    });

    while let Some(event) = events.recv().await {
        info!("UI event: {event:?}");
        if event == UiEvent::Terminate {
            break;
        }
    }

    controller.teardown();
    Ok(())
}
