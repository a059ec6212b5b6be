use lancelink::domain_model::{MessageId, UserId};
use lancelink::logger::*;
use lancelink::provider::ChatProvider;
use lancelink::session::SessionEvent;
use lancelink::settings::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let provider = ChatProvider::try_new(&project_settings)?;

    let current_user = UserId(
        cli.user
            .ok_or_else(|| anyhow::anyhow!("--user is required"))?,
    );
    let peer = match cli.peer {
        Some(peer) => UserId(peer),
        None => provider.directory().resolve_peer().await?,
    };
    info!("chatting as [{}] with [{}]", current_user, peer);

    let (session, mut events) = provider.open_session(current_user.clone());
    session.set_peer(peer);

    let me = current_user.clone();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::HistoryLoaded { count } => {
                    println!("-- {} earlier messages --", count);
                }
                SessionEvent::LoadFailed(e) => {
                    println!("!! could not load history: {}", e);
                }
                SessionEvent::Appended(message) => {
                    if message.sender_id == me {
                        println!("          me> {}", message.text);
                    } else {
                        println!("{}> {}", message.sender_id, message.text);
                    }
                }
                SessionEvent::SendFailed { temp_id } => {
                    println!("!! send failed, `/retry {}` to resend", temp_id);
                }
                SessionEvent::LoadStarted | SessionEvent::Confirmed { .. } => {}
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Some(id) = line.strip_prefix("/retry ") {
                        session.retry_send(MessageId(id.trim().to_owned()));
                    } else {
                        session.send_text(line);
                    }
                }
                None => break,
            },
        }
    }

    session.shutdown().await;
    provider.shutdown().await;
    printer.abort();
    info!("bye");

    Ok(())
}
