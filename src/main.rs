use admin_chat::api::client::ApiClient;
use admin_chat::api::models::Message;
use admin_chat::chat::peer::RowOwned;
use admin_chat::{AppState, ChatSettings, ChatUpdate, ConnectionManager, GroupChat, PeerChat, SendOutcome, WsTransport};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "admin-chat", about = "Follow marketplace support and dealer chats from a terminal")]
struct Cli {
    /// Backend base url, e.g. https://admin.example.com
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Bearer token; defaults to the stored session token
    #[arg(long, global = true)]
    token: Option<String>,
    /// Persist --base-url/--token to the config file
    #[arg(long, global = true)]
    save: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List support groups
    Groups,
    /// Open a support group, print new messages and send stdin lines
    Follow {
        #[arg(long)]
        group: Option<String>,
    },
    /// Watch dealer–seller chats
    DealerChats {
        #[arg(long)]
        chat: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut state = AppState::load();
    if let Some(url) = cli.base_url {
        state.base_url = admin_chat::utils::normalize_url(&url);
    }
    if cli.token.is_some() {
        state.token = cli.token;
    }
    if cli.save {
        state.save()?;
    }
    if !state.is_configured() {
        eprintln!("No server configured. Pass --base-url (and --save to remember it).");
        return Ok(());
    }

    let api = Arc::new(ApiClient::new(&state.base_url, state.token.clone()));
    let connection = ConnectionManager::new(state.socket_config()?, state.identity(), Arc::new(WsTransport::new()));
    let settings = ChatSettings::from(&state);

    match cli.command {
        Command::Groups => {
            let chat = GroupChat::new(api, connection, settings);
            chat.load_conversations().await;
            for conv in chat.conversations() {
                let preview = conv.last_message.and_then(|p| p.text).unwrap_or_default();
                println!("{:<24} {:<32} unread={:<3} {}", conv.id, conv.title, conv.unread.admin, preview);
            }
        }
        Command::Follow { group } => {
            connection.connect(None);
            let chat = GroupChat::new(api, connection.clone(), settings);
            chat.load_conversations().await;
            let target = group.or_else(|| chat.conversations().first().map(|c| c.id.clone()));
            let Some(target) = target else {
                eprintln!("No support groups available.");
                return Ok(());
            };
            chat.select_conversation(&target).await;
            follow_group(&chat).await;
            connection.disconnect();
        }
        Command::DealerChats { chat: selected } => {
            connection.connect(None);
            let peer = PeerChat::new(api, connection.clone(), settings);
            peer.load_conversations().await;
            if let Some(id) = selected {
                peer.select_conversation(&id).await;
            }
            follow_peer(&peer).await;
            connection.disconnect();
        }
    }
    Ok(())
}

fn print_message(m: &Message) {
    let time = m.created_at.with_timezone(&chrono::Local).format("%H:%M");
    let body = m.preview_text().unwrap_or_default();
    println!("[{time}] {} ({}): {body}", m.sender_name, m.sender_role.as_str());
}

async fn follow_group(chat: &GroupChat) {
    let mut updates = chat.subscribe();
    let mut printed = 0;
    for m in chat.messages() {
        print_message(&m);
        printed += 1;
    }
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(ChatUpdate::TranscriptChanged { .. }) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    let messages = chat.messages();
                    for m in messages.iter().skip(printed) {
                        print_message(m);
                    }
                    printed = messages.len();
                }
                Ok(ChatUpdate::TypingChanged) => {
                    let names = chat.typing_names();
                    if !names.is_empty() {
                        println!("  {} typing…", names.join(", "));
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            line = lines.next_line() => match line {
                Ok(Some(text)) => {
                    chat.keystroke();
                    if chat.send_message(&text).await == SendOutcome::Failed {
                        eprintln!("Message not sent.");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("stdin closed: {e}");
                    break;
                }
            },
        }
    }
}

async fn follow_peer(peer: &PeerChat) {
    let mut updates = peer.subscribe();
    let mut printed = 0;
    loop {
        let rows = peer.rows();
        for row in rows.iter().skip(printed) {
            match row {
                RowOwned::DateSeparator(label) => println!("── {label} ──"),
                RowOwned::Message(m) => print_message(m),
            }
        }
        printed = rows.len();
        match updates.recv().await {
            Ok(ChatUpdate::TranscriptChanged { scroll_to_bottom: false }) => printed = 0,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
