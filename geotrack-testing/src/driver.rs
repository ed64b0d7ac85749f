use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use geotrack_logic::{PermissionKind, PermissionStatus};
use geotrack_test_shared::{TestingRequest, TestingResponse, get_socket_name, prelude::*};
use interprocess::local_socket::{tokio::Stream, traits::tokio::Stream as _};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// How long to keep listening for tracker events after a request
const LISTEN_FOR: Duration = Duration::from_millis(500);

#[derive(Parser)]
struct Cli {
    /// Name of the local socket the test daemon is listening on
    socket: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum PermissionValue {
    Fine,
    Coarse,
}

impl From<PermissionValue> for PermissionKind {
    fn from(value: PermissionValue) -> Self {
        match value {
            PermissionValue::Fine => PermissionKind::FineLocation,
            PermissionValue::Coarse => PermissionKind::CoarseLocation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum AnswerValue {
    Grant,
    Deny,
}

impl From<AnswerValue> for PermissionStatus {
    fn from(value: AnswerValue) -> Self {
        match value {
            AnswerValue::Grant => PermissionStatus::Granted,
            AnswerValue::Deny => PermissionStatus::Denied,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Press the tracking button
    Toggle,
    /// Start tracking without going through the button
    Start,
    /// Stop tracking
    Stop,
    /// Send the app to the background
    Background,
    /// Bring the app back to the foreground
    Foreground,
    /// Grant a permission without a prompt
    Grant {
        #[arg(value_enum)]
        permission: PermissionValue,
    },
    /// Revoke a permission
    Revoke {
        #[arg(value_enum)]
        permission: PermissionValue,
    },
    /// Answer the pending permission prompt
    Answer {
        #[arg(value_enum)]
        answer: AnswerValue,
    },
    /// Deliver a location fix
    Fix {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        long: f64,
    },
    /// Deliver an update with no location
    Unavailable,
    /// Print what the screen currently shows
    State,
    /// Shut the daemon down
    Quit,
}

impl From<Commands> for TestingRequest {
    fn from(value: Commands) -> Self {
        match value {
            Commands::Toggle => TestingRequest::Toggle,
            Commands::Start => TestingRequest::Start,
            Commands::Stop => TestingRequest::Stop,
            Commands::Background => TestingRequest::Background,
            Commands::Foreground => TestingRequest::Foreground,
            Commands::Grant { permission } => TestingRequest::SetPermission(permission.into(), true),
            Commands::Revoke { permission } => {
                TestingRequest::SetPermission(permission.into(), false)
            }
            Commands::Answer { answer } => TestingRequest::AnswerPermission(answer.into()),
            Commands::Fix { lat, long } => TestingRequest::PushFix { lat, long },
            Commands::Unavailable => TestingRequest::PushUnavailable,
            Commands::State => TestingRequest::GetState,
            Commands::Quit => TestingRequest::Quit,
        }
    }
}

fn print_resp(resp: &TestingResponse) {
    match resp {
        TestingResponse::Complete => println!("OK"),
        TestingResponse::UiState(ui) => {
            println!("[{}] {}", ui.button_label, ui.location_text.replace('\n', " | "));
        }
        TestingResponse::Notice(notice) => println!("Notice: {}", notice.message()),
        TestingResponse::Error(why) => eprintln!("Error: {why}"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let cli = Cli::parse();

    let socket_name = get_socket_name(cli.socket.clone()).context("Failed to get socket name")?;

    let stream = Stream::connect(socket_name)
        .await
        .context("Failed to connect to socket")?;

    let req = TestingRequest::from(cli.command);
    let mut encoded = serde_json::to_vec(&req).context("Failed to encode request")?;
    encoded.push(b'\n');

    let mut recv = BufReader::new(&stream);
    let mut send = &stream;
    send.write_all(&encoded)
        .await
        .context("Failed to send request")?;

    let mut buffer = String::with_capacity(256);
    while let Ok(res) = tokio::time::timeout(LISTEN_FOR, recv.read_line(&mut buffer)).await {
        if res.context("Failed to read response")? == 0 {
            break;
        }
        let resp = serde_json::from_str::<TestingResponse>(&buffer)
            .context("Failed to parse response")?;
        buffer.clear();
        print_resp(&resp);
    }

    Ok(())
}
