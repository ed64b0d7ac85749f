use geotrack_logic::{
    LocationFix, LocationRequest, LocationUpdate, Notice, SavedState, Tracker, UiUpdateSender,
};
use geotrack_test_shared::*;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::mpsc,
};

/// Something the tracker wants the driver to know about
enum DaemonEvent {
    Update,
    Notice(Notice),
}

struct UpdateSender(mpsc::Sender<DaemonEvent>);

impl UpdateSender {
    fn push(&self, event: DaemonEvent) {
        if let Err(why) = self.0.try_send(event) {
            debug!("Dropping tracker event, no driver is reading them: {why}");
        }
    }
}

/// Throw away whatever the tracker reported while nobody was connected, returns how many
fn discard_stale(events: &mut mpsc::Receiver<DaemonEvent>) -> usize {
    let mut discarded = 0;
    while events.try_recv().is_ok() {
        discarded += 1;
    }
    discarded
}

impl UiUpdateSender for UpdateSender {
    fn send_update(&self) {
        self.push(DaemonEvent::Update);
    }

    fn show_notice(&self, notice: Notice) {
        self.push(DaemonEvent::Notice(notice));
    }
}

type SimTracker = Tracker<SimLocation, SimGeocoder, SimPermissions, UpdateSender>;

/// Handle a single request. Toggling may wait on a permission prompt, so it runs on its own
/// task to keep the daemon free to receive the answer.
async fn process_req(tracker: &Arc<SimTracker>, req: TestingRequest) -> Result<TestingResponse> {
    match req {
        TestingRequest::Toggle => {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.toggle().await });
        }
        TestingRequest::Start => tracker.start().await,
        TestingRequest::Stop => tracker.stop().await,
        TestingRequest::Background => tracker.on_background().await,
        TestingRequest::Foreground => tracker.on_foreground().await,
        TestingRequest::SetPermission(kind, granted) => {
            tracker.permissions().set(kind, granted);
        }
        TestingRequest::AnswerPermission(status) => {
            tracker.permissions().answer(status)?;
        }
        TestingRequest::PushFix { lat, long } => {
            let fix = LocationFix::new(lat, long, chrono::Utc::now());
            tracker.location().push(fix.into()).await?;
        }
        TestingRequest::PushUnavailable => {
            tracker.location().push(LocationUpdate::Unavailable).await?;
        }
        TestingRequest::GetState => {
            return Ok(tracker.ui_state().await.into());
        }
        TestingRequest::Quit => tracker.quit(),
    }
    Ok(TestingResponse::Complete)
}

async fn write_resp(send: &mut (impl AsyncWriteExt + Unpin), resp: &TestingResponse) {
    let mut encoded = serde_json::to_vec(resp).expect("Failed to encode");
    encoded.push(b'\n');
    if let Err(why) = send.write_all(&encoded).await {
        warn!("Failed to send response: {why:?}");
    }
}

use interprocess::local_socket::{ListenerOptions, tokio::prelude::*};

const EVENT_CAPACITY: usize = 40;

const CLI_MSG: &str = "Usage: geotrack-test-daemon SOCKET_NAME [offline|nominatim]";

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> Result {
    colog::init();

    let args = std::env::args().collect::<Vec<_>>();
    let raw_socket_name = args.get(1).cloned().expect(CLI_MSG);
    let geocoder_name = args.get(2).map(String::as_str).unwrap_or("offline");
    let socket_name = get_socket_name(raw_socket_name)?;
    let geocoder = SimGeocoder::from_name(geocoder_name)?;
    let opts = ListenerOptions::new().name(socket_name);
    let listener = opts.create_tokio().context("Failed to bind to socket")?;
    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(EVENT_CAPACITY);

    let tracker = Arc::new(SimTracker::new(
        LocationRequest::default(),
        SavedState::default(),
        SimLocation::default(),
        Arc::new(geocoder),
        SimPermissions::new(false, false),
        UpdateSender(event_tx),
    ));

    let loop_tracker = tracker.clone();
    let tracker_loop = tokio::spawn(async move { loop_tracker.main_loop().await });

    info!("Testing Daemon Ready");

    'server: loop {
        let res = tokio::select! {
            res = listener.accept() => {
                res
            },
            Ok(_) = tokio::signal::ctrl_c() => {
                break 'server;
            }
        };

        match res {
            Ok(stream) => {
                let stale = discard_stale(&mut event_rx);
                if stale > 0 {
                    debug!("Discarded {stale} events from before this driver connected");
                }

                let mut recv = BufReader::new(&stream);
                let mut send = &stream;

                let mut buffer = String::with_capacity(256);

                loop {
                    tokio::select! {
                        Ok(_) = tokio::signal::ctrl_c() => {
                            break 'server;
                        }
                        res = recv.read_line(&mut buffer) => {
                            match res {
                                Ok(0) => {
                                    break;
                                }
                                Ok(_amnt) => {
                                    let parsed = serde_json::from_str::<TestingRequest>(&buffer);
                                    buffer.clear();
                                    match parsed {
                                        Ok(req) => {
                                            let quit = matches!(req, TestingRequest::Quit);
                                            let resp = process_req(&tracker, req)
                                                .await
                                                .unwrap_or_else(TestingResponse::from);
                                            write_resp(&mut send, &resp).await;
                                            if quit {
                                                break 'server;
                                            }
                                        }
                                        Err(why) => {
                                            let resp =
                                                TestingResponse::Error(format!("Malformed request: {why}"));
                                            write_resp(&mut send, &resp).await;
                                        }
                                    }
                                }
                                Err(why) => {
                                    error!("Read Error: {why:?}");
                                }
                            }
                        }
                        Some(event) = event_rx.recv() => {
                            let resp: TestingResponse = match event {
                                DaemonEvent::Update => tracker.ui_state().await.into(),
                                DaemonEvent::Notice(notice) => notice.into(),
                            };
                            write_resp(&mut send, &resp).await;
                        }
                    }
                }
            }
            Err(why) => error!("Error from connection: {why:?}"),
        }
    }

    tracker.quit();
    tracker_loop.await.context("Tracker loop panicked")?;

    Ok(())
}
