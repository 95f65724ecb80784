use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info};

use crate::engine::{DashboardEngine, DashboardView, IngestReport, RefreshOutcome, RefreshTicket};
use crate::error::SourceError;
use crate::models::dto::RecordDTO;
use crate::source::RecordSource;

/// Notices kept for a presentation layer that is not reading. Newer ones are
/// dropped once this many are queued.
pub const NOTICE_BACKLOG: usize = 256;

/// User actions the presentation layer can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Refresh,
    ToggleDomain(String),
    SetDomain(String, bool),
    ToggleAllDomains,
    SaveSelection,
    DiscardSelection,
    ShowAll,
    DrillDown(Option<String>),
    GoToPage(usize),
    NextPage,
    PrevPage,
    SetPageSize(usize),
    Clear,
}

#[derive(Debug)]
pub enum SessionEvent {
    Command(Command),
    Fetched {
        ticket: RefreshTicket,
        result: Result<Vec<RecordDTO>, SourceError>,
    },
    Pushed(RecordDTO),
    PushLost(SourceError),
    Shutdown,
}

/// Status the presentation layer should surface to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Refreshed(IngestReport),
    StaleRefreshDiscarded,
    InvalidRecord(String),
    SourceUnavailable(String),
    Pruned(usize),
    Cleared,
}

/// Channels handed to everyone outside the session. Views are read-only
/// snapshots; the only way to change state is to send an event.
#[derive(Clone)]
pub struct SessionHandle {
    pub events: UnboundedSender<SessionEvent>,
    pub views: watch::Receiver<Arc<DashboardView>>,
    pub notices: Receiver<Notice>,
}

impl SessionHandle {
    pub fn send(&self, command: Command) -> bool {
        self.events.send(SessionEvent::Command(command)).is_ok()
    }

    pub fn latest(&self) -> Arc<DashboardView> {
        self.views.borrow().clone()
    }
}

/// Owns the engine and applies events one at a time, publishing a fresh
/// view after each.
pub struct Session<S> {
    engine: DashboardEngine,
    source: Arc<S>,
    events: UnboundedSender<SessionEvent>,
    views: watch::Sender<Arc<DashboardView>>,
    notices: Sender<Notice>,
    max_age: Option<Duration>,
}

impl<S: RecordSource + 'static> Session<S> {
    pub fn new(
        mut engine: DashboardEngine,
        source: Arc<S>,
        max_age: Option<Duration>,
    ) -> (Self, SessionHandle, UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (views_tx, views_rx) = watch::channel(Arc::new(engine.view().clone()));
        let (notices_tx, notices_rx) = bounded(NOTICE_BACKLOG);

        let session = Session {
            engine,
            source,
            events: events_tx.clone(),
            views: views_tx,
            notices: notices_tx,
            max_age,
        };
        let handle = SessionHandle {
            events: events_tx,
            views: views_rx,
            notices: notices_rx,
        };
        (session, handle, events_rx)
    }

    pub async fn run(mut self, mut events: UnboundedReceiver<SessionEvent>, running: Arc<AtomicBool>) {
        self.refresh();
        while running.load(Ordering::SeqCst) {
            let Some(event) = events.recv().await else {
                break;
            };
            if matches!(event, SessionEvent::Shutdown) {
                break;
            }
            self.handle(event);
        }
        info!("session stopped");
    }

    /// Applies one event and publishes the resulting view.
    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Command(command) => self.apply(command),
            SessionEvent::Fetched { ticket, result } => match result {
                Ok(batch) => match self.engine.complete_refresh(ticket, batch) {
                    RefreshOutcome::Applied(report) => {
                        self.notify(Notice::Refreshed(report));
                        self.prune();
                    }
                    RefreshOutcome::Stale => self.notify(Notice::StaleRefreshDiscarded),
                },
                Err(e) => {
                    error!("Error fetching history: {}", e);
                    self.notify(Notice::SourceUnavailable(e.to_string()));
                }
            },
            SessionEvent::Pushed(dto) => {
                if let Err(e) = self.engine.append(dto) {
                    self.notify(Notice::InvalidRecord(e.to_string()));
                }
            }
            SessionEvent::PushLost(e) => self.notify(Notice::SourceUnavailable(e.to_string())),
            SessionEvent::Shutdown => {}
        }
        self.publish();
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Refresh => self.refresh(),
            Command::ToggleDomain(domain) => {
                self.engine.toggle_domain(&domain);
            }
            Command::SetDomain(domain, selected) => self.engine.set_domain(&domain, selected),
            Command::ToggleAllDomains => self.engine.toggle_all_domains(),
            Command::SaveSelection => {
                self.engine.save_selection();
            }
            Command::DiscardSelection => self.engine.discard_selection(),
            Command::ShowAll => self.engine.show_everything(),
            Command::DrillDown(ip) => self.engine.drill_down(ip),
            Command::GoToPage(page) => {
                self.engine.go_to_page(page);
            }
            Command::NextPage => {
                self.engine.next_page();
            }
            Command::PrevPage => {
                self.engine.prev_page();
            }
            Command::SetPageSize(size) => self.engine.set_page_size(size),
            Command::Clear => {
                self.engine.clear();
                self.notify(Notice::Cleared);
            }
        }
    }

    /// Starts a bulk fetch on its own task. The result comes back as a
    /// `Fetched` event carrying the ticket issued here.
    fn refresh(&mut self) {
        let ticket = self.engine.begin_refresh();
        let source = Arc::clone(&self.source);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = source.history().await;
            // session gone means nobody wants the result
            let _ = events.send(SessionEvent::Fetched { ticket, result });
        });
    }

    fn prune(&mut self) {
        let Some(age) = self.max_age.and_then(|d| chrono::Duration::from_std(d).ok()) else {
            return;
        };
        let cutoff = Local::now().naive_local() - age;
        let removed = self.engine.prune_before(cutoff);
        if removed > 0 {
            self.notify(Notice::Pruned(removed));
        }
    }

    fn notify(&self, notice: Notice) {
        match self.notices.try_send(notice) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(notice)) => debug!(?notice, "notice backlog full, dropping"),
        }
    }

    fn publish(&mut self) {
        let view = Arc::new(self.engine.view().clone());
        self.views.send_replace(view);
    }

    pub fn engine(&self) -> &DashboardEngine {
        &self.engine
    }
}

/// Fires `Command::Refresh` every `period` until `running` clears.
pub fn spawn_refresh_timer(
    events: UnboundedSender<SessionEvent>,
    period: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        // first tick completes immediately; the session already refreshed
        interval.tick().await;
        while running.load(Ordering::SeqCst) {
            interval.tick().await;
            if events.send(SessionEvent::Command(Command::Refresh)).is_err() {
                break;
            }
        }
    })
}
