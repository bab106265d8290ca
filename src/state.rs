use crate::{
    auth::RosterSession,
    config::RuntimeConfiguration,
    data::student::PgStudentStore,
    error::{GetDatabaseConnectionSnafu, MigrateSnafu, OpenDatabaseSnafu, RosterResult},
    events::{EventBus, EventKind, Handler, StudentEvent},
    jobs::JobRunner,
    maud_conveniences::render_nav,
    routes::sse::SseEvent,
    service::{AccountService, ImportReport, StudentService},
};
use maud::{DOCTYPE, Markup, html};
use snafu::ResultExt;
use sqlx::{Pool, Postgres, pool::PoolConnection, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::sync::broadcast::{Receiver, Sender, channel, error::RecvError};

const STUDENT_EVENT_KINDS: [EventKind; 3] = [
    EventKind::StudentCreated,
    EventKind::StudentUpdated,
    EventKind::StudentDeleted,
];

/// Everything the handlers share. Built with [`RosterState::new`], made ready with
/// [`RosterState::initialise`] and torn down with [`RosterState::sensible_shutdown`].
#[derive(Clone, Debug)]
pub struct RosterState {
    pool: Pool<Postgres>,
    config: RuntimeConfiguration,
    bus: Arc<EventBus>,
    students: StudentService<PgStudentStore>,
    accounts: AccountService,
    import_jobs: JobRunner<ImportReport>,
    sse_events_sender: Sender<SseEvent>,
}

impl RosterState {
    /// Doesn't touch the database yet, connections are made on first use.
    pub fn new(options: PgPoolOptions, config: RuntimeConfiguration) -> RosterResult<Self> {
        let pool = options
            .connect_lazy(&config.db_config().get_db_path())
            .context(OpenDatabaseSnafu)?;

        let bus = Arc::new(EventBus::new());
        let (tx, _rx) = channel(16);

        Ok(Self {
            students: StudentService::new(PgStudentStore::new(pool.clone()), bus.clone()),
            accounts: AccountService::new(pool.clone()),
            pool,
            config,
            bus,
            import_jobs: JobRunner::new(),
            sse_events_sender: tx,
        })
    }

    /// Runs migrations, then routes student changes and finished imports to the SSE feed.
    pub async fn initialise(&self) -> RosterResult<()> {
        sqlx::migrate!().run(&self.pool).await.context(MigrateSnafu)?;

        let log_changes: Handler = Arc::new(|event: &StudentEvent| {
            debug!(kind = ?event.kind(), id = event.student_id(), "Student changed");
            Ok(())
        });
        let sender = self.sse_events_sender.clone();
        let notify_browsers: Handler = Arc::new(move |_: &StudentEvent| {
            //no open feeds is fine
            let _ = sender.send(SseEvent::StudentsChanged);
            Ok(())
        });
        for kind in STUDENT_EVENT_KINDS {
            self.bus.subscribe(kind, log_changes.clone());
            self.bus.subscribe(kind, notify_browsers.clone());
        }

        let mut completions = self.import_jobs.subscribe_completions();
        let sender = self.sse_events_sender.clone();
        tokio::spawn(async move {
            loop {
                match completions.recv().await {
                    Ok(completion) => {
                        debug!(id = %completion.id, succeeded = completion.succeeded, "Import finished");
                        let _ = sender.send(SseEvent::ImportFinished);
                    }
                    Err(RecvError::Lagged(n)) => warn!(n, "Missed import completions"),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        info!("State initialised");
        Ok(())
    }

    pub async fn sensible_shutdown(&self) -> RosterResult<()> {
        self.bus.clear();
        self.pool.close().await;
        info!("Dropped event subscriptions and closed the pool");
        Ok(())
    }

    pub fn render(&self, auth_session: RosterSession, markup: Markup) -> Markup {
        let nav = render_nav(auth_session.user.as_ref());

        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="UTF-8" {}
                    meta name="viewport" content="width=device-width, initial-scale=1.0" {}
                    script src="https://unpkg.com/htmx.org@2.0.4" integrity="sha384-HGfztofotfshcF7+8n44JQL2oJmowVChPTg48S+jvZoztPfvwD79OC/LTtG6dMp+" crossorigin="anonymous" {}
                    script src="https://unpkg.com/htmx-ext-sse@2.2.3" integrity="sha384-Y4gc0CK6Kg+hmulDc6rZPJu0tqvk7EWlih0Oh+2OkAi1ZDlCbBDCQEE2uVk472Ky" crossorigin="anonymous" {}
                    script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4" {}
                    title { "Roster" }
                }
                body hx-ext="sse" sse-connect=[auth_session.user.is_some().then_some("/sse_feed")] class="bg-gray-900 min-h-screen flex flex-col items-center pt-24 text-white" {
                    (nav)
                    (markup)
                }
            }
        }
    }

    pub async fn get_connection(&self) -> RosterResult<PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .context(GetDatabaseConnectionSnafu)
    }

    pub const fn config(&self) -> &RuntimeConfiguration {
        &self.config
    }

    pub const fn students(&self) -> &StudentService<PgStudentStore> {
        &self.students
    }

    pub const fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub const fn import_jobs(&self) -> &JobRunner<ImportReport> {
        &self.import_jobs
    }

    pub fn subscribe_to_sse_feed(&self) -> Receiver<SseEvent> {
        self.sse_events_sender.subscribe()
    }
}
