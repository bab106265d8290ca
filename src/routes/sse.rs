use crate::state::RosterState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SseEvent {
    StudentsChanged,
    ImportFinished,
}

impl SseEvent {
    /// The name htmx listens for, as in `hx-trigger="sse:students_changed"`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::StudentsChanged => "students_changed",
            Self::ImportFinished => "import_finished",
        }
    }
}

pub async fn sse_feed(
    State(state): State<RosterState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    //lagging receivers just skip what they missed, the next event refreshes everything anyway
    let stream = BroadcastStream::new(state.subscribe_to_sse_feed())
        .filter_map(Result::ok)
        .map(|event| Ok(Event::default().event(event.name()).data(event.name())));

    Sse::new(stream).keep_alive(KeepAlive::default())
}
