//! Event sink and subscriber stream for one search.
//!
//! The sink side is held by the search task; the stream side by the single
//! subscriber (the HTTP response). The channel is bounded: `progress` events
//! are dropped on overflow, everything else waits for the subscriber, so
//! `path_found`, `complete`, and `error` are never lost.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use wikigraph_core::{ProgressInfo, SearchEvent};

/// Sending half, held by the search task.
#[derive(Clone)]
pub struct EventSink {
  tx: mpsc::Sender<SearchEvent>,
}

/// Receiving half, held by the subscriber.
pub struct EventStream {
  rx: mpsc::Receiver<SearchEvent>,
  keepalive: Duration,
  finished: bool,
}

/// Create a bounded sink/stream pair for one request.
pub fn channel(buffer: usize, keepalive: Duration) -> (EventSink, EventStream) {
  let (tx, rx) = mpsc::channel(buffer.max(1));
  (
    EventSink { tx },
    EventStream {
      rx,
      keepalive,
      finished: false,
    },
  )
}

impl EventSink {
  /// Deliver an event, waiting for channel room. A closed channel (the
  /// subscriber went away) is not an error here; cancellation is signalled
  /// separately.
  pub async fn send(&self, event: SearchEvent) {
    if self.tx.send(event).await.is_err() {
      debug!("event subscriber gone, dropping event");
    }
  }

  /// Deliver a progress event if there is room, else drop it.
  pub fn send_progress(&self, info: ProgressInfo) {
    if let Err(err) = self.tx.try_send(SearchEvent::Progress(info)) {
      trace!(%err, "dropping progress event");
    }
  }
}

impl EventStream {
  /// Next event for the subscriber.
  ///
  /// Yields `Keepalive` after `keepalive` of silence. Returns `None` once a
  /// terminal event has been delivered (or the sender side is gone).
  pub async fn next_event(&mut self) -> Option<SearchEvent> {
    if self.finished {
      return None;
    }
    match tokio::time::timeout(self.keepalive, self.rx.recv()).await {
      Ok(Some(event)) => {
        if event.is_terminal() {
          self.finished = true;
          self.rx.close();
        }
        Some(event)
      }
      Ok(None) => {
        self.finished = true;
        None
      }
      Err(_) => Some(SearchEvent::Keepalive),
    }
  }

  /// Next event rendered as a `data: <json>\n\n` frame.
  pub async fn next_frame(&mut self) -> Option<String> {
    loop {
      let event = self.next_event().await?;
      match event.to_frame() {
        Ok(frame) => return Some(frame),
        Err(err) => {
          debug!(%err, "failed to serialize event, skipping");
        }
      }
    }
  }

  /// Drain everything up to and including the terminal event. Test helper
  /// for exercising whole searches.
  pub async fn collect_events(&mut self) -> Vec<SearchEvent> {
    let mut events = Vec::new();
    while let Some(event) = self.next_event().await {
      let terminal = event.is_terminal();
      events.push(event);
      if terminal {
        break;
      }
    }
    events
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use wikigraph_core::{ErrorInfo, ErrorKind, ResolvingInfo};

  fn progress(n: u64) -> ProgressInfo {
    ProgressInfo {
      forward_depth: 1,
      backward_depth: 0,
      pages_checked: n,
      pages_per_second: 0,
      elapsed_ms: 0,
    }
  }

  #[tokio::test]
  async fn events_arrive_in_order() {
    let (sink, mut stream) = channel(8, Duration::from_secs(15));
    sink
      .send(SearchEvent::Resolving(ResolvingInfo {
        message: "resolving".to_string(),
      }))
      .await;
    sink.send_progress(progress(10));
    drop(sink);

    assert!(matches!(stream.next_event().await, Some(SearchEvent::Resolving(_))));
    assert!(matches!(stream.next_event().await, Some(SearchEvent::Progress(_))));
    assert!(stream.next_event().await.is_none());
  }

  #[tokio::test]
  async fn overflow_drops_progress_but_not_criticals() {
    let (sink, mut stream) = channel(2, Duration::from_secs(15));
    for i in 0..5 {
      sink.send_progress(progress(i));
    }

    // Only the first two progress events fit.
    assert!(matches!(stream.next_event().await, Some(SearchEvent::Progress(p)) if p.pages_checked == 0));
    assert!(matches!(stream.next_event().await, Some(SearchEvent::Progress(p)) if p.pages_checked == 1));

    sink
      .send(SearchEvent::Error(ErrorInfo {
        kind: ErrorKind::NoPath,
        message: "no path".to_string(),
      }))
      .await;
    assert!(matches!(stream.next_event().await, Some(SearchEvent::Error(_))));
    // Terminal event ends the stream.
    assert!(stream.next_event().await.is_none());
  }

  #[tokio::test]
  async fn silence_yields_keepalive() {
    let (_sink, mut stream) = channel(2, Duration::from_millis(10));
    assert!(matches!(stream.next_event().await, Some(SearchEvent::Keepalive)));
  }

  #[tokio::test]
  async fn frames_are_sse_shaped() {
    let (sink, mut stream) = channel(2, Duration::from_secs(15));
    sink.send(SearchEvent::Keepalive).await;
    let frame = stream.next_frame().await.unwrap();
    assert!(frame.starts_with("data: "));
    assert!(frame.ends_with("\n\n"));
  }
}
