//! Request/response correlation over one device stream.
//!
//! The correlator owns both halves of the TCP stream. Senders take an
//! exclusive lock only for the "allocate id + write frame" pair; waiting for
//! the reply happens unlocked, so a slow reply never blocks other senders
//! and replies can be dispatched freely in between sends. A dedicated
//! receive task decodes inbound lines and resolves the matching pending
//! call by id.
//!
//! # Lifecycle
//!
//! `Created → Running → Canceled → Stopped`, one-way. [`Correlator::start`]
//! launches the receive task (no-op while Running, error from a terminal
//! state). [`Correlator::stop`] cancels the task, joins it, and finalizes to
//! Stopped; it is safe to call repeatedly and concurrently. An I/O failure
//! in the receive task forces the correlator straight to Stopped.
//!
//! # Ordering
//!
//! Within one link, frames are written in send order (the send lock
//! guarantees it). Replies are matched purely by correlation id; no
//! assumption is made about the order they arrive in.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use pindock_core::constants::{MAX_COMMAND_ID, RESULT_TIMEOUT_MS};
use pindock_core::{Error, RunState};
use pindock_protocol::{Command, CommandFrame, LinkCodec};

use crate::error::LinkError;

/// Table of calls awaiting their reply, keyed by correlation id.
///
/// Entries exist only between send and resolution (reply, timeout, or
/// correlator shutdown). Dropping a sender wakes its waiter with an absent
/// result.
type PendingCalls = Arc<Mutex<HashMap<u16, oneshot::Sender<String>>>>;

/// Write half plus the id counter it protects.
///
/// Both live under one lock so that id allocation and the frame write are
/// a single atomic step; nothing else is ever done while holding it.
struct LinkWriter {
    counter: u16,
    sink: FramedWrite<OwnedWriteHalf, LinkCodec>,
}

impl LinkWriter {
    /// Allocate the next correlation id.
    fn next_id(&mut self) -> u16 {
        self.counter = next_command_id(self.counter);
        self.counter
    }
}

/// Successor in the 1..=9999 id cycle; 0 is never produced.
fn next_command_id(counter: u16) -> u16 {
    counter % MAX_COMMAND_ID + 1
}

/// Command correlation engine for one device connection.
pub struct Correlator {
    state: Arc<Mutex<RunState>>,
    writer: tokio::sync::Mutex<LinkWriter>,
    pending: PendingCalls,
    token: CancellationToken,
    /// Read half, parked here until `start` hands it to the receive task.
    reader: Mutex<Option<FramedRead<OwnedReadHalf, LinkCodec>>>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
}

impl Correlator {
    /// Create a correlator over a freshly accepted device stream.
    ///
    /// `token` should be a child of the process-wide cancellation token so
    /// external shutdown reaches the receive task directly.
    #[must_use]
    pub fn new(stream: TcpStream, token: CancellationToken) -> Self {
        let (read, write) = stream.into_split();

        Self {
            state: Arc::new(Mutex::new(RunState::Created)),
            writer: tokio::sync::Mutex::new(LinkWriter {
                counter: 0,
                sink: FramedWrite::new(write, LinkCodec::new()),
            }),
            pending: Arc::new(Mutex::new(HashMap::new())),
            token,
            reader: Mutex::new(Some(FramedRead::new(read, LinkCodec::new()))),
            receive_task: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.lock().expect("state lock poisoned")
    }

    /// Launch the receive loop.
    ///
    /// No-op while already Running.
    ///
    /// # Errors
    /// Returns `Error::InvalidStateTransition` (as `LinkError::Core`) when
    /// called from a terminal state.
    pub fn start(&self) -> Result<(), LinkError> {
        let mut state = self.state.lock().expect("state lock poisoned");

        match *state {
            RunState::Running => return Ok(()),
            RunState::Canceled | RunState::Stopped => {
                return Err(Error::InvalidStateTransition {
                    from: state.to_string(),
                    to: RunState::Running.to_string(),
                }
                .into());
            }
            RunState::Created => {}
        }

        let reader = self
            .reader
            .lock()
            .expect("reader lock poisoned")
            .take()
            .expect("reader already taken in Created state");

        *state = RunState::Running;
        drop(state);

        let handle = tokio::spawn(receive_loop(
            reader,
            Arc::clone(&self.pending),
            Arc::clone(&self.state),
            self.token.clone(),
        ));

        *self.receive_task.lock().expect("task lock poisoned") = Some(handle);

        debug!("correlator started");
        Ok(())
    }

    /// Cancel the receive loop, join it, and finalize to Stopped.
    ///
    /// Safe to call repeatedly and concurrently; later calls are no-ops.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            if *state == RunState::Running {
                *state = RunState::Canceled;
            }
        }

        self.token.cancel();

        let handle = self.receive_task.lock().expect("task lock poisoned").take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("error joining receive task: {e}");
            }
        }

        // Best-effort socket shutdown, bounded so a wedged writer cannot
        // hang the stop path; a failure only means the peer is already
        // gone.
        let shutdown = async {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.sink.get_mut().shutdown().await {
                debug!("socket shutdown: {e}");
            }
        };
        if tokio::time::timeout(Duration::from_millis(500), shutdown)
            .await
            .is_err()
        {
            debug!("socket shutdown timed out");
        }

        // Wake anyone still parked on a pending call.
        self.pending.lock().expect("pending lock poisoned").clear();

        *self.state.lock().expect("state lock poisoned") = RunState::Stopped;
        debug!("correlator stopped");
    }

    /// Send a command; for reply-expecting commands, wait for the result.
    ///
    /// Returns `Ok(None)` for fire-and-forget commands, and for
    /// reply-expecting commands whose result window (5 s) expired - the
    /// caller decides whether absence is fatal. The pending entry is removed
    /// regardless of outcome.
    ///
    /// # Errors
    /// `LinkError::NotRunning` if the correlator is not Running;
    /// `LinkError::Transport` on write failure.
    pub async fn send(&self, command: Command) -> Result<Option<String>, LinkError> {
        if self.state() != RunState::Running {
            return Err(LinkError::NotRunning);
        }

        let expects_reply = command.expects_reply();

        // Lock scope: id allocation + frame write, nothing more. The
        // pending entry is registered under the same scope so a reply
        // cannot arrive before the table knows the id.
        let (id, receiver) = {
            let mut writer = self.writer.lock().await;
            let id = writer.next_id();

            let receiver = if expects_reply {
                let (tx, rx) = oneshot::channel();
                self.pending
                    .lock()
                    .expect("pending lock poisoned")
                    .insert(id, tx);
                Some(rx)
            } else {
                None
            };

            trace!(id, command = %command, "sending frame");

            if let Err(e) = writer.sink.send(CommandFrame::new(id, command)).await {
                if expects_reply {
                    self.pending
                        .lock()
                        .expect("pending lock poisoned")
                        .remove(&id);
                }
                return Err(match e {
                    Error::Io(io) => LinkError::Transport(io),
                    other => LinkError::Core(other),
                });
            }

            (id, receiver)
        };

        let Some(receiver) = receiver else {
            return Ok(None);
        };

        let result =
            tokio::time::timeout(Duration::from_millis(RESULT_TIMEOUT_MS), receiver).await;

        self.pending
            .lock()
            .expect("pending lock poisoned")
            .remove(&id);

        match result {
            Ok(Ok(text)) => Ok(Some(text)),
            // Sender dropped: the correlator shut down mid-wait.
            Ok(Err(_)) => Ok(None),
            // Result window expired.
            Err(_) => {
                trace!(id, "reply window expired");
                Ok(None)
            }
        }
    }
}

/// Receive loop: decode reply frames and resolve pending calls by id.
///
/// Runs until cancellation, end-of-stream, or an I/O error. The two latter
/// cases force the shared state to Stopped so the owning connection observes
/// the dead transport on its next cycle.
async fn receive_loop(
    mut reader: FramedRead<OwnedReadHalf, LinkCodec>,
    pending: PendingCalls,
    state: Arc<Mutex<RunState>>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("receive loop cancelled");
                break;
            }
            frame = reader.next() => match frame {
                Some(Ok(reply)) => {
                    // Id 0 is the decoded value of an all-zero or empty id
                    // field; it never matches a pending call.
                    if reply.id == 0 {
                        continue;
                    }

                    let sender = pending
                        .lock()
                        .expect("pending lock poisoned")
                        .remove(&reply.id);

                    match sender {
                        Some(tx) => {
                            trace!(id = reply.id, result = %reply.result, "reply matched");
                            let _ = tx.send(reply.result);
                        }
                        None => {
                            // Late reply after its window expired, or a
                            // peer inventing ids: dropped silently.
                            trace!(id = reply.id, "unmatched reply dropped");
                        }
                    }
                }
                Some(Err(e)) => {
                    error!("receive loop decode failure: {e}");
                    force_stop(&pending, &state);
                    break;
                }
                None => {
                    debug!("device closed the link");
                    force_stop(&pending, &state);
                    break;
                }
            }
        }
    }
}

fn force_stop(pending: &PendingCalls, state: &Arc<Mutex<RunState>>) {
    pending.lock().expect("pending lock poisoned").clear();
    *state.lock().expect("state lock poisoned") = RunState::Stopped;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_cycle_without_zero() {
        assert_eq!(next_command_id(0), 1);
        assert_eq!(next_command_id(1), 2);
        assert_eq!(next_command_id(9998), 9999);
        // Wraparound skips 0 entirely.
        assert_eq!(next_command_id(MAX_COMMAND_ID), 1);
    }

    #[test]
    fn full_cycle_stays_in_range() {
        let mut counter = 0u16;
        for _ in 0..20_000 {
            counter = next_command_id(counter);
            assert!((1..=MAX_COMMAND_ID).contains(&counter));
        }
    }
}
