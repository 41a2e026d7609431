// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The Suspension Primitive (§4.B): each executive runs inside its
//! own lightweight execution context ("fiber") with a pair of
//! channels to the scheduling thread — a `push` end on which the
//! fiber emits a request (or final result), and a `pull` end on
//! which it receives a response.
//!
//! Realized as Design Notes option (a): a stackful fiber (plain OS
//! thread, since Rust has no first-class stackful coroutines in
//! stable std) paired with a zero-capacity `crossbeam_channel`, which
//! gives the exact single-outstanding-message rendezvous the
//! suspension contract requires. Single-threaded per fiber: the fiber
//! blocks on `pull` whenever it awaits a response; the scheduler
//! blocks on the fiber's `push` whenever it awaits the next request.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread::{Builder, JoinHandle};

/// Default fiber stack size (§5 "Memory").
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// The fiber-side handle, given to the executive body. `suspend`
/// blocks the calling thread until the scheduler resumes it.
pub struct FiberContext<Req, Resp> {
    push: Sender<Req>,
    pull: Receiver<Resp>,
}

impl<Req, Resp> FiberContext<Req, Resp> {
    /// Emits `request` on the push channel and blocks until the
    /// scheduler replies on the pull channel. This is the fiber's
    /// only suspension point.
    pub fn suspend(&self, request: Req) -> Resp {
        self.push
            .send(request)
            .expect("scheduler must outlive the fiber it owns");
        self.pull
            .recv()
            .expect("scheduler must reply to every suspended request")
    }
}

/// The scheduler-side handle to a running fiber.
pub struct FiberHandle<Req, Resp> {
    requests: Receiver<Req>,
    responses: Sender<Resp>,
    join: Option<JoinHandle<()>>,
}

impl<Req, Resp> FiberHandle<Req, Resp> {
    /// Blocks until the fiber emits its next request (or terminates
    /// without one, in which case `None` is returned).
    pub fn next_request(&self) -> Option<Req> {
        self.requests.recv().ok()
    }

    /// Resumes the fiber with `response`. Posting `Revert(DeadLock)`
    /// in response to a `WaitKey` request is how the scheduler
    /// exercises the only cancellation point this primitive defines
    /// (§4.B "Cancellation").
    pub fn resume(&self, response: Resp) {
        // A closed fiber (finished or panicked) simply drops the
        // response; this is not a scheduler error.
        let _ = self.responses.send(response);
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

impl<Req, Resp> Drop for FiberHandle<Req, Resp> {
    fn drop(&mut self) {
        self.join();
    }
}

/// Spawns `body` on its own thread, wired to a fresh push/pull
/// channel pair, and returns the scheduler-side [`FiberHandle`].
pub fn spawn<Req, Resp, F>(name: impl Into<String>, stack_size: usize, body: F) -> FiberHandle<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    F: FnOnce(FiberContext<Req, Resp>) + Send + 'static,
{
    let (push_tx, push_rx) = bounded::<Req>(0);
    let (pull_tx, pull_rx) = bounded::<Resp>(0);
    let ctx = FiberContext {
        push: push_tx,
        pull: pull_rx,
    };
    let join = Builder::new()
        .name(name.into())
        .stack_size(stack_size)
        .spawn(move || body(ctx))
        .expect("failed to spawn executive fiber");
    FiberHandle {
        requests: push_rx,
        responses: pull_tx,
        join: Some(join),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Req {
        Get(String),
        Done(String),
    }

    #[derive(Debug, PartialEq)]
    enum Resp {
        Value(String),
    }

    #[test]
    fn request_response_round_trip() {
        let handle: FiberHandle<Req, Resp> = spawn("test-fiber", DEFAULT_STACK_SIZE, |ctx| {
            let v = ctx.suspend(Req::Get("k".into()));
            let Resp::Value(v) = v;
            let _ = ctx.suspend(Req::Done(v));
        });

        assert_eq!(handle.next_request(), Some(Req::Get("k".into())));
        handle.resume(Resp::Value("hello".into()));
        assert_eq!(handle.next_request(), Some(Req::Done("hello".into())));
        handle.resume(Resp::Value("ack".into()));
        assert_eq!(handle.next_request(), None);
    }

    #[test]
    fn requests_from_one_fiber_are_totally_ordered() {
        let handle: FiberHandle<Req, Resp> = spawn("ordered-fiber", DEFAULT_STACK_SIZE, |ctx| {
            for i in 0..5 {
                ctx.suspend(Req::Get(i.to_string()));
            }
        });
        for i in 0..5 {
            assert_eq!(handle.next_request(), Some(Req::Get(i.to_string())));
            handle.resume(Resp::Value(String::new()));
        }
        assert_eq!(handle.next_request(), None);
    }
}
