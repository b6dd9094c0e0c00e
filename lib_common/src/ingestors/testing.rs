//! Scripted collaborators for session and pipeline unit tests.

use std::collections::VecDeque;
use std::future::{ready, Future};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{stream, StreamExt};

use crate::ingestors::error::StreamError;
use crate::ingestors::session::{ByteStream, Sleeper, StreamConnector};

type Chunks = Vec<Result<Bytes, StreamError>>;

/// Builds a successful body out of string chunks.
pub fn chunks(parts: &[&str]) -> Chunks {
    parts.iter().map(|p| Ok(Bytes::copy_from_slice(p.as_bytes()))).collect()
}

#[derive(Default)]
struct Script {
    steps: Mutex<VecDeque<Result<Chunks, StreamError>>>,
    calls: AtomicU32,
}

/// Replays a fixed list of connection outcomes, then refuses every attempt.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Script>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(self, error: StreamError) -> Self {
        self.script.steps.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn respond(self, body: Chunks) -> Self {
        self.script.steps.lock().unwrap().push_back(Ok(body));
        self
    }

    pub fn calls(&self) -> u32 {
        self.script.calls.load(Ordering::SeqCst)
    }
}

impl StreamConnector for ScriptedConnector {
    fn connect(&self) -> impl Future<Output = Result<ByteStream, StreamError>> + Send {
        self.script.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.steps.lock().unwrap().pop_front();
        ready(match step {
            Some(Ok(body)) => Ok(stream::iter(body).boxed()),
            Some(Err(e)) => Err(e),
            None => Err(StreamError::Connect("connection refused".into())),
        })
    }
}

/// Records requested delays and returns at once.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.slept.lock().unwrap().push(duration);
        ready(())
    }
}
