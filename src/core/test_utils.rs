//! 测试辅助工具：可编排行为的模拟连接器、连接与远程操作。
//! Test utilities: mock connector, connection and remote operation with
//! scriptable behavior.

use crate::config::DialConfig;
use crate::error::{Error, Result, StatusCode};
use crate::scope::CallScope;
use crate::transport::{Connection, Connector, RemoteOperation};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, sleep};

/// How a mock connection becomes ready.
#[derive(Debug, Clone, Copy)]
pub enum Readiness {
    /// Ready as soon as the dial returns.
    Immediate,
    /// Becomes ready this far into the readiness wait.
    After(Duration),
    /// Never becomes ready; the dialer's scope has to end the wait.
    Never,
}

/// Shared, inspectable state of one mock connection.
#[derive(Debug, Default)]
pub struct ConnState {
    ready: AtomicBool,
    closed: AtomicBool,
}

impl ConnState {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A mock transport connection backed by plain atomics.
#[derive(Debug)]
pub struct MockConnection {
    state: Arc<ConnState>,
    readiness: Readiness,
}

#[async_trait]
impl Connection for MockConnection {
    fn is_ready(&self) -> bool {
        self.state.ready.load(Ordering::SeqCst)
    }

    async fn wait_for_state_change(&self, scope: &CallScope) -> bool {
        match self.readiness {
            Readiness::Immediate => true,
            Readiness::After(delay) => {
                tokio::select! {
                    _ = sleep(delay) => {
                        self.state.ready.store(true, Ordering::SeqCst);
                        true
                    }
                    _ = scope.cancelled() => false,
                }
            }
            Readiness::Never => {
                scope.cancelled().await;
                false
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A mock connector with a scriptable dial: an optional delay, a number of
/// failures before the first success, and a readiness schedule for the
/// connections it produces. Counts every dial attempt so tests can assert
/// the single-flight property.
pub struct MockConnector {
    dials: AtomicUsize,
    dial_delay: Duration,
    fail_first: AtomicUsize,
    readiness: Readiness,
    connections: Mutex<Vec<Arc<ConnState>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            dials: AtomicUsize::new(0),
            dial_delay: Duration::ZERO,
            fail_first: AtomicUsize::new(0),
            readiness: Readiness::Immediate,
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Every dial takes this long before settling.
    pub fn with_dial_delay(mut self, delay: Duration) -> Self {
        self.dial_delay = delay;
        self
    }

    /// The first `n` dials fail before any succeeds.
    pub fn failing_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    /// Produced connections follow this readiness schedule.
    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// State handles of every connection produced so far, in dial order.
    pub fn connections(&self) -> Vec<Arc<ConnState>> {
        self.connections.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Conn = MockConnection;

    async fn dial(
        &self,
        target: &str,
        _config: &DialConfig,
        scope: &CallScope,
    ) -> Result<Self::Conn> {
        self.dials.fetch_add(1, Ordering::SeqCst);

        if self.dial_delay > Duration::ZERO {
            tokio::select! {
                _ = sleep(self.dial_delay) => {}
                _ = scope.cancelled() => {
                    return Err(Error::DialFailed {
                        target: target.to_string(),
                        reason: "dial scope ended".to_string(),
                    });
                }
            }
        }

        let should_fail = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(Error::DialFailed {
                target: target.to_string(),
                reason: "mock connector refused".to_string(),
            });
        }

        let state = Arc::new(ConnState {
            ready: AtomicBool::new(matches!(self.readiness, Readiness::Immediate)),
            closed: AtomicBool::new(false),
        });
        self.connections.lock().unwrap().push(state.clone());
        Ok(MockConnection {
            state,
            readiness: self.readiness,
        })
    }
}

/// A remote echo operation that fails with a scripted sequence of status
/// codes before succeeding. Successful invocations echo the request bytes.
pub struct FlakyOperation {
    script: Mutex<VecDeque<StatusCode>>,
    invocations: AtomicUsize,
}

impl FlakyOperation {
    pub fn new(failures: &[StatusCode]) -> Self {
        Self {
            script: Mutex::new(failures.iter().copied().collect()),
            invocations: AtomicUsize::new(0),
        }
    }

    /// An operation that never fails.
    pub fn reliable() -> Self {
        Self::new(&[])
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteOperation<MockConnection> for FlakyOperation {
    type Request = Bytes;
    type Response = Bytes;

    async fn invoke(&self, _connection: &MockConnection, request: Bytes) -> Result<Bytes> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(code) => Err(Error::CallFailed {
                code,
                message: "scripted failure".to_string(),
            }),
            None => Ok(request),
        }
    }
}
