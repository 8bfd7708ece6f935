//! 连接管理器：惰性、单飞行的共享连接拨号与缓存。
//! The connection manager: lazy, single-flight dialing and caching of the shared connection.

use crate::config::DialConfig;
use crate::error::{Error, Result};
use crate::scope::CallScope;
use crate::transport::{Connection, Connector};
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

/// The result delivered through the completion gate to every waiter of the
/// same in-flight dial.
///
/// 通过完成门分发给同一在途拨号所有等待者的结果。
type DialOutcome<C> = Result<Arc<C>>;

/// The dial lifecycle of the managed connection. Mutated only while holding
/// the manager's lock.
///
/// 被管理连接的拨号生命周期。仅在持有管理器锁时变更。
enum DialState<C> {
    /// No connection and no dial in flight. The next caller becomes the dialer.
    /// 既无连接也无在途拨号。下一个调用方将成为拨号者。
    Idle {
        /// The failure reason of the previous dial, kept until the next dial starts.
        /// 上一次拨号的失败原因，保留至下一次拨号开始。
        last_error: Option<String>,
    },
    /// A dial task is in flight; the waiter list is the one-shot completion
    /// gate, created on Idle→Dialing and drained exactly once.
    /// 拨号任务在途；等待者列表即一次性完成门，在 Idle→Dialing 时创建并恰好
    /// 排空一次。
    Dialing {
        waiters: Vec<oneshot::Sender<DialOutcome<C>>>,
    },
    /// A live connection is cached and shared by reference with all callers.
    /// 已缓存活动连接，通过引用与所有调用方共享。
    Ready(Arc<C>),
    /// `close` has run; terminal.
    /// `close` 已执行；终态。
    Closed,
}

/// What `close` decided to do after inspecting the state under the lock.
/// `close` 在锁内检查状态后决定采取的动作。
enum CloseAction<C> {
    Wait(oneshot::Receiver<DialOutcome<C>>),
    Release(Arc<C>),
    Done,
}

struct ManagerInner<D: Connector> {
    target: String,
    connector: D,
    config: DialConfig,
    state: Mutex<DialState<D::Conn>>,
}

/// Owns the lazy, single-flight dial and the cached live connection for one
/// target endpoint.
///
/// At most one dial attempt is in flight per manager at any time; every
/// caller observing an in-flight dial waits on the same completion gate and
/// never starts a second dial. The dial itself runs in a spawned task, so a
/// canceling caller never cancels work shared by others.
///
/// 为单个目标端点持有惰性、单飞行的拨号过程与缓存的活动连接。
///
/// 任一时刻每个管理器至多有一次在途拨号；观察到在途拨号的每个调用方都等待
/// 同一个完成门，绝不发起第二次拨号。拨号本身运行在独立任务中，因此取消的
/// 调用方绝不会取消他人共享的工作。
pub struct ConnectionManager<D: Connector> {
    inner: Arc<ManagerInner<D>>,
}

impl<D: Connector> Clone for ConnectionManager<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Connector> ConnectionManager<D> {
    /// Creates a manager for `target`. No dial happens until the first
    /// [`ensure_connection`](Self::ensure_connection).
    ///
    /// 为 `target` 创建管理器。在第一次
    /// [`ensure_connection`](Self::ensure_connection) 之前不会发生拨号。
    pub fn new(target: impl Into<String>, connector: D, config: DialConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                target: target.into(),
                connector,
                config,
                state: Mutex::new(DialState::Idle { last_error: None }),
            }),
        }
    }

    /// The endpoint identifier this manager dials.
    /// 此管理器拨号的端点标识。
    pub fn target(&self) -> &str {
        &self.inner.target
    }

    /// Returns the cached connection, joining or starting a dial as needed.
    ///
    /// - `Ready`: returns the live connection immediately, no waiting.
    /// - `Idle`: this caller becomes the dialer; the dial task's readiness
    ///   wait is bounded by this caller's scope.
    /// - `Dialing`: waits on the existing completion gate, bounded by this
    ///   caller's own scope; if the scope ends first the caller receives
    ///   [`Error::CallCanceled`] while the dial continues for everyone else.
    /// - after `close`: [`Error::NotConnected`].
    ///
    /// A failed dial is not cached: the manager returns to `Idle` and a later
    /// call starts a fresh dial. Retry policy belongs to the caller or the
    /// breaker, not to the manager.
    ///
    /// 返回缓存的连接，并按需加入或发起拨号。
    ///
    /// - `Ready`：立即返回活动连接，无需等待。
    /// - `Idle`：该调用方成为拨号者；拨号任务的就绪等待受该调用方范围约束。
    /// - `Dialing`：在既有完成门上等待，受调用方自身范围约束；若范围先结束，
    ///   调用方收到 [`Error::CallCanceled`]，而拨号对其他人继续进行。
    /// - `close` 之后：[`Error::NotConnected`]。
    ///
    /// 失败的拨号不会被缓存：管理器回到 `Idle`，后续调用会发起全新拨号。
    /// 重试策略属于调用方或熔断器，而非管理器。
    pub async fn ensure_connection(&self, scope: &CallScope) -> Result<Arc<D::Conn>> {
        let gate = {
            let mut state = self.inner.state.lock().await;
            match &mut *state {
                DialState::Ready(conn) => return Ok(conn.clone()),
                DialState::Closed => return Err(Error::NotConnected),
                DialState::Dialing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    rx
                }
                DialState::Idle { .. } => {
                    let (tx, rx) = oneshot::channel();
                    *state = DialState::Dialing { waiters: vec![tx] };
                    let inner = self.inner.clone();
                    let dialer_scope = scope.clone();
                    tokio::spawn(async move { inner.run_dial(dialer_scope).await });
                    rx
                }
            }
        };

        tokio::select! {
            outcome = gate => match outcome {
                Ok(result) => result,
                Err(_) => Err(Error::ChannelClosed),
            },
            _ = scope.cancelled() => Err(Error::CallCanceled),
        }
    }

    /// The failure reason of the last dial, sticky until the next dial starts.
    /// 上一次拨号的失败原因，保留至下一次拨号开始。
    pub async fn last_dial_error(&self) -> Option<String> {
        match &*self.inner.state.lock().await {
            DialState::Idle { last_error } => last_error.clone(),
            _ => None,
        }
    }

    /// Discards and releases the cached connection. If a dial is in flight,
    /// blocks until it settles first, so a connection can never be published
    /// after `close` has returned. Idempotent.
    ///
    /// 丢弃并释放缓存的连接。若有在途拨号，先阻塞至其完成，确保 `close` 返回
    /// 之后不会再发布连接。幂等。
    pub async fn close(&self) -> Result<()> {
        loop {
            let action = {
                let mut state = self.inner.state.lock().await;
                match &mut *state {
                    DialState::Dialing { waiters } => {
                        let (tx, rx) = oneshot::channel();
                        waiters.push(tx);
                        CloseAction::Wait(rx)
                    }
                    DialState::Ready(conn) => {
                        let conn = conn.clone();
                        *state = DialState::Closed;
                        CloseAction::Release(conn)
                    }
                    DialState::Idle { .. } => {
                        *state = DialState::Closed;
                        CloseAction::Done
                    }
                    DialState::Closed => CloseAction::Done,
                }
            };

            match action {
                CloseAction::Wait(gate) => {
                    // 等待在途拨号完成后重新检查状态
                    // Re-examine the state once the in-flight dial settles.
                    let _ = gate.await;
                }
                CloseAction::Release(conn) => {
                    info!(endpoint = %self.inner.target, "connection manager closed, releasing connection");
                    return conn.close().await;
                }
                CloseAction::Done => {
                    info!(endpoint = %self.inner.target, "connection manager closed");
                    return Ok(());
                }
            }
        }
    }
}

impl<D: Connector> ManagerInner<D> {
    /// The single dial task: dials, waits for readiness bounded by the
    /// dialer's scope, then publishes the outcome and drains the gate.
    ///
    /// 唯一的拨号任务：拨号，等待就绪（受拨号者范围约束），然后发布结果并
    /// 排空完成门。
    async fn run_dial(self: Arc<Self>, dialer_scope: CallScope) {
        debug!(endpoint = %self.target, "dial starting");
        let result = self.dial_and_wait_ready(&dialer_scope).await;

        let mut state = self.state.lock().await;
        let waiters = match std::mem::replace(&mut *state, DialState::Idle { last_error: None }) {
            DialState::Dialing { waiters } => waiters,
            other => {
                // Only this task moves the state out of `Dialing`.
                // 只有本任务会把状态移出 `Dialing`。
                *state = other;
                return;
            }
        };

        match result {
            Ok(conn) => {
                let conn = Arc::new(conn);
                info!(endpoint = %self.target, waiters = waiters.len(), "dial succeeded");
                *state = DialState::Ready(conn.clone());
                drop(state);
                for waiter in waiters {
                    let _ = waiter.send(Ok(conn.clone()));
                }
            }
            Err(err) => {
                warn!(endpoint = %self.target, error = %err, "dial failed");
                *state = DialState::Idle {
                    last_error: Some(err.to_string()),
                };
                drop(state);
                for waiter in waiters {
                    let _ = waiter.send(Err(err.clone()));
                }
            }
        }
    }

    /// Dials the target, then polls transport readiness until the connection
    /// reports ready or the dialer's scope ends.
    ///
    /// 拨号目标端点，然后轮询传输就绪状态，直到连接就绪或拨号者范围结束。
    async fn dial_and_wait_ready(&self, scope: &CallScope) -> Result<D::Conn> {
        let conn = self
            .connector
            .dial(&self.target, &self.config, scope)
            .await
            .map_err(|err| match err {
                already @ Error::DialFailed { .. } => already,
                other => Error::DialFailed {
                    target: self.target.clone(),
                    reason: other.to_string(),
                },
            })?;

        while !conn.is_ready() {
            if !conn.wait_for_state_change(scope).await {
                let _ = conn.close().await;
                return Err(Error::DialFailed {
                    target: self.target.clone(),
                    reason: "call scope ended before the connection became ready".to_string(),
                });
            }
        }

        Ok(conn)
    }
}
