use crate::shape::UpstreamInput;
use crate::upstream::UpstreamStrategy;
use kite_core::error::UpstreamError;
use kite_core::metrics::Metrics;
use std::sync::Arc;
use std::time::Duration;

/// The first successful result of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub upstream: String,
    pub value: String,
}

/// Walks a chain of upstreams in order and stops at the first success.
///
/// Every attempt runs under a hard deadline. Failures of any kind are logged
/// and counted, never returned; a fully failed chain yields `None`.
#[derive(Clone)]
pub struct FallbackInvoker {
    deadline: Duration,
    metrics: Arc<Metrics>,
}

impl FallbackInvoker {
    pub fn new(deadline: Duration, metrics: Arc<Metrics>) -> Self {
        Self { deadline, metrics }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub async fn invoke(
        &self,
        chain: &[Arc<dyn UpstreamStrategy>],
        input: &UpstreamInput,
    ) -> Option<Served> {
        for (position, upstream) in chain.iter().enumerate() {
            let name = upstream.name();
            self.metrics.record_attempt();
            tracing::debug!(upstream = name, position, "Trying upstream");

            let outcome = match tokio::time::timeout(self.deadline, upstream.attempt(input)).await {
                Ok(result) => result,
                Err(_) => Err(UpstreamError::Timeout(self.deadline)),
            };

            match outcome {
                Ok(value) => {
                    tracing::debug!(upstream = name, position, "Upstream succeeded");
                    return Some(Served {
                        upstream: name.to_string(),
                        value,
                    });
                }
                Err(e) => {
                    self.metrics.record_upstream_failure(name);
                    tracing::warn!(upstream = name, position, error = %e, "Upstream failed, trying next");
                }
            }
        }
        None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) enum Behavior {
        Reply(&'static str),
        Fail,
        Unusable,
        Hang,
    }

    /// Scripted upstream that counts how often it was called.
    pub(crate) struct Scripted {
        pub name: String,
        pub behavior: Behavior,
        pub calls: AtomicUsize,
    }

    impl Scripted {
        pub(crate) fn new(name: &str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpstreamStrategy for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        async fn attempt(&self, _input: &UpstreamInput) -> Result<String, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Reply(text) => Ok(text.to_string()),
                Behavior::Fail => Err(UpstreamError::Status { status: 500 }),
                Behavior::Unusable => Err(UpstreamError::Unusable),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    fn invoker() -> FallbackInvoker {
        FallbackInvoker::new(Duration::from_millis(200), Arc::new(Metrics::new()))
    }

    #[tokio::test]
    async fn test_short_circuits_on_first_success() {
        let a = Scripted::new("a", Behavior::Fail);
        let b = Scripted::new("b", Behavior::Unusable);
        let c = Scripted::new("c", Behavior::Reply("from c"));
        let d = Scripted::new("d", Behavior::Reply("from d"));
        let chain: Vec<Arc<dyn UpstreamStrategy>> =
            vec![a.clone(), b.clone(), c.clone(), d.clone()];

        let served = invoker()
            .invoke(&chain, &UpstreamInput::new("hi"))
            .await
            .unwrap();
        assert_eq!(served.upstream, "c");
        assert_eq!(served.value, "from c");
        assert_eq!((a.calls(), b.calls(), c.calls(), d.calls()), (1, 1, 1, 0));
    }

    #[tokio::test]
    async fn test_exhausted_chain_tries_each_once() {
        let a = Scripted::new("a", Behavior::Fail);
        let b = Scripted::new("b", Behavior::Unusable);
        let chain: Vec<Arc<dyn UpstreamStrategy>> = vec![a.clone(), b.clone()];

        let metrics = Arc::new(Metrics::new());
        let invoker = FallbackInvoker::new(Duration::from_millis(200), metrics.clone());
        assert!(invoker.invoke(&chain, &UpstreamInput::new("hi")).await.is_none());
        assert_eq!((a.calls(), b.calls()), (1, 1));

        let snap = metrics.snapshot();
        assert_eq!(snap["upstream_attempts"], 2);
        assert_eq!(snap["upstream_failures"], 2);
    }

    #[tokio::test]
    async fn test_deadline_moves_to_next() {
        let slow = Scripted::new("slow", Behavior::Hang);
        let fast = Scripted::new("fast", Behavior::Reply("ok"));
        let chain: Vec<Arc<dyn UpstreamStrategy>> = vec![slow.clone(), fast.clone()];

        let invoker = FallbackInvoker::new(Duration::from_millis(20), Arc::new(Metrics::new()));
        let served = invoker.invoke(&chain, &UpstreamInput::new("hi")).await.unwrap();
        assert_eq!(served.upstream, "fast");
        assert_eq!(slow.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_chain() {
        assert!(invoker().invoke(&[], &UpstreamInput::new("hi")).await.is_none());
    }
}
