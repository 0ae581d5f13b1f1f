use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{StoryResult, StoryboardError};
use crate::schema::Storyboard;
use crate::session::{RequestToken, Session};
use crate::source::StoryboardSource;

/// A finished generation, tagged with the request it answers.
#[derive(Debug)]
pub struct Completion {
    pub request: RequestToken,
    pub result: StoryResult<Storyboard>,
}

/// One-shot generation: blank input is rejected without calling `source`.
pub async fn generate(source: &dyn StoryboardSource, input: &str) -> StoryResult<Storyboard> {
    if input.trim().is_empty() {
        return Err(StoryboardError::empty_input());
    }
    source.generate(input).await
}

/// Runs at most one generation task at a time on behalf of a [`Session`].
///
/// Results come back over the completion channel; the session decides
/// whether they are still current.
pub struct Orchestrator {
    source: Arc<dyn StoryboardSource>,
    completions: UnboundedSender<Completion>,
    in_flight: Option<JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(source: Arc<dyn StoryboardSource>, completions: UnboundedSender<Completion>) -> Self {
        Self {
            source,
            completions,
            in_flight: None,
        }
    }

    /// Starts generating for the session's current input, aborting any
    /// request still in flight. Blank input fails without a task.
    pub fn submit(&mut self, session: &mut Session) -> StoryResult<RequestToken> {
        let request = session.begin_request()?;
        self.cancel();

        let source = Arc::clone(&self.source);
        let completions = self.completions.clone();
        let input = session.input().to_owned();
        debug!(request = request.get(), source = source.name(), "spawning generation task");
        self.in_flight = Some(tokio::spawn(async move {
            let result = source.generate(&input).await;
            // The receiver is gone only when the player has shut down.
            let _ = completions.send(Completion { request, result });
        }));
        Ok(request)
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.in_flight.take() {
            if !task.is_finished() {
                debug!("aborting in-flight generation");
            }
            task.abort();
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::schema::Frame;
    use crate::session::Phase;

    struct CountingSource {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingSource {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
            })
        }
    }

    #[async_trait]
    impl StoryboardSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn generate(&self, explanation: &str) -> StoryResult<Storyboard> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            Ok(Storyboard {
                title: format!("{explanation} #{call}"),
                frames: vec![Frame::default()],
                full_code_block: None,
            })
        }
    }

    #[tokio::test]
    async fn blank_input_never_reaches_the_source() {
        let source = CountingSource::new(Duration::ZERO);
        let error = generate(source.as_ref(), " \t\n").await.expect_err("blank");
        assert_eq!(error.code(), "E_VALIDATION");
        assert_eq!(error.to_string(), "Please enter a code explanation.");
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut orchestrator = Orchestrator::new(source.clone(), tx);
        let mut session = Session::new("");
        assert!(orchestrator.submit(&mut session).is_err());
        assert!(!orchestrator.is_in_flight());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn completion_is_applied_to_the_session() {
        let source = CountingSource::new(Duration::ZERO);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut orchestrator = Orchestrator::new(source, tx);
        let mut session = Session::new("quicksort");

        let request = orchestrator.submit(&mut session).expect("submitted");
        let completion = rx.recv().await.expect("completion");
        assert_eq!(completion.request, request);
        assert!(session.complete(completion.request, completion.result));
        assert_eq!(session.storyboard().map(|s| s.title.as_str()), Some("quicksort #1"));
    }

    #[tokio::test(start_paused = true)]
    async fn resubmitting_aborts_the_previous_task() {
        let source = CountingSource::new(Duration::from_secs(5));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut orchestrator = Orchestrator::new(source.clone(), tx);
        let mut session = Session::new("merge sort");

        let first = orchestrator.submit(&mut session).expect("first");
        tokio::task::yield_now().await;
        let second = orchestrator.submit(&mut session).expect("second");
        assert_ne!(first, second);

        let completion = rx.recv().await.expect("completion");
        assert_eq!(completion.request, second);
        assert!(session.complete(completion.request, completion.result));
        assert!(matches!(session.phase(), Phase::Ready { .. }));

        drop(orchestrator);
        assert!(rx.recv().await.is_none());
    }
}
