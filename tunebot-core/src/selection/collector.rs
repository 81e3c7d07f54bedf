use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use tunebot_common::models::{PresentationHandle, ResultSet, Selection, SelectionToken, UserId};
use tunebot_common::traits::Notifier;

use crate::Error;
use crate::selection::router::{ReactionGate, ReactionRouter};

/// One pending pick: which set, who may answer, and until when.
#[derive(Debug, Clone)]
pub struct SelectionRequest {
    pub result_set: ResultSet,
    pub requester_id: UserId,
    pub deadline: Instant,
}

/// Waits for the requester's reaction on a presented result set.
pub struct SelectionCollector {
    router: Arc<ReactionRouter>,
    notifier: Arc<dyn Notifier>,
    window: Duration,
}

impl SelectionCollector {
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(30);

    pub fn new(router: Arc<ReactionRouter>, notifier: Arc<dyn Notifier>, window: Duration) -> Self {
        Self {
            router,
            notifier,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Starts the selection window now.
    pub fn request(&self, result_set: ResultSet, requester_id: UserId) -> SelectionRequest {
        SelectionRequest {
            result_set,
            requester_id,
            deadline: Instant::now() + self.window,
        }
    }

    /// Resolves the request against reactions on `presentation`.
    ///
    /// Once the wait has started, the reaction choices on the presented
    /// message are cleared exactly once whichever way this returns, including
    /// when the future is dropped before completion. A wait that cannot start
    /// because another one already owns the message leaves its choices alone.
    pub async fn collect(
        &self,
        presentation: PresentationHandle,
        request: SelectionRequest,
    ) -> Result<Selection, Error> {
        let requester = request.requester_id;
        let offered = request.result_set.clone();
        let gate = self.router.open_gate(presentation.message.message_id, move |ev| {
            ev.user_id == requester
                && SelectionToken::from_emoji(&ev.emoji).is_some_and(|token| offered.contains(token))
        })?;

        let cleanup = ChoiceCleanup::new(Arc::clone(&self.notifier), presentation.clone());
        let outcome = self.wait(gate, &presentation, request).await;
        cleanup.run().await;
        outcome
    }

    async fn wait(
        &self,
        mut gate: ReactionGate,
        presentation: &PresentationHandle,
        request: SelectionRequest,
    ) -> Result<Selection, Error> {
        let requester = request.requester_id;
        let event = match timeout_at(request.deadline, gate.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                return Err(Error::Platform("reaction gate closed before a selection arrived".into()));
            }
            Err(_) => {
                info!(
                    "No selection from user {requester} on message {} within {:?}",
                    presentation.message.message_id, self.window
                );
                return Err(Error::SelectionTimeout(self.window));
            }
        };
        drop(gate);

        let token = SelectionToken::from_emoji(&event.emoji)
            .ok_or_else(|| Error::IndexOutOfRange(format!("unexpected emoji {}", event.emoji)))?;
        let candidate = request.result_set.candidate_for(token)?.clone();
        if candidate.media_id().is_none() {
            return Err(Error::InvalidSelection(format!(
                "'{}' ({token}) has no media id",
                candidate.title
            )));
        }

        debug!("User {requester} picked {token} '{}'", candidate.title);
        Ok(Selection { token, candidate })
    }
}

/// Clears presented choices once. `run` does it inline; if the owner is
/// dropped first, `Drop` hands the job to the runtime.
struct ChoiceCleanup {
    notifier: Arc<dyn Notifier>,
    presentation: Option<PresentationHandle>,
}

impl ChoiceCleanup {
    fn new(notifier: Arc<dyn Notifier>, presentation: PresentationHandle) -> Self {
        Self {
            notifier,
            presentation: Some(presentation),
        }
    }

    async fn run(mut self) {
        if let Some(presentation) = self.presentation.take() {
            clear_choices(Arc::clone(&self.notifier), presentation).await;
        }
    }
}

impl Drop for ChoiceCleanup {
    fn drop(&mut self) {
        let Some(presentation) = self.presentation.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let notifier = Arc::clone(&self.notifier);
                runtime.spawn(clear_choices(notifier, presentation));
            }
            Err(_) => warn!(
                "Selection on message {} abandoned outside a runtime; choices left in place",
                presentation.message.message_id
            ),
        }
    }
}

async fn clear_choices(notifier: Arc<dyn Notifier>, presentation: PresentationHandle) {
    if let Err(e) = notifier.clear_choices(&presentation).await {
        warn!(
            "Failed to clear choices on message {}: {e}",
            presentation.message.message_id
        );
    }
}
