//! Session engine
//!
//! Entry point for every inbound event. Handling is split in three phases:
//!
//! 1. the event id is admitted through the dedup window
//! 2. the chat's session is locked and the router commits the transition
//! 3. the lock is released and the resulting effects are executed in order
//!
//! Delivery and answering-service failures never roll back a committed
//! transition; they are logged and, where the user would otherwise be left
//! waiting, turned into an apology.

use crate::answer::AnsweringService;
use crate::broadcast::broadcast;
use crate::catalog::{Catalog, CatalogItem};
use crate::config::{get_dedup_max_capacity, get_dedup_ttl_secs, Settings, QUIZ_LENGTH};
use crate::dedup::DedupWindow;
use crate::directory::UserDirectory;
use crate::effect::Effect;
use crate::event::{Event, EventKind};
use crate::router::{Outcome, Router};
use crate::session::SessionStore;
use crate::transport::{Outbound, Transport};
use crate::utils::{retry_telegram_operation, split_long_message, TELEGRAM_MESSAGE_LIMIT};
use crate::views;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Mime type of photos downloaded from the chat platform
const PHOTO_MIME_TYPE: &str = "image/jpeg";

/// Engine tunables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub owner_id: Option<i64>,
    pub payments_enabled: bool,
    pub quiz_length: usize,
    pub dedup_horizon: Duration,
    pub dedup_capacity: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            owner_id: None,
            payments_enabled: false,
            quiz_length: QUIZ_LENGTH,
            dedup_horizon: Duration::from_secs(get_dedup_ttl_secs()),
            dedup_capacity: get_dedup_max_capacity(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            owner_id: settings.owner_id,
            payments_enabled: settings.payments_enabled(),
            ..Self::default()
        }
    }
}

/// External services the engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub directory: Arc<dyn UserDirectory>,
    pub answerer: Arc<dyn AnsweringService>,
    pub catalog: Arc<Catalog>,
}

/// Result of handling one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The event id was seen within the dedup horizon; nothing happened
    Duplicate,
    /// The event was routed and its effects executed
    Processed(Outcome),
}

/// Per-chat session engine
pub struct Engine {
    router: Router,
    sessions: SessionStore,
    dedup: DedupWindow,
    transport: Arc<dyn Transport>,
    directory: Arc<dyn UserDirectory>,
    answerer: Arc<dyn AnsweringService>,
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            transport,
            directory,
            answerer,
            catalog,
        } = collaborators;

        info!(
            owner_configured = config.owner_id.is_some(),
            payments_enabled = config.payments_enabled,
            dedup_horizon_secs = config.dedup_horizon.as_secs(),
            "Session engine created"
        );

        Self {
            router: Router::new(
                config.owner_id,
                catalog,
                directory.clone(),
                config.payments_enabled,
                config.quiz_length,
            ),
            sessions: SessionStore::new(),
            dedup: DedupWindow::new(config.dedup_horizon, config.dedup_capacity),
            transport,
            directory,
            answerer,
        }
    }

    /// Live chat sessions
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handles one inbound event end to end.
    ///
    /// Events of the same chat are serialized by the session lock; different
    /// chats proceed in parallel.
    pub async fn handle(&self, event: Event) -> Handled {
        if !self.dedup.admit(&event.event_id).await {
            // A redelivered callback still needs an answer to stop the spinner
            if let EventKind::CallbackQuery { query_id, .. } = &event.kind {
                if let Err(e) = self.transport.answer_callback(query_id, None).await {
                    debug!(error = %e, "Failed to answer duplicate callback");
                }
            }
            return Handled::Duplicate;
        }

        let transition = {
            let session = self.sessions.get_or_create(event.chat_id).await;
            let mut guard = session.lock().await;
            self.router.route(&mut guard, &event).await
        };

        debug!(
            event_id = %event.event_id,
            outcome = ?transition.outcome,
            effects = transition.effects.len(),
            "Transition committed"
        );

        for effect in transition.effects {
            self.execute(effect).await;
        }

        Handled::Processed(transition.outcome)
    }

    async fn execute(&self, effect: Effect) {
        match effect {
            Effect::Send { chat_id, message } => {
                self.deliver(chat_id, message).await;
            }
            Effect::AnswerCallback { query_id, text } => {
                if let Err(e) = self.transport.answer_callback(&query_id, text).await {
                    warn!(error = %e, "Failed to answer callback query");
                }
            }
            Effect::AnswerPreCheckout { query_id, ok } => {
                if let Err(e) = self.transport.answer_pre_checkout(&query_id, ok).await {
                    error!(error = %e, ok, "Failed to answer pre-checkout query");
                }
            }
            Effect::SendInvoice { chat_id, invoice } => {
                if let Err(e) = self.transport.send_invoice(chat_id, invoice).await {
                    error!(chat_id, error = %e, "Failed to send invoice");
                    self.deliver(chat_id, Outbound::text(views::PAYMENT_SERVICE_ERROR))
                        .await;
                }
            }
            Effect::ProductCard { chat_id, item } => self.product_card(chat_id, &item).await,
            Effect::AskAi { chat_id, prompt } => self.ask_ai(chat_id, &prompt).await,
            Effect::AskAiWithImage {
                chat_id,
                file_id,
                prompt,
            } => self.ask_ai_with_image(chat_id, &file_id, &prompt).await,
            Effect::Relay {
                target,
                message,
                ack_to,
            } => {
                let ack = if self.deliver(target, message).await {
                    views::relay_delivered(target)
                } else {
                    views::relay_failed(target)
                };
                self.deliver(ack_to, Outbound::text(ack)).await;
            }
            Effect::Broadcast { owner_id, content } => self.broadcast(owner_id, &content).await,
        }
    }

    /// Sends one message, logging failures. Returns `true` on success.
    async fn deliver(&self, chat_id: i64, message: Outbound) -> bool {
        match self.transport.send(chat_id, message).await {
            Ok(()) => true,
            Err(e) if e.is_blocked() => {
                info!(chat_id, "Recipient blocked the bot");
                false
            }
            Err(e) => {
                warn!(chat_id, error = %e, "Message delivery failed");
                false
            }
        }
    }

    async fn product_card(&self, chat_id: i64, item: &CatalogItem) {
        match self
            .transport
            .send(chat_id, views::product_card(item))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_blocked() => info!(chat_id, "Recipient blocked the bot"),
            Err(e) => {
                warn!(chat_id, item = %item.name, error = %e, "Product photo failed, sending text card");
                self.deliver(chat_id, views::product_text_card(item)).await;
            }
        }
    }

    async fn ask_ai(&self, chat_id: i64, prompt: &str) {
        match self.answerer.ask(prompt).await {
            Ok(answer) => self.send_answer(chat_id, &answer).await,
            Err(e) => {
                error!(chat_id, error = %e, "Answering service failed");
                self.deliver(chat_id, Outbound::text(views::AI_ERROR)).await;
            }
        }
    }

    async fn ask_ai_with_image(&self, chat_id: i64, file_id: &str, prompt: &str) {
        let transport = &self.transport;
        let download = retry_telegram_operation(move || async move {
            transport
                .download(file_id)
                .await
                .map_err(anyhow::Error::from)
        })
        .await;

        let result = match download {
            Ok(image) => {
                debug!(chat_id, bytes = image.len(), "Photo downloaded");
                self.answerer
                    .ask_with_image(prompt, image, PHOTO_MIME_TYPE)
                    .await
                    .map_err(anyhow::Error::from)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(answer) => self.send_answer(chat_id, &answer).await,
            Err(e) => {
                error!(chat_id, error = %e, "Image answer failed");
                self.deliver(chat_id, Outbound::text(views::AI_IMAGE_ERROR))
                    .await;
            }
        }
    }

    /// Sends an answer in platform-sized chunks.
    async fn send_answer(&self, chat_id: i64, answer: &str) {
        if answer.trim().is_empty() {
            self.deliver(chat_id, Outbound::text(views::AI_EMPTY_ANSWER))
                .await;
            return;
        }

        for chunk in split_long_message(answer, TELEGRAM_MESSAGE_LIMIT) {
            if !self.deliver(chat_id, Outbound::text(chunk)).await {
                break;
            }
        }
    }

    async fn broadcast(&self, owner_id: i64, content: &Outbound) {
        let summary = match broadcast(
            self.transport.as_ref(),
            self.directory.as_ref(),
            owner_id,
            content,
        )
        .await
        {
            Ok(report) => {
                for chat_id in &report.removed {
                    if let Some(session) = self.sessions.get(*chat_id).await {
                        session.lock().await.reset_registration();
                    }
                }
                views::broadcast_finished(report.delivered, report.removed.len(), report.failed)
            }
            Err(e) => {
                error!(error = %e, "Broadcast aborted, directory unavailable");
                views::BROADCAST_DIRECTORY_ERROR.to_string()
            }
        };
        self.deliver(owner_id, Outbound::text(summary)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::{AnswerError, MockAnsweringService};
    use crate::directory::{InMemoryDirectory, User};
    use crate::transport::{DeliveryError, MockTransport};
    use mockall::predicate::*;

    const CHAT: i64 = 100;

    fn engine(transport: MockTransport, answerer: MockAnsweringService) -> Engine {
        let directory =
            InMemoryDirectory::with_users([User::new(CHAT, "Ali", Some("+998900000000".into()))]);
        Engine::new(
            EngineConfig {
                owner_id: Some(1),
                payments_enabled: true,
                quiz_length: 3,
                dedup_horizon: Duration::from_secs(60),
                dedup_capacity: 1_000,
            },
            Collaborators {
                transport: Arc::new(transport),
                directory: Arc::new(directory),
                answerer: Arc::new(answerer),
                catalog: Arc::new(Catalog::builtin()),
            },
        )
    }

    #[tokio::test]
    async fn test_duplicate_event_is_ignored() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|_, _| Ok(()));
        let engine = engine(transport, MockAnsweringService::new());

        let event = Event::message(CHAT, 1, "Ali", EventKind::Text("/nimadir".into()));
        assert!(matches!(
            engine.handle(event.clone()).await,
            Handled::Processed(Outcome::Applied)
        ));
        assert_eq!(engine.handle(event).await, Handled::Duplicate);
    }

    #[tokio::test]
    async fn test_duplicate_callback_answered_silently() {
        let mut transport = MockTransport::new();
        transport.expect_send().returning(|_, _| Ok(()));
        transport
            .expect_answer_callback()
            .with(eq("q1"), eq(None::<String>))
            .times(1)
            .returning(|_, _| Ok(()));
        transport
            .expect_answer_callback()
            .with(eq("q1"), always())
            .times(1)
            .returning(|_, _| Ok(()));
        let engine = engine(transport, MockAnsweringService::new());

        let event = Event::callback(CHAT, "q1", "Ali", views::CALLBACK_VIEW_ORDER);
        engine.handle(event.clone()).await;
        assert_eq!(engine.handle(event).await, Handled::Duplicate);
    }

    #[tokio::test]
    async fn test_ai_failure_sends_apology() {
        let mut answerer = MockAnsweringService::new();
        answerer
            .expect_ask()
            .returning(|_| Err(AnswerError::NetworkError("timeout".into())));

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .with(eq(CHAT), eq(Outbound::text(views::AI_ERROR)))
            .times(1)
            .returning(|_, _| Ok(()));
        transport.expect_send().returning(|_, _| Ok(()));
        let engine = engine(transport, answerer);

        engine
            .handle(Event::message(
                CHAT,
                1,
                "Ali",
                EventKind::Command(crate::event::Command::AiChat),
            ))
            .await;
        engine
            .handle(Event::message(
                CHAT,
                2,
                "Ali",
                EventKind::Text("Salom".into()),
            ))
            .await;
    }

    #[tokio::test]
    async fn test_product_card_falls_back_to_text() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|_, message| matches!(message, Outbound::Photo { .. }))
            .returning(|_, _| Err(DeliveryError::Failed("bad image url".into())));
        transport
            .expect_send()
            .withf(|_, message| matches!(message, Outbound::Text { .. }))
            .returning(|_, _| Ok(()));
        let engine = engine(transport, MockAnsweringService::new());

        let item = Catalog::builtin()
            .find_item("Burger")
            .cloned()
            .expect("builtin item");
        engine
            .execute(Effect::ProductCard {
                chat_id: CHAT,
                item,
            })
            .await;
    }

    #[tokio::test]
    async fn test_relay_acknowledges_failure() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .with(eq(CHAT), always())
            .times(1)
            .returning(|_, _| Err(DeliveryError::Blocked));
        transport
            .expect_send()
            .with(eq(1), eq(Outbound::text(views::relay_failed(CHAT))))
            .times(1)
            .returning(|_, _| Ok(()));
        let engine = engine(transport, MockAnsweringService::new());

        engine
            .execute(Effect::Relay {
                target: CHAT,
                message: Outbound::text("Yaratuvchidan: salom"),
                ack_to: 1,
            })
            .await;
    }
}
