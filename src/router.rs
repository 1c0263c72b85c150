//! Mode router
//!
//! The per-chat state machine. Given an event and the chat's session it
//! commits the transition and returns the effects to run afterwards.
//! Evaluation order:
//!
//! 1. owner messages (reply relay, broadcast, owner commands)
//! 2. contact share (registration)
//! 3. registration gate
//! 4. commands, callback queries, payments
//! 5. mode dispatch for plain messages, then the owner fallback notice

use crate::cart::{self, CartListing};
use crate::catalog::Catalog;
use crate::directory::{User, UserDirectory};
use crate::effect::Effect;
use crate::event::{Command, Contact, Event, EventKind, PaymentInfo};
use crate::quiz::{self, AnswerOutcome};
use crate::session::{ChatSession, Mode, RegistrationState};
use crate::transport::{MediaSource, Outbound, TextFormat};
use crate::views;
use lazy_regex::lazy_regex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// `"<chat_id>, "` prefix of messages the owner can reply to
static RE_REPLY_TARGET: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"^(-?\d+),");

/// How a transition ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event was handled normally
    Applied,
    /// The chat must register first; a phone prompt was emitted
    NotRegistered,
    /// A contact of another user was shared
    WrongNumberMismatch,
    /// Checkout or payment requested with an empty cart
    EmptyCart,
    /// The owner replied to a message without a chat id prefix
    MalformedReplyRouting,
    /// The user directory failed; nothing was committed
    DirectoryFailure,
}

/// Committed transition plus the effects to execute
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub outcome: Outcome,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn applied(effects: Vec<Effect>) -> Self {
        Self {
            outcome: Outcome::Applied,
            effects,
        }
    }

    fn rejected(outcome: Outcome, effects: Vec<Effect>) -> Self {
        Self { outcome, effects }
    }
}

/// Extracts the target chat id from the text of a replied-to message
#[must_use]
pub fn parse_reply_target(text: &str) -> Option<i64> {
    RE_REPLY_TARGET
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|id| id.as_str().parse().ok())
}

/// Converts an owner message into the content sent to every chat
#[must_use]
pub fn broadcast_content(kind: &EventKind) -> Option<Outbound> {
    match kind {
        EventKind::Text(text) => Some(Outbound::text(text.clone())),
        EventKind::Photo { file_id, caption } => Some(Outbound::Photo {
            source: MediaSource::FileId(file_id.clone()),
            caption: caption.clone(),
            format: TextFormat::Plain,
            keyboard: None,
        }),
        EventKind::Video { file_id, caption } => Some(Outbound::Video {
            file_id: file_id.clone(),
            caption: caption.clone(),
        }),
        EventKind::Voice { file_id, caption } => Some(Outbound::Voice {
            file_id: file_id.clone(),
            caption: caption.clone(),
        }),
        EventKind::VideoNote { file_id } => Some(Outbound::VideoNote {
            file_id: file_id.clone(),
        }),
        EventKind::Contact(contact) => Some(Outbound::Contact {
            phone_number: contact.phone_number.clone(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
        }),
        EventKind::Location {
            latitude,
            longitude,
        } => Some(Outbound::Location {
            latitude: *latitude,
            longitude: *longitude,
        }),
        _ => None,
    }
}

/// Converts an owner reply into the content relayed to one chat
fn relay_content(kind: &EventKind) -> Option<Outbound> {
    match kind {
        EventKind::Text(text) => Some(Outbound::text(views::relay_text(text))),
        EventKind::Voice { .. }
        | EventKind::Video { .. }
        | EventKind::VideoNote { .. }
        | EventKind::Photo { .. } => broadcast_content(kind),
        _ => None,
    }
}

/// Media copy forwarded to the owner along with a fallback notice
fn owner_media_copy(event: &Event) -> Option<Outbound> {
    let caption = Some(views::owner_media_caption(
        event.chat_id,
        &event.sender_name,
    ));
    match &event.kind {
        EventKind::Voice { file_id, .. } => Some(Outbound::Voice {
            file_id: file_id.clone(),
            caption,
        }),
        EventKind::Photo { file_id, .. } => Some(Outbound::Photo {
            source: MediaSource::FileId(file_id.clone()),
            caption,
            format: TextFormat::Plain,
            keyboard: None,
        }),
        EventKind::Video { file_id, .. } => Some(Outbound::Video {
            file_id: file_id.clone(),
            caption,
        }),
        _ => None,
    }
}

/// The chat state machine
pub struct Router {
    owner_id: Option<i64>,
    catalog: Arc<Catalog>,
    directory: Arc<dyn UserDirectory>,
    payments_enabled: bool,
    quiz_length: usize,
}

impl Router {
    #[must_use]
    pub fn new(
        owner_id: Option<i64>,
        catalog: Arc<Catalog>,
        directory: Arc<dyn UserDirectory>,
        payments_enabled: bool,
        quiz_length: usize,
    ) -> Self {
        Self {
            owner_id,
            catalog,
            directory,
            payments_enabled,
            quiz_length: quiz_length.max(1),
        }
    }

    fn is_owner(&self, chat_id: i64) -> bool {
        self.owner_id == Some(chat_id)
    }

    /// Routes one event for the chat owning `session`.
    ///
    /// The caller must hold the chat's lock for the whole call.
    pub async fn route(&self, session: &mut ChatSession, event: &Event) -> Transition {
        // Contacts register every chat, the owner included, and are never broadcast
        if let EventKind::Contact(contact) = &event.kind {
            return self.register_contact(session, event, contact).await;
        }

        if let Some(transition) = self.route_owner(event) {
            return transition;
        }

        self.sync_registration(session).await;
        if !session.is_registered() {
            return Self::gate(session, event);
        }

        match &event.kind {
            EventKind::Command(command) => self.command(session, event, *command),
            EventKind::CallbackQuery { query_id, data } => self.callback(session, query_id, data),
            EventKind::PreCheckout { query_id, .. } => {
                Transition::applied(vec![Effect::AnswerPreCheckout {
                    query_id: query_id.clone(),
                    ok: true,
                }])
            }
            EventKind::SuccessfulPayment(payment) => self.payment(session, payment),
            _ => self.dispatch_message(session, event),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Owner
    // ─────────────────────────────────────────────────────────────────────

    fn route_owner(&self, event: &Event) -> Option<Transition> {
        let owner = event.chat_id;
        if !self.is_owner(owner) || !event.kind.is_message() {
            return None;
        }

        let effects = match (&event.kind, event.reply_to.as_deref()) {
            // Payments for the owner's own orders go through the customer flow
            (EventKind::SuccessfulPayment(_), _) => return None,
            (EventKind::Command(command), _) => {
                let text = match command {
                    Command::Start => views::OWNER_GREETING,
                    Command::Info => views::INFO,
                    _ => views::OWNER_HELP,
                };
                vec![Effect::text(owner, text)]
            }
            (EventKind::Text(text), _) if text.starts_with('/') => {
                vec![Effect::text(owner, views::OWNER_HELP)]
            }
            (kind, Some(replied)) => {
                let Some(target) = parse_reply_target(replied) else {
                    debug!(owner, "Owner reply without chat id prefix");
                    return Some(Transition::rejected(
                        Outcome::MalformedReplyRouting,
                        vec![Effect::text(owner, views::MALFORMED_REPLY)],
                    ));
                };
                match relay_content(kind) {
                    Some(message) => vec![Effect::Relay {
                        target,
                        message,
                        ack_to: owner,
                    }],
                    None => vec![Effect::text(owner, views::RELAY_UNSUPPORTED)],
                }
            }
            (kind, None) => match broadcast_content(kind) {
                Some(content) => {
                    info!(owner, "Owner message queued for broadcast");
                    vec![Effect::Broadcast {
                        owner_id: owner,
                        content,
                    }]
                }
                None => Vec::new(),
            },
        };

        Some(Transition::applied(effects))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────

    async fn register_contact(
        &self,
        session: &mut ChatSession,
        event: &Event,
        contact: &Contact,
    ) -> Transition {
        let chat_id = event.chat_id;
        if contact.user_id != Some(chat_id) {
            warn!(chat_id, contact_user = ?contact.user_id, "Rejected contact of another user");
            return Transition::rejected(
                Outcome::WrongNumberMismatch,
                vec![Effect::text(chat_id, views::WRONG_NUMBER)],
            );
        }

        let name = event.sender_name.as_str();
        let phone = contact.phone_number.clone();
        let notify = !self.is_owner(chat_id);
        let mut effects = Vec::new();

        let stored = match self.directory.find_by_chat_id(chat_id).await {
            Ok(None) => self
                .directory
                .create(User::new(chat_id, name, Some(phone.clone())))
                .await
                .map(|_| {
                    info!(chat_id, "New user registered");
                    effects.push(Effect::text(chat_id, views::registered(name, &phone)));
                    if notify {
                        self.notify_owner(&mut effects, views::owner_new_user(name, &phone));
                    }
                }),
            Ok(Some(mut user)) if !user.has_phone() => {
                user.phone_number = Some(phone.clone());
                self.directory.update(user).await.map(|()| {
                    info!(chat_id, "User phone number added");
                    effects.push(Effect::text(chat_id, views::phone_updated(&phone)));
                    if notify {
                        self.notify_owner(&mut effects, views::owner_phone_updated(name, &phone));
                    }
                })
            }
            Ok(Some(_)) => {
                effects.push(Effect::text(chat_id, views::ALREADY_REGISTERED));
                Ok(())
            }
            Err(e) => Err(e),
        };

        if let Err(e) = stored {
            error!(chat_id, error = %e, "Directory write failed during registration");
            return Transition::rejected(
                Outcome::DirectoryFailure,
                vec![Effect::text(chat_id, views::REGISTRATION_FAILED)],
            );
        }

        session.mark_registered();
        effects.push(Effect::send(chat_id, views::all_features_unlocked()));
        effects.push(Effect::send(chat_id, views::menu_prompt(&self.catalog)));
        Transition::applied(effects)
    }

    fn notify_owner(&self, effects: &mut Vec<Effect>, text: String) {
        if let Some(owner) = self.owner_id {
            effects.push(Effect::text(owner, text));
        }
    }

    /// Loads the registration state from the directory once per session.
    async fn sync_registration(&self, session: &mut ChatSession) {
        if session.registration_synced {
            return;
        }

        match self.directory.find_by_chat_id(session.chat_id()).await {
            Ok(Some(user)) if user.has_phone() => {
                session.registration = RegistrationState::Registered;
            }
            Ok(Some(_)) => session.registration = RegistrationState::PendingPhone,
            Ok(None) => {
                if session.registration == RegistrationState::Registered {
                    session.registration = RegistrationState::Unregistered;
                }
            }
            Err(e) => {
                // Not cached; the next event asks again
                warn!(chat_id = session.chat_id(), error = %e, "Registration lookup failed");
                return;
            }
        }
        session.registration_synced = true;
    }

    fn gate(session: &mut ChatSession, event: &Event) -> Transition {
        let chat_id = event.chat_id;
        debug!(chat_id, "Event from unregistered chat");
        session.registration = RegistrationState::PendingPhone;

        let mut effects = Vec::new();
        match &event.kind {
            EventKind::CallbackQuery { query_id, .. } => {
                effects.push(Effect::toast(query_id, views::REGISTER_FIRST_TOAST));
            }
            EventKind::PreCheckout { query_id, .. } => {
                effects.push(Effect::AnswerPreCheckout {
                    query_id: query_id.clone(),
                    ok: false,
                });
            }
            _ => {}
        }
        effects.push(Effect::send(
            chat_id,
            views::phone_prompt(&event.sender_name),
        ));
        Transition::rejected(Outcome::NotRegistered, effects)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    fn command(&self, session: &mut ChatSession, event: &Event, command: Command) -> Transition {
        let chat_id = event.chat_id;
        let effects = match command {
            Command::Start => {
                cart::open(session);
                vec![Effect::send(
                    chat_id,
                    views::greeting(&event.sender_name, &self.catalog),
                )]
            }
            Command::Info => vec![Effect::text(chat_id, views::INFO)],
            Command::MyOrder => match cart::list_items(session) {
                CartListing::Empty => vec![Effect::text(chat_id, views::NO_ORDERS_YET)],
                CartListing::Items { lines, total } => {
                    vec![Effect::send(chat_id, views::order_listing(&lines, total))]
                }
            },
            Command::ClearOrder => {
                cart::clear(session);
                vec![Effect::text(chat_id, views::ORDER_CLEARED)]
            }
            Command::Quiz => {
                let quiz = quiz::generate(self.quiz_length);
                let first = quiz
                    .current()
                    .map(|question| views::quiz_question(0, &question.prompt));
                session.start_quiz(quiz);
                info!(chat_id, "Quiz started");
                first
                    .map(|text| Effect::text(chat_id, text))
                    .into_iter()
                    .collect()
            }
            Command::AiChat => {
                session.enter(Mode::AiChat);
                vec![Effect::text(chat_id, views::ai_welcome(&event.sender_name))]
            }
        };
        Transition::applied(effects)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Callback queries and payments
    // ─────────────────────────────────────────────────────────────────────

    fn callback(&self, session: &mut ChatSession, query_id: &str, data: &str) -> Transition {
        let chat_id = session.chat_id();

        if let Some(name) = data.strip_prefix(views::CALLBACK_BUY_PREFIX) {
            let Some(item) = self.catalog.find_item(name) else {
                debug!(chat_id, data, "Buy callback for unknown item");
                return Transition::applied(vec![Effect::toast(
                    query_id,
                    views::UNKNOWN_ITEM_TOAST,
                )]);
            };
            let total = cart::add_item(session, &item.name, item.price);
            if !matches!(session.mode(), Mode::Quiz | Mode::AiChat) {
                session.enter(Mode::Ordering);
            }
            return Transition::applied(vec![
                Effect::toast(query_id, views::item_added_toast(&item.name, total)),
                Effect::send(chat_id, views::item_added(&item.name, total)),
            ]);
        }

        match data {
            views::CALLBACK_VIEW_ORDER => {
                let listing = match cart::list_items(session) {
                    CartListing::Empty => Effect::text(chat_id, views::NO_ORDERS),
                    CartListing::Items { lines, total } => {
                        Effect::send(chat_id, views::order_listing(&lines, total))
                    }
                };
                Transition::applied(vec![Effect::ack_callback(query_id), listing])
            }
            views::CALLBACK_CHECKOUT => match cart::checkout(session) {
                Ok(summary) => Transition::applied(vec![
                    Effect::toast(query_id, views::CHECKOUT_READY_TOAST),
                    Effect::send(chat_id, views::checkout_summary(&summary)),
                ]),
                Err(_) => Transition::rejected(
                    Outcome::EmptyCart,
                    vec![
                        Effect::toast(query_id, views::EMPTY_CART_TOAST),
                        Effect::text(chat_id, views::EMPTY_CART),
                    ],
                ),
            },
            views::CALLBACK_CONFIRM_PAYMENT => self.confirm_payment(session, query_id),
            views::CALLBACK_CONTINUE_ORDERING => Transition::applied(vec![
                Effect::ack_callback(query_id),
                Effect::send(chat_id, views::continue_ordering(&self.catalog)),
            ]),
            _ => {
                debug!(chat_id, data, "Unknown callback data");
                Transition::applied(vec![Effect::toast(query_id, views::UNKNOWN_ACTION_TOAST)])
            }
        }
    }

    fn confirm_payment(&self, session: &ChatSession, query_id: &str) -> Transition {
        let chat_id = session.chat_id();
        let Ok(summary) = cart::checkout(session) else {
            return Transition::rejected(
                Outcome::EmptyCart,
                vec![Effect::toast(query_id, views::NO_ORDER_TOAST)],
            );
        };

        if !self.payments_enabled {
            warn!(chat_id, "Invoice requested but payments are not configured");
            return Transition::applied(vec![
                Effect::toast(query_id, views::PAYMENT_UNAVAILABLE_TOAST),
                Effect::text(chat_id, views::PAYMENT_SERVICE_ERROR),
            ]);
        }

        Transition::applied(vec![
            Effect::toast(query_id, views::OPENING_PAYMENT_TOAST),
            Effect::SendInvoice {
                chat_id,
                invoice: cart::build_invoice(&summary),
            },
        ])
    }

    fn payment(&self, session: &mut ChatSession, payment: &PaymentInfo) -> Transition {
        let chat_id = session.chat_id();
        let receipt = cart::confirm_payment(session, payment.total_amount);
        if session.mode() == Mode::Ordering {
            session.enter(Mode::Idle);
        }

        let mut effects = vec![Effect::text(chat_id, views::payment_received(&receipt))];
        self.notify_owner(
            &mut effects,
            views::owner_payment_notice(chat_id, &receipt, payment),
        );
        Transition::applied(effects)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Messages
    // ─────────────────────────────────────────────────────────────────────

    fn dispatch_message(&self, session: &mut ChatSession, event: &Event) -> Transition {
        let chat_id = event.chat_id;

        let effects = match (session.mode(), &event.kind) {
            (_, EventKind::Text(text)) if text.starts_with('/') => {
                vec![Effect::text(chat_id, views::NOT_UNDERSTOOD)]
            }
            (
                _,
                EventKind::Location {
                    latitude,
                    longitude,
                },
            ) => self.location(event, *latitude, *longitude),
            (Mode::Quiz, EventKind::Text(text)) => Self::answer_quiz(session, text),
            (Mode::AiChat, EventKind::Text(text)) => vec![
                Effect::text(chat_id, views::AI_PROCESSING),
                Effect::AskAi {
                    chat_id,
                    prompt: text.clone(),
                },
            ],
            (Mode::AiChat, EventKind::Photo { file_id, caption }) => {
                let prompt = caption
                    .as_deref()
                    .filter(|caption| !caption.trim().is_empty())
                    .unwrap_or(views::DEFAULT_IMAGE_PROMPT);
                vec![
                    Effect::text(chat_id, views::AI_IMAGE_PROCESSING),
                    Effect::AskAiWithImage {
                        chat_id,
                        file_id: file_id.clone(),
                        prompt: prompt.to_string(),
                    },
                ]
            }
            (Mode::AiChat, EventKind::Video { .. }) => {
                vec![Effect::text(chat_id, views::AI_VIDEO_UNSUPPORTED)]
            }
            (Mode::AiChat, _) => vec![Effect::text(chat_id, views::AI_MEDIA_UNSUPPORTED)],
            (Mode::Idle | Mode::Ordering, EventKind::Text(text))
                if self.catalog.is_category(text) =>
            {
                session.enter(Mode::Ordering);
                self.category_listing(chat_id, text)
            }
            _ => self.fallback(event),
        };

        Transition::applied(effects)
    }

    fn answer_quiz(session: &mut ChatSession, text: &str) -> Vec<Effect> {
        let chat_id = session.chat_id();
        let Some(quiz) = session.quiz_mut() else {
            return Vec::new();
        };

        match quiz.submit_answer(text) {
            AnswerOutcome::Next { index, prompt } => {
                vec![Effect::text(chat_id, views::quiz_question(index, &prompt))]
            }
            AnswerOutcome::Finished { correct, total } => {
                session.end_quiz();
                info!(chat_id, correct, total, "Quiz finished");
                vec![
                    Effect::text(chat_id, views::quiz_finished(correct, total)),
                    Effect::text(chat_id, views::QUIZ_AGAIN),
                ]
            }
        }
    }

    fn category_listing(&self, chat_id: i64, category: &str) -> Vec<Effect> {
        let mut effects = vec![Effect::send(chat_id, views::category_header(category))];
        effects.extend(self.catalog.items_in(category).into_iter().map(|item| {
            Effect::ProductCard {
                chat_id,
                item: item.clone(),
            }
        }));
        effects.push(Effect::send(chat_id, views::category_footer()));
        effects
    }

    fn location(&self, event: &Event, latitude: f64, longitude: f64) -> Vec<Effect> {
        let mut effects = vec![Effect::text(event.chat_id, views::LOCATION_RECEIVED)];
        if let Some(owner) = self.owner_id {
            effects.push(Effect::send(
                owner,
                Outbound::Location {
                    latitude,
                    longitude,
                },
            ));
            effects.push(Effect::text(
                owner,
                views::owner_location_note(event.chat_id, &event.sender_name),
            ));
        }
        effects
    }

    fn fallback(&self, event: &Event) -> Vec<Effect> {
        let chat_id = event.chat_id;
        let mut effects = Vec::new();

        if let Some(owner) = self.owner_id.filter(|owner| *owner != chat_id) {
            effects.push(Effect::send(
                owner,
                views::owner_fallback_notice(chat_id, &event.sender_name, &event.kind),
            ));
            if let Some(copy) = owner_media_copy(event) {
                effects.push(Effect::send(owner, copy));
            }
        }

        if matches!(event.kind, EventKind::Text(_)) {
            effects.push(Effect::text(chat_id, views::NOT_UNDERSTOOD));
        }
        effects
    }
}
