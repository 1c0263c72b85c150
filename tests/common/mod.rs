//! Recording fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mazza_bot::answer::{AnswerError, AnsweringService};
use mazza_bot::catalog::Catalog;
use mazza_bot::directory::{InMemoryDirectory, User};
use mazza_bot::engine::{Collaborators, Engine, EngineConfig};
use mazza_bot::transport::{DeliveryError, Invoice, Outbound, Transport};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const OWNER: i64 = 1;

/// Transport that records everything and fails for configured chats
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(i64, Outbound)>>,
    callbacks: Mutex<Vec<(String, Option<String>)>>,
    pre_checkouts: Mutex<Vec<(String, bool)>>,
    invoices: Mutex<Vec<(i64, Invoice)>>,
    blocked: HashSet<i64>,
    files: HashMap<String, Vec<u8>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn blocking(mut self, chat_id: i64) -> Self {
        self.blocked.insert(chat_id);
        self
    }

    #[must_use]
    pub fn with_file(mut self, file_id: &str, bytes: &[u8]) -> Self {
        self.files.insert(file_id.to_string(), bytes.to_vec());
        self
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<Outbound> {
        self.sent
            .lock()
            .expect("lock")
            .iter()
            .filter(|(target, _)| *target == chat_id)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent_to(chat_id)
            .iter()
            .filter_map(|message| message.as_text().map(str::to_string))
            .collect()
    }

    pub fn total_sent(&self) -> usize {
        self.sent.lock().expect("lock").len()
    }

    pub fn callback_answers(&self) -> Vec<(String, Option<String>)> {
        self.callbacks.lock().expect("lock").clone()
    }

    pub fn pre_checkout_answers(&self) -> Vec<(String, bool)> {
        self.pre_checkouts.lock().expect("lock").clone()
    }

    pub fn invoices(&self) -> Vec<(i64, Invoice)> {
        self.invoices.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, chat_id: i64, message: Outbound) -> Result<(), DeliveryError> {
        if self.blocked.contains(&chat_id) {
            return Err(DeliveryError::Blocked);
        }
        self.sent.lock().expect("lock").push((chat_id, message));
        Ok(())
    }

    async fn answer_callback(
        &self,
        query_id: &str,
        text: Option<String>,
    ) -> Result<(), DeliveryError> {
        self.callbacks
            .lock()
            .expect("lock")
            .push((query_id.to_string(), text));
        Ok(())
    }

    async fn answer_pre_checkout(&self, query_id: &str, ok: bool) -> Result<(), DeliveryError> {
        self.pre_checkouts
            .lock()
            .expect("lock")
            .push((query_id.to_string(), ok));
        Ok(())
    }

    async fn send_invoice(&self, chat_id: i64, invoice: Invoice) -> Result<(), DeliveryError> {
        self.invoices.lock().expect("lock").push((chat_id, invoice));
        Ok(())
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DeliveryError> {
        self.files
            .get(file_id)
            .cloned()
            .ok_or_else(|| DeliveryError::Failed(format!("no such file: {file_id}")))
    }
}

/// Answering service with a canned reply that records its prompts
pub struct FakeAnswerer {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
    images: Mutex<Vec<(String, Vec<u8>, String)>>,
}

impl FakeAnswerer {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock").clone()
    }

    pub fn images(&self) -> Vec<(String, Vec<u8>, String)> {
        self.images.lock().expect("lock").clone()
    }

    fn answer(&self) -> Result<String, AnswerError> {
        self.reply
            .clone()
            .ok_or_else(|| AnswerError::NetworkError("connection reset".into()))
    }
}

#[async_trait]
impl AnsweringService for FakeAnswerer {
    async fn ask(&self, prompt: &str) -> Result<String, AnswerError> {
        self.prompts.lock().expect("lock").push(prompt.to_string());
        self.answer()
    }

    async fn ask_with_image(
        &self,
        prompt: &str,
        image: Vec<u8>,
        mime_type: &str,
    ) -> Result<String, AnswerError> {
        self.images
            .lock()
            .expect("lock")
            .push((prompt.to_string(), image, mime_type.to_string()));
        self.answer()
    }
}

pub struct Harness {
    pub engine: Arc<Engine>,
    pub transport: Arc<RecordingTransport>,
    pub directory: Arc<InMemoryDirectory>,
    pub answerer: Arc<FakeAnswerer>,
}

pub fn registered(chat_id: i64, name: &str) -> User {
    User::new(chat_id, name, Some(format!("+99890{chat_id:07}")))
}

pub fn harness(users: Vec<User>) -> Harness {
    build(
        users,
        RecordingTransport::new(),
        FakeAnswerer::replying("Javob"),
        true,
    )
}

pub fn build(
    users: Vec<User>,
    transport: RecordingTransport,
    answerer: FakeAnswerer,
    payments_enabled: bool,
) -> Harness {
    let transport = Arc::new(transport);
    let directory = Arc::new(InMemoryDirectory::with_users(users));
    let answerer = Arc::new(answerer);

    let engine = Engine::new(
        EngineConfig {
            owner_id: Some(OWNER),
            payments_enabled,
            quiz_length: 10,
            dedup_horizon: Duration::from_secs(60),
            dedup_capacity: 10_000,
        },
        Collaborators {
            transport: transport.clone(),
            directory: directory.clone(),
            answerer: answerer.clone(),
            catalog: Arc::new(Catalog::builtin()),
        },
    );

    Harness {
        engine: Arc::new(engine),
        transport,
        directory,
        answerer,
    }
}
