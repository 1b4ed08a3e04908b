use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::api::{BotApi, BotApiError};
use super::types::{
    AnswerCallbackQuery, AnswerInlineQuery, BotCommand, EditInlineMessageText, GetUpdates,
    SendMessage, SendPhoto, Update,
};

/// A request the bot sent, as recorded by [`MockBotApi`]
#[derive(Debug, Clone, PartialEq)]
pub enum BotRequest {
    SendMessage(SendMessage),
    SendPhoto(SendPhoto),
    EditInlineMessageText(EditInlineMessageText),
    AnswerInlineQuery(AnswerInlineQuery),
    AnswerCallbackQuery(AnswerCallbackQuery),
    SetMyCommands(Vec<BotCommand>),
    SetMyDescription(String),
    SetMyShortDescription(String),
}

/// In-process Bot API that records outgoing requests and replays queued updates
#[derive(Default)]
pub struct MockBotApi {
    requests: Mutex<Vec<BotRequest>>,
    polls: Mutex<Vec<GetUpdates>>,
    updates: Mutex<VecDeque<Result<Vec<Update>, BotApiError>>>,
    /// method name -> error returned instead of recording
    failures: Mutex<HashMap<&'static str, BotApiError>>,
}

impl MockBotApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `method` fail with `error`.
    pub fn with_failure(self, method: &'static str, error: BotApiError) -> Self {
        lock(&self.failures).insert(method, error);
        self
    }

    /// Queue the result of one `getUpdates` call.
    pub fn push_updates(&self, batch: Result<Vec<Update>, BotApiError>) {
        lock(&self.updates).push_back(batch);
    }

    pub fn requests(&self) -> Vec<BotRequest> {
        lock(&self.requests).clone()
    }

    pub fn polls(&self) -> Vec<GetUpdates> {
        lock(&self.polls).clone()
    }

    pub fn sent_messages(&self) -> Vec<SendMessage> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                BotRequest::SendMessage(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn sent_photos(&self) -> Vec<SendPhoto> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                BotRequest::SendPhoto(photo) => Some(photo),
                _ => None,
            })
            .collect()
    }

    pub fn inline_answers(&self) -> Vec<AnswerInlineQuery> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                BotRequest::AnswerInlineQuery(answer) => Some(answer),
                _ => None,
            })
            .collect()
    }

    pub fn callback_answers(&self) -> Vec<AnswerCallbackQuery> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                BotRequest::AnswerCallbackQuery(answer) => Some(answer),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<EditInlineMessageText> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                BotRequest::EditInlineMessageText(edit) => Some(edit),
                _ => None,
            })
            .collect()
    }

    fn record(&self, method: &'static str, request: BotRequest) -> Result<(), BotApiError> {
        if let Some(error) = lock(&self.failures).get(method) {
            return Err(error.clone());
        }
        lock(&self.requests).push(request);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl BotApi for MockBotApi {
    async fn get_updates(&self, request: &GetUpdates) -> Result<Vec<Update>, BotApiError> {
        lock(&self.polls).push(request.clone());
        let next = lock(&self.updates).pop_front();
        match next {
            Some(batch) => batch,
            None => {
                // stands in for an idle long poll
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_message(&self, request: &SendMessage) -> Result<(), BotApiError> {
        self.record("sendMessage", BotRequest::SendMessage(request.clone()))
    }

    async fn send_photo(&self, request: &SendPhoto) -> Result<(), BotApiError> {
        self.record("sendPhoto", BotRequest::SendPhoto(request.clone()))
    }

    async fn edit_inline_message_text(
        &self,
        request: &EditInlineMessageText,
    ) -> Result<(), BotApiError> {
        self.record(
            "editMessageText",
            BotRequest::EditInlineMessageText(request.clone()),
        )
    }

    async fn answer_inline_query(&self, request: &AnswerInlineQuery) -> Result<(), BotApiError> {
        self.record(
            "answerInlineQuery",
            BotRequest::AnswerInlineQuery(request.clone()),
        )
    }

    async fn answer_callback_query(
        &self,
        request: &AnswerCallbackQuery,
    ) -> Result<(), BotApiError> {
        self.record(
            "answerCallbackQuery",
            BotRequest::AnswerCallbackQuery(request.clone()),
        )
    }

    async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), BotApiError> {
        self.record("setMyCommands", BotRequest::SetMyCommands(commands.to_vec()))
    }

    async fn set_my_description(&self, description: &str) -> Result<(), BotApiError> {
        self.record(
            "setMyDescription",
            BotRequest::SetMyDescription(description.to_string()),
        )
    }

    async fn set_my_short_description(
        &self,
        short_description: &str,
    ) -> Result<(), BotApiError> {
        self.record(
            "setMyShortDescription",
            BotRequest::SetMyShortDescription(short_description.to_string()),
        )
    }
}
