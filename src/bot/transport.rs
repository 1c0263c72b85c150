use crate::transport::{
    ButtonRequestKind, DeliveryError, Invoice, Keyboard, MediaSource, Outbound, ReplyButton,
    TextFormat, Transport,
};
use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    ButtonRequest, CallbackQueryId, ChatId, FileId, InlineKeyboardButton, InlineKeyboardMarkup,
    InputFile, KeyboardButton, KeyboardMarkup, KeyboardRemove, LabeledPrice, ParseMode,
    PreCheckoutQueryId, ReplyMarkup,
};
use teloxide::{ApiError, RequestError};
use tracing::debug;

/// Bot API implementation of [`Transport`]
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
    provider_token: Option<String>,
}

impl TelegramTransport {
    #[must_use]
    pub fn new(bot: Bot, provider_token: Option<String>) -> Self {
        Self {
            bot,
            provider_token,
        }
    }
}

/// Maps Bot API failures; unreachable recipients become `Blocked`.
fn delivery_error(err: RequestError) -> DeliveryError {
    match err {
        RequestError::Api(
            ApiError::BotBlocked | ApiError::UserDeactivated | ApiError::BotKicked,
        ) => DeliveryError::Blocked,
        other => DeliveryError::Failed(other.to_string()),
    }
}

fn parse_mode(format: TextFormat) -> Option<ParseMode> {
    match format {
        TextFormat::Plain => None,
        TextFormat::Html => Some(ParseMode::Html),
    }
}

fn reply_button(button: ReplyButton) -> KeyboardButton {
    let key = KeyboardButton::new(button.text);
    match button.request {
        Some(ButtonRequestKind::Contact) => key.request(ButtonRequest::Contact),
        Some(ButtonRequestKind::Location) => key.request(ButtonRequest::Location),
        None => key,
    }
}

fn reply_markup(keyboard: Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Reply { rows, one_time } => {
            let rows: Vec<Vec<KeyboardButton>> = rows
                .into_iter()
                .map(|row| row.into_iter().map(reply_button).collect())
                .collect();
            let markup = KeyboardMarkup::new(rows).resize_keyboard();
            if one_time {
                markup.one_time_keyboard().into()
            } else {
                markup.into()
            }
        }
        Keyboard::Remove => KeyboardRemove::new().into(),
        Keyboard::Inline(rows) => {
            let rows: Vec<Vec<InlineKeyboardButton>> = rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|button| {
                            InlineKeyboardButton::callback(button.text, button.callback_data)
                        })
                        .collect()
                })
                .collect();
            InlineKeyboardMarkup::new(rows).into()
        }
    }
}

fn input_file(source: MediaSource) -> Result<InputFile, DeliveryError> {
    match source {
        MediaSource::FileId(id) => Ok(InputFile::file_id(FileId(id))),
        MediaSource::Url(url) => reqwest::Url::parse(&url)
            .map(InputFile::url)
            .map_err(|e| DeliveryError::Failed(format!("invalid photo url {url}: {e}"))),
    }
}

impl TelegramTransport {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: String,
        format: TextFormat,
        keyboard: Option<Keyboard>,
    ) -> Result<(), RequestError> {
        let mut req = self.bot.send_message(chat_id, text);
        if let Some(mode) = parse_mode(format) {
            req = req.parse_mode(mode);
        }
        if let Some(keyboard) = keyboard {
            req = req.reply_markup(reply_markup(keyboard));
        }
        req.await.map(|_| ())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: InputFile,
        caption: Option<String>,
        format: TextFormat,
        keyboard: Option<Keyboard>,
    ) -> Result<(), RequestError> {
        let mut req = self.bot.send_photo(chat_id, photo);
        if let Some(caption) = caption {
            req = req.caption(caption);
        }
        if let Some(mode) = parse_mode(format) {
            req = req.parse_mode(mode);
        }
        if let Some(keyboard) = keyboard {
            req = req.reply_markup(reply_markup(keyboard));
        }
        req.await.map(|_| ())
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, chat_id: i64, message: Outbound) -> Result<(), DeliveryError> {
        let chat = ChatId(chat_id);
        let result = match message {
            Outbound::Text {
                text,
                format,
                keyboard,
            } => self.send_text(chat, text, format, keyboard).await,
            Outbound::Photo {
                source,
                caption,
                format,
                keyboard,
            } => {
                let photo = input_file(source)?;
                self.send_photo(chat, photo, caption, format, keyboard)
                    .await
            }
            Outbound::Video { file_id, caption } => {
                let mut req = self
                    .bot
                    .send_video(chat, InputFile::file_id(FileId(file_id)));
                if let Some(caption) = caption {
                    req = req.caption(caption);
                }
                req.await.map(|_| ())
            }
            Outbound::Voice { file_id, caption } => {
                let mut req = self
                    .bot
                    .send_voice(chat, InputFile::file_id(FileId(file_id)));
                if let Some(caption) = caption {
                    req = req.caption(caption);
                }
                req.await.map(|_| ())
            }
            Outbound::VideoNote { file_id } => self
                .bot
                .send_video_note(chat, InputFile::file_id(FileId(file_id)))
                .await
                .map(|_| ()),
            Outbound::Contact {
                phone_number,
                first_name,
                last_name,
            } => {
                let mut req = self.bot.send_contact(chat, phone_number, first_name);
                if let Some(last_name) = last_name {
                    req = req.last_name(last_name);
                }
                req.await.map(|_| ())
            }
            Outbound::Location {
                latitude,
                longitude,
            } => self
                .bot
                .send_location(chat, latitude, longitude)
                .await
                .map(|_| ()),
        };
        result.map_err(delivery_error)
    }

    async fn answer_callback(
        &self,
        query_id: &str,
        text: Option<String>,
    ) -> Result<(), DeliveryError> {
        let mut req = self
            .bot
            .answer_callback_query(CallbackQueryId(query_id.to_string()));
        if let Some(text) = text {
            req = req.text(text);
        }
        req.await.map(|_| ()).map_err(delivery_error)
    }

    async fn answer_pre_checkout(&self, query_id: &str, ok: bool) -> Result<(), DeliveryError> {
        self.bot
            .answer_pre_checkout_query(PreCheckoutQueryId(query_id.to_string()), ok)
            .await
            .map(|_| ())
            .map_err(delivery_error)
    }

    async fn send_invoice(&self, chat_id: i64, invoice: Invoice) -> Result<(), DeliveryError> {
        let Some(token) = self.provider_token.clone() else {
            return Err(DeliveryError::Failed(
                "payment provider token not configured".into(),
            ));
        };

        let prices: Vec<LabeledPrice> = invoice
            .prices
            .into_iter()
            .map(|price| LabeledPrice {
                label: price.label,
                amount: price.amount,
            })
            .collect();

        self.bot
            .send_invoice(
                ChatId(chat_id),
                invoice.title,
                invoice.description,
                invoice.payload,
                invoice.currency,
                prices,
            )
            .provider_token(token)
            .need_name(invoice.need_name)
            .need_phone_number(invoice.need_phone_number)
            .need_shipping_address(invoice.need_shipping_address)
            .await
            .map(|_| ())
            .map_err(delivery_error)
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DeliveryError> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(delivery_error)?;

        let mut buf = Vec::new();
        self.bot
            .download_file(&file.path, &mut buf)
            .await
            .map_err(|e| DeliveryError::Failed(e.to_string()))?;

        debug!(file_id, bytes = buf.len(), "File downloaded");
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InlineButton;

    #[test]
    fn test_blocked_errors_are_classified() {
        assert!(delivery_error(RequestError::Api(ApiError::BotBlocked)).is_blocked());
        assert!(delivery_error(RequestError::Api(ApiError::UserDeactivated)).is_blocked());
        assert!(!delivery_error(RequestError::Api(ApiError::Unknown(
            "Bad Request: chat not found".into()
        )))
        .is_blocked());
    }

    #[test]
    fn test_html_format_sets_parse_mode() {
        assert_eq!(parse_mode(TextFormat::Html), Some(ParseMode::Html));
        assert_eq!(parse_mode(TextFormat::Plain), None);
    }

    #[test]
    fn test_inline_keyboard_conversion() {
        let markup = reply_markup(Keyboard::Inline(vec![vec![
            InlineButton::new("Sotib olish", "buy_Burger"),
            InlineButton::new("Buyurtma", "view_order"),
        ]]));
        let ReplyMarkup::InlineKeyboard(inline) = markup else {
            panic!("expected inline keyboard");
        };
        assert_eq!(inline.inline_keyboard.len(), 1);
        assert_eq!(inline.inline_keyboard[0].len(), 2);
    }

    #[test]
    fn test_reply_keyboard_contact_request() {
        let markup = reply_markup(Keyboard::Reply {
            rows: vec![vec![ReplyButton::requesting(
                "Telefon",
                ButtonRequestKind::Contact,
            )]],
            one_time: true,
        });
        let ReplyMarkup::Keyboard(keyboard) = markup else {
            panic!("expected reply keyboard");
        };
        assert!(keyboard.one_time_keyboard);
        assert_eq!(
            keyboard.keyboard[0][0].request,
            Some(ButtonRequest::Contact)
        );
    }

    #[test]
    fn test_invalid_photo_url() {
        let result = input_file(MediaSource::Url("not a url".into()));
        assert!(result.is_err());
    }
}
