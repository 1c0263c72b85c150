use super::commands::parse_command;
use crate::event::{Contact, Event, EventKind, PaymentInfo, ShippingAddress};
use teloxide::types::{CallbackQuery, Message, PreCheckoutQuery, SuccessfulPayment, User};

/// Name used when the sender has no first name
const UNKNOWN_SENDER: &str = "Foydalanuvchi";

fn sender_name(user: Option<&User>) -> String {
    user.map(|u| u.first_name.trim())
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_SENDER)
        .to_string()
}

/// Converts a chat message into an engine event.
#[must_use]
pub fn from_message(msg: &Message, bot_username: &str) -> Event {
    let event = Event::message(
        msg.chat.id.0,
        msg.id.0,
        sender_name(msg.from.as_ref()),
        message_kind(msg, bot_username),
    );

    match msg
        .reply_to_message()
        .and_then(|replied| replied.text().or_else(|| replied.caption()))
    {
        Some(text) => event.replying_to(text),
        None => event,
    }
}

fn message_kind(msg: &Message, bot_username: &str) -> EventKind {
    let caption = msg.caption().map(ToString::to_string);

    if let Some(text) = msg.text() {
        return parse_command(text, bot_username)
            .map_or_else(|| EventKind::Text(text.to_string()), EventKind::Command);
    }
    if let Some(contact) = msg.contact() {
        return EventKind::Contact(Contact {
            phone_number: contact.phone_number.clone(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            user_id: contact.user_id.map(|id| id.0.cast_signed()),
        });
    }
    if let Some(location) = msg.location() {
        return EventKind::Location {
            latitude: location.latitude,
            longitude: location.longitude,
        };
    }
    // Largest size comes last
    if let Some(photo) = msg.photo().and_then(<[_]>::last) {
        return EventKind::Photo {
            file_id: photo.file.id.to_string(),
            caption,
        };
    }
    if let Some(voice) = msg.voice() {
        return EventKind::Voice {
            file_id: voice.file.id.to_string(),
            caption,
        };
    }
    if let Some(video) = msg.video() {
        return EventKind::Video {
            file_id: video.file.id.to_string(),
            caption,
        };
    }
    if let Some(note) = msg.video_note() {
        return EventKind::VideoNote {
            file_id: note.file.id.to_string(),
        };
    }
    if let Some(payment) = msg.successful_payment() {
        return EventKind::SuccessfulPayment(payment_info(payment));
    }
    EventKind::Other
}

fn payment_info(payment: &SuccessfulPayment) -> PaymentInfo {
    let order = &payment.order_info;
    PaymentInfo {
        total_amount: payment.total_amount,
        currency: payment.currency.clone(),
        payer_name: order.name.clone(),
        phone_number: order.phone_number.clone(),
        shipping_address: order
            .shipping_address
            .as_ref()
            .map(|address| ShippingAddress {
                city: address.city.clone(),
                street_line1: address.street_line1.clone(),
                street_line2: address.street_line2.clone(),
                post_code: address.post_code.clone(),
            }),
    }
}

/// Converts an inline button press into an engine event.
///
/// The sender's private chat is used as the chat id, so presses on
/// messages without an accessible chat still reach the right session.
#[must_use]
pub fn from_callback(query: &CallbackQuery) -> Event {
    Event::callback(
        query.from.id.0.cast_signed(),
        query.id.to_string(),
        sender_name(Some(&query.from)),
        query.data.clone().unwrap_or_default(),
    )
}

/// Converts a pre-checkout query into an engine event.
#[must_use]
pub fn from_pre_checkout(query: &PreCheckoutQuery) -> Event {
    Event::pre_checkout(
        query.from.id.0.cast_signed(),
        query.id.to_string(),
        sender_name(Some(&query.from)),
        query.total_amount,
    )
}
