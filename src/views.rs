//! User-facing texts and keyboards
//!
//! All messages are in Uzbek. HTML-formatted messages escape every
//! user-supplied fragment.

use crate::cart::{CheckoutSummary, PaymentReceipt};
use crate::catalog::{Catalog, CatalogItem};
use crate::event::{EventKind, PaymentInfo};
use crate::session::CartLine;
use crate::transport::{
    ButtonRequestKind, InlineButton, Keyboard, MediaSource, Outbound, ReplyButton, TextFormat,
};
use crate::utils::escape_html;

// ─────────────────────────────────────────────────────────────────────────────
// Callback constants
// ─────────────────────────────────────────────────────────────────────────────

/// Prefix of "add to cart" callback data, followed by the item name
pub const CALLBACK_BUY_PREFIX: &str = "buy_";
/// Show the cart summary with a payment button
pub const CALLBACK_CHECKOUT: &str = "checkout";
/// Issue the invoice
pub const CALLBACK_CONFIRM_PAYMENT: &str = "confirm_payment";
/// Show the cart
pub const CALLBACK_VIEW_ORDER: &str = "view_order";
/// Show the menu keyboard again
pub const CALLBACK_CONTINUE_ORDERING: &str = "continue_ordering";

/// Label of the location request button on the main menu
pub const SEND_LOCATION_BUTTON: &str = "Manzilni yuborish";
/// Label of the contact request button
pub const SEND_PHONE_BUTTON: &str = "Telefon raqamimni jo'natish";

/// Prompt used when a photo arrives without a caption in AI mode
pub const DEFAULT_IMAGE_PROMPT: &str = "Bu rasmda nima borligini tahlil qil?";

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

fn display_name(name: &str) -> &str {
    if name.trim().is_empty() {
        "foydalanuvchi"
    } else {
        name
    }
}

/// Phone number prompt with a one-time contact button
#[must_use]
pub fn phone_prompt(name: &str) -> Outbound {
    Outbound::text(format!(
        "{}, botdan to'liq foydalanish uchun iltimos, telefon raqamingizni jo'natish tugmasini bosing. Raqamingizsiz bot funksiyalaridan foydalana olmaysiz.",
        display_name(name)
    ))
    .with_keyboard(Keyboard::Reply {
        rows: vec![vec![ReplyButton::requesting(
            SEND_PHONE_BUTTON,
            ButtonRequestKind::Contact,
        )]],
        one_time: true,
    })
}

pub const REGISTER_FIRST_TOAST: &str = "Iltimos, avval telefon raqamingizni ro'yxatdan o'tkazing.";

pub const WRONG_NUMBER: &str =
    "Noto'g'ri telefon raqami yuborildi. Iltimos, o'zingizning raqamingizni yuboring.";

pub const ALREADY_REGISTERED: &str = "Sizning raqamingiz allaqachon ro'yxatdan o'tgan.";

pub const REGISTRATION_FAILED: &str =
    "Ro'yxatdan o'tishda xatolik yuz berdi. Iltimos, keyinroq qayta urinib ko'ring.";

#[must_use]
pub fn registered(name: &str, phone: &str) -> String {
    format!(
        "Rahmat, {}! Siz ro'yxatdan o'tdingiz. Telefon raqamingiz: {phone}",
        display_name(name)
    )
}

#[must_use]
pub fn phone_updated(phone: &str) -> String {
    format!("Telefon raqamingiz yangilandi: {phone}")
}

/// Hides the contact keyboard after registration
#[must_use]
pub fn all_features_unlocked() -> Outbound {
    Outbound::text("Endi siz botning barcha funksiyalaridan foydalanishingiz mumkin.")
        .with_keyboard(Keyboard::Remove)
}

#[must_use]
pub fn owner_new_user(name: &str, phone: &str) -> String {
    format!("Yangi foydalanuvchi ro'yxatdan o'tdi: {name}, Raqami: {phone}")
}

#[must_use]
pub fn owner_phone_updated(name: &str, phone: &str) -> String {
    format!("Foydalanuvchi {name} raqamini yangiladi: {phone}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Menu and commands
// ─────────────────────────────────────────────────────────────────────────────

/// One row per category plus the location request button
#[must_use]
pub fn main_menu_keyboard(catalog: &Catalog) -> Keyboard {
    let mut rows: Vec<Vec<ReplyButton>> = catalog
        .categories()
        .into_iter()
        .map(|category| vec![ReplyButton::text(category)])
        .collect();
    rows.push(vec![ReplyButton::requesting(
        SEND_LOCATION_BUTTON,
        ButtonRequestKind::Location,
    )]);
    Keyboard::Reply {
        rows,
        one_time: false,
    }
}

#[must_use]
pub fn greeting(name: &str, catalog: &Catalog) -> Outbound {
    Outbound::text(format!(
        "Assalomu alaykum, {}! Mazza Food botiga xush kelibsiz.",
        display_name(name)
    ))
    .with_keyboard(main_menu_keyboard(catalog))
}

#[must_use]
pub fn menu_prompt(catalog: &Catalog) -> Outbound {
    Outbound::text("Menyuni tanlang:").with_keyboard(main_menu_keyboard(catalog))
}

#[must_use]
pub fn continue_ordering(catalog: &Catalog) -> Outbound {
    Outbound::text("Yana nimani buyurtma qilasiz?").with_keyboard(main_menu_keyboard(catalog))
}

pub const INFO: &str = "Mazza Food tezkor va mazali ovqatlar shaxobchasining ovqat buyurtma qilish uchun telegram boti! Bizning shiorimiz: Tez, Mazali, Sifatli!";

pub const NOT_UNDERSTOOD: &str =
    "Uzr, men sizni tushunmadim. Menyudan tanlang yoki buyruqlardan foydalaning.";

// ─────────────────────────────────────────────────────────────────────────────
// Products
// ─────────────────────────────────────────────────────────────────────────────

#[must_use]
pub fn category_header(category: &str) -> Outbound {
    Outbound::html(format!(
        "<b>{}</b> bo'limidagi mahsulotlar:",
        escape_html(category)
    ))
}

fn buy_keyboard(item: &CatalogItem) -> Keyboard {
    Keyboard::Inline(vec![vec![InlineButton::new(
        format!("🛒 Buyurtma berish ({} so'm)", item.price),
        format!("{CALLBACK_BUY_PREFIX}{}", item.name),
    )]])
}

fn product_caption(item: &CatalogItem) -> String {
    format!(
        "🍽 <b>{}</b>\n💵 {} so'm\n📝 <i>{}</i>",
        escape_html(&item.name),
        item.price,
        escape_html(&item.description)
    )
}

/// Photo card with a buy button
#[must_use]
pub fn product_card(item: &CatalogItem) -> Outbound {
    Outbound::Photo {
        source: MediaSource::Url(item.image_url.clone()),
        caption: Some(product_caption(item)),
        format: TextFormat::Html,
        keyboard: Some(buy_keyboard(item)),
    }
}

/// Text card used when the product photo cannot be sent
#[must_use]
pub fn product_text_card(item: &CatalogItem) -> Outbound {
    Outbound::html(format!(
        "{}\n\n(Rasmni yuklashda xatolik yuz berdi. Iltimos, administratorga murojaat qiling.)",
        product_caption(item)
    ))
    .with_keyboard(buy_keyboard(item))
}

#[must_use]
pub fn category_footer() -> Outbound {
    Outbound::text("Yuqoridan mahsulot tanlashingiz mumkin.").with_keyboard(Keyboard::Inline(vec![
        vec![InlineButton::new("Buyurtmani ko'rish", CALLBACK_VIEW_ORDER)],
        vec![InlineButton::new("To'lovga o'tish", CALLBACK_CHECKOUT)],
        vec![InlineButton::new(
            "Menyuga qaytish",
            CALLBACK_CONTINUE_ORDERING,
        )],
    ]))
}

// ─────────────────────────────────────────────────────────────────────────────
// Cart
// ─────────────────────────────────────────────────────────────────────────────

#[must_use]
pub fn item_added_toast(name: &str, total: u64) -> String {
    format!("✅ \"{name}\" tanlandi! Jami: {total} so'm")
}

#[must_use]
pub fn item_added(name: &str, total: u64) -> Outbound {
    Outbound::text(format!(
        "\"{name}\" buyurtmangizga qo'shildi. Joriy summa: {total} so'm."
    ))
    .with_keyboard(Keyboard::Inline(vec![
        vec![InlineButton::new(
            "Yana buyurtma berish",
            CALLBACK_CONTINUE_ORDERING,
        )],
        vec![InlineButton::new("Buyurtmani ko'rish", CALLBACK_VIEW_ORDER)],
        vec![InlineButton::new("To'lovga o'tish", CALLBACK_CHECKOUT)],
    ]))
}

pub const UNKNOWN_ITEM_TOAST: &str = "Bu mahsulot topilmadi.";
pub const UNKNOWN_ACTION_TOAST: &str = "Noma'lum amal.";

pub const NO_ORDERS_YET: &str = "Sizda hozircha buyurtmalar yo'q. Menyudan mahsulot tanlang.";
pub const NO_ORDERS: &str = "Sizda hozircha buyurtmalar yo'q.";
pub const ORDER_CLEARED: &str = "✅ Buyurtmangiz tozalandi.";

fn numbered_lines(lines: &[CartLine]) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            format!(
                "{}. {} - {} so'm",
                index + 1,
                escape_html(&line.name),
                line.unit_price
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[must_use]
pub fn order_listing(lines: &[CartLine], total: u64) -> Outbound {
    Outbound::html(format!(
        "🧾 <b>Mening buyurtmalarim:</b>\n{}\n\n<b>💰 Jami:</b> {total} so'm",
        numbered_lines(lines)
    ))
}

pub const EMPTY_CART_TOAST: &str = "Buyurtma berilmagan. Avval buyurtma bering.";
pub const EMPTY_CART: &str = "Buyurtma berilmagan. Avval menyudan mahsulot tanlang.";
pub const CHECKOUT_READY_TOAST: &str = "Buyurtmangiz tayyor! To'lovga o'tishingiz mumkin.";

#[must_use]
pub fn checkout_summary(summary: &CheckoutSummary) -> Outbound {
    Outbound::html(format!(
        "🧾 <b>Sizning buyurtmangiz:</b>\n{}\n\n<b>💰 Umumiy:</b> {} so'm\n\nBuyurtmani yakunlash uchun pastdagi tugmani bosing:",
        numbered_lines(&summary.lines),
        summary.total
    ))
    .with_keyboard(Keyboard::Inline(vec![vec![InlineButton::new(
        "Buyurtmani tasdiqlash va to'lash",
        CALLBACK_CONFIRM_PAYMENT,
    )]]))
}

pub const NO_ORDER_TOAST: &str = "Buyurtma mavjud emas.";
pub const OPENING_PAYMENT_TOAST: &str = "To'lov oynasini ochamiz...";
pub const PAYMENT_UNAVAILABLE_TOAST: &str = "To'lov xizmati hozircha mavjud emas.";
pub const PAYMENT_SERVICE_ERROR: &str =
    "To'lov xizmatida xatolik yuz berdi. Iltimos, keyinroq urinib ko'ring.";

fn item_names(lines: &[CartLine]) -> String {
    lines
        .iter()
        .map(|line| line.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[must_use]
pub fn payment_received(receipt: &PaymentReceipt) -> String {
    format!(
        "✅ To'lovingiz qabul qilindi! Jami: {} so'm. Buyurtmangiz ({}) tez orada yetkazib beriladi!",
        receipt.paid_amount,
        item_names(&receipt.lines)
    )
}

/// Fulfillment notice for the owner
#[must_use]
pub fn owner_payment_notice(
    chat_id: i64,
    receipt: &PaymentReceipt,
    payment: &PaymentInfo,
) -> String {
    let unknown = "Nomaʼlum";
    let payer = payment.payer_name.as_deref().unwrap_or(unknown);
    let phone = payment
        .phone_number
        .as_deref()
        .unwrap_or("Nomaʼlum telefon");

    let address = payment.shipping_address.as_ref().map_or_else(
        || "Nomaʼlum shahar, Nomaʼlum koʻcha".to_string(),
        |address| {
            let mut text = format!("{}, {}", address.city, address.street_line1);
            if !address.street_line2.is_empty() {
                text.push_str(&format!(", {}", address.street_line2));
            }
            if !address.post_code.is_empty() {
                text.push_str(&format!(", Pochta indeksi: {}", address.post_code));
            }
            text
        },
    );

    let mut notice = format!(
        "Yangi to'lov qabul qilindi: {chat_id}, {payer} dan.\nBuyurtma: {}.\nJami: {} so'm.\nManzil: {address}.\nTelefon: {phone}",
        item_names(&receipt.lines),
        receipt.paid_amount
    );
    if receipt.mismatch {
        notice.push_str(&format!(
            "\n⚠️ To'langan summa savat summasidan farq qiladi: savat {} so'm.",
            receipt.cart_total
        ));
    }
    notice
}

// ─────────────────────────────────────────────────────────────────────────────
// Quiz
// ─────────────────────────────────────────────────────────────────────────────

/// `index` is zero-based
#[must_use]
pub fn quiz_question(index: usize, prompt: &str) -> String {
    format!("{}-savol: {prompt} = ?", index + 1)
}

#[must_use]
pub fn quiz_finished(correct: usize, total: usize) -> String {
    format!("Test yakunlandi: Siz {correct} / {total} ta savolga to'g'ri javob berdingiz.")
}

pub const QUIZ_AGAIN: &str = "Yana ishlamoqchimisiz? /quiz buyrug'ini bosing";

// ─────────────────────────────────────────────────────────────────────────────
// AI chat
// ─────────────────────────────────────────────────────────────────────────────

#[must_use]
pub fn ai_welcome(name: &str) -> String {
    format!(
        "Salom {}, men sun'iy intellektman. Sizga qanday yordam bera olaman?",
        display_name(name)
    )
}

pub const AI_PROCESSING: &str = "Sizning so'rovingizni qayta ishlamoqdaman. Bu bir necha soniya vaqt olishi mumkin, iltimos kuting...";
pub const AI_IMAGE_PROCESSING: &str =
    "Rasmni tahlil qilmoqdaman. Bu bir necha soniya vaqt olishi mumkin, iltimos kuting...";
pub const AI_ERROR: &str = "Sun'iy intellektdan javob olayotganda kutilmagan xatolik yuz berdi. Iltimos, keyinroq urinib ko'ring.";
pub const AI_IMAGE_ERROR: &str =
    "Rasmni tahlil qilishda xatolik yuz berdi. Iltimos, keyinroq urinib ko'ring.";
pub const AI_EMPTY_ANSWER: &str = "Kechirasiz, tushunmadim. Boshqa savol bering.";
pub const AI_VIDEO_UNSUPPORTED: &str =
    "Hozircha videoni tahlil qilish imkoniyati yo'q. Faqat rasmlarni tahlil qila olaman.";
pub const AI_MEDIA_UNSUPPORTED: &str = "Hozircha faqat matn va rasmlarni qabul qila olaman.";

// ─────────────────────────────────────────────────────────────────────────────
// Location and owner notices
// ─────────────────────────────────────────────────────────────────────────────

pub const LOCATION_RECEIVED: &str =
    "Manzilingiz qabul qilindi. Buyurtmangiz shu manzilga yetkaziladi.";

/// Starts with the `"<chat_id>, "` prefix so the owner can reply to it
#[must_use]
pub fn owner_location_note(chat_id: i64, name: &str) -> String {
    format!("{chat_id}, {name} dan yangi buyurtma uchun yetkazib berish manzili.")
}

/// Caption attached to media copies forwarded to the owner
#[must_use]
pub fn owner_media_caption(chat_id: i64, name: &str) -> String {
    format!("{chat_id}, {name}")
}

/// Notification about a message no handler consumed
#[must_use]
pub fn owner_fallback_notice(chat_id: i64, name: &str, kind: &EventKind) -> Outbound {
    let body = match kind {
        EventKind::Text(text) => format!("<b>Matn:</b> {}", escape_html(text)),
        EventKind::Voice { .. } => "<b>Ovozli xabar</b>".to_string(),
        EventKind::Photo { .. } => "<b>Rasm</b>".to_string(),
        EventKind::Video { .. } => "<b>Video</b>".to_string(),
        EventKind::VideoNote { .. } => "<b>Video qayd</b>".to_string(),
        EventKind::Contact(_) => "<b>Kontakt</b>".to_string(),
        EventKind::Location { .. } => "<b>Joylashuv</b>".to_string(),
        _ => "<b>Noma'lum turdagi xabar</b>".to_string(),
    };
    Outbound::html(format!(
        "{chat_id}, {} dan yangi xabar:\n{body}",
        escape_html(name)
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Owner
// ─────────────────────────────────────────────────────────────────────────────

pub const OWNER_GREETING: &str = "Assalomu alaykum! Siz bot egasi sifatida tayinlangansiz.";

pub const OWNER_HELP: &str = "Oddiy xabar yuborsangiz, u barcha foydalanuvchilarga tarqatiladi.\nFoydalanuvchiga javob berish uchun uning xabariga reply qiling.";

pub const MALFORMED_REPLY: &str =
    "❌ Replydan chat ID topilmadi. Iltimos, reply formatiga e'tibor bering (ID, text...).";

pub const RELAY_UNSUPPORTED: &str =
    "❌ Faqat matn, ovozli xabar, video, video qayd yoki rasm yuborish mumkin.";

/// Text relayed from the owner to a chat
#[must_use]
pub fn relay_text(text: &str) -> String {
    format!("Yaratuvchidan: {text}")
}

#[must_use]
pub fn relay_delivered(target: i64) -> String {
    format!("✅ Xabar {target} ga yuborildi.")
}

#[must_use]
pub fn relay_failed(target: i64) -> String {
    format!("Xabarni {target} ga yuborishda xatolik yuz berdi.")
}

#[must_use]
pub fn broadcast_finished(delivered: usize, removed: usize, failed: usize) -> String {
    format!(
        "✅ Barcha faol foydalanuvchilarga xabar yuborildi!\nYetkazildi: {delivered}, o'chirildi: {removed}, xatolik: {failed}"
    )
}

pub const BROADCAST_DIRECTORY_ERROR: &str =
    "❌ Foydalanuvchilar ro'yxatini olishda xatolik yuz berdi. Xabar yuborilmadi.";
