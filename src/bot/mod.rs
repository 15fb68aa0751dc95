/// Command and media message handlers
pub mod handlers;
/// Delivery sink backed by the Telegram API
pub mod sink;

pub use sink::TelegramSink;
