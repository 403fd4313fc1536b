//! # parley-channels
//!
//! Channel adapters. Each adapter bridges a messaging surface to the bot
//! loop in `parley-runtime` by implementing the [`Channel`] trait.
//!
//! | Channel  | Transport                              |
//! |----------|----------------------------------------|
//! | Telegram | Bot API `getUpdates` long-poll         |
//! | Local    | In-process queues (terminal chat, tests) |

pub mod adapter;
pub mod local;
pub mod telegram;

pub use adapter::{Channel, ChannelEvent, IncomingMessage, OutgoingMessage};
pub use local::{LocalChannel, LocalSender};
pub use telegram::TelegramChannel;
