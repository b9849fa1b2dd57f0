//! Server role: greets clients, answers envelope commands and hands each
//! received message to a [`DeliveryHandler`].
//!
//! [`DeliveryHandler`]: crate::validate::DeliveryHandler

mod content;
mod envelope;
mod greeting;
mod handlers;
mod quit;
mod session;
mod state;

pub use content::ReceiveContentCodec;
pub use envelope::ReceiveEnvelopeCodec;
pub use greeting::GreetingCodec;
pub use handlers::{Action, CommandHandlers, PendingAction};
pub use quit::DisconnectCodec;
pub use session::{ServerCodec, ServerServices, ServerSession, ServerSessionFactory};
pub use state::{ClientType, DataType, ServerState};
