//! Client role: delivers [`DeliveryRequest`]s pulled from a
//! [`DeliveryRequestHandler`] over one connection.
//!
//! [`DeliveryRequest`]: crate::delivery::DeliveryRequest
//! [`DeliveryRequestHandler`]: crate::delivery::DeliveryRequestHandler

mod content;
mod envelope;
mod exchange;
mod greeting;
mod hello;
mod reset;
mod session;
mod state;

pub use content::SendContentCodec;
pub use envelope::{EnvelopeState, SendEnvelopeCodec};
pub use greeting::ServiceReadyCodec;
pub use hello::HelloCodec;
pub use reset::{QuitCodec, ResetCodec};
pub use session::{ClientCodec, ClientSession, ClientSessionFactory};
pub use state::ClientState;
