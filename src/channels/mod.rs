//! Mail I/O around the pipeline: the inbound webhook, the reply dispatcher,
//! and outbound transports.

pub mod reply;
pub mod transport;
pub mod webhook;

pub use reply::{InboundRequest, ReplyDispatcher};
pub use transport::{MailConfig, MailTransport, OutgoingEmail, create_transport};
pub use webhook::webhook_routes;
