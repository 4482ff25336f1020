//! Gateway: the single HTTP endpoint that answers both conversational webhook
//! calls and agent tool calls.
//!
//! `POST /` classifies the body, maps it to a downstream action, calls the data
//! API and shapes the reply for whichever protocol the request arrived on.

mod fulfill;
pub mod reply;
mod server;

pub use fulfill::{Fulfiller, FulfillmentError};
pub use reply::Reply;
pub use server::{router, run_gateway, GatewayState, SERVICE_NAME};
