//! qhop-client
//!
//! [`RabbitClient`] talks to a RabbitMQ node: queue metadata through the HTTP
//! management API and message moves over AMQP 0-9-1 with publisher confirms.

mod client;
pub use client::{RabbitClient, RabbitClientBuilder};

mod config;
pub use config::ClientConfig;

mod errors;
pub use errors::{ClientError, Result};

mod management;
mod message_mover;
