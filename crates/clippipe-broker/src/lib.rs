#![deny(unreachable_patterns)]
//! AMQP messaging for the pipeline.
//!
//! This crate provides:
//! - Idempotent declaration of the queue topology (five primary queues, one
//!   fanout dead-letter exchange, one dead-letter queue)
//! - Persistent publishing of job envelopes
//! - A one-message-at-a-time consumer with manual ack and a
//!   reject-without-requeue failure policy

pub mod broker;
pub mod error;
pub mod queues;

pub use broker::{Broker, BrokerConfig, ConsumeOutcome};
pub use error::{BrokerError, BrokerResult};
pub use queues::{
    ANALYSE_QUEUE, COLLECT_QUEUE, COMPLETED_QUEUE, DEAD_LETTER_EXCHANGE, DEAD_LETTER_QUEUE,
    EDIT_QUEUE, TRANSCRIBE_QUEUE,
};
