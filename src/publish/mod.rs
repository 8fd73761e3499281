//! Announcing stored files to subscribers

pub mod rabbit;

pub use rabbit::RabbitPublisher;

use crate::error::PublishError;

/// Message bus announcing where a processed file can be fetched
#[cfg_attr(test, mockall::automock)]
pub trait Publisher {
    /// Sends one persistent message whose body is `resource_location`,
    /// tagged with `routing_key`
    fn publish(&self, routing_key: &str, resource_location: &str) -> Result<(), PublishError>;
}
