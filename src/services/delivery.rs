//! Delivery registration.

use crate::models::{DeliveryRecord, EntityKind};
use crate::services::sink::{MetadataRequest, MetadataSink, is_truthy};
use crate::{Error, Result};
use serde_json::Value;

/// Register `delivery` unless one with the same receiver and date exists.
///
/// Returns the backend's reply to the POST (usually the stored record with
/// its `delivery_id`).
///
/// # Errors
/// - [`Error::InvalidInput`] for an empty receiver or date, or a duplicate
/// - [`Error::Connection`] when the backend rejects the record
pub fn register_delivery(sink: &dyn MetadataSink, delivery: &DeliveryRecord) -> Result<Value> {
    if delivery.receiver_name.trim().is_empty() || delivery.date.trim().is_empty() {
        return Err(Error::InvalidInput(
            "delivery needs a receiver name and a date".to_string(),
        ));
    }

    let lookup = MetadataRequest::get(
        delivery.kind(),
        [
            ("receiver_name", delivery.receiver_name.as_str()),
            ("date", delivery.date.as_str()),
        ],
    )?;
    let existing = sink.send(&lookup)?;
    if is_truthy(&existing) {
        return Err(Error::InvalidInput(format!(
            "a delivery received by '{}' on {} already exists",
            delivery.receiver_name, delivery.date
        )));
    }

    let reply = sink.send(&MetadataRequest::post(EntityKind::Delivery, delivery)?)?;
    if !is_truthy(&reply) {
        return Err(Error::Connection(
            "delivery record was not accepted by the backend".to_string(),
        ));
    }

    log::info!(
        "Registered delivery for '{}' on {}",
        delivery.receiver_name,
        delivery.date
    );
    Ok(reply)
}
