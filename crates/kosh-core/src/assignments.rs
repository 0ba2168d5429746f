//! Device-to-rack-unit assignment replacement.
//!
//! The assignment endpoint takes the whole desired list in one request and
//! applies it atomically, so unlike layouts there is no partial state to
//! report.

use kosh_api_models::{DeviceAssignment, RackAssignment};
use tracing::info;
use uuid::Uuid;

use crate::api::Inventory;
use crate::client::ResourceClient;
use crate::codec::AssignmentRecord;
use crate::error::{CoreError, CoreResult};

/// Validate every record without touching the network.
///
/// # Errors
///
/// Returns the first [`CoreError::InvalidInput`] in document order.
pub fn validate_assignments(records: &[AssignmentRecord]) -> CoreResult<Vec<DeviceAssignment>> {
    records
        .iter()
        .enumerate()
        .map(|(row, record)| record.assignment(row))
        .collect()
}

/// Submit `records` as the complete assignment set for `rack_id` and return
/// the assignments as re-read from the server.
///
/// # Errors
///
/// Returns [`CoreError::InvalidInput`] before any request, or
/// [`CoreError::Remote`] when the write or the re-read fails.
pub async fn replace_assignments<C: ResourceClient + ?Sized>(
    inventory: Inventory<'_, C>,
    rack_id: Uuid,
    records: &[AssignmentRecord],
) -> CoreResult<Vec<RackAssignment>> {
    let desired = validate_assignments(records)?;
    info!(%rack_id, assignments = desired.len(), "replacing rack assignments");
    inventory
        .assign_devices(rack_id, &desired)
        .await
        .map_err(|err| CoreError::remote("assign devices", err))?;
    inventory
        .rack_assignments(rack_id)
        .await
        .map_err(|err| CoreError::remote("verify rack assignments", err))
}
