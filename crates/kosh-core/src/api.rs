//! Typed facade over a [`ResourceClient`].
//!
//! Each method maps one inventory endpoint onto a request path and decodes
//! the JSON body into the shared DTOs from `kosh-api-models`.

use kosh_api_models::{
    Device, DeviceAssignment, DevicePhase, DevicePhaseBody, DeviceSettings, HardwareProduct,
    LayoutSlot, LayoutSlotCreate, Rack, RackAssignment, RackCreate, RackRole, RackUpdate, Room,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::client::{ClientError, ClientResult, ResourceClient};

/// Percent-encode a single path segment.
#[must_use]
pub fn segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// Borrowing wrapper exposing typed inventory endpoints.
pub struct Inventory<'a, C: ?Sized> {
    client: &'a C,
}

impl<C: ?Sized> Clone for Inventory<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ?Sized> Copy for Inventory<'_, C> {}

impl<'a, C: ResourceClient + ?Sized> Inventory<'a, C> {
    /// Wrap a resource client.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Underlying resource client.
    #[must_use]
    pub const fn client(&self) -> &'a C {
        self.client
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let body = self.client.get(path).await?;
        serde_json::from_slice(&body).map_err(|source| ClientError::Decode {
            path: path.to_string(),
            source,
        })
    }

    async fn post_body<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<Vec<u8>> {
        let payload = serde_json::to_value(body).map_err(|source| ClientError::Encode {
            path: path.to_string(),
            source,
        })?;
        self.client.post(path, &payload).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.post_body(path, body).await?;
        serde_json::from_slice(&response).map_err(|source| ClientError::Decode {
            path: path.to_string(),
            source,
        })
    }

    /// `GET /hardware_product`
    pub async fn hardware_products(&self) -> ClientResult<Vec<HardwareProduct>> {
        self.get_json("/hardware_product").await
    }

    /// `GET /hardware_product/{id}`
    pub async fn hardware_product(&self, id: Uuid) -> ClientResult<HardwareProduct> {
        self.get_json(&format!("/hardware_product/{id}")).await
    }

    /// `GET /hardware_product/name={name}`
    pub async fn hardware_product_by_name(&self, name: &str) -> ClientResult<HardwareProduct> {
        self.get_json(&format!("/hardware_product/name={}", segment(name)))
            .await
    }

    /// `GET /hardware_product/alias={alias}`
    pub async fn hardware_product_by_alias(&self, alias: &str) -> ClientResult<HardwareProduct> {
        self.get_json(&format!("/hardware_product/alias={}", segment(alias)))
            .await
    }

    /// `GET /room`
    pub async fn rooms(&self) -> ClientResult<Vec<Room>> {
        self.get_json("/room").await
    }

    /// `GET /rack_role`
    pub async fn rack_roles(&self) -> ClientResult<Vec<RackRole>> {
        self.get_json("/rack_role").await
    }

    /// `GET /rack`
    pub async fn racks(&self) -> ClientResult<Vec<Rack>> {
        self.get_json("/rack").await
    }

    /// `GET /rack/{id}`
    pub async fn rack(&self, id: Uuid) -> ClientResult<Rack> {
        self.get_json(&format!("/rack/{id}")).await
    }

    /// `POST /rack`
    pub async fn create_rack(&self, request: &RackCreate) -> ClientResult<Rack> {
        self.post_json("/rack", request).await
    }

    /// `POST /rack/{id}`
    pub async fn update_rack(&self, id: Uuid, request: &RackUpdate) -> ClientResult<Rack> {
        self.post_json(&format!("/rack/{id}"), request).await
    }

    /// `DELETE /rack/{id}`
    pub async fn delete_rack(&self, id: Uuid) -> ClientResult<()> {
        self.client.delete(&format!("/rack/{id}")).await
    }

    /// `GET /rack/{id}/layouts`
    pub async fn rack_layout(&self, rack_id: Uuid) -> ClientResult<Vec<LayoutSlot>> {
        self.get_json(&format!("/rack/{rack_id}/layouts")).await
    }

    /// `POST /layout`
    pub async fn create_layout_slot(&self, request: &LayoutSlotCreate) -> ClientResult<LayoutSlot> {
        self.post_json("/layout", request).await
    }

    /// `DELETE /layout/{id}`
    pub async fn delete_layout_slot(&self, id: Uuid) -> ClientResult<()> {
        self.client.delete(&format!("/layout/{id}")).await
    }

    /// `GET /rack/{id}/assignment`
    pub async fn rack_assignments(&self, rack_id: Uuid) -> ClientResult<Vec<RackAssignment>> {
        self.get_json(&format!("/rack/{rack_id}/assignment")).await
    }

    /// `POST /rack/{id}/assignment`; the server applies the batch atomically.
    pub async fn assign_devices(
        &self,
        rack_id: Uuid,
        assignments: &[DeviceAssignment],
    ) -> ClientResult<()> {
        self.post_body(&format!("/rack/{rack_id}/assignment"), assignments)
            .await
            .map(|_| ())
    }

    /// `GET /device/{id}`; `device` is a UUID or a serial number.
    pub async fn device(&self, device: &str) -> ClientResult<Device> {
        self.get_json(&format!("/device/{}", segment(device))).await
    }

    /// `GET /device?{field}={value}`; exact-match search on a device field,
    /// a setting, or a `tag.`-prefixed tag.
    pub async fn find_devices(&self, field: &str, value: &str) -> ClientResult<Vec<Device>> {
        self.get_json(&format!("/device?{}={}", segment(field), segment(value)))
            .await
    }

    /// `GET /device/{id}/phase`
    pub async fn device_phase(&self, device: &str) -> ClientResult<DevicePhaseBody> {
        self.get_json(&format!("/device/{}/phase", segment(device)))
            .await
    }

    /// `POST /device/{id}/phase`
    pub async fn set_device_phase(&self, device: &str, phase: DevicePhase) -> ClientResult<()> {
        let body = serde_json::json!({ "id": device, "phase": phase });
        self.post_body(&format!("/device/{}/phase", segment(device)), &body)
            .await
            .map(|_| ())
    }

    /// `GET /device/{id}/settings`
    pub async fn device_settings(&self, device: &str) -> ClientResult<DeviceSettings> {
        self.get_json(&format!("/device/{}/settings", segment(device)))
            .await
    }

    /// `GET /device/{id}/settings/{key}`; the server answers with a
    /// single-key settings map.
    pub async fn device_setting(&self, device: &str, key: &str) -> ClientResult<Option<Value>> {
        let mut settings: DeviceSettings = self
            .get_json(&format!(
                "/device/{}/settings/{}",
                segment(device),
                segment(key)
            ))
            .await?;
        Ok(settings.remove(key))
    }

    /// `POST /device/{id}/settings/{key}`
    pub async fn set_device_setting(
        &self,
        device: &str,
        key: &str,
        value: &str,
    ) -> ClientResult<()> {
        let mut body = DeviceSettings::new();
        body.insert(key.to_string(), Value::String(value.to_string()));
        self.post_body(
            &format!("/device/{}/settings/{}", segment(device), segment(key)),
            &body,
        )
        .await
        .map(|_| ())
    }

    /// `DELETE /device/{id}/settings/{key}`
    pub async fn delete_device_setting(&self, device: &str, key: &str) -> ClientResult<()> {
        self.client
            .delete(&format!(
                "/device/{}/settings/{}",
                segment(device),
                segment(key)
            ))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_escapes_reserved_characters() {
        assert_eq!(segment("tag.rack"), "tag.rack");
        assert_eq!(segment("Joyent-Compute 2U"), "Joyent-Compute%202U");
        assert_eq!(segment("a/b"), "a%2Fb");
    }
}
