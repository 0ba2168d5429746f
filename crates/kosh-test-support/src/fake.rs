//! In-memory stand-in for the inventory service.
//!
//! [`FakeInventory`] implements [`ResourceClient`] by routing request paths
//! onto a small in-memory model. Every call is recorded in order, and
//! individual calls can be made to fail with a chosen status.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use kosh_api_models::{
    DeviceAssignment, DeviceSettings, HardwareProduct, LayoutSlot, LayoutSlotCreate, Rack,
    RackAssignment, RackCreate, RackRole, Room,
};
use kosh_core::{ClientError, ClientResult, ResourceClient};
use serde_json::Value;
use uuid::Uuid;

use crate::fixtures;

/// HTTP verb of a recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

/// One request observed by the fake.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Verb.
    pub method: Method,
    /// Request path as issued.
    pub path: String,
    /// JSON body for `POST`.
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    method: Method,
    nth: usize,
    status: u16,
}

#[derive(Default)]
struct InventoryState {
    products: Vec<HardwareProduct>,
    rooms: Vec<Room>,
    roles: Vec<RackRole>,
    racks: Vec<Rack>,
    slots: Vec<LayoutSlot>,
    assignments: HashMap<Uuid, Vec<RackAssignment>>,
    settings: HashMap<String, DeviceSettings>,
    calls: Vec<RecordedCall>,
    faults: Vec<Fault>,
}

type Routed = Result<Vec<u8>, (u16, String)>;

fn json_bytes<T: serde::Serialize + ?Sized>(value: &T) -> Routed {
    serde_json::to_vec(value).map_err(|err| (500, err.to_string()))
}

fn parse_id(raw: &str) -> Result<Uuid, (u16, String)> {
    Uuid::parse_str(raw).map_err(|_| (400, format!("invalid id {raw}")))
}

fn not_found(what: &str) -> (u16, String) {
    (404, format!("{what} not found"))
}

impl InventoryState {
    fn rack_exists(&self, id: Uuid) -> bool {
        self.racks.iter().any(|rack| rack.id == id)
    }

    fn get(&self, segments: &[String]) -> Routed {
        let parts: Vec<&str> = segments.iter().map(String::as_str).collect();
        match parts.as_slice() {
            ["hardware_product"] => json_bytes(&self.products),
            ["hardware_product", key] => {
                let found = if let Some(name) = key.strip_prefix("name=") {
                    self.products.iter().find(|p| p.name == name)
                } else if let Some(alias) = key.strip_prefix("alias=") {
                    self.products.iter().find(|p| p.alias == alias)
                } else {
                    let id = parse_id(key)?;
                    self.products.iter().find(|p| p.id == id)
                };
                found.map_or_else(|| Err(not_found("hardware product")), json_bytes)
            }
            ["room"] => json_bytes(&self.rooms),
            ["rack_role"] => json_bytes(&self.roles),
            ["rack"] => json_bytes(&self.racks),
            ["rack", id] => {
                let id = parse_id(id)?;
                self.racks
                    .iter()
                    .find(|rack| rack.id == id)
                    .map_or_else(|| Err(not_found("rack")), json_bytes)
            }
            ["rack", id, "layouts"] => {
                let id = parse_id(id)?;
                if !self.rack_exists(id) {
                    return Err(not_found("rack"));
                }
                let slots: Vec<&LayoutSlot> =
                    self.slots.iter().filter(|slot| slot.rack_id == id).collect();
                json_bytes(&slots)
            }
            ["rack", id, "assignment"] => {
                let id = parse_id(id)?;
                if !self.rack_exists(id) {
                    return Err(not_found("rack"));
                }
                json_bytes(self.assignments.get(&id).map_or(&[][..], Vec::as_slice))
            }
            ["device", device, "settings"] => {
                json_bytes(&self.settings.get(*device).cloned().unwrap_or_default())
            }
            ["device", device, "settings", key] => {
                let value = self
                    .settings
                    .get(*device)
                    .and_then(|settings| settings.get(*key))
                    .ok_or_else(|| not_found("setting"))?;
                let mut single = DeviceSettings::new();
                single.insert((*key).to_string(), value.clone());
                json_bytes(&single)
            }
            _ => Err(not_found("route")),
        }
    }

    fn post(&mut self, segments: &[String], body: &Value) -> Routed {
        let parts: Vec<&str> = segments.iter().map(String::as_str).collect();
        match parts.as_slice() {
            ["rack"] => {
                let request: RackCreate = decode(body)?;
                let room = self
                    .rooms
                    .iter()
                    .find(|room| room.id == request.datacenter_room_id)
                    .ok_or_else(|| not_found("room"))?;
                let role = self
                    .roles
                    .iter()
                    .find(|role| role.id == request.rack_role_id)
                    .ok_or_else(|| not_found("rack role"))?;
                let mut rack = fixtures::rack(&request.name, room, role);
                if let Some(phase) = request.phase {
                    rack.phase = phase;
                }
                self.racks.push(rack.clone());
                json_bytes(&rack)
            }
            ["rack", id] => {
                let id = parse_id(id)?;
                let rack = self
                    .racks
                    .iter_mut()
                    .find(|rack| rack.id == id)
                    .ok_or_else(|| not_found("rack"))?;
                apply_rack_update(rack, body)?;
                json_bytes(&*rack)
            }
            ["layout"] => {
                let request: LayoutSlotCreate = decode(body)?;
                if !self.rack_exists(request.rack_id) {
                    return Err(not_found("rack"));
                }
                let product = self
                    .products
                    .iter()
                    .find(|p| p.id == request.hardware_product_id)
                    .ok_or_else(|| not_found("hardware product"))?;
                let occupied = self.slots.iter().any(|slot| {
                    slot.rack_id == request.rack_id
                        && slot.rack_unit_start == request.rack_unit_start
                });
                if occupied {
                    return Err((409, "rack unit already occupied".to_string()));
                }
                let slot = fixtures::slot(request.rack_id, product, request.rack_unit_start);
                self.slots.push(slot.clone());
                json_bytes(&slot)
            }
            ["rack", id, "assignment"] => {
                let id = parse_id(id)?;
                if !self.rack_exists(id) {
                    return Err(not_found("rack"));
                }
                let requested: Vec<DeviceAssignment> = decode(body)?;
                let assigned: Vec<RackAssignment> = requested
                    .into_iter()
                    .map(|assignment| {
                        let slot = self.slots.iter().find(|slot| {
                            slot.rack_id == id && slot.rack_unit_start == assignment.rack_unit_start
                        });
                        let product = slot.and_then(|slot| {
                            self.products
                                .iter()
                                .find(|p| p.id == slot.hardware_product_id)
                        });
                        RackAssignment {
                            device_id: assignment.device_id,
                            device_asset_tag: assignment.device_asset_tag,
                            hardware_product_name: product.map(|p| p.name.clone()),
                            rack_unit_start: assignment.rack_unit_start,
                            rack_unit_size: slot.map_or(1, |slot| slot.rack_unit_size),
                        }
                    })
                    .collect();
                self.assignments.insert(id, assigned);
                Ok(Vec::new())
            }
            ["device", device, "settings", key] => {
                let value = body
                    .get(*key)
                    .cloned()
                    .ok_or_else(|| (400, format!("body is missing {key}")))?;
                self.settings
                    .entry((*device).to_string())
                    .or_default()
                    .insert((*key).to_string(), value);
                Ok(Vec::new())
            }
            _ => Err(not_found("route")),
        }
    }

    fn delete(&mut self, segments: &[String]) -> Result<(), (u16, String)> {
        let parts: Vec<&str> = segments.iter().map(String::as_str).collect();
        match parts.as_slice() {
            ["rack", id] => {
                let id = parse_id(id)?;
                let before = self.racks.len();
                self.racks.retain(|rack| rack.id != id);
                if self.racks.len() == before {
                    return Err(not_found("rack"));
                }
                self.slots.retain(|slot| slot.rack_id != id);
                self.assignments.remove(&id);
                Ok(())
            }
            ["layout", id] => {
                let id = parse_id(id)?;
                let before = self.slots.len();
                self.slots.retain(|slot| slot.id != id);
                if self.slots.len() == before {
                    return Err(not_found("layout slot"));
                }
                Ok(())
            }
            ["device", device, "settings", key] => self
                .settings
                .get_mut(*device)
                .and_then(|settings| settings.remove(*key))
                .map(|_| ())
                .ok_or_else(|| not_found("setting")),
            _ => Err(not_found("route")),
        }
    }

    /// Record the call and return the injected status when a fault matches.
    fn record(&mut self, method: Method, path: &str, body: Option<&Value>) -> Option<u16> {
        self.calls.push(RecordedCall {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });
        let seen = self.calls.iter().filter(|call| call.method == method).count();
        self.faults
            .iter()
            .find(|fault| fault.method == method && fault.nth == seen)
            .map(|fault| fault.status)
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &Value) -> Result<T, (u16, String)> {
    serde_json::from_value(body.clone()).map_err(|err| (400, err.to_string()))
}

fn text_field(body: &Value, field: &str) -> Result<Option<Option<String>>, (u16, String)> {
    match body.get(field) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(text)) => Ok(Some(Some(text.clone()))),
        Some(_) => Err((400, format!("{field} must be a string or null"))),
    }
}

fn id_field(body: &Value, field: &str) -> Result<Option<Uuid>, (u16, String)> {
    match body.get(field) {
        None => Ok(None),
        Some(value) => decode(value).map(Some),
    }
}

fn apply_rack_update(rack: &mut Rack, body: &Value) -> Result<(), (u16, String)> {
    if let Some(Some(name)) = text_field(body, "name")? {
        rack.name = name;
    }
    if let Some(Some(phase)) = text_field(body, "phase")? {
        rack.phase = phase;
    }
    if let Some(room) = id_field(body, "datacenter_room_id")? {
        rack.datacenter_room_id = room;
    }
    if let Some(role) = id_field(body, "rack_role_id")? {
        rack.rack_role_id = role;
    }
    if let Some(serial) = text_field(body, "serial_number")? {
        rack.serial_number = serial;
    }
    if let Some(tag) = text_field(body, "asset_tag")? {
        rack.asset_tag = tag;
    }
    Ok(())
}

fn segments(path: &str) -> Vec<String> {
    path.trim_start_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(segment)
                .map_or_else(|_| segment.to_string(), std::borrow::Cow::into_owned)
        })
        .collect()
}

/// In-memory inventory service implementing [`ResourceClient`].
#[derive(Default)]
pub struct FakeInventory {
    state: Mutex<InventoryState>,
}

impl FakeInventory {
    /// Empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InventoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a hardware product.
    pub fn insert_product(&self, product: HardwareProduct) -> HardwareProduct {
        self.state().products.push(product.clone());
        product
    }

    /// Register a new hardware product with a random id.
    pub fn add_product(&self, name: &str, alias: &str, rack_unit_size: u32) -> HardwareProduct {
        self.insert_product(fixtures::product(name, alias, rack_unit_size))
    }

    /// Register a room.
    pub fn add_room(&self, alias: &str) -> Room {
        let room = fixtures::room(alias);
        self.state().rooms.push(room.clone());
        room
    }

    /// Register a rack role.
    pub fn add_role(&self, name: &str, rack_size: u32) -> RackRole {
        let role = fixtures::rack_role(name, rack_size);
        self.state().roles.push(role.clone());
        role
    }

    /// Register a rack.
    pub fn insert_rack(&self, rack: Rack) -> Rack {
        self.state().racks.push(rack.clone());
        rack
    }

    /// Register a rack, creating a room and role for it.
    pub fn add_rack(&self, name: &str) -> Rack {
        let room = self.add_room("test-room");
        let role = self.add_role("test-role", 42);
        self.insert_rack(fixtures::rack(name, &room, &role))
    }

    /// Occupy `rack_unit_start` of `rack_id` with `product`.
    pub fn add_slot(
        &self,
        rack_id: Uuid,
        product: &HardwareProduct,
        rack_unit_start: u32,
    ) -> LayoutSlot {
        let slot = fixtures::slot(rack_id, product, rack_unit_start);
        self.state().slots.push(slot.clone());
        slot
    }

    /// Store a device setting.
    pub fn set_setting(&self, device: &str, key: &str, value: Value) {
        self.state()
            .settings
            .entry(device.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Fail the `nth` (1-based) call with `method` with `status`.
    pub fn fail_nth(&self, method: Method, nth: usize, status: u16) {
        self.state().faults.push(Fault {
            method,
            nth,
            status,
        });
    }

    /// Current slots of `rack_id`, in insertion order.
    #[must_use]
    pub fn slots(&self, rack_id: Uuid) -> Vec<LayoutSlot> {
        self.state()
            .slots
            .iter()
            .filter(|slot| slot.rack_id == rack_id)
            .cloned()
            .collect()
    }

    /// `rack_unit_start` to product id for `rack_id`, ordered by rack unit.
    #[must_use]
    pub fn slot_map(&self, rack_id: Uuid) -> Vec<(u32, Uuid)> {
        let mut mapping: Vec<(u32, Uuid)> = self
            .slots(rack_id)
            .into_iter()
            .map(|slot| (slot.rack_unit_start, slot.hardware_product_id))
            .collect();
        mapping.sort_unstable();
        mapping
    }

    /// Every recorded call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Verbs of every recorded call, in order.
    #[must_use]
    pub fn methods(&self) -> Vec<Method> {
        self.state().calls.iter().map(|call| call.method).collect()
    }

    /// Number of recorded calls with `method`.
    #[must_use]
    pub fn count(&self, method: Method) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    /// Number of recorded calls with `method` and exactly `path`.
    #[must_use]
    pub fn count_path(&self, method: Method, path: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }

    /// Forget recorded calls; the model is untouched.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

fn failure(path: &str, (status, message): (u16, String)) -> ClientError {
    ClientError::from_status(path, status, Some(message))
}

#[async_trait]
impl ResourceClient for FakeInventory {
    async fn get(&self, path: &str) -> ClientResult<Vec<u8>> {
        let mut state = self.state();
        if let Some(status) = state.record(Method::Get, path, None) {
            return Err(failure(path, (status, "injected failure".to_string())));
        }
        state.get(&segments(path)).map_err(|err| failure(path, err))
    }

    async fn post(&self, path: &str, body: &Value) -> ClientResult<Vec<u8>> {
        let mut state = self.state();
        if let Some(status) = state.record(Method::Post, path, Some(body)) {
            return Err(failure(path, (status, "injected failure".to_string())));
        }
        state
            .post(&segments(path), body)
            .map_err(|err| failure(path, err))
    }

    async fn delete(&self, path: &str) -> ClientResult<()> {
        let mut state = self.state();
        if let Some(status) = state.record(Method::Delete, path, None) {
            return Err(failure(path, (status, "injected failure".to_string())));
        }
        state.delete(&segments(path)).map_err(|err| failure(path, err))
    }
}
