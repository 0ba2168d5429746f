//! Rack layout reconciliation.
//!
//! # Design
//! - The inventory service only offers per-slot create and delete, so a
//!   layout is replaced by deleting every current slot and then creating
//!   every desired one. All deletions precede all creations.
//! - Every record is validated before the first request; every product
//!   reference is resolved before the first mutation.
//! - Replacing a non-empty layout requires [`ReplacePolicy::Overwrite`].
//! - Failures after the first mutation surface as
//!   [`CoreError::PartialFailure`] with a [`ReplaceProgress`]. Nothing is
//!   rolled back; re-running the import from the same document repairs the
//!   rack.
//! - Two processes reconciling the same rack concurrently race; the service
//!   offers nothing to lock on.

use std::collections::HashMap;

use kosh_api_models::{HardwareProduct, LayoutSlot, LayoutSlotCreate};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::Inventory;
use crate::client::ResourceClient;
use crate::codec::{DesiredLayoutEntry, ProductRef, encode_layout};
use crate::error::{CoreError, CoreResult};
use crate::identity::Resolver;

/// Mutations completed by a layout replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceProgress {
    /// Slots slated for deletion.
    pub deletions_planned: usize,
    /// Slots deleted so far.
    pub deleted: usize,
    /// Slots slated for creation.
    pub creations_planned: usize,
    /// Slots created so far.
    pub created: usize,
}

impl ReplaceProgress {
    /// Returns `true` once every planned mutation has been applied.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.deleted == self.deletions_planned && self.created == self.creations_planned
    }
}

/// How to treat a rack that already has slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplacePolicy {
    /// Fail with [`CoreError::Conflict`] before mutating anything.
    #[default]
    RefuseExisting,
    /// Delete the existing slots.
    Overwrite,
}

impl ReplacePolicy {
    /// Policy for an `--overwrite` style flag.
    #[must_use]
    pub const fn from_overwrite(overwrite: bool) -> Self {
        if overwrite {
            Self::Overwrite
        } else {
            Self::RefuseExisting
        }
    }
}

/// A validated record whose product reference has not been resolved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEntry {
    /// Index of the record in the input document.
    pub row: usize,
    /// First rack unit.
    pub rack_unit_start: u32,
    /// Product reference to resolve.
    pub reference: ProductRef,
}

/// A desired slot with its product resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSlot {
    /// Index of the record in the input document.
    pub row: usize,
    /// First rack unit.
    pub rack_unit_start: u32,
    /// Resolved product.
    pub product: HardwareProduct,
}

/// Check every record without touching the network.
///
/// # Errors
///
/// Returns the first [`CoreError::InvalidInput`] in document order.
pub fn validate_entries(entries: &[DesiredLayoutEntry]) -> CoreResult<Vec<ValidatedEntry>> {
    entries
        .iter()
        .enumerate()
        .map(|(row, entry)| {
            Ok(ValidatedEntry {
                row,
                rack_unit_start: entry.ru_start,
                reference: entry.reference(row)?,
            })
        })
        .collect()
}

/// Ordered mutations that replace one rack's layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    /// Rack being rewritten.
    pub rack_id: Uuid,
    /// Slot ids to delete.
    pub deletions: Vec<Uuid>,
    /// Slots to create afterwards.
    pub creations: Vec<LayoutSlotCreate>,
}

impl LayoutPlan {
    /// Plan the full replacement of `current` by `desired`.
    #[must_use]
    pub fn replace(rack_id: Uuid, current: &[LayoutSlot], desired: &[ResolvedSlot]) -> Self {
        Self {
            rack_id,
            deletions: current.iter().map(|slot| slot.id).collect(),
            creations: desired
                .iter()
                .map(|slot| LayoutSlotCreate {
                    rack_id,
                    hardware_product_id: slot.product.id,
                    rack_unit_start: slot.rack_unit_start,
                })
                .collect(),
        }
    }

    /// Progress before anything has been applied.
    #[must_use]
    pub fn progress(&self) -> ReplaceProgress {
        ReplaceProgress {
            deletions_planned: self.deletions.len(),
            creations_planned: self.creations.len(),
            ..ReplaceProgress::default()
        }
    }
}

/// Replaces rack layouts, resolving product references through a
/// per-invocation [`Resolver`].
pub struct LayoutReconciler<'a, C: ?Sized> {
    resolver: Resolver<'a, C>,
}

impl<'a, C: ResourceClient + ?Sized> LayoutReconciler<'a, C> {
    /// Reconciler with a fresh identity cache.
    #[must_use]
    pub fn new(inventory: Inventory<'a, C>) -> Self {
        Self::with_resolver(Resolver::new(inventory))
    }

    /// Reconciler reusing an existing resolver and its cache.
    #[must_use]
    pub fn with_resolver(resolver: Resolver<'a, C>) -> Self {
        Self { resolver }
    }

    /// Hand the resolver back, cache included.
    #[must_use]
    pub fn into_resolver(self) -> Resolver<'a, C> {
        self.resolver
    }

    /// Resolve every record to a concrete product.
    ///
    /// Validation of the whole document happens first, so a malformed record
    /// anywhere fails before any lookup is issued.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`], [`CoreError::NotFound`], or
    /// [`CoreError::Remote`].
    pub async fn resolve(
        &mut self,
        entries: &[DesiredLayoutEntry],
    ) -> CoreResult<Vec<ResolvedSlot>> {
        let validated = validate_entries(entries)?;
        let mut resolved = Vec::with_capacity(validated.len());
        for entry in validated {
            let product = match entry.reference {
                ProductRef::Id(id) => self.resolver.product_by_id(id).await?,
                ProductRef::Name(name) => self.resolver.product_by_name(&name).await?,
                ProductRef::Alias(alias) => self.resolver.product_by_alias(&alias).await?,
                ProductRef::Exported { id, name, alias } => {
                    let product = self.resolver.product_by_id(id).await?;
                    let renamed = name.is_some_and(|name| name != product.name)
                        || alias.is_some_and(|alias| alias != product.alias);
                    if renamed {
                        warn!(
                            row = entry.row,
                            product_id = %id,
                            name = %product.name,
                            alias = %product.alias,
                            "product labels changed since export; using product id"
                        );
                    }
                    product
                }
            };
            resolved.push(ResolvedSlot {
                row: entry.row,
                rack_unit_start: entry.rack_unit_start,
                product,
            });
        }
        Ok(resolved)
    }

    /// Replace the layout of `rack_id` with `entries` and return the layout
    /// as re-read from the server.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] before any request.
    /// - [`CoreError::NotFound`] when a product or the rack does not exist.
    /// - [`CoreError::Conflict`] when the rack has slots and `policy` is
    ///   [`ReplacePolicy::RefuseExisting`]; nothing is mutated.
    /// - [`CoreError::PartialFailure`] when a delete or create fails.
    /// - [`CoreError::Remote`] for other read failures.
    pub async fn reconcile(
        &mut self,
        rack_id: Uuid,
        entries: &[DesiredLayoutEntry],
        policy: ReplacePolicy,
    ) -> CoreResult<Vec<LayoutSlot>> {
        let desired = self.resolve(entries).await?;
        let inventory = self.resolver.inventory();

        let current = inventory
            .rack_layout(rack_id)
            .await
            .map_err(|err| CoreError::remote("fetch rack layout", err))?;
        if !current.is_empty() && policy == ReplacePolicy::RefuseExisting {
            return Err(CoreError::Conflict {
                rack_id,
                existing: current.len(),
            });
        }

        let plan = LayoutPlan::replace(rack_id, &current, &desired);
        info!(
            %rack_id,
            deletions = plan.deletions.len(),
            creations = plan.creations.len(),
            "replacing rack layout"
        );
        let progress = self.apply(&plan).await?;
        info!(
            %rack_id,
            deleted = progress.deleted,
            created = progress.created,
            "rack layout replaced"
        );

        inventory
            .rack_layout(rack_id)
            .await
            .map_err(|err| CoreError::remote("verify rack layout", err))
    }

    async fn apply(&self, plan: &LayoutPlan) -> CoreResult<ReplaceProgress> {
        let inventory = self.resolver.inventory();
        let rack_id = plan.rack_id;
        let mut progress = plan.progress();

        for slot_id in &plan.deletions {
            if let Err(source) = inventory.delete_layout_slot(*slot_id).await {
                warn!(%rack_id, %slot_id, ?progress, "layout slot deletion failed");
                return Err(CoreError::PartialFailure {
                    rack_id,
                    progress,
                    source,
                });
            }
            progress.deleted += 1;
        }

        for create in &plan.creations {
            if let Err(source) = inventory.create_layout_slot(create).await {
                warn!(
                    %rack_id,
                    rack_unit_start = create.rack_unit_start,
                    ?progress,
                    "layout slot creation failed"
                );
                return Err(CoreError::PartialFailure {
                    rack_id,
                    progress,
                    source,
                });
            }
            progress.created += 1;
        }

        Ok(progress)
    }
}

/// Build the export document for `slots`, fetching each distinct product
/// once through `resolver`.
///
/// # Errors
///
/// Returns [`CoreError::NotFound`] when a slot references a product that no
/// longer exists, or [`CoreError::Remote`].
pub async fn export_layout<C: ResourceClient + ?Sized>(
    resolver: &mut Resolver<'_, C>,
    slots: &[LayoutSlot],
) -> CoreResult<Vec<DesiredLayoutEntry>> {
    let products = products_for(resolver, slots).await?;
    Ok(encode_layout(slots, &products))
}

/// Fetch every distinct product referenced by `slots`.
///
/// # Errors
///
/// Returns [`CoreError::NotFound`] or [`CoreError::Remote`].
pub async fn products_for<C: ResourceClient + ?Sized>(
    resolver: &mut Resolver<'_, C>,
    slots: &[LayoutSlot],
) -> CoreResult<HashMap<Uuid, HardwareProduct>> {
    let mut products = HashMap::new();
    for slot in slots {
        if products.contains_key(&slot.hardware_product_id) {
            continue;
        }
        let product = resolver.product_by_id(slot.hardware_product_id).await?;
        products.insert(product.id, product);
    }
    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ru: u32, name: Option<&str>, alias: Option<&str>) -> DesiredLayoutEntry {
        DesiredLayoutEntry {
            ru_start: ru,
            product_id: None,
            product_name: name.map(str::to_string),
            product_alias: alias.map(str::to_string),
        }
    }

    #[test]
    fn validation_reports_first_bad_row() {
        let entries = vec![
            entry(1, Some("a"), None),
            entry(3, None, None),
            entry(5, Some("b"), Some("c")),
        ];
        match validate_entries(&entries).expect_err("invalid") {
            CoreError::InvalidInput { row, .. } => assert_eq!(row, Some(1)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn plan_orders_every_deletion_before_creation() {
        let rack_id = Uuid::new_v4();
        let product = HardwareProduct {
            id: Uuid::new_v4(),
            name: "C".into(),
            alias: "c".into(),
            sku: None,
            rack_unit_size: Some(1),
        };
        let desired = vec![ResolvedSlot {
            row: 0,
            rack_unit_start: 10,
            product: product.clone(),
        }];
        let plan = LayoutPlan::replace(rack_id, &[], &desired);
        assert!(plan.deletions.is_empty());
        assert_eq!(
            plan.creations,
            vec![LayoutSlotCreate {
                rack_id,
                hardware_product_id: product.id,
                rack_unit_start: 10,
            }]
        );

        let progress = plan.progress();
        assert_eq!(progress.creations_planned, 1);
        assert!(!progress.is_complete());
    }

    #[test]
    fn policy_follows_overwrite_flag() {
        assert_eq!(ReplacePolicy::from_overwrite(true), ReplacePolicy::Overwrite);
        assert_eq!(ReplacePolicy::from_overwrite(false), ReplacePolicy::RefuseExisting);
    }
}
