use kosh_core::{
    CoreError, DesiredLayoutEntry, ErrorCategory, Inventory, LayoutReconciler, ReplacePolicy,
    Resolver, decode_layout, export_layout,
};
use kosh_test_support::{FakeInventory, Method};
use uuid::Uuid;

fn by_name(ru: u32, name: &str) -> DesiredLayoutEntry {
    DesiredLayoutEntry {
        ru_start: ru,
        product_name: Some(name.to_string()),
        ..DesiredLayoutEntry::default()
    }
}

fn by_alias(ru: u32, alias: &str) -> DesiredLayoutEntry {
    DesiredLayoutEntry {
        ru_start: ru,
        product_alias: Some(alias.to_string()),
        ..DesiredLayoutEntry::default()
    }
}

fn by_id(ru: u32, id: Uuid) -> DesiredLayoutEntry {
    DesiredLayoutEntry {
        ru_start: ru,
        product_id: Some(id),
        ..DesiredLayoutEntry::default()
    }
}

fn mutations(fake: &FakeInventory) -> Vec<Method> {
    fake.methods()
        .into_iter()
        .filter(|method| *method != Method::Get)
        .collect()
}

#[tokio::test]
async fn overwrite_deletes_every_slot_before_creating_any() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let rack = fake.add_rack("R1");
    let a = fake.add_product("A", "a", 1);
    let b = fake.add_product("B", "b", 2);
    let c = fake.add_product("C", "c", 1);
    let d = fake.add_product("Dee", "D", 4);
    fake.add_slot(rack.id, &a, 1);
    fake.add_slot(rack.id, &b, 5);

    let mut reconciler = LayoutReconciler::new(Inventory::new(&fake));
    let desired = vec![by_name(1, "C"), by_alias(10, "D")];
    let result = reconciler
        .reconcile(rack.id, &desired, ReplacePolicy::Overwrite)
        .await?;

    assert_eq!(fake.slot_map(rack.id), vec![(1, c.id), (10, d.id)]);
    assert_eq!(result.len(), 2);
    assert_eq!(fake.count(Method::Delete), 2);
    assert_eq!(fake.count(Method::Post), 2);
    assert_eq!(
        mutations(&fake),
        vec![Method::Delete, Method::Delete, Method::Post, Method::Post]
    );
    Ok(())
}

#[tokio::test]
async fn existing_layout_without_overwrite_is_a_conflict() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let rack = fake.add_rack("R1");
    let a = fake.add_product("A", "a", 1);
    fake.add_slot(rack.id, &a, 1);

    let mut reconciler = LayoutReconciler::new(Inventory::new(&fake));
    let err = reconciler
        .reconcile(rack.id, &[by_name(3, "A")], ReplacePolicy::RefuseExisting)
        .await
        .expect_err("conflict");

    match err {
        CoreError::Conflict { rack_id, existing } => {
            assert_eq!(rack_id, rack.id);
            assert_eq!(existing, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(mutations(&fake).is_empty());
    assert_eq!(fake.slot_map(rack.id), vec![(1, a.id)]);
    Ok(())
}

#[tokio::test]
async fn empty_rack_accepts_import_without_overwrite() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let rack = fake.add_rack("R1");
    let a = fake.add_product("A", "a", 1);

    let mut reconciler = LayoutReconciler::new(Inventory::new(&fake));
    reconciler
        .reconcile(rack.id, &[by_name(7, "A")], ReplacePolicy::RefuseExisting)
        .await?;

    assert_eq!(fake.slot_map(rack.id), vec![(7, a.id)]);
    assert_eq!(fake.count(Method::Delete), 0);
    Ok(())
}

#[tokio::test]
async fn records_without_exactly_one_reference_fail_before_any_request() {
    let fake = FakeInventory::new();
    let rack = fake.add_rack("R1");
    fake.add_product("A", "a", 1);

    let missing = DesiredLayoutEntry {
        ru_start: 4,
        ..DesiredLayoutEntry::default()
    };
    let doubled = DesiredLayoutEntry {
        ru_start: 4,
        product_name: Some("A".into()),
        product_alias: Some("a".into()),
        ..DesiredLayoutEntry::default()
    };

    for (bad, row) in [(missing, 1_usize), (doubled, 1_usize)] {
        let mut reconciler = LayoutReconciler::new(Inventory::new(&fake));
        let desired = vec![by_name(1, "A"), bad];
        let err = reconciler
            .reconcile(rack.id, &desired, ReplacePolicy::Overwrite)
            .await
            .expect_err("invalid input");
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
        assert!(matches!(err, CoreError::InvalidInput { row: Some(r), .. } if r == row));
    }
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn every_reference_field_yields_the_same_layout() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let product = fake.add_product("Joyent-Compute-Platform", "compute", 2);
    let variants = [
        by_id(12, product.id),
        by_name(12, "Joyent-Compute-Platform"),
        by_alias(12, "compute"),
    ];

    let mut mappings = Vec::new();
    for (index, entry) in variants.into_iter().enumerate() {
        let rack = fake.add_rack(&format!("rack-{index}"));
        let mut reconciler = LayoutReconciler::new(Inventory::new(&fake));
        reconciler
            .reconcile(rack.id, &[entry], ReplacePolicy::Overwrite)
            .await?;
        mappings.push(fake.slot_map(rack.id));
    }

    assert_eq!(mappings[0], vec![(12, product.id)]);
    assert_eq!(mappings[0], mappings[1]);
    assert_eq!(mappings[1], mappings[2]);
    Ok(())
}

#[tokio::test]
async fn export_then_import_reproduces_the_layout() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let source = fake.add_rack("source");
    let target = fake.add_rack("target");
    let compute = fake.add_product("Compute", "cmp", 2);
    let storage = fake.add_product("Storage", "sto", 4);
    let switch = fake.add_product("Switch", "sw", 1);
    fake.add_slot(source.id, &switch, 42);
    fake.add_slot(source.id, &compute, 3);
    fake.add_slot(source.id, &storage, 10);
    fake.add_slot(source.id, &compute, 20);
    fake.add_slot(target.id, &switch, 1);

    let inventory = Inventory::new(&fake);
    let slots = inventory.rack_layout(source.id).await?;
    let mut resolver = Resolver::new(inventory);
    let exported = export_layout(&mut resolver, &slots).await?;
    let order: Vec<u32> = exported.iter().map(|entry| entry.ru_start).collect();
    assert_eq!(order, vec![42, 20, 10, 3]);

    let document = serde_json::to_vec_pretty(&exported)?;
    let desired = decode_layout(&document)?;
    let mut reconciler = LayoutReconciler::with_resolver(resolver);
    reconciler
        .reconcile(target.id, &desired, ReplacePolicy::Overwrite)
        .await?;

    assert_eq!(fake.slot_map(target.id), fake.slot_map(source.id));
    Ok(())
}

#[tokio::test]
async fn export_shape_trusts_product_id_over_stale_labels() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let rack = fake.add_rack("R1");
    let compute = fake.add_product("Compute", "cmp", 2);
    fake.add_product("Storage", "sto", 4);

    // Labels recorded before the product was renamed.
    let entry = DesiredLayoutEntry {
        ru_start: 5,
        product_id: Some(compute.id),
        product_name: Some("Storage".into()),
        product_alias: Some("cmp-old".into()),
    };
    let mut reconciler = LayoutReconciler::new(Inventory::new(&fake));
    reconciler
        .reconcile(rack.id, &[entry], ReplacePolicy::Overwrite)
        .await?;

    assert_eq!(fake.slot_map(rack.id), vec![(5, compute.id)]);
    Ok(())
}

#[tokio::test]
async fn product_without_alias_survives_export_and_import() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let source = fake.add_rack("source");
    let target = fake.add_rack("target");
    let bare = fake.add_product("NoAlias", "", 1);
    let compute = fake.add_product("Compute", "cmp", 2);
    fake.add_slot(source.id, &bare, 3);
    fake.add_slot(source.id, &compute, 7);

    let inventory = Inventory::new(&fake);
    let slots = inventory.rack_layout(source.id).await?;
    let mut resolver = Resolver::new(inventory);
    let exported = export_layout(&mut resolver, &slots).await?;
    let document = serde_json::to_vec(&exported)?;
    assert!(!String::from_utf8_lossy(&document).contains(r#""product_alias":"""#));

    let desired = decode_layout(&document)?;
    let mut reconciler = LayoutReconciler::with_resolver(resolver);
    reconciler
        .reconcile(target.id, &desired, ReplacePolicy::Overwrite)
        .await?;

    assert_eq!(fake.slot_map(target.id), vec![(3, bare.id), (7, compute.id)]);
    Ok(())
}

#[tokio::test]
async fn failed_create_reports_progress_without_rollback() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let rack = fake.add_rack("R1");
    let a = fake.add_product("A", "a", 1);
    let b = fake.add_product("B", "b", 1);
    fake.add_slot(rack.id, &a, 1);
    fake.add_slot(rack.id, &a, 2);
    fake.fail_nth(Method::Post, 2, 500);

    let mut reconciler = LayoutReconciler::new(Inventory::new(&fake));
    let desired = vec![by_name(1, "B"), by_name(2, "B"), by_name(3, "B")];
    let err = reconciler
        .reconcile(rack.id, &desired, ReplacePolicy::Overwrite)
        .await
        .expect_err("partial failure");

    match err {
        CoreError::PartialFailure {
            rack_id,
            progress,
            source,
        } => {
            assert_eq!(rack_id, rack.id);
            assert_eq!(progress.deletions_planned, 2);
            assert_eq!(progress.deleted, 2);
            assert_eq!(progress.creations_planned, 3);
            assert_eq!(progress.created, 1);
            assert!(!progress.is_complete());
            assert_eq!(source.status(), Some(500));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fake.slot_map(rack.id), vec![(1, b.id)]);
    assert_eq!(fake.count(Method::Post), 2);
    Ok(())
}

#[tokio::test]
async fn failed_delete_stops_before_any_create() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let rack = fake.add_rack("R1");
    let a = fake.add_product("A", "a", 1);
    fake.add_slot(rack.id, &a, 1);
    fake.add_slot(rack.id, &a, 2);
    fake.fail_nth(Method::Delete, 2, 503);

    let mut reconciler = LayoutReconciler::new(Inventory::new(&fake));
    let err = reconciler
        .reconcile(rack.id, &[by_alias(9, "a")], ReplacePolicy::Overwrite)
        .await
        .expect_err("partial failure");

    assert_eq!(err.category(), ErrorCategory::PartialFailure);
    if let CoreError::PartialFailure { progress, .. } = err {
        assert_eq!(progress.deleted, 1);
        assert_eq!(progress.created, 0);
    }
    assert_eq!(fake.count(Method::Post), 0);
    assert_eq!(fake.slots(rack.id).len(), 1);
    Ok(())
}

#[tokio::test]
async fn repeated_products_are_looked_up_once() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let rack = fake.add_rack("R1");
    let c = fake.add_product("C", "c", 1);

    let desired = vec![
        by_name(1, "C"),
        by_name(2, "C"),
        by_name(3, "C"),
        by_id(4, c.id),
        by_alias(5, "c"),
        by_alias(6, "c"),
    ];
    let mut reconciler = LayoutReconciler::new(Inventory::new(&fake));
    reconciler
        .reconcile(rack.id, &desired, ReplacePolicy::Overwrite)
        .await?;

    assert_eq!(fake.count_path(Method::Get, "/hardware_product/name=C"), 1);
    assert_eq!(fake.count_path(Method::Get, "/hardware_product/alias=c"), 1);
    assert_eq!(
        fake.count_path(Method::Get, &format!("/hardware_product/{}", c.id)),
        0
    );
    assert_eq!(fake.slots(rack.id).len(), 6);
    Ok(())
}

#[tokio::test]
async fn unknown_product_is_not_found_and_mutates_nothing() {
    let fake = FakeInventory::new();
    let rack = fake.add_rack("R1");
    let a = fake.add_product("A", "a", 1);
    fake.add_slot(rack.id, &a, 1);

    let mut reconciler = LayoutReconciler::new(Inventory::new(&fake));
    let err = reconciler
        .reconcile(rack.id, &[by_name(1, "missing")], ReplacePolicy::Overwrite)
        .await
        .expect_err("not found");

    assert_eq!(err.category(), ErrorCategory::NotFound);
    assert!(mutations(&fake).is_empty());
}

#[tokio::test]
async fn empty_document_clears_the_rack() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let rack = fake.add_rack("R1");
    let a = fake.add_product("A", "a", 1);
    fake.add_slot(rack.id, &a, 1);

    let mut reconciler = LayoutReconciler::new(Inventory::new(&fake));
    let result = reconciler
        .reconcile(rack.id, &decode_layout(b"[]")?, ReplacePolicy::Overwrite)
        .await?;

    assert!(result.is_empty());
    assert_eq!(fake.count(Method::Delete), 1);
    Ok(())
}
