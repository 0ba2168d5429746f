use kosh_core::{ErrorCategory, Inventory, decode_assignments, replace_assignments};
use kosh_test_support::{FakeInventory, Method};
use uuid::Uuid;

#[tokio::test]
async fn assignments_are_written_in_one_request_then_reread() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let rack = fake.add_rack("R1");
    let compute = fake.add_product("Compute", "cmp", 2);
    fake.add_slot(rack.id, &compute, 3);

    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let document = format!(
        r#"[
            {{"device_id": "{first}", "rack_unit_start": 3, "device_asset_tag": "AT-1"}},
            {{"device_id": "{second}", "rack_unit_start": 7}}
        ]"#
    );
    let records = decode_assignments(document.as_bytes())?;

    let result = replace_assignments(Inventory::new(&fake), rack.id, &records).await?;

    let path = format!("/rack/{}/assignment", rack.id);
    assert_eq!(fake.count_path(Method::Post, &path), 1);
    assert_eq!(fake.count_path(Method::Get, &path), 1);
    let calls = fake.calls();
    assert_eq!(calls[0].method, Method::Post);
    assert_eq!(calls[1].method, Method::Get);

    assert_eq!(result.len(), 2);
    assert_eq!(result[0].device_id, first);
    assert_eq!(result[0].hardware_product_name.as_deref(), Some("Compute"));
    assert_eq!(result[0].rack_unit_size, 2);
    assert_eq!(result[1].device_asset_tag, None);
    Ok(())
}

#[tokio::test]
async fn invalid_assignment_document_sends_nothing() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let rack = fake.add_rack("R1");
    let records = decode_assignments(br#"[{"rack_unit_start": 3}]"#)?;

    let err = replace_assignments(Inventory::new(&fake), rack.id, &records)
        .await
        .expect_err("missing device");

    assert_eq!(err.category(), ErrorCategory::InvalidInput);
    assert!(fake.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn rejected_batch_is_a_remote_failure() -> anyhow::Result<()> {
    let fake = FakeInventory::new();
    let rack = fake.add_rack("R1");
    fake.fail_nth(Method::Post, 1, 400);
    let records = decode_assignments(
        format!(r#"[{{"device_id": "{}", "rack_unit_start": 1}}]"#, Uuid::new_v4()).as_bytes(),
    )?;

    let err = replace_assignments(Inventory::new(&fake), rack.id, &records)
        .await
        .expect_err("rejected");

    assert_eq!(err.category(), ErrorCategory::Remote);
    assert_eq!(fake.count(Method::Get), 0);
    Ok(())
}
