use pretty_assertions::assert_eq;
use strata_sats::{TypeInfo, Value};
use strata_schema::{Column, IndexConstraint, Schema, SchemaError, Tag};
use strata_table::{ForeignKeyDefinition, ReferenceOption, RootValue, Row, TableError, PRIMARY_INDEX};

fn people_root() -> RootValue {
    let _ = env_logger::builder().is_test(true).try_init();
    let schema = Schema::new(vec![
        Column::primary_key(1u64, "id", TypeInfo::Int),
        Column::new(2u64, "name", TypeInfo::Text),
    ])
    .unwrap();
    let root = RootValue::new().create_table("people", schema).unwrap();
    root.insert_row("people", &Row::new().with(1u64, 1i64).with(2u64, "ann"))
        .unwrap()
        .insert_row("people", &Row::new().with(1u64, 2i64).with(2u64, "bob"))
        .unwrap()
}

fn customers_orders() -> RootValue {
    let customers = Schema::new(vec![
        Column::primary_key(1u64, "id", TypeInfo::Int),
        Column::new(2u64, "name", TypeInfo::Varchar { max_len: 20 }),
    ])
    .unwrap();
    let orders = Schema::new(vec![
        Column::primary_key(10u64, "id", TypeInfo::Int),
        Column::new(11u64, "customer_id", TypeInfo::Int),
    ])
    .unwrap();
    let root = RootValue::new()
        .create_table("customers", customers)
        .unwrap()
        .create_table("orders", orders)
        .unwrap()
        .insert_row("customers", &Row::new().with(1u64, 1i64).with(2u64, "ann"))
        .unwrap();
    let def = ForeignKeyDefinition {
        name: "fk_customer".into(),
        columns: vec!["Customer_ID".into()],
        referenced_table: "CUSTOMERS".into(),
        referenced_columns: vec!["id".into()],
        ..Default::default()
    };
    let (root, _) = root.create_foreign_key("orders", &def).unwrap();
    root.insert_row("orders", &Row::new().with(10u64, 100i64).with(11u64, 1i64))
        .unwrap()
}

#[test]
fn add_column_with_default_backfills_rows() {
    let root = people_root();
    let age = Column::new(Tag::INVALID, "age", TypeInfo::Int).with_default(0i64);
    let root = root.add_column("people", age, None).unwrap();

    let people = root.table("people").unwrap();
    let names = people.schema().columns().iter().map(|c| &*c.name).collect::<Vec<_>>();
    assert_eq!(names, ["id", "name", "age"]);
    let age_tag = people.schema().get_by_name("age").unwrap().tag;
    assert!(age_tag.is_valid());
    for row in people.rows() {
        assert_eq!(row.unwrap().get::<i64>(age_tag), Ok(0));
    }
}

#[test]
fn duplicate_unique_key_leaves_root_unchanged() {
    let (root, _) = people_root()
        .create_index("people", None, &["name"], IndexConstraint::Unique, "")
        .unwrap();
    let root = root
        .insert_row("people", &Row::new().with(1u64, 3i64).with(2u64, "cy"))
        .unwrap();
    let before = root.hash();

    let err = root
        .insert_row("people", &Row::new().with(1u64, 4i64).with(2u64, "cy"))
        .unwrap_err();
    assert!(matches!(err, TableError::UniqueConstraintViolation { .. }));
    assert!(err.is_integrity());
    assert_eq!(root.hash(), before);
    assert_eq!(root.table("people").unwrap().row_count(), 3);
}

#[test]
fn dropping_a_referenced_column_is_rejected() {
    let root = customers_orders();
    let before = root.hash();
    let err = root.drop_column("customers", "id").unwrap_err();
    assert!(matches!(err, TableError::ForeignKeyDependency { ref fk, .. } if &**fk == "fk_customer"));
    assert_eq!(root.hash(), before);

    let err = root.drop_column("orders", "customer_id").unwrap_err();
    assert!(matches!(err, TableError::ForeignKeyDependency { .. }));
    let err = root.drop_index("orders", "customer_id").unwrap_err();
    assert!(matches!(err, TableError::ForeignKeyDependency { .. }));
    let err = root.drop_table("customers").unwrap_err();
    assert!(matches!(err, TableError::ForeignKeyDependency { .. }));

    // Once the key is gone, all of them go through.
    let root = root.drop_foreign_key("fk_customer").unwrap();
    root.drop_column("orders", "customer_id").unwrap();
    root.drop_table("customers").unwrap();
    assert!(matches!(
        root.drop_foreign_key("fk_customer"),
        Err(TableError::ForeignKeyNotFound { .. })
    ));
}

#[test]
fn foreign_keys_resolve_names_at_read_time() {
    let root = customers_orders();
    let fk = root.foreign_key_collection().get("fk_customer").unwrap();
    assert_eq!(&*fk.referenced_table_name, "customers");
    assert_eq!(&*fk.referenced_table_index, PRIMARY_INDEX);
    assert_eq!(&*fk.table_index, "customer_id");

    let renamed = Column::new(Tag::INVALID, "buyer", TypeInfo::Int);
    let root = root.modify_column("orders", "customer_id", renamed, None).unwrap();
    let keys = root.get_foreign_keys("orders").unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].columns, vec![Box::from("buyer")]);
    assert_eq!(keys[0].referenced_columns, vec![Box::from("id")]);
    assert_eq!(keys[0].on_delete, ReferenceOption::DefaultAction);

    let root = root.rename_index("orders", "customer_id", "by_buyer").unwrap();
    assert_eq!(&*root.foreign_key_collection().get("fk_customer").unwrap().table_index, "by_buyer");
}

#[test]
fn invalid_foreign_keys_are_rejected_whole() {
    let root = customers_orders();
    let mut def = ForeignKeyDefinition {
        columns: vec!["customer_id".into()],
        referenced_table: "customers".into(),
        referenced_columns: vec!["name".into()],
        ..Default::default()
    };
    assert!(matches!(
        root.create_foreign_key("orders", &def),
        Err(TableError::ForeignKeyTypeMismatch { .. })
    ));

    def.referenced_columns = vec!["id".into(), "name".into()];
    assert!(matches!(
        root.create_foreign_key("orders", &def),
        Err(TableError::ForeignKeyColumnCountMismatch)
    ));

    def.referenced_columns = vec!["id".into()];
    def.referenced_table = "nobody".into();
    assert!(root.create_foreign_key("orders", &def).unwrap_err().is_not_found());

    def.referenced_table = "customers".into();
    def.name = "bad name".into();
    assert!(matches!(
        root.create_foreign_key("orders", &def),
        Err(TableError::Schema(SchemaError::InvalidIdentifier { .. }))
    ));

    // A dangling order makes the scan fail, and the supporting index is not kept.
    let dangling = root
        .drop_foreign_key("fk_customer")
        .unwrap()
        .insert_row("orders", &Row::new().with(10u64, 101i64).with(11u64, 9i64))
        .unwrap()
        .drop_index("orders", "customer_id")
        .unwrap();
    def.name = "".into();
    let err = dangling.create_foreign_key("orders", &def).unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot add foreign key to table `orders`: foreign key `orders_ibfk_1` violated by [9]"
    );
    assert!(dangling.table("orders").unwrap().schema().indexes().is_empty());
}

#[test]
fn parent_indexes_must_be_unique() {
    let root = customers_orders();
    let def = ForeignKeyDefinition {
        columns: vec!["id".into()],
        referenced_table: "orders".into(),
        referenced_columns: vec!["customer_id".into()],
        ..Default::default()
    };
    assert!(matches!(
        root.create_foreign_key("customers", &def),
        Err(TableError::MissingParentIndex { .. })
    ));
}

#[test]
fn set_null_columns_stay_nullable() {
    let root = customers_orders().drop_foreign_key("fk_customer").unwrap();
    let def = ForeignKeyDefinition {
        columns: vec!["customer_id".into()],
        referenced_table: "customers".into(),
        referenced_columns: vec!["id".into()],
        on_delete: ReferenceOption::SetNull,
        ..Default::default()
    };
    let (root, _) = root.create_foreign_key("orders", &def).unwrap();
    let not_null = Column::new(Tag::INVALID, "customer_id", TypeInfo::Int).not_null();
    let err = root.modify_column("orders", "customer_id", not_null, None).unwrap_err();
    assert!(matches!(err, TableError::ForeignKeyNullabilityConflict { .. }));

    let wider = Column::new(Tag::INVALID, "customer_id", TypeInfo::Uint);
    let err = root.modify_column("orders", "customer_id", wider, None).unwrap_err();
    assert!(matches!(err, TableError::ForeignKeyTypeMismatch { .. }));
}

#[test]
fn roots_persist_through_a_store() {
    let store = strata_store::MemoryValueStore::new();
    let root = customers_orders();
    let hash = root.write_to(&store).unwrap();
    let read = RootValue::read_from(&store, &hash).unwrap();
    assert_eq!(read.hash(), root.hash());
    assert_eq!(read.foreign_key_collection(), root.foreign_key_collection());
    assert_eq!(
        read.table("orders").unwrap().get_row(&[Value::Int(100)]).unwrap(),
        Some(Row::new().with(10u64, 100i64).with(11u64, 1i64))
    );
}
