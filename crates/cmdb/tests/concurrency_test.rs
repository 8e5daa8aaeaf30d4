use std::sync::Arc;

use cmdb::{Cmdb, CmdbConfig, Options, TypeRegistry};

#[test]
fn shared_cmdb_serves_concurrent_writers() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = Cmdb::open(CmdbConfig::new(dir.path().join("cmdb.db"))).unwrap();
    db.add_schema("host", None).unwrap();
    db.add_field("host", "cpus", r#"{"type": {"name": "Int", "option": {"min": 1}}, "nullable": true, "unique": false}"#)
        .unwrap();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let db = &db;
            scope.spawn(move || {
                for i in 0..10 {
                    let entity = db.add_entity("host", &format!("w{worker}-{i}")).unwrap();
                    db.set_value(entity.id, "cpus", &(i + 1).to_string()).unwrap();
                }
            });
        }
    });

    let field = db.get_field("host", "cpus").unwrap().unwrap();
    assert_eq!(db.store().list_field_values(field.id).unwrap().len(), 40);
}

#[test]
fn racing_writers_cannot_share_a_unique_value() {
    let db = Cmdb::open_in_memory().unwrap();
    db.add_schema("host", None).unwrap();
    db.add_field("host", "ip", r#"{"type": "IP", "nullable": true}"#).unwrap();
    let entities: Vec<_> = (0..8)
        .map(|i| db.add_entity("host", &format!("web-{i}")).unwrap().id)
        .collect();

    let accepted = std::thread::scope(|scope| {
        let handles: Vec<_> = entities
            .iter()
            .map(|&id| {
                let db = &db;
                scope.spawn(move || db.set_value(id, "ip", "10.0.0.1").is_ok())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count()
    });

    assert_eq!(accepted, 1);
}

#[test]
fn concurrent_resolution_yields_one_instance_per_key() {
    let registry = Arc::new(TypeRegistry::with_builtins());

    let instances: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                scope.spawn(move || {
                    // Alternate key order and alias; all map to the same key.
                    let options = if i % 2 == 0 {
                        Options::new().with("min", 0).with("max", 10)
                    } else {
                        Options::new().with("max", 10).with("min", 0)
                    };
                    let name = if i % 3 == 0 { "Int" } else { "cmdb.types.Int" };
                    registry.resolve_instance(name, &options).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(registry.cached_instances(), 1);
}
