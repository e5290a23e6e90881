//! End-to-end deserialization tests over on-disk datapackages.
//!
//! Each test writes a small package into a temp directory and runs the
//! full pipeline: manifest, CSV resources, foreign keys, typemap
//! construction, time index assembly.

use std::fs;
use std::path::Path;

use enerpack_core::{EnerpackError, FacadeKind, FieldValue, Node};
use enerpack_io::{deserialize_energy_system, reader, ConstraintKind};

fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn dispatch_package(root: &Path) {
    write_file(
        root,
        "datapackage.json",
        r#"{
            "name": "dispatch-test",
            "version": "1.0.0",
            "resources": [
                {"name": "bus", "path": "data/hubs/bus.csv"},
                {
                    "name": "load",
                    "path": "data/elements/load.csv",
                    "schema": {
                        "primaryKey": "name",
                        "foreignKeys": [
                            {"fields": "bus", "reference": {"resource": "bus", "fields": "name"}},
                            {"fields": "profile", "reference": {"resource": "load_profile"}}
                        ]
                    }
                },
                {
                    "name": "dispatchable",
                    "path": "data/elements/dispatchable.csv",
                    "schema": {
                        "primaryKey": "name",
                        "foreignKeys": [
                            {"fields": "bus", "reference": {"resource": "bus", "fields": "name"}}
                        ]
                    }
                },
                {"name": "load_profile", "path": "data/sequences/load_profile.csv"}
            ]
        }"#,
    );
    write_file(root, "data/hubs/bus.csv", "name,type,balanced\nel,bus,true\n");
    write_file(
        root,
        "data/elements/load.csv",
        "name,type,bus,amount,profile\ndemand-el,load,el,100,electricity-load\n",
    );
    write_file(
        root,
        "data/elements/dispatchable.csv",
        "name,type,bus,carrier,tech,capacity,marginal_cost\n\
         gen-gas,dispatchable,el,gas,ccgt,1000,25\n",
    );
    write_file(
        root,
        "data/sequences/load_profile.csv",
        "timeindex,electricity-load\n\
         2024-01-01T00:00:00,0.3\n\
         2024-01-01T01:00:00,0.2\n\
         2024-01-01T02:00:00,0.5\n",
    );
}

#[test]
fn test_simple_dispatch_scenario() {
    let dir = tempfile::tempdir().unwrap();
    dispatch_package(dir.path());

    let result = deserialize_energy_system(dir.path()).unwrap();
    let system = &result.system;

    let stats = system.stats();
    assert_eq!(stats.num_buses, 1, "expected exactly one bus");
    assert_eq!(stats.num_components, 2, "expected two non-bus components");
    assert_eq!(system.timeindex.len(), 3, "time index inferred from the load profile");
    assert_eq!(result.diagnostics.error_count(), 0);

    // The load's profile foreign key resolved into the sequence column
    let Some(Node::Component(load)) = system.node("demand-el") else {
        panic!("load facade missing");
    };
    match &load.kind {
        FacadeKind::Load(payload) => {
            assert_eq!(payload.amount, 100.0);
            assert_eq!(payload.profile, FieldValue::Series(vec![0.3, 0.2, 0.5]));
        }
        other => panic!("unexpected kind {:?}", other.name()),
    }

    // Flows: bus -> load, generator -> bus
    let flows = system.flows();
    assert_eq!(flows.len(), 2);
    assert!(flows.iter().any(|(s, t, _)| *s == "el" && *t == "demand-el"));
    assert!(flows.iter().any(|(s, t, _)| *s == "gen-gas" && *t == "el"));
}

#[test]
fn test_version_mismatch_is_nonfatal() {
    let dir = tempfile::tempdir().unwrap();
    dispatch_package(dir.path());
    let manifest = dir.path().join("datapackage.json");
    let raw = fs::read_to_string(&manifest)
        .unwrap()
        .replace("\"1.0.0\"", "\"2.3.0\"");
    fs::write(&manifest, raw).unwrap();

    let result = deserialize_energy_system(dir.path()).unwrap();
    assert!(result
        .diagnostics
        .issues
        .iter()
        .any(|i| i.category == "descriptor" && i.message.contains("2.3.0")));
}

#[test]
fn test_buses_inferred_from_node_lists() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "datapackage.json",
        r#"{
            "name": "inference-test",
            "resources": [
                {"name": "shortage", "path": "data/elements/shortage.csv"}
            ]
        }"#,
    );
    write_file(
        dir.path(),
        "data/elements/shortage.csv",
        "name,type,successors,marginal_cost\nslack-heat,shortage,heat-bus,3000\n",
    );

    let result = deserialize_energy_system(dir.path()).unwrap();
    let system = &result.system;
    assert_eq!(system.stats().num_buses, 1);
    assert!(system.node("heat-bus").is_some());
    // A single-step default index: no sequences anywhere
    assert_eq!(system.timeindex.len(), 1);
}

#[test]
fn test_cyclic_foreign_keys_detected() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "datapackage.json",
        r#"{
            "name": "cycle-test",
            "resources": [
                {"name": "bus", "path": "data/hubs/bus.csv"},
                {
                    "name": "first",
                    "path": "data/elements/first.csv",
                    "schema": {"foreignKeys": [
                        {"fields": "partner", "reference": {"resource": "second"}}
                    ]}
                },
                {
                    "name": "second",
                    "path": "data/elements/second.csv",
                    "schema": {"foreignKeys": [
                        {"fields": "partner", "reference": {"resource": "first"}}
                    ]}
                }
            ]
        }"#,
    );
    write_file(dir.path(), "data/hubs/bus.csv", "name,type\nel,bus\n");
    write_file(
        dir.path(),
        "data/elements/first.csv",
        "name,type,bus,partner\na,excess,el,b\n",
    );
    write_file(
        dir.path(),
        "data/elements/second.csv",
        "name,type,bus,partner\nb,excess,el,a\n",
    );

    let err = deserialize_energy_system(dir.path()).unwrap_err();
    assert!(matches!(err, EnerpackError::Validation(_)));
    assert!(err.to_string().contains("cyclic foreign-key reference"));
}

#[test]
fn test_differing_sequence_indices_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "datapackage.json",
        r#"{
            "name": "mismatch-test",
            "resources": [
                {"name": "bus", "path": "data/hubs/bus.csv"},
                {"name": "profile_a", "path": "data/sequences/profile_a.csv"},
                {"name": "profile_b", "path": "data/sequences/profile_b.csv"}
            ]
        }"#,
    );
    write_file(dir.path(), "data/hubs/bus.csv", "name,type\nel,bus\n");
    write_file(
        dir.path(),
        "data/sequences/profile_a.csv",
        "timeindex,x\n2024-01-01T00:00:00,1.0\n",
    );
    write_file(
        dir.path(),
        "data/sequences/profile_b.csv",
        "timeindex,y\n2024-06-01T00:00:00,1.0\n",
    );

    let err = deserialize_energy_system(dir.path()).unwrap_err();
    assert!(err.to_string().contains("timeindices in resources differ"));
}

#[test]
fn test_duplicate_element_names_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "datapackage.json",
        r#"{
            "name": "duplicate-test",
            "resources": [
                {"name": "bus", "path": "data/hubs/bus.csv"},
                {"name": "first", "path": "data/elements/first.csv"},
                {"name": "second", "path": "data/elements/second.csv"}
            ]
        }"#,
    );
    write_file(dir.path(), "data/hubs/bus.csv", "name,type\nel,bus\n");
    write_file(
        dir.path(),
        "data/elements/first.csv",
        "name,type,bus\nslack,excess,el\n",
    );
    write_file(
        dir.path(),
        "data/elements/second.csv",
        "name,type,bus\nslack,shortage,el\n",
    );

    let err = deserialize_energy_system(dir.path()).unwrap_err();
    assert!(err.to_string().contains("slack"));
}

#[test]
fn test_multi_period_expansion_rules() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "datapackage.json",
        r#"{
            "name": "periods-test",
            "resources": [
                {"name": "bus", "path": "data/hubs/bus.csv"},
                {"name": "periods", "path": "data/periods/periods.csv"},
                {"name": "dispatchable", "path": "data/elements/dispatchable.csv"}
            ]
        }"#,
    );
    write_file(dir.path(), "data/hubs/bus.csv", "name,type\nel,bus\n");
    write_file(
        dir.path(),
        "data/periods/periods.csv",
        "timeindex,timeincrement,periods\n\
         2020-01-01T00:00:00,1,0\n\
         2020-01-01T01:00:00,1,0\n\
         2030-01-01T00:00:00,1,1\n\
         2030-01-01T01:00:00,1,1\n",
    );
    write_file(
        dir.path(),
        "data/elements/dispatchable.csv",
        "name,type,bus,carrier,tech,capacity,capacity_cost,fixed_costs,expandable\n\
         gen-1,dispatchable,el,gas,ccgt,100,\"[10, 20]\",\"[5, 7]\",true\n",
    );

    let result = deserialize_energy_system(dir.path()).unwrap();
    let system = &result.system;
    assert_eq!(system.timeindex.len(), 4);
    assert_eq!(system.periods.as_ref().unwrap().count(), 2);

    let Some(Node::Component(facade)) = system.node("gen-1") else {
        panic!("generator missing");
    };
    match &facade.kind {
        FacadeKind::Dispatchable(payload) => {
            // Periodic attribute preserved as the literal per-period list
            assert_eq!(
                payload.capacity_cost,
                Some(FieldValue::Series(vec![10.0, 20.0]))
            );
            // Yearly attribute expanded per calendar year: 2020..2030 plus
            // one year for the final period
            let fixed = payload.fixed_costs.as_ref().unwrap().as_series().unwrap();
            assert_eq!(fixed.len(), 11);
            assert_eq!(fixed[0], 5.0);
            assert_eq!(fixed[10], 7.0);
        }
        other => panic!("unexpected kind {:?}", other.name()),
    }

    // Heuristic expansion is flagged
    assert!(result
        .diagnostics
        .issues
        .iter()
        .any(|i| i.category == "expansion" && i.message.contains("fixed_costs")));
}

#[test]
fn test_reservoir_subnode_enters_graph_with_parent() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "datapackage.json",
        r#"{
            "name": "reservoir-test",
            "resources": [
                {"name": "bus", "path": "data/hubs/bus.csv"},
                {
                    "name": "reservoir",
                    "path": "data/elements/reservoir.csv",
                    "schema": {"foreignKeys": [
                        {"fields": "profile", "reference": {"resource": "inflow"}}
                    ]}
                },
                {"name": "inflow", "path": "data/sequences/inflow.csv"}
            ]
        }"#,
    );
    write_file(dir.path(), "data/hubs/bus.csv", "name,type\nel,bus\n");
    write_file(
        dir.path(),
        "data/elements/reservoir.csv",
        "name,type,bus,carrier,tech,storage_capacity,capacity,profile\n\
         hydro-1,reservoir,el,hydro,reservoir,1000,50,natural-inflow\n",
    );
    write_file(
        dir.path(),
        "data/sequences/inflow.csv",
        "timeindex,natural-inflow\n\
         2024-01-01T00:00:00,10\n\
         2024-01-01T01:00:00,12\n",
    );

    let result = deserialize_energy_system(dir.path()).unwrap();
    let system = &result.system;
    assert_eq!(result.diagnostics.stats.subnodes, 1);
    assert!(system.node("hydro-1").is_some());
    assert!(system.node("hydro-1-inflow").is_some());
    // inflow -> reservoir, reservoir -> bus
    let flows = system.flows();
    assert!(flows
        .iter()
        .any(|(s, t, _)| *s == "hydro-1-inflow" && *t == "hydro-1"));
    assert!(flows.iter().any(|(s, t, _)| *s == "hydro-1" && *t == "el"));
}

#[test]
fn test_constraints_resource() {
    let dir = tempfile::tempdir().unwrap();
    dispatch_package(dir.path());
    // Extend the manifest with a constraints resource
    let manifest = dir.path().join("datapackage.json");
    let raw = fs::read_to_string(&manifest).unwrap().replace(
        r#"{"name": "load_profile", "path": "data/sequences/load_profile.csv"}"#,
        r#"{"name": "load_profile", "path": "data/sequences/load_profile.csv"},
           {"name": "emission_limit", "path": "data/constraints/emission_limit.csv"}"#,
    );
    fs::write(&manifest, raw).unwrap();
    write_file(
        dir.path(),
        "data/constraints/emission_limit.csv",
        "name,type,keyword,limit\nco2-cap,generic_integral_limit,emission_factor,1000\n",
    );

    let result = deserialize_energy_system(dir.path()).unwrap();
    assert_eq!(result.constraints.len(), 1);
    assert_eq!(
        result.constraints[0].kind,
        ConstraintKind::GenericIntegralLimit {
            keyword: "emission_factor".into(),
            limit: 1000.0
        }
    );
    let expr = result.constraints[0]
        .build_constraint(&result.system)
        .unwrap();
    assert_eq!(expr.upper_bound, 1000.0);
}

#[test]
fn test_malformed_resource_names_the_resource() {
    let dir = tempfile::tempdir().unwrap();
    dispatch_package(dir.path());
    write_file(
        dir.path(),
        "data/elements/dispatchable.csv",
        "name,type,bus,node_parameters\ngen-gas,dispatchable,el,\"{broken\"\n",
    );

    let err = deserialize_energy_system(dir.path()).unwrap_err();
    assert!(matches!(err, EnerpackError::Parse(_)));
    assert!(err.to_string().contains("dispatchable"));
}

#[test]
fn test_elements_roundtrip_through_reader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.csv");
    let header = "name,type,bus,carrier,tech,storage_capacity,capacity,efficiency";
    let rows = [
        ("battery-1", "storage", "el", "lithium", "battery", 100.0, 25.0, 0.92),
        ("battery-2", "storage", "el", "lithium", "battery", 40.0, 10.0, 0.95),
    ];
    let mut content = String::from(header);
    content.push('\n');
    for (name, type_tag, bus, carrier, tech, sc, cap, eff) in rows {
        content.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            name, type_tag, bus, carrier, tech, sc, cap, eff
        ));
    }
    fs::write(&path, &content).unwrap();

    let parsed = reader::read_elements(&path).unwrap();
    assert_eq!(parsed.len(), rows.len());
    for (row, (name, type_tag, bus, carrier, tech, sc, cap, eff)) in parsed.iter().zip(rows) {
        assert_eq!(row.name, name);
        assert_eq!(row.type_tag, type_tag);
        assert_eq!(row.parameters["bus"], serde_json::json!(bus));
        assert_eq!(row.parameters["carrier"], serde_json::json!(carrier));
        assert_eq!(row.parameters["tech"], serde_json::json!(tech));
        assert_eq!(row.parameters["storage_capacity"], serde_json::json!(sc));
        assert_eq!(row.parameters["capacity"], serde_json::json!(cap));
        assert_eq!(row.parameters["efficiency"], serde_json::json!(eff));
    }
}

#[test]
fn test_storage_default_fill_through_package() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "datapackage.json",
        r#"{
            "name": "storage-test",
            "resources": [
                {"name": "bus", "path": "data/hubs/bus.csv"},
                {"name": "storage", "path": "data/elements/storage.csv"}
            ]
        }"#,
    );
    write_file(dir.path(), "data/hubs/bus.csv", "name,type\nel,bus\n");
    write_file(
        dir.path(),
        "data/elements/storage.csv",
        "name,type,bus,carrier,tech,storage_capacity,capacity\n\
         battery-1,storage,el,lithium,battery,100,25\n",
    );

    let result = deserialize_energy_system(dir.path()).unwrap();
    let Some(Node::Component(facade)) = result.system.node("battery-1") else {
        panic!("storage missing");
    };
    match &facade.kind {
        FacadeKind::Storage(payload) => assert_eq!(payload.initial_fill, Some(50.0)),
        other => panic!("unexpected kind {:?}", other.name()),
    }
}
