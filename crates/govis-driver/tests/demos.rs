//! End-to-end runs over the modules under `demos/`.
//!
//! Each test loads a demo module from disk, checks it, and runs it when
//! the check passes.

use govis_driver::Driver;
use std::path::PathBuf;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name)
}

fn load(name: &str) -> Driver {
    let mut driver = Driver::new();
    driver
        .load_dir(demo(name))
        .unwrap_or_else(|e| panic!("failed to load {name}: {e:?}"));
    driver
}

#[test]
fn test_exported_demo_runs() {
    let driver = load("exported");
    let mut out = Vec::new();
    driver.run(&mut out).unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "User: users.User{Name:\"doej\", ID:101, password:\"\"}\nroot true\n"
    );
}

#[test]
fn test_private_demo_is_rejected() {
    let driver = load("private");
    let report = driver.check_report();

    let messages: Vec<String> = report.errors.iter().map(|e| e.to_string()).collect();
    assert_eq!(
        messages,
        vec!["unknown field 'password' in struct literal of type users.User"]
    );
}
