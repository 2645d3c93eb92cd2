//! CLI-level integration tests: exercises the built binary against small
//! fixture files and checks exit codes and output shape.

use std::io::Write;
use std::process::Command;

fn write_fixture(name: &str, contents: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

const SAMPLE_CONFIG: &str = "\
Data TLB configuration
Number of sets: 1
Set size: 1

Page Table configuration
Number of virtual pages: 4
Number of physical pages: 4
Page size: 4096

Data Cache configuration
Number of sets: 4
Set size: 1
Line size: 8
Write through/no write allocate: y

Virtual addresses: n
TLB: n
L2 cache: n
";

#[test]
fn missing_config_file_exits_with_code_two() {
    let trace = write_fixture("memsim-cli-test-missing-config.dat", "R:0x0\n");
    let output = Command::new(env!("CARGO_BIN_EXE_memsim"))
        .args(["--config", "/nonexistent/path.config", "--trace"])
        .arg(&trace)
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
    std::fs::remove_file(trace).ok();
}

#[test]
fn missing_trace_file_exits_with_code_two() {
    let config = write_fixture("memsim-cli-test-missing-trace.config", SAMPLE_CONFIG);
    let output = Command::new(env!("CARGO_BIN_EXE_memsim"))
        .args(["--config"])
        .arg(&config)
        .args(["--trace", "/nonexistent/trace.dat"])
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
    std::fs::remove_file(config).ok();
}

#[test]
fn valid_run_prints_header_and_exits_zero() {
    let config = write_fixture("memsim-cli-test-valid.config", SAMPLE_CONFIG);
    let trace = write_fixture("memsim-cli-test-valid.dat", "R:0x0\nW:0x8\nR:0x0\n");
    let output = Command::new(env!("CARGO_BIN_EXE_memsim"))
        .args(["--config"])
        .arg(&config)
        .args(["--trace"])
        .arg(&trace)
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Virtual  Virt."));
    assert!(stdout.contains("dc hit rate"));
    std::fs::remove_file(config).ok();
    std::fs::remove_file(trace).ok();
}
