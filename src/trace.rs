//! Trace file parsing: `OP:HEX` lines, one access per line. Grounded on
//! the original `TraceParser` — malformed lines (no `:`) are skipped
//! silently and uncounted, and the address is masked to the configured
//! address width.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

use crate::simulate::cache_core::Op;

/// A single parsed trace entry.
#[derive(Clone, Copy, Debug)]
pub struct TraceEntry {
    pub op: Op,
    pub address: u64,
}

/// Reads trace lines from a file path, or from stdin when `path == "-"`.
pub struct TraceSource {
    lines: Box<dyn Iterator<Item = io::Result<String>>>,
    addr_bits: u32,
}

impl TraceSource {
    pub fn open(path: &str, addr_bits: u32) -> Result<Self> {
        let lines: Box<dyn Iterator<Item = io::Result<String>>> = if path == "-" {
            Box::new(BufReader::new(io::stdin()).lines())
        } else {
            let file = File::open(Path::new(path)).with_context(|| format!("opening trace file {path:?}"))?;
            Box::new(BufReader::new(file).lines())
        };
        Ok(TraceSource { lines, addr_bits })
    }
}

fn parse_hex(hex: &str) -> Option<u64> {
    let hex = hex.trim().trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(hex, 16).ok()
}

impl Iterator for TraceSource {
    type Item = Result<TraceEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err).context("reading trace input")),
            };
            let Some((op_str, hex_str)) = raw.split_once(':') else {
                continue;
            };
            let op = match op_str.trim() {
                "R" | "r" => Op::Read,
                "W" | "w" => Op::Write,
                _ => continue,
            };
            let Some(address) = parse_hex(hex_str) else {
                continue;
            };
            let mask = crate::simulate::cache_core::mask(self.addr_bits);
            return Some(Ok(TraceEntry {
                op,
                address: address & mask,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("memsim-trace-test-{}.dat", contents.len()));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_valid_lines_and_skips_malformed_ones() {
        let path = fixture("R:0x28\nmalformed line\nW: 0x1000\n\n");
        let entries: Vec<_> = TraceSource::open(path.to_str().unwrap(), 32)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].address, 0x28);
        assert!(matches!(entries[0].op, Op::Read));
        assert!(matches!(entries[1].op, Op::Write));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn masks_address_to_addr_bits() {
        let path = fixture("R:0x100000000\n");
        let entries: Vec<_> = TraceSource::open(path.to_str().unwrap(), 32)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(entries[0].address, 0);
        std::fs::remove_file(path).ok();
    }
}
