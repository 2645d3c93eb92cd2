//! Configuration file parsing and validation. The format is a bespoke
//! "Section Name" / "Key: value" text format (not TOML/JSON), so this is a
//! hand-rolled parser in the same spirit as the CLI's own hand-rolled
//! numeric-argument parser, grounded directly on the original simulator's
//! `Config.from_config_file`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};

fn is_power_of_two(n: u64) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

fn safe_log_2(n: u64) -> Result<u32> {
    ensure!(is_power_of_two(n), "value {n} must be a power of two");
    Ok(n.trailing_zeros())
}

fn safe_enabled(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "y" => Ok(true),
        "n" => Ok(false),
        other => bail!("enabled flag must be 'y' or 'n', got {other:?}"),
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BitCounts {
    pub dtlb_tag_bits: u32,
    pub dtlb_index_bits: u32,
    pub dtlb_offset_bits: u32,
    pub dc_tag_bits: u32,
    pub dc_index_bits: u32,
    pub dc_offset_bits: u32,
    pub l2_tag_bits: u32,
    pub l2_index_bits: u32,
    pub l2_offset_bits: u32,
    pub vpn_bits: u32,
    pub page_offset_bits: u32,
    pub ppn_bits: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
    pub num_sets: u64,
    pub associativity: u64,
    pub line_size: u64,
    /// `true` is write-through/no-write-allocate, `false` is
    /// write-back/write-allocate, matching the file's own bit sense.
    pub write_through_no_allocate: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct DtlbConfig {
    pub num_sets: u64,
    pub associativity: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct PageTableConfig {
    pub n_virtual_pages: u64,
    pub n_physical_pages: u64,
    pub page_size: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub virtual_addresses: bool,
    pub dtlb_enabled: bool,
    pub l2_enabled: bool,
    pub dtlb: DtlbConfig,
    pub pt: PageTableConfig,
    pub dc: CacheConfig,
    pub l2: Option<CacheConfig>,
    pub address_bits: u32,
    pub bits: BitCounts,
}

struct RawSections {
    dtlb: HashMap<String, String>,
    pt: HashMap<String, String>,
    dc: HashMap<String, String>,
    l2: HashMap<String, String>,
    toggles: HashMap<String, String>,
}

fn parse_sections(text: &str) -> RawSections {
    let section_headers: [(&str, &str); 4] = [
        ("Data TLB configuration", "dtlb"),
        ("Page Table configuration", "pt"),
        ("Data Cache configuration", "dc"),
        ("L2 Cache configuration", "l2"),
    ];

    let mut sections = RawSections {
        dtlb: HashMap::new(),
        pt: HashMap::new(),
        dc: HashMap::new(),
        l2: HashMap::new(),
        toggles: HashMap::new(),
    };

    let mut current: Option<&str> = None;
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((_, key)) = section_headers.iter().find(|(header, _)| *header == line) {
            current = Some(key);
            continue;
        }

        let lower = line.to_lowercase();
        if lower.starts_with("virtual addresses:") || lower.starts_with("tlb:") || lower.starts_with("l2 cache:") {
            if let Some((key, val)) = line.split_once(':') {
                sections.toggles.insert(key.trim().to_string(), val.trim().to_string());
            }
            continue;
        }

        if let (Some(key_section), Some((key, val))) = (current, line.split_once(':')) {
            let bucket = match key_section {
                "dtlb" => &mut sections.dtlb,
                "pt" => &mut sections.pt,
                "dc" => &mut sections.dc,
                "l2" => &mut sections.l2,
                _ => unreachable!(),
            };
            bucket.insert(key.trim().to_string(), val.trim().to_string());
        }
    }

    sections
}

fn get_u64(map: &HashMap<String, String>, key: &str, default: u64) -> Result<u64> {
    match map.get(key) {
        Some(v) => v.parse::<u64>().with_context(|| format!("{key} is not a valid integer: {v:?}")),
        None => Ok(default),
    }
}

fn require(map: &HashMap<String, String>, key: &str) -> Result<String> {
    map.get(key)
        .cloned()
        .with_context(|| format!("missing required config key {key:?}"))
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_str(&text)
    }

    pub fn from_str(text: &str) -> Result<Config> {
        let sections = parse_sections(text);

        let dtlb_num_sets = get_u64(&sections.dtlb, "Number of sets", 0)?;
        let dtlb_associativity = get_u64(&sections.dtlb, "Set size", 1)?;
        let dtlb_enabled = safe_enabled(&require(&sections.toggles, "TLB")?)?;

        let n_virtual_pages = get_u64(&sections.pt, "Number of virtual pages", 0)?;
        let n_physical_pages = get_u64(&sections.pt, "Number of physical pages", 0)?;
        let page_size = get_u64(&sections.pt, "Page size", 0)?;

        let l2_num_sets = get_u64(&sections.l2, "Number of sets", 0)?;
        let l2_associativity = get_u64(&sections.l2, "Set size", 1)?;
        let l2_line_size = get_u64(&sections.l2, "Line size", 0)?;
        let l2_enabled = safe_enabled(&require(&sections.toggles, "L2 cache")?)?;
        let l2_policy = if l2_enabled {
            safe_enabled(&require(&sections.l2, "Write through/no write allocate")?)?
        } else {
            true
        };

        let dc_num_sets = get_u64(&sections.dc, "Number of sets", 0)?;
        let dc_associativity = get_u64(&sections.dc, "Set size", 1)?;
        let dc_line_size = get_u64(&sections.dc, "Line size", 0)?;
        let dc_policy = safe_enabled(&require(&sections.dc, "Write through/no write allocate")?)?;

        let virtual_addresses = safe_enabled(&require(&sections.toggles, "Virtual addresses")?)?;

        let mut config = Config {
            virtual_addresses,
            dtlb_enabled,
            l2_enabled,
            dtlb: DtlbConfig {
                num_sets: dtlb_num_sets,
                associativity: dtlb_associativity,
            },
            pt: PageTableConfig {
                n_virtual_pages,
                n_physical_pages,
                page_size,
            },
            dc: CacheConfig {
                num_sets: dc_num_sets,
                associativity: dc_associativity,
                line_size: dc_line_size,
                write_through_no_allocate: dc_policy,
            },
            l2: if l2_enabled {
                Some(CacheConfig {
                    num_sets: l2_num_sets,
                    associativity: l2_associativity,
                    line_size: l2_line_size,
                    write_through_no_allocate: l2_policy,
                })
            } else {
                None
            },
            address_bits: 0,
            bits: BitCounts::default(),
        };

        config.derive_bits()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.address_bits <= 32, "address bits exceed 32 bits");
        if self.dtlb_enabled {
            self.validate_dtlb()?;
        }
        self.validate_dc()?;
        self.validate_pt()?;
        if let Some(l2) = &self.l2 {
            self.validate_l2(l2)?;
        }
        Ok(())
    }

    fn validate_dtlb(&self) -> Result<()> {
        ensure!(
            (1..=256).contains(&self.dtlb.num_sets),
            "DTLB number of sets must be between 1 and 256"
        );
        ensure!(
            (1..=8).contains(&self.dtlb.associativity),
            "DTLB associativity must be between 1 and 8"
        );
        ensure!(
            is_power_of_two(self.dtlb.num_sets),
            "DTLB number of sets must be a power of two"
        );
        Ok(())
    }

    fn validate_dc(&self) -> Result<()> {
        ensure!(
            (1..=8192).contains(&self.dc.num_sets),
            "DC number of sets must be between 1 and 8192"
        );
        ensure!(
            (1..=8).contains(&self.dc.associativity),
            "DC associativity must be between 1 and 8"
        );
        ensure!(is_power_of_two(self.dc.num_sets), "DC number of sets must be a power of two");
        ensure!(is_power_of_two(self.dc.line_size), "DC line size must be a power of two");
        ensure!(self.dc.line_size >= 8, "DC line size must be at least 8 bytes");
        Ok(())
    }

    fn validate_pt(&self) -> Result<()> {
        ensure!(
            (1..=8192).contains(&self.pt.n_virtual_pages),
            "number of virtual pages must be between 1 and 8192"
        );
        ensure!(
            (1..=1024).contains(&self.pt.n_physical_pages),
            "number of physical pages must be between 1 and 1024"
        );
        ensure!(
            is_power_of_two(self.pt.n_virtual_pages),
            "number of virtual pages must be a power of two"
        );
        ensure!(is_power_of_two(self.pt.page_size), "page size must be a power of two");
        if self.virtual_addresses {
            let space = self
                .pt
                .n_virtual_pages
                .checked_mul(self.pt.page_size)
                .context("virtual address space overflowed")?;
            ensure!(space <= 1u64 << 32, "maximum virtual address space exceeded (2^32)");
        }
        Ok(())
    }

    fn validate_l2(&self, l2: &CacheConfig) -> Result<()> {
        ensure!((1..=8).contains(&l2.associativity), "L2 associativity must be between 1 and 8");
        ensure!(
            l2.line_size >= self.dc.line_size,
            "L2 line size must be at least as large as DC line size"
        );
        Ok(())
    }

    fn bit_slice(addr_bits: u32, sets: Option<u64>, line_size: Option<u64>) -> Result<(u32, u32, u32)> {
        let index_bits = match sets {
            Some(sets) => safe_log_2(sets)?,
            None => 0,
        };
        let offset_bits = match line_size {
            Some(line_size) => safe_log_2(line_size)?,
            None => 0,
        };
        let used = index_bits + offset_bits;
        ensure!(
            addr_bits >= used,
            "invalid bit configuration: negative tag bits (addr_bits={addr_bits}, index_bits={index_bits}, offset_bits={offset_bits})"
        );
        Ok((addr_bits - used, index_bits, offset_bits))
    }

    fn derive_bits(&mut self) -> Result<()> {
        if self.virtual_addresses {
            self.bits.page_offset_bits = safe_log_2(self.pt.page_size)?;
            self.bits.vpn_bits = safe_log_2(self.pt.n_virtual_pages)?;
            self.bits.ppn_bits = safe_log_2(self.pt.n_physical_pages)?;
            self.address_bits = self.bits.vpn_bits + self.bits.page_offset_bits;
        } else {
            self.bits.page_offset_bits = 0;
            self.bits.vpn_bits = 0;
            self.bits.ppn_bits = safe_log_2(self.pt.n_physical_pages)?;
            self.address_bits = safe_log_2(self.pt.n_physical_pages)? + safe_log_2(self.pt.page_size)?;
        }

        if self.dtlb_enabled && self.virtual_addresses {
            let (tag, index, _) = Self::bit_slice(self.bits.vpn_bits, Some(self.dtlb.num_sets), None)?;
            self.bits.dtlb_tag_bits = tag;
            self.bits.dtlb_index_bits = index;
            self.bits.dtlb_offset_bits = 0;
        } else {
            self.bits.dtlb_tag_bits = 0;
            self.bits.dtlb_index_bits = 0;
            self.bits.dtlb_offset_bits = 0;
        }

        let (dc_tag, dc_index, dc_offset) =
            Self::bit_slice(self.address_bits, Some(self.dc.num_sets), Some(self.dc.line_size))?;
        self.bits.dc_tag_bits = dc_tag;
        self.bits.dc_index_bits = dc_index;
        self.bits.dc_offset_bits = dc_offset;

        if let Some(l2) = &self.l2 {
            let (l2_tag, l2_index, l2_offset) =
                Self::bit_slice(self.address_bits, Some(l2.num_sets), Some(l2.line_size))?;
            self.bits.l2_tag_bits = l2_tag;
            self.bits.l2_index_bits = l2_index;
            self.bits.l2_offset_bits = l2_offset;
        }

        Ok(())
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Data TLB contains {} sets.", self.dtlb.num_sets)?;
        writeln!(f, "Each set contains {} entries.", self.dtlb.associativity)?;
        writeln!(f, "Number of bits used for the index is {}.\n", self.bits.dtlb_index_bits)?;

        writeln!(f, "Number of virtual pages is {}.", self.pt.n_virtual_pages)?;
        writeln!(f, "Number of physical pages is {}.", self.pt.n_physical_pages)?;
        writeln!(f, "Each page contains {} bytes.", self.pt.page_size)?;
        writeln!(f, "Number of bits used for the page table index is {}.", self.bits.vpn_bits)?;
        writeln!(f, "Number of bits used for the page offset is {}.\n", self.bits.page_offset_bits)?;

        writeln!(f, "D-cache contains {} sets.", self.dc.num_sets)?;
        writeln!(f, "Each set contains {} entries.", self.dc.associativity)?;
        writeln!(f, "Each line is {} bytes.", self.dc.line_size)?;
        writeln!(
            f,
            "The cache uses a {}write allocate and {} policy.",
            if self.dc.write_through_no_allocate { "no " } else { "" },
            if self.dc.write_through_no_allocate { "write-through" } else { "write-back" }
        )?;
        writeln!(f, "Number of bits used for the index is {}.", self.bits.dc_index_bits)?;
        writeln!(f, "Number of bits used for the offset is {}.\n", self.bits.dc_offset_bits)?;

        if let Some(l2) = &self.l2 {
            writeln!(f, "L2 cache contains {} sets.", l2.num_sets)?;
            writeln!(f, "Each set contains {} entries.", l2.associativity)?;
            writeln!(f, "Each line is {} bytes.", l2.line_size)?;
            writeln!(
                f,
                "The cache uses a {}write allocate and {} policy.",
                if l2.write_through_no_allocate { "no " } else { "" },
                if l2.write_through_no_allocate { "write-through" } else { "write-back" }
            )?;
            writeln!(f, "Number of bits used for the index is {}.", self.bits.l2_index_bits)?;
            writeln!(f, "Number of bits used for the offset is {}.\n", self.bits.l2_offset_bits)?;
        }

        if self.virtual_addresses {
            write!(f, "The addresses read in are virtual addresses.")?;
        } else {
            write!(f, "The addresses read in are physical addresses.")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Data TLB configuration
Number of sets: 4
Set size: 2

Page Table configuration
Number of virtual pages: 1024
Number of physical pages: 256
Page size: 4096

Data Cache configuration
Number of sets: 64
Set size: 2
Line size: 32
Write through/no write allocate: n

L2 Cache configuration
Number of sets: 256
Set size: 4
Line size: 64
Write through/no write allocate: y

Virtual addresses: y
TLB: y
L2 cache: y
";

    #[test]
    fn parses_sample_config() {
        let config = Config::from_str(SAMPLE).expect("sample config should parse");
        assert!(config.virtual_addresses);
        assert!(config.dtlb_enabled);
        assert!(config.l2_enabled);
        assert_eq!(config.bits.vpn_bits, 10);
        assert_eq!(config.bits.page_offset_bits, 12);
        assert_eq!(config.bits.dc_index_bits, 6);
        assert_eq!(config.bits.dc_offset_bits, 5);
    }

    #[test]
    fn rejects_non_power_of_two_sets() {
        let bad = SAMPLE.replace("Number of sets: 64", "Number of sets: 63");
        assert!(Config::from_str(&bad).is_err());
    }

    #[test]
    fn rejects_l2_line_smaller_than_dc() {
        let bad = SAMPLE.replace("Line size: 64", "Line size: 16");
        assert!(Config::from_str(&bad).is_err());
    }
}
