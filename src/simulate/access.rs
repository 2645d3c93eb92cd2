//! Per-access trace line: the fixed-width fields printed for each trace
//! entry, filled in by whichever levels participate in that access. Field
//! widths and blanking rules are grounded directly on the original
//! simulator's `AccessLine.__str__`.

use std::fmt;

fn format_numeric(value: Option<u64>, width: usize, zero_pad: bool) -> String {
    match value {
        None => " ".repeat(width),
        Some(v) => {
            if zero_pad {
                format!("{:0width$x}", v, width = width)
            } else {
                format!("{:>width$x}", v, width = width)
            }
        }
    }
}

fn format_hit_miss(value: Option<bool>, width: usize) -> String {
    match value {
        None => " ".repeat(width),
        Some(true) => format!("{:>width$}", "hit", width = width),
        Some(false) => format!("{:>width$}", "miss", width = width),
    }
}

/// One trace line's worth of results, accumulated as the access descends
/// through whichever levels are enabled.
#[derive(Default, Clone, Debug)]
pub struct AccessLine {
    pub address: u64,
    pub vpn: Option<u64>,
    pub page_offset: Option<u64>,
    pub dtlb_tag: Option<u64>,
    pub dtlb_index: Option<u64>,
    pub dtlb_result: Option<bool>,
    pub pt_result: Option<bool>,
    pub ppn: Option<u64>,
    pub dc_tag: Option<u64>,
    pub dc_index: Option<u64>,
    pub dc_result: Option<bool>,
    pub l2_tag: Option<u64>,
    pub l2_index: Option<u64>,
    pub l2_result: Option<bool>,
}

impl AccessLine {
    pub fn new(address: u64) -> Self {
        AccessLine {
            address,
            ..Default::default()
        }
    }

    pub const HEADER_LINES: [&'static str; 3] = [
        "Virtual  Virt.  Page TLB    TLB TLB  PT   Phys        DC  DC          L2  L2",
        "Address  Page # Off  Tag    Ind Res. Res. Pg # DC Tag Ind Res. L2 Tag Ind Res.",
        "-------- ------ ---- ------ --- ---- ---- ---- ------ --- ---- ------ --- ----",
    ];
}

impl fmt::Display for AccessLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            format_numeric(Some(self.address), 8, true),
            format_numeric(self.vpn, 6, false),
            format_numeric(self.page_offset, 4, false),
            format_numeric(self.dtlb_tag, 6, false),
            format_numeric(self.dtlb_index, 3, false),
            format_hit_miss(self.dtlb_result, 4),
            format_hit_miss(self.pt_result, 4),
            format_numeric(self.ppn, 4, false),
            format_numeric(self.dc_tag, 6, false),
            format_numeric(self.dc_index, 3, false),
            format_hit_miss(self.dc_result, 4),
            format_numeric(self.l2_tag, 6, false),
            format_numeric(self.l2_index, 3, false),
            format_hit_miss(self.l2_result, 4),
        ];
        write!(f, "{}", fields.join(" "))
    }
}
