pub mod page;
pub mod tlb;

use log::{debug, warn};
use thiserror::Error;

pub use self::{
    page::{page_number, page_offset, physical_address, PageTable, PageTableEntry, VirtualAddr},
    tlb::{LayoutError, Tlb, TlbEntry, TlbLine},
};

#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("page fault: virtual page {page:#x} has no physical page (address {addr:#06x})")]
    PageFault { addr: u16, page: u8 },
}

/// Translates `addr` through `tlb`, falling back to `pt` on a miss.
///
/// A hit never looks at the page table. A miss on a valid page evicts the
/// least recently used slot, caches the mapping and returns the translation
/// in the same call.
pub fn translate(tlb: &mut Tlb, pt: &PageTable, addr: u16) -> Result<u16, Fault> {
    resolve(tlb, pt, addr).map(|event| event.physical_addr)
}

fn resolve(tlb: &mut Tlb, pt: &PageTable, addr: u16) -> Result<AccessEvent, Fault> {
    let vaddr = VirtualAddr::from(addr);
    let vpn = vaddr.page_num;

    let event = AccessEvent {
        addr,
        virtual_page_num: vpn,
        page_offset: vaddr.page_offset,
        ..Default::default()
    };

    if let Some((slot, ppn)) = tlb.lookup(vpn) {
        debug!("tlb hit: {:04x} page {:x} in slot {}", addr, vpn, slot);
        return Ok(AccessEvent {
            tlb_slot: Some(slot),
            tlb_res: Query::Hit,
            physical_page_num: ppn,
            physical_addr: physical_address(addr, ppn),
            ..event
        });
    }

    let ppn = match pt.lookup(vpn) {
        PageTableEntry::Valid(ppn) => ppn,
        PageTableEntry::Invalid => {
            warn!("page fault on {:04x}: page {:x} is invalid", addr, vpn);
            return Err(Fault::PageFault { addr, page: vpn });
        }
    };

    let slot = tlb.victim();
    debug!("tlb miss: {:04x} page {:x} -> {:x}, filling slot {}", addr, vpn, ppn, slot);
    tlb.install(slot, ppn, vpn);

    Ok(AccessEvent {
        tlb_slot: Some(slot),
        tlb_res: Query::Miss,
        page_table_res: Some(Query::Hit),
        physical_page_num: ppn,
        physical_addr: physical_address(addr, ppn),
        ..event
    })
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Stats {
    pub hits: u64,
    pub misses: u64,
    pub faults: u64,
}

impl Stats {
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses + self.faults
    }
}

/// One translation stream: a private TLB in front of a shared page table
pub struct Translator<'pt> {
    tlb: Tlb,
    pt: &'pt PageTable,
    stats: Stats,
}

impl<'pt> Translator<'pt> {
    pub fn new(pt: &'pt PageTable) -> Self {
        Translator::with_tlb(Tlb::new(), pt)
    }

    pub fn with_tlb(tlb: Tlb, pt: &'pt PageTable) -> Self {
        Translator { tlb, pt, stats: Stats::default() }
    }

    pub fn access(&mut self, addr: u16) -> Result<AccessEvent, Fault> {
        let result = resolve(&mut self.tlb, self.pt, addr);
        match &result {
            Ok(event) if event.tlb_res == Query::Hit => self.stats.hits += 1,
            Ok(_) => self.stats.misses += 1,
            Err(_) => self.stats.faults += 1,
        }
        result
    }

    pub fn translate(&mut self, addr: u16) -> Result<u16, Fault> {
        self.access(addr).map(|event| event.physical_addr)
    }

    pub fn tlb(&self) -> &Tlb {
        &self.tlb
    }

    pub fn page_table(&self) -> &PageTable {
        self.pt
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }
}

/// Represents the details of a successful translation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AccessEvent {
    pub addr: u16,
    pub virtual_page_num: u8,
    pub page_offset: u16,
    pub tlb_slot: Option<usize>,
    pub tlb_res: Query,
    pub page_table_res: Option<Query>,
    pub physical_page_num: u8,
    pub physical_addr: u16,
}

impl AccessEvent {
    pub const HEADER: &'static str = "vaddr  pg# pgoff slot tlb  pt   ppn  paddr";
}

impl std::fmt::Display for AccessEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(f,
            //vaddr pg# pgoff slot tlb pt ppn paddr
            "{:04x} {:4x} {:5x} {:>4} {:4} {:4} {:3x} {:>6}",
            self.addr,
            self.virtual_page_num,
            self.page_offset,
            self.tlb_slot.map_or("".to_string(), |n| n.to_string()),
            self.tlb_res.as_str(),
            self.page_table_res.as_ref().map_or("", |q| q.as_str()),
            self.physical_page_num,
            format!("{:04x}", self.physical_addr),
        )
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Query {
    Hit,
    #[default]
    Miss,
}

impl Query {
    fn as_str(&self) -> &'static str {
        match self {
            Query::Hit => "hit",
            Query::Miss => "miss",
        }
    }
}
