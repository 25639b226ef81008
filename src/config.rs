use std::fs::File;
use std::io::{prelude::*, BufReader};
use std::error::Error;

use log::info;

use crate::{
    memory::{
        page::{OFFSET_BITS, PAGE_NUM_BITS, PAGE_TABLE_SIZE},
        tlb::TLB_SIZE,
        PageTable, PageTableEntry,
    },
    utils::{bits, error},
};

const MAX_PHYS_PAGE: u16 = (1 << PAGE_NUM_BITS) - 1;

/// Initial fill of the page table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    entries: [PageTableEntry; PAGE_TABLE_SIZE],
}

impl Config {
    pub fn from_file(path: &str) -> Result<Config, Box<dyn Error>> {
        let file = File::open(path)?;
        let config = Config::from_reader(BufReader::new(file))?;
        info!("loaded page table from {}", path);
        Ok(config)
    }

    /// Reads `Virtual page <n>: <physical page | invalid>` lines.
    /// Blank lines and lines without a ':' are ignored.
    pub fn from_reader(reader: impl BufRead) -> Result<Config, Box<dyn Error>> {
        let lines = reader
            .lines()
            .filter_map(|line| line.ok())
            .filter(|line| !line.is_empty() && line.contains(':'));

        let mut entries: [Option<PageTableEntry>; PAGE_TABLE_SIZE] = [None; PAGE_TABLE_SIZE];
        let mut count = 0;

        for line in lines {
            let Some((label, value)) = line.split_once(':') else { continue };
            count += 1;

            let vpn = match label.split_whitespace().last().and_then(bits::parse_num) {
                Some(n) => n as usize,
                None => error!("Could not read a virtual page number from '{}'", label.trim()),
            };
            if vpn >= PAGE_TABLE_SIZE {
                error!("Virtual page {} specified but max is {}", vpn, PAGE_TABLE_SIZE - 1);
            }
            if entries[vpn].is_some() {
                error!("Virtual page {} is mapped more than once", vpn);
            }

            let entry = match value.trim() {
                "invalid" | "-" => PageTableEntry::Invalid,
                v => match bits::parse_num(v) {
                    Some(ppn) if ppn <= MAX_PHYS_PAGE => PageTableEntry::valid(ppn as u8),
                    Some(ppn) => error!("Physical page {} specified but max is {}", ppn, MAX_PHYS_PAGE),
                    None => error!("Could not read a physical page from '{}'", v),
                },
            };
            entries[vpn] = Some(entry);
        }

        if count != PAGE_TABLE_SIZE {
            error!("Expected {} page table entries, Found {}", PAGE_TABLE_SIZE, count);
        }

        // count == 16 with no duplicates means every slot is filled
        let entries = entries.map(|entry| entry.unwrap_or(PageTableEntry::Invalid));
        Ok(Config { entries })
    }

    pub fn page_table(&self) -> PageTable {
        PageTable::from_entries(self.entries)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config { entries: *PageTable::new().entries() }
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "TLB contains {} fully associative entries.", TLB_SIZE)?;
        writeln!(f)?;

        writeln!(f, "Number of virtual pages is {}.", PAGE_TABLE_SIZE)?;
        writeln!(f, "Each page contains {} bytes.", 1 << OFFSET_BITS)?;
        writeln!(f, "Number of bits used for the page table index is {}.", PAGE_NUM_BITS)?;
        writeln!(f, "Number of bits used for the page offset is {}.", OFFSET_BITS)?;
        writeln!(f)?;

        for (vpn, entry) in self.entries.iter().enumerate() {
            match entry {
                PageTableEntry::Valid(ppn) => writeln!(f, "Virtual page {:x} -> physical page {:x}", vpn, ppn)?,
                PageTableEntry::Invalid => writeln!(f, "Virtual page {:x} is invalid", vpn)?,
            }
        }
        Ok(())
    }
}
