use crate::utils::bits;

/// Number of bits in a page offset (4 KiB pages)
pub const OFFSET_BITS: u32 = 12;
/// Number of bits in a page number
pub const PAGE_NUM_BITS: u32 = 4;
/// Number of entries in the page table, one per virtual page
pub const PAGE_TABLE_SIZE: usize = 1 << PAGE_NUM_BITS;

const PAGE_NUM_MASK: u8 = bits::mask(PAGE_NUM_BITS) as u8;

/// Top 4 bits of a virtual address
pub fn page_number(addr: u16) -> u8 {
    let (page_num, _) = bits::split_at(addr, OFFSET_BITS);
    page_num as u8
}

/// Low 12 bits of an address
pub fn page_offset(addr: u16) -> u16 {
    let (_, offset) = bits::split_at(addr, OFFSET_BITS);
    offset
}

/// Substitutes the page number of `virtual_addr` with `physical_page_num`.
/// The page offset passes through untouched.
pub fn physical_address(virtual_addr: u16, physical_page_num: u8) -> u16 {
    let ppn = (physical_page_num & PAGE_NUM_MASK) as u16;
    bits::join_at(ppn, page_offset(virtual_addr), OFFSET_BITS)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VirtualAddr {
    pub page_num: u8,
    pub page_offset: u16,
}

impl From<u16> for VirtualAddr {
    fn from(addr: u16) -> Self {
        VirtualAddr {
            page_num: page_number(addr),
            page_offset: page_offset(addr),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PhysicalAddr {
    pub page_num: u8,
    pub page_offset: u16,
}

impl PhysicalAddr {
    /// Reuses the offset of `vaddr` inside physical page `page_num`
    pub fn translate(vaddr: VirtualAddr, page_num: u8) -> Self {
        PhysicalAddr {
            page_num: page_num & PAGE_NUM_MASK,
            page_offset: vaddr.page_offset,
        }
    }

    pub fn raw(&self) -> u16 {
        bits::join_at(self.page_num as u16, self.page_offset, OFFSET_BITS)
    }
}

/// One page table slot. Only a valid entry carries a physical page.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PageTableEntry {
    Valid(u8),
    Invalid,
}

impl PageTableEntry {
    const VALID_BIT: u8 = 1 << PAGE_NUM_BITS;

    /// A valid entry. The physical page is truncated to 4 bits.
    pub fn valid(physical_page_num: u8) -> Self {
        PageTableEntry::Valid(physical_page_num & PAGE_NUM_MASK)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, PageTableEntry::Valid(_))
    }

    pub fn physical_page_num(&self) -> Option<u8> {
        match self {
            PageTableEntry::Valid(ppn) => Some(*ppn),
            PageTableEntry::Invalid => None,
        }
    }

    /// Packs into the 5-bit hardware form: bit 4 valid, bits 3..0 physical page.
    pub fn to_bits(&self) -> u8 {
        match self {
            PageTableEntry::Valid(ppn) => Self::VALID_BIT | (ppn & PAGE_NUM_MASK),
            PageTableEntry::Invalid => 0,
        }
    }

    pub fn from_bits(raw: u8) -> Self {
        if raw & Self::VALID_BIT != 0 {
            PageTableEntry::valid(raw)
        } else {
            PageTableEntry::Invalid
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTable {
    entries: [PageTableEntry; PAGE_TABLE_SIZE],
}

impl PageTable {
    /// Identity mapped: virtual page i lives in physical page i
    pub fn new() -> Self {
        let mut entries = [PageTableEntry::Invalid; PAGE_TABLE_SIZE];
        for (i, entry) in entries.iter_mut().enumerate() {
            *entry = PageTableEntry::valid(i as u8);
        }
        PageTable { entries }
    }

    pub fn from_entries(entries: [PageTableEntry; PAGE_TABLE_SIZE]) -> Self {
        PageTable { entries }
    }

    pub fn lookup(&self, page_num: u8) -> PageTableEntry {
        self.entries[(page_num & PAGE_NUM_MASK) as usize]
    }

    pub fn entries(&self) -> &[PageTableEntry; PAGE_TABLE_SIZE] {
        &self.entries
    }
}

impl Default for PageTable {
    fn default() -> Self {
        PageTable::new()
    }
}
