use log::{debug, error, trace};
use thiserror::Error;

/// Number of slots in the fully associative TLB
pub const TLB_SIZE: usize = 4;

/// Rank held by the least recently used slot
const LRU_RANK: u8 = (TLB_SIZE - 1) as u8;

/// Ways a caller-supplied TLB can break the cache invariants
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("TLB ranks {0:?} are not a permutation of 0..=3")]
    Ranks([u8; TLB_SIZE]),
    #[error("virtual page {0:#x} is cached in more than one TLB slot")]
    DuplicatePage(u8),
}

/// What a slot currently caches
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TlbLine {
    Empty,
    Occupied { vpn: u8, ppn: u8 },
}

/// A TLB slot: the cached mapping plus its recency rank
/// (0 = most recently used, 3 = next to be evicted).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TlbEntry {
    pub rank: u8,
    pub line: TlbLine,
}

impl TlbEntry {
    const VALID_BIT: u16 = 1 << 10;

    pub fn empty(rank: u8) -> Self {
        TlbEntry { rank: rank & 0x3, line: TlbLine::Empty }
    }

    pub fn occupied(rank: u8, vpn: u8, ppn: u8) -> Self {
        TlbEntry {
            rank: rank & 0x3,
            line: TlbLine::Occupied { vpn: vpn & 0xf, ppn: ppn & 0xf },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.line, TlbLine::Occupied { .. })
    }

    pub fn vpn(&self) -> Option<u8> {
        match self.line {
            TlbLine::Occupied { vpn, .. } => Some(vpn),
            TlbLine::Empty => None,
        }
    }

    pub fn ppn(&self) -> Option<u8> {
        match self.line {
            TlbLine::Occupied { ppn, .. } => Some(ppn),
            TlbLine::Empty => None,
        }
    }

    /// Packs the entry as `valid:1 | rank:2 | vpn:4 | ppn:4` (bits 10..0)
    pub fn to_bits(&self) -> u16 {
        let rank = (self.rank as u16 & 0x3) << 8;
        match self.line {
            TlbLine::Occupied { vpn, ppn } => {
                Self::VALID_BIT | rank | (vpn as u16 & 0xf) << 4 | (ppn as u16 & 0xf)
            }
            TlbLine::Empty => rank,
        }
    }

    pub fn from_bits(raw: u16) -> Self {
        let rank = ((raw >> 8) & 0x3) as u8;
        if raw & Self::VALID_BIT != 0 {
            TlbEntry::occupied(rank, ((raw >> 4) & 0xf) as u8, (raw & 0xf) as u8)
        } else {
            TlbEntry::empty(rank)
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Tlb {
    entries: [TlbEntry; TLB_SIZE],
}

impl Tlb {
    /// All slots empty, ranked 0..3 in slot order
    pub fn new() -> Self {
        let mut entries = [TlbEntry::empty(0); TLB_SIZE];
        for (slot, entry) in entries.iter_mut().enumerate() {
            entry.rank = slot as u8;
        }
        Tlb { entries }
    }

    /// Builds a TLB in an arbitrary state, checking the rank permutation
    /// and that no virtual page is cached twice.
    pub fn from_entries(entries: [TlbEntry; TLB_SIZE]) -> Result<Self, LayoutError> {
        let ranks = entries.map(|e| e.rank);
        let mut seen = [false; TLB_SIZE];
        for &rank in ranks.iter() {
            match seen.get_mut(rank as usize) {
                Some(s) if !*s => *s = true,
                _ => return Err(LayoutError::Ranks(ranks)),
            }
        }

        for (i, a) in entries.iter().enumerate() {
            if let Some(vpn) = a.vpn() {
                if entries[i + 1..].iter().any(|b| b.vpn() == Some(vpn)) {
                    return Err(LayoutError::DuplicatePage(vpn));
                }
            }
        }

        Ok(Tlb { entries })
    }

    pub fn entries(&self) -> &[TlbEntry; TLB_SIZE] {
        &self.entries
    }

    pub fn entry(&self, slot: usize) -> TlbEntry {
        self.entries[slot]
    }

    /// Slot caching `page_num`, if any
    pub fn find(&self, page_num: u8) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.vpn() == Some(page_num))
    }

    /// Makes `slot` the most recently used. Every slot that was more recent
    /// than it moves one rank down; the rest keep their rank.
    pub fn touch(&mut self, slot: usize) {
        let old_rank = self.entries[slot].rank;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            if i != slot && entry.rank < old_rank {
                entry.rank += 1;
            }
        }
        self.entries[slot].rank = 0;
        trace!("touched slot {}, ranks now {:?}", slot, self.ranks());
    }

    /// The least recently used slot.
    ///
    /// # Panics
    ///
    /// If no slot holds the LRU rank. That can only happen when rank
    /// maintenance is broken, so there is nothing sensible to recover.
    pub fn victim(&self) -> usize {
        match self.entries.iter().position(|entry| entry.rank == LRU_RANK) {
            Some(slot) => slot,
            None => {
                error!("no TLB slot holds rank {}: ranks {:?}", LRU_RANK, self.ranks());
                panic!("TLB rank invariant violated: ranks {:?}", self.ranks());
            }
        }
    }

    /// Overwrites `slot` with the vpn -> ppn mapping and makes it most recent
    pub fn install(&mut self, slot: usize, ppn: u8, vpn: u8) {
        let rank = self.entries[slot].rank;
        if let TlbLine::Occupied { vpn: old_vpn, ppn: old_ppn } = self.entries[slot].line {
            debug!("evicting slot {}: {:x} -> {:x}", slot, old_vpn, old_ppn);
        }
        self.entries[slot] = TlbEntry::occupied(rank, vpn, ppn);
        self.touch(slot);
    }

    /// Find followed by touch on a hit. Returns the slot and its physical page.
    pub fn lookup(&mut self, page_num: u8) -> Option<(usize, u8)> {
        let slot = self.find(page_num)?;
        let ppn = self.entries[slot].ppn()?;
        self.touch(slot);
        Some((slot, ppn))
    }

    /// Recency rank of every slot, in slot order
    pub fn ranks(&self) -> [u8; TLB_SIZE] {
        self.entries.map(|entry| entry.rank)
    }
}

impl Default for Tlb {
    fn default() -> Self {
        Tlb::new()
    }
}

impl std::fmt::Display for Tlb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "index:\t\t")?;
        for slot in 0..TLB_SIZE {
            write!(f, "\t{}", slot)?;
        }
        writeln!(f)?;
        write!(f, "TLB entries:\t")?;
        for rank in self.ranks() {
            write!(f, "\t[{}]", rank)?;
        }
        writeln!(f)
    }
}

impl std::fmt::Debug for Tlb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "TLB:")?;
        for (slot, e) in self.entries.iter().enumerate() {
            write!(f, "\tSlot {} (rank {}): ", slot, e.rank)?;
            match e.line {
                TlbLine::Occupied { vpn, ppn } => writeln!(f, "vpn {:x} -> ppn {:x}", vpn, ppn)?,
                TlbLine::Empty => writeln!(f, "empty")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn is_permutation(ranks: [u8; TLB_SIZE]) -> bool {
        let mut sorted = ranks;
        sorted.sort_unstable();
        sorted == [0, 1, 2, 3]
    }

    #[test]
    fn starts_empty() {
        let tlb = Tlb::new();
        assert_eq!(tlb.ranks(), [0, 1, 2, 3]);
        assert!(tlb.entries().iter().all(|e| !e.is_valid()));
        // no spurious hit on page 0 before anything is installed
        assert_eq!(tlb.find(0), None);
    }

    #[test]
    fn touch_shifts_only_more_recent_slots() {
        let mut tlb = Tlb::new();
        tlb.touch(2);
        assert_eq!(tlb.ranks(), [1, 2, 0, 3]);
        assert_eq!(tlb.victim(), 3);
    }

    #[test]
    fn touch_twice_is_touch_once() {
        let mut once = Tlb::new();
        once.touch(1);
        let mut twice = Tlb::new();
        twice.touch(1);
        twice.touch(1);
        assert_eq!(once.ranks(), twice.ranks());
    }

    #[test]
    fn touch_lru_slot() {
        let mut tlb = Tlb::new();
        tlb.touch(3);
        assert_eq!(tlb.ranks(), [1, 2, 3, 0]);
        assert_eq!(tlb.victim(), 2);
    }

    #[test]
    fn install_replaces_and_promotes() {
        let mut tlb = Tlb::new();
        let slot = tlb.victim();
        tlb.install(slot, 0x2, 0x9);
        assert_eq!(tlb.entry(3), TlbEntry::occupied(0, 0x9, 0x2));
        assert_eq!(tlb.find(0x9), Some(3));
        assert_eq!(tlb.ranks(), [1, 2, 3, 0]);
    }

    #[test]
    fn fills_every_slot_before_evicting() {
        let mut tlb = Tlb::new();
        for vpn in 0..4u8 {
            let slot = tlb.victim();
            tlb.install(slot, vpn, vpn);
        }
        assert!(tlb.entries().iter().all(|e| e.is_valid()));
        // page 0 went in first so it is the oldest
        assert_eq!(tlb.victim(), tlb.find(0).unwrap());
    }

    #[test]
    fn lookup_hits_and_touches() {
        let mut tlb = Tlb::new();
        tlb.install(0, 0x7, 0x1);
        tlb.install(1, 0x8, 0x2);
        assert_eq!(tlb.lookup(0x1), Some((0, 0x7)));
        assert_eq!(tlb.entry(0).rank, 0);
        assert_eq!(tlb.lookup(0x5), None);
    }

    #[test]
    fn ranks_stay_a_permutation() {
        let mut rng = StdRng::seed_from_u64(530);
        let mut tlb = Tlb::new();
        for _ in 0..10_000 {
            if rng.gen_bool(0.5) {
                tlb.touch(rng.gen_range(0..TLB_SIZE));
            } else {
                let vpn = rng.gen_range(0..16u8);
                let slot = tlb.find(vpn).unwrap_or_else(|| tlb.victim());
                tlb.install(slot, rng.gen_range(0..16u8), vpn);
            }
            assert!(is_permutation(tlb.ranks()), "ranks {:?}", tlb.ranks());
        }
    }

    #[test]
    fn layout_checks() {
        let dup_rank = [
            TlbEntry::empty(0),
            TlbEntry::empty(0),
            TlbEntry::empty(2),
            TlbEntry::empty(3),
        ];
        assert_eq!(Tlb::from_entries(dup_rank), Err(LayoutError::Ranks([0, 0, 2, 3])));

        let dup_page = [
            TlbEntry::occupied(0, 5, 1),
            TlbEntry::occupied(1, 5, 2),
            TlbEntry::empty(2),
            TlbEntry::empty(3),
        ];
        assert_eq!(Tlb::from_entries(dup_page), Err(LayoutError::DuplicatePage(5)));

        let ok = [
            TlbEntry::occupied(3, 5, 1),
            TlbEntry::empty(0),
            TlbEntry::occupied(2, 6, 2),
            TlbEntry::empty(1),
        ];
        let tlb = Tlb::from_entries(ok).unwrap();
        assert_eq!(tlb.victim(), 0);
    }

    #[test]
    #[should_panic(expected = "rank invariant")]
    fn missing_lru_rank_is_fatal() {
        let mut tlb = Tlb::new();
        tlb.entries[3].rank = 2;
        tlb.victim();
    }

    #[test]
    fn entry_packing() {
        let e = TlbEntry::occupied(2, 0x9, 0x2);
        assert_eq!(e.to_bits(), 0b1_10_1001_0010);
        assert_eq!(TlbEntry::from_bits(e.to_bits()), e);
        assert_eq!(TlbEntry::from_bits(0b0_11_1111_1111), TlbEntry::empty(3));
    }

    #[test]
    fn rank_table() {
        let mut tlb = Tlb::new();
        tlb.touch(2);
        let dump = tlb.to_string();
        assert!(dump.contains("[1]\t[2]\t[0]\t[3]"), "{}", dump);
    }
}
