use std::fs::File;
use std::error::Error;
use std::io::{prelude::*, BufReader};

use log::warn;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// An input event to the translation simulation
///
/// TraceEvents are explicitly either TraceEvent::Read or TraceEvent::Write. The inner
/// address is always virtual.
pub enum TraceEvent {
    Read(u16),
    Write(u16),
}

impl TraceEvent {
    pub fn addr(&self) -> u16 {
        match self {
            TraceEvent::Read(a) | TraceEvent::Write(a) => *a,
        }
    }

    /// Parses one `R:9042` / `w:0x1fff` line
    pub fn parse(line: &str) -> Option<TraceEvent> {
        let (access_type_str, access_addr_str) = line.split_once(':')?;

        let access_addr = access_addr_str.trim();
        let access_addr = access_addr
            .strip_prefix("0x")
            .or_else(|| access_addr.strip_prefix("0X"))
            .unwrap_or(access_addr);
        let access_addr = u16::from_str_radix(access_addr, 16).ok()?;

        match access_type_str.trim() {
            "R" | "r" => Some(TraceEvent::Read(access_addr)),
            "W" | "w" => Some(TraceEvent::Write(access_addr)),
            _ => None,
        }
    }
}

/// Reads in a trace line by line, returning a TraceEvent for every valid line
pub struct TraceReader;

impl TraceReader {
    pub fn from_reader<R: BufRead>(reader: R) -> impl Iterator<Item = TraceEvent> {
        reader
            .lines()
            .filter_map(|line| line.ok())
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty() && line.contains(':'))
            .filter_map(|(n, line)| {
                let event = TraceEvent::parse(&line);
                if event.is_none() {
                    warn!("skipping malformed trace line {}: '{}'", n + 1, line);
                }
                event
            })
    }

    pub fn from_file(path: &str) -> Result<impl Iterator<Item = TraceEvent>, Box<dyn Error>> {
        let file = File::open(path)?;
        Ok(TraceReader::from_reader(BufReader::new(file)))
    }
}
