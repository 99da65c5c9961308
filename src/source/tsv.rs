//! Tab-separated alignment source, the reference implementation of
//! [`AlignmentSource`](super::AlignmentSource).
//!
//! Column layout, one record per line (`.` for a missing mate field):
//! `read_name  chrom  pos  mapq  flags  cigar  mate_chrom  mate_pos  sequence`

use ahash::AHashMap;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::warn;

use super::AlignmentSource;
use crate::core::alignment::{parse_cigar, AlignmentRecord};

#[derive(Debug, Default)]
pub struct TsvAlignmentSource {
    /// Records per chromosome, sorted by position.
    by_chrom: AHashMap<String, Vec<AlignmentRecord>>,
    /// Lines that did not parse at all.
    pub unparseable_lines: u64,
}

impl TsvAlignmentSource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("cannot open alignment records file {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: BufReader<R>) -> Result<Self> {
        let mut source = Self::default();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.context("reading alignment records")?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match parse_line(trimmed) {
                Some(record) => source
                    .by_chrom
                    .entry(record.chrom.clone())
                    .or_default()
                    .push(record),
                None => {
                    source.unparseable_lines += 1;
                    warn!(line = line_no + 1, "skipping unparseable alignment line");
                }
            }
        }
        for records in source.by_chrom.values_mut() {
            records.sort_by_key(|r| (r.pos, r.read_name.clone()));
        }
        Ok(source)
    }

    pub fn record_count(&self) -> usize {
        self.by_chrom.values().map(Vec::len).sum()
    }
}

fn parse_line(line: &str) -> Option<AlignmentRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 9 {
        return None;
    }
    let pos: i64 = fields[2].parse().ok()?;
    let mapq: u8 = fields[3].parse().ok()?;
    let flags: u16 = fields[4].parse().ok()?;
    let cigar = parse_cigar(fields[5])?;
    let mate_chrom = match fields[6] {
        "." => None,
        // "=" means "same as chrom", SAM-style.
        "=" => Some(fields[1].to_string()),
        other => Some(other.to_string()),
    };
    let mate_pos = match fields[7] {
        "." => None,
        other => Some(other.parse().ok()?),
    };
    let sequence = match fields[8] {
        "*" | "." => String::new(),
        other => other.to_string(),
    };
    Some(AlignmentRecord {
        read_name: fields[0].to_string(),
        chrom: fields[1].to_string(),
        pos,
        mapq,
        flags,
        cigar,
        mate_chrom,
        mate_pos,
        sequence,
    })
}

impl AlignmentSource for TsvAlignmentSource {
    fn fetch<'a>(
        &'a self,
        chrom: &str,
        start: i64,
        end: i64,
    ) -> Result<Box<dyn Iterator<Item = AlignmentRecord> + 'a>> {
        let records = self.by_chrom.get(chrom).map(Vec::as_slice).unwrap_or(&[]);
        Ok(Box::new(
            records
                .iter()
                .filter(move |r| r.pos < end && r.reference_end() > start)
                .cloned(),
        ))
    }

    fn chromosomes(&self) -> Vec<(String, i64)> {
        let mut chroms: Vec<(String, i64)> = self
            .by_chrom
            .iter()
            .map(|(chrom, records)| {
                let extent = records.iter().map(|r| r.reference_end()).max().unwrap_or(0);
                (chrom.clone(), extent)
            })
            .collect();
        chroms.sort();
        chroms
    }
}
