//! Degraded-path behavior: components without usable sequence fragments
//! must never consult the alignment-scoring collaborator and must still
//! produce calls from graph-estimated breakpoints.

use std::io::{BufReader, Cursor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sv_forge::core::alignment::flags;
use sv_forge::pipeline::SvCallerPipeline;
use sv_forge::scoring::{AlignmentScorer, LocalAlignment, PairwiseScorer};
use sv_forge::source::{InMemoryReference, NoReference, TsvAlignmentSource};
use sv_forge::utils::configuration::CallerConfig;
use sv_forge::SvType;

struct CountingScorer {
    inner: PairwiseScorer,
    calls: Arc<AtomicUsize>,
}

impl AlignmentScorer for CountingScorer {
    fn local_align(&self, a: &[u8], b: &[u8]) -> LocalAlignment {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.local_align(a, b)
    }
}

fn source_from(lines: &[String]) -> TsvAlignmentSource {
    let body = lines.join("\n");
    TsvAlignmentSource::from_reader(BufReader::new(Cursor::new(body))).unwrap()
}

#[test]
fn fragmentless_component_skips_the_scorer_entirely() {
    // Discordant pairs carry no clipped sequence: nothing to assemble.
    let lines: Vec<String> = (0..3)
        .map(|i| {
            format!(
                "r{i}\tchr1\t{}\t60\t{}\t100M\t=\t{}\t*",
                900 + i,
                flags::PAIRED | flags::MATE_REVERSE,
                5000 + i
            )
        })
        .collect();
    let source = source_from(&lines);

    let calls_made = Arc::new(AtomicUsize::new(0));
    let scorer = CountingScorer {
        inner: PairwiseScorer::default(),
        calls: Arc::clone(&calls_made),
    };
    let pipeline = SvCallerPipeline::new(CallerConfig::default()).with_scorer(Box::new(scorer));
    let regions = SvCallerPipeline::default_regions(&source);
    let output = pipeline.run(&source, &NoReference, &regions).unwrap();

    assert_eq!(calls_made.load(Ordering::Relaxed), 0);
    assert_eq!(output.calls.len(), 1);
    let call = &output.calls[0];
    // Graph-estimated (imprecise) breakpoints survive.
    assert!(call.assembly.is_none());
    assert_eq!(call.sv_type, SvType::Deletion);
    assert!(call.sv_length > 3000);
}

#[test]
fn overlapping_clips_assemble_into_supported_contig() {
    // A reference is attached so the refinement path runs; the novel clip
    // sequence does not anchor, so graph-estimated breakpoints stand.
    let mut reference_seq = Vec::new();
    for i in 0..3000usize {
        reference_seq.push(b"ACGT"[i % 4]);
    }
    let reference = InMemoryReference::new().with_sequence("chr1", &reference_seq);

    // Clipped tails share a 24-base overlap; the clip carries sequence the
    // reference does not contain.
    let novel = "TTGGTTGGTTGGTTGGTTGGTTGGTTGGTTGG";
    let matching: String = String::from_utf8(reference_seq[1940..1970].to_vec()).unwrap();

    let mut lines = Vec::new();
    for i in 0..3 {
        // 70M30S at pos 1930: alignment ends at 2000, clipped tail is the
        // start of the novel sequence.
        let clip = &novel[..30];
        let seq = format!("{}{}", "A".repeat(70), clip);
        lines.push(format!(
            "left{i}\tchr1\t1930\t60\t{}\t70M30S\t=\t2400\t{seq}",
            flags::PAIRED | flags::PROPER_PAIR | flags::MATE_REVERSE
        ));
    }
    for i in 0..3 {
        // Fragments overlapping the first batch, extending further into
        // the novel sequence plus upstream matching sequence.
        let clip = format!("{}{}", &matching[..8], &novel[..24]);
        let seq = format!("{clip}{}", "C".repeat(68));
        lines.push(format!(
            "right{i}\tchr1\t2000\t60\t{}\t32S68M\t=\t2400\t{seq}",
            flags::PAIRED | flags::PROPER_PAIR | flags::MATE_REVERSE
        ));
    }

    let source = source_from(&lines);
    let pipeline = SvCallerPipeline::new(CallerConfig::default());
    let regions = SvCallerPipeline::default_regions(&source);
    let output = pipeline.run(&source, &reference, &regions).unwrap();

    assert_eq!(output.calls.len(), 1);
    let call = &output.calls[0];
    let assembly = call.assembly.as_ref().expect("assembly should succeed");
    assert!(assembly.contig_support_count >= 2);
    assert!(assembly.assembly_quality > 0.5);
}
