//! End-to-end pipeline scenarios: alignment records in, variant calls out.

use std::io::{BufReader, Cursor};

use sv_forge::core::alignment::flags;
use sv_forge::pipeline::SvCallerPipeline;
use sv_forge::source::{NoReference, TsvAlignmentSource};
use sv_forge::utils::configuration::CallerConfig;
use sv_forge::SvType;

fn source_from(lines: &[String]) -> TsvAlignmentSource {
    let body = lines.join("\n");
    TsvAlignmentSource::from_reader(BufReader::new(Cursor::new(body))).unwrap()
}

/// Forward read of an FR pair.
fn fr_pair_line(read: &str, chrom: &str, pos: i64, mate_pos: i64) -> String {
    format!(
        "{read}\t{chrom}\t{pos}\t60\t{}\t100M\t=\t{mate_pos}\t*",
        flags::PAIRED | flags::MATE_REVERSE
    )
}

#[test]
fn deletion_scenario_three_spanning_pairs() {
    // Three discordant pairs spanning chr1:~1000 to chr1:~5000 with
    // concordant FR orientation.
    let lines: Vec<String> = (0..3)
        .map(|i| fr_pair_line(&format!("r{i}"), "chr1", 900 + i, 5000 + i))
        .collect();
    let source = source_from(&lines);
    let pipeline = SvCallerPipeline::new(CallerConfig::default());
    let regions = SvCallerPipeline::default_regions(&source);
    let output = pipeline.run(&source, &NoReference, &regions).unwrap();

    assert_eq!(output.calls.len(), 1);
    let call = &output.calls[0];
    assert_eq!(call.sv_type, SvType::Deletion);
    assert!((call.pos - 1000).abs() <= 50);
    assert!((call.end - 5000).abs() <= 50);
    assert_eq!(call.support_metrics.n_discordant, 3);
    assert_eq!(call.supporting_read_names.len(), 3);
}

#[test]
fn lone_soft_clip_scenario_no_call() {
    let lines = vec![format!(
        "solo\tchr3\t1000\t60\t{}\t80M20S\t=\t1300\t{}",
        flags::PAIRED | flags::PROPER_PAIR,
        "A".repeat(100)
    )];
    let source = source_from(&lines);
    let pipeline = SvCallerPipeline::new(CallerConfig::default());
    let regions = SvCallerPipeline::default_regions(&source);
    let output = pipeline.run(&source, &NoReference, &regions).unwrap();

    assert!(output.calls.is_empty());
    assert_eq!(output.stats.partition.rejected_low_support, 1);
}

#[test]
fn insertion_scenario_merges_opposite_evidence_directions() {
    let inserted = "ACGTACGTACGTACGTACGTACGTACGTGG";
    assert_eq!(inserted.len(), 30);

    let mut lines = Vec::new();
    // Reads carrying the insertion inside their CIGAR, breakpoint at 200.
    for i in 0..3 {
        let seq = format!("{}{}{}", "A".repeat(50), inserted, "C".repeat(20));
        lines.push(format!(
            "ins{i}\tchr2\t150\t60\t{}\t50M30I20M\t=\t500\t{seq}",
            flags::PAIRED | flags::PROPER_PAIR | flags::MATE_REVERSE
        ));
    }
    // Reads approaching from the right, soft-clipped back onto the same
    // junction.
    for i in 0..3 {
        let clip = format!("{}{}", "A".repeat(10), inserted);
        let seq = format!("{clip}{}", "C".repeat(60));
        lines.push(format!(
            "clip{i}\tchr2\t200\t60\t{}\t40S60M\t=\t500\t{seq}",
            flags::PAIRED | flags::PROPER_PAIR | flags::MATE_REVERSE
        ));
    }

    let source = source_from(&lines);
    let pipeline = SvCallerPipeline::new(CallerConfig::default());
    let regions = SvCallerPipeline::default_regions(&source);
    let output = pipeline.run(&source, &NoReference, &regions).unwrap();

    // Both evidence directions collapse into one insertion call with
    // unioned support, not two half-calls.
    assert_eq!(output.calls.len(), 1);
    let call = &output.calls[0];
    assert_eq!(call.sv_type, SvType::Insertion);
    assert_eq!(call.pos, 200);
    assert_eq!(call.supporting_read_names.len(), 6);
    assert_eq!(call.support_metrics.supporting_reads, 6);
    assert_eq!(call.support_metrics.n_insertion, 3);
    assert_eq!(call.support_metrics.n_soft_clip, 3);
    assert!((30..=40).contains(&call.sv_length));
    // The clip fragments overlap, so assembly should have succeeded.
    assert!(call.assembly.is_some());
}

#[test]
fn translocation_scenario_cross_chromosome_pairs() {
    let lines: Vec<String> = (0..4)
        .map(|i| {
            format!(
                "t{i}\tchr1\t{}\t60\t{}\t100M\tchr9\t{}\t*",
                2000 + i * 10,
                flags::PAIRED | flags::MATE_REVERSE,
                7_000_000 + i * 10
            )
        })
        .collect();
    let source = source_from(&lines);
    let pipeline = SvCallerPipeline::new(CallerConfig::default());
    let regions = SvCallerPipeline::default_regions(&source);
    let output = pipeline.run(&source, &NoReference, &regions).unwrap();

    assert_eq!(output.calls.len(), 1);
    let call = &output.calls[0];
    assert_eq!(call.sv_type, SvType::Translocation);
    assert_eq!(call.chrom, "chr1");
    assert_eq!(call.mate_chrom.as_deref(), Some("chr9"));
    assert!(call.mate_pos.unwrap() >= 7_000_000);
}

#[test]
fn every_call_satisfies_coordinate_invariants() {
    let mut lines: Vec<String> = (0..3)
        .map(|i| fr_pair_line(&format!("del{i}"), "chr1", 1000 + i, 9000 + i))
        .collect();
    // Same-strand pairs: inversion signal.
    for i in 0..3 {
        lines.push(format!(
            "inv{i}\tchr4\t{}\t60\t{}\t100M\t=\t{}\t*",
            3000 + i,
            flags::PAIRED,
            12_000 + i
        ));
    }
    for i in 0..3 {
        lines.push(format!(
            "bnd{i}\tchr2\t{}\t60\t{}\t100M\tchrX\t{}\t*",
            500 + i,
            flags::PAIRED | flags::MATE_REVERSE,
            900_000 + i
        ));
    }
    let source = source_from(&lines);
    let pipeline = SvCallerPipeline::new(CallerConfig::default());
    let regions = SvCallerPipeline::default_regions(&source);
    let output = pipeline.run(&source, &NoReference, &regions).unwrap();

    assert!(output.calls.len() >= 3);
    for call in &output.calls {
        assert!(call.coordinates_valid(), "invalid call: {call:?}");
        if call.sv_type != SvType::Translocation {
            assert!(call.end >= call.pos);
            assert!(call.sv_length > 0);
        }
        assert!(call.genotype.is_some());
        let confidence = call.confidence.unwrap();
        assert!((0.0..=1.0).contains(&confidence));
    }
    // Output is (chrom, pos)-sorted.
    let keys: Vec<(String, i64)> = output
        .calls
        .iter()
        .map(|c| (c.chrom.clone(), c.pos))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn identical_inputs_give_byte_identical_output() {
    let mut lines: Vec<String> = (0..5)
        .map(|i| fr_pair_line(&format!("a{i}"), "chr1", 1000 + i * 13, 6000 + i * 7))
        .collect();
    for i in 0..4 {
        lines.push(format!(
            "c{i}\tchr2\t{}\t60\t{}\t70M30S\t=\t400\t{}",
            300 + i,
            flags::PAIRED | flags::PROPER_PAIR,
            "ACGT".repeat(25)
        ));
    }
    for i in 0..3 {
        lines.push(format!(
            "x{i}\tchr1\t{}\t60\t{}\t100M\tchr5\t{}\t*",
            88_000 + i,
            flags::PAIRED | flags::MATE_REVERSE,
            1_000_000 + i
        ));
    }

    let source = source_from(&lines);
    let pipeline = SvCallerPipeline::new(CallerConfig::default());
    let regions = SvCallerPipeline::default_regions(&source);

    let first = pipeline.run(&source, &NoReference, &regions).unwrap();
    let second = pipeline.run(&source, &NoReference, &regions).unwrap();

    let a = serde_json::to_string(&first.calls).unwrap();
    let b = serde_json::to_string(&second.calls).unwrap();
    assert_eq!(a, b);
}

#[test]
fn noisy_region_aborts_without_poisoning_others() {
    let mut lines: Vec<String> = (0..50)
        .map(|i| fr_pair_line(&format!("n{i}"), "chr1", 1000 + i, 9000 + i))
        .collect();
    for i in 0..3 {
        lines.push(fr_pair_line(&format!("ok{i}"), "chr2", 700 + i, 5200 + i));
    }
    let source = source_from(&lines);
    let mut config = CallerConfig::default();
    config.pipeline.max_events_per_region = 20;
    let pipeline = SvCallerPipeline::new(config);
    let regions = SvCallerPipeline::default_regions(&source);
    let output = pipeline.run(&source, &NoReference, &regions).unwrap();

    assert_eq!(output.stats.regions_aborted, 1);
    assert!(output.aborted_regions[0].starts_with("chr1:"));
    assert_eq!(output.calls.len(), 1);
    assert_eq!(output.calls[0].chrom, "chr2");
}
