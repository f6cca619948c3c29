//! Whole-file round trips and indexed query scenarios.

use std::io::Cursor;

use alnmap::{
    build_index, cigar_from_text, flags, AlignmentRecord, BamReader, BamWriter, Index,
    ReferenceSequence, SamHeader, TagValue,
};

fn three_reference_header() -> SamHeader {
    SamHeader::new(
        "@HD\tVN:1.6\tSO:coordinate\n",
        vec![
            ReferenceSequence::new("chr1", 1000),
            ReferenceSequence::new("chr2", 2000),
            ReferenceSequence::new("chr3", 500),
        ],
    )
}

fn mapped_record(reference_id: i32, position: i32, name: &str) -> AlignmentRecord {
    AlignmentRecord {
        reference_id,
        position,
        mapping_quality: 60,
        flags: flags::PAIRED,
        cigar: cigar_from_text("10M").unwrap(),
        mate_reference_id: reference_id,
        mate_position: position,
        insert_size: 0,
        name: name.to_string(),
        sequence: b"ACGTACGTAC".to_vec(),
        quality: vec![35; 10],
        tags: vec![(*b"NM", TagValue::Int32(0))],
    }
}

/// 50 records on chr1 at positions 1..=900 and 10 on chr2 at 1..=50,
/// coordinate sorted.
fn example_records() -> Vec<AlignmentRecord> {
    let mut records = Vec::new();
    for i in 0..50 {
        let position = 1 + i * 18; // spread over 1..=883
        records.push(mapped_record(0, position, &format!("chr1_read_{i:02}")));
    }
    for i in 0..10 {
        let position = 1 + i * 5; // spread over 1..=46
        records.push(mapped_record(1, position, &format!("chr2_read_{i:02}")));
    }
    records
}

fn write_file(header: &SamHeader, records: &[AlignmentRecord]) -> Vec<u8> {
    alnmap::write_all(header, records, Vec::new()).unwrap()
}

// ==================== Sequential Round Trip Tests ====================

#[test]
fn full_file_round_trip_preserves_every_field() {
    let header = three_reference_header();
    let mut records = example_records();
    records.push(AlignmentRecord {
        reference_id: -1,
        position: 0,
        mate_reference_id: -1,
        mate_position: 0,
        name: "unmapped_read".to_string(),
        flags: flags::UNMAPPED,
        sequence: b"TTTTT".to_vec(),
        ..Default::default()
    });

    let bytes = write_file(&header, &records);
    let mut reader = BamReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.header(), &header);
    assert_eq!(reader.parse_all().unwrap(), records);
}

#[test]
fn lazy_and_eager_parse_agree() {
    let header = three_reference_header();
    let records = example_records();
    let bytes = write_file(&header, &records);

    let mut eager = BamReader::new(Cursor::new(bytes.clone())).unwrap();
    let all = eager.parse_all().unwrap();

    let mut lazy = BamReader::new(Cursor::new(bytes)).unwrap();
    let streamed: Vec<_> = lazy.records().map(Result::unwrap).collect();
    assert_eq!(all, streamed);
}

// ==================== Region Query Scenario Tests ====================

#[test]
fn chr2_region_query_returns_exactly_its_records() {
    let header = three_reference_header();
    let records = example_records();
    let bytes = write_file(&header, &records);

    let mut reader = BamReader::new(Cursor::new(bytes.clone())).unwrap();
    let index = build_index(&mut reader).unwrap();

    let mut reader = BamReader::new(Cursor::new(bytes)).unwrap();
    let hits: Vec<_> = reader
        .query_by_name(&index, "chr2", 0, 50)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(hits.len(), 10);
    assert!(hits.iter().all(|r| r.reference_id == 1));
    assert!(hits.iter().all(|r| r.name.starts_with("chr2_read_")));
}

#[test]
fn chr1_tail_region_is_empty() {
    let header = three_reference_header();
    let records = example_records();
    let bytes = write_file(&header, &records);

    let mut reader = BamReader::new(Cursor::new(bytes.clone())).unwrap();
    let index = build_index(&mut reader).unwrap();

    let mut reader = BamReader::new(Cursor::new(bytes)).unwrap();
    let hits: Vec<_> = reader
        .query_by_name(&index, "chr1", 900, 1000)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert!(hits.is_empty());
}

#[test]
fn whole_reference_query_matches_filtered_scan() {
    let header = three_reference_header();
    let records = example_records();
    let bytes = write_file(&header, &records);

    let mut reader = BamReader::new(Cursor::new(bytes.clone())).unwrap();
    let index = build_index(&mut reader).unwrap();

    for (reference_id, name) in [(0usize, "chr1"), (1, "chr2"), (2, "chr3")] {
        let mut reader = BamReader::new(Cursor::new(bytes.clone())).unwrap();
        let hits: Vec<_> = reader
            .query(&index, reference_id, 0, u32::MAX)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        let expected: Vec<_> = records
            .iter()
            .filter(|r| r.reference_id == reference_id as i32)
            .cloned()
            .collect();
        assert_eq!(hits, expected, "reference {name}");
    }
}

#[test]
fn query_works_across_many_blocks() {
    let header = SamHeader::new("", vec![ReferenceSequence::new("chr1", 10_000_000)]);
    let records: Vec<_> = (0..20_000)
        .map(|i| {
            let mut r = mapped_record(0, 1 + i * 100, &format!("deep_{i:06}"));
            r.sequence = b"ACGTACGTACGTACGTACGTACGTACGTACGT".to_vec();
            r.cigar = cigar_from_text("32M").unwrap();
            r.quality = vec![30; 32];
            r
        })
        .collect();
    let bytes = write_file(&header, &records);
    // large enough to need several compressed blocks
    assert!(bytes.len() > 65536 / 4);

    let mut reader = BamReader::new(Cursor::new(bytes.clone())).unwrap();
    let index = build_index(&mut reader).unwrap();

    let mut reader = BamReader::new(Cursor::new(bytes)).unwrap();
    let hits: Vec<_> = reader
        .query(&index, 0, 1_000_000, 1_010_000)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    let expected: Vec<_> = records
        .iter()
        .filter(|r| {
            let begin = (r.position - 1) as u32;
            begin < 1_010_000 && begin + 32 > 1_000_000
        })
        .cloned()
        .collect();
    assert_eq!(hits, expected);
}

// ==================== Index File Round Trip Tests ====================

#[test]
fn index_survives_serialization() {
    let header = three_reference_header();
    let records = example_records();
    let bytes = write_file(&header, &records);

    let mut reader = BamReader::new(Cursor::new(bytes.clone())).unwrap();
    let index = build_index(&mut reader).unwrap();

    let mut index_bytes = Vec::new();
    index.write_to(&mut index_bytes).unwrap();
    let reloaded = Index::read_from(&mut Cursor::new(&index_bytes)).unwrap();
    assert_eq!(reloaded, index);

    // the reloaded index answers queries identically
    let mut reader = BamReader::new(Cursor::new(bytes)).unwrap();
    let hits: Vec<_> = reader
        .query_by_name(&reloaded, "chr2", 0, 50)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(hits.len(), 10);
}

#[test]
fn writer_side_index_answers_queries() {
    let header = three_reference_header();
    let records = example_records();

    let mut writer = BamWriter::new(Vec::new(), &header).unwrap();
    let index = writer.write_all_indexed(&records).unwrap();
    let bytes = writer.into_inner().unwrap();

    let mut reader = BamReader::new(Cursor::new(bytes)).unwrap();
    let hits: Vec<_> = reader
        .query_by_name(&index, "chr2", 0, 50)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(hits.len(), 10);
}
