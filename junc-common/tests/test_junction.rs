// Junction stream format round-trips

use junc_common::{
    JunctionPosition, JunctionPositionReader, JunctionPositionWriter, SEPARATOR_ID, SEPARATOR_POS,
};
use std::path::Path;

fn write_stream(path: &Path, junctions: &[JunctionPosition]) {
    let mut writer = JunctionPositionWriter::create(path).unwrap();
    for j in junctions {
        writer.write(*j).unwrap();
    }
    writer.finish().unwrap();
}

fn read_stream(path: &Path) -> Vec<JunctionPosition> {
    let mut reader = JunctionPositionReader::open(path).unwrap();
    let mut junctions = Vec::new();
    while let Some(j) = reader.next_junction().unwrap() {
        junctions.push(j);
    }
    junctions
}

#[test]
fn test_roundtrip_with_separators() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junctions.bin");

    // Chromosome 1 has no junctions; the reader must still land records on
    // chromosome 2.
    let written = vec![
        JunctionPosition::new(0, 0, 7),
        JunctionPosition::new(0, 5, 3),
        JunctionPosition::new(2, 1, 7),
    ];
    write_stream(&path, &written);

    assert_eq!(read_stream(&path), written);
}

#[test]
fn test_empty_stream() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junctions.bin");
    write_stream(&path, &[]);

    assert!(read_stream(&path).is_empty());
}

#[test]
fn test_on_disk_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junctions.bin");
    write_stream(
        &path,
        &[
            JunctionPosition::new(0, 3, 9),
            JunctionPosition::new(1, 0, 0x0102030405060708),
        ],
    );

    // (pos: u32 LE, id: u64 LE) records with one separator between the two
    // chromosomes.
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 3 * 12);
    assert_eq!(&bytes[0..4], 3u32.to_le_bytes());
    assert_eq!(&bytes[4..12], 9u64.to_le_bytes());
    assert_eq!(&bytes[12..16], SEPARATOR_POS.to_le_bytes());
    assert_eq!(&bytes[16..24], SEPARATOR_ID.to_le_bytes());
    assert_eq!(&bytes[24..28], 0u32.to_le_bytes());
    assert_eq!(&bytes[28..36], 0x0102030405060708u64.to_le_bytes());
}

#[test]
fn test_reader_skips_leading_separators() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junctions.bin");

    // First junction on chromosome 3: three separators precede it.
    write_stream(&path, &[JunctionPosition::new(3, 11, 2)]);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 4 * 12);
    assert_eq!(read_stream(&path), vec![JunctionPosition::new(3, 11, 2)]);
}
