#![no_main]

use libfuzzer_sys::fuzz_target;
use transcode_avi::{IndexEntry, IndexTable, SearchFlags};

fuzz_target!(|data: &[u8]| {
    let mut table = IndexTable::new();

    // Each 8-byte record: timestamp, size, keyframe flag
    for record in data.chunks_exact(8) {
        let timestamp = i32::from_le_bytes([record[0], record[1], record[2], record[3]]) as i64;
        let size = u16::from_le_bytes([record[4], record[5]]) as u32;
        table.add_entry(IndexEntry {
            pos: table.len() as u64 * 16,
            timestamp,
            size,
            keyframe: record[6] & 1 == 1,
        });
    }

    let timestamps: Vec<i64> = table.entries().iter().map(|e| e.timestamp).collect();
    assert!(timestamps.windows(2).all(|w| w[0] < w[1]));

    if let Some(last) = data.last() {
        let flags = SearchFlags::from_bits_truncate(*last as u32);
        if let Some(i) = table.search(*last as i64, flags) {
            assert!(i < table.len());
        }
    }

    if table.len() == 1 {
        let total = table.entries()[0].size;
        let sample_size = data.first().copied().unwrap_or(1).max(1) as u32;
        table.split_single_block(sample_size);
        let sum: u32 = table.entries().iter().map(|e| e.size).sum();
        assert_eq!(sum, total);
    }
});
