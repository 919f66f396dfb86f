#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use transcode_avi::{AviDemuxer, SearchFlags};

fuzz_target!(|data: &[u8]| {
    let cursor = Cursor::new(data.to_vec());

    // Errors are fine, panics and hangs are not
    if let Ok(mut demuxer) = AviDemuxer::open(cursor) {
        let _ = demuxer.num_streams();
        let _ = demuxer.is_non_interleaved();

        for _ in 0..256 {
            match demuxer.read_packet() {
                Ok(Some(_)) => {}
                _ => break,
            }
        }

        if demuxer.num_streams() > 0 {
            let _ = demuxer.seek(0, 0, SearchFlags::BACKWARD);
            let _ = demuxer.read_packet();
        }
        demuxer.close();
    }
});
