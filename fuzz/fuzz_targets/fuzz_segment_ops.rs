#![no_main]
use arbitrary::Arbitrary;
use damd::{DamdFile, SegmentOptions};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Add { key: u8, data: Vec<u8>, compress: bool },
    Remove { key: u8 },
    Save,
}

#[derive(Debug, Arbitrary)]
struct Input {
    host: Vec<u8>,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let path = dir.path().join("host.bin");
    if std::fs::write(&path, &input.host).is_err() {
        return;
    }

    let mut file = match DamdFile::open(&path) {
        Ok(file) => file,
        // Hosts that happen to end in a container trailer
        Err(_) => return,
    };
    let host_len = file.original_size() as usize;

    for op in input.ops.iter().take(32) {
        match op {
            Op::Add { key, data, compress } => {
                let options = SegmentOptions::new().compress(*compress);
                file.add_segment_with(&format!("k{}", key % 8), data.clone(), options)
                    .unwrap();
            }
            Op::Remove { key } => {
                file.remove_segment(&format!("k{}", key % 8));
            }
            Op::Save => file.save().unwrap(),
        }
    }
    file.save().unwrap();

    let reloaded = DamdFile::open(&path).unwrap();
    assert_eq!(reloaded.list_segments(), file.list_segments());
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..host_len], &input.host[..host_len]);
});
