use std::collections::VecDeque;

use dns_defender::{Defender, StorageConfig};

const SAMPLE_FRAME: &[u8] = b"\
    \x00\x15\x17\x0e\x61\xa2\x00\x03\x6c\xb3\x54\x1b\x08\x00\
    \x45\x00\x00\x38\xfa\xd6\x00\x00\xf3\x11\x92\x32\xbc\x5f\x1d\xb1\xc3\x86\x9d\x14\
    \xd5\x03\x00\x35\x00\x24\x00\x00\
    \x46\x14\x01\x00\x00\x01\x00\x00\x00\x00\x00\x01\
    \x00\x00\xff\x00\x01\
    \x00\x00\x29\x23\x28\x00\x00\x00\x00\x00\x00";

pub fn main() {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters("dns_defender=trace");
    builder.init();

    // one good frame, one cut off in the middle of the DNS header
    let frames: VecDeque<Vec<u8>> = vec![SAMPLE_FRAME.to_vec(), SAMPLE_FRAME[..50].to_vec()].into();

    let mut defender = Defender::with_config(frames, StorageConfig::with_seed(1));
    let stats = defender
        .run(|observation| {
            for question in &observation.questions {
                println!(
                    "{}:{} id=0x{:04x} asks {} (type {}, class {})",
                    observation.source,
                    observation.source_port,
                    observation.id,
                    question.name,
                    question.qtype,
                    question.qclass
                );
            }
        })
        .unwrap();

    println!("{:?}", stats);
    for arena in defender.storage().stats() {
        println!(
            "{:>8}: {} entries, {}/{} slots free",
            arena.name, arena.entries, arena.available, arena.capacity
        );
    }
}
