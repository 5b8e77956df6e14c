// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Transient arenas grow to their high-water mark and upload through staging.

use frame_relay::imp::{Call, CallLog, RecordingDriver};
use frame_relay::{Config, GROWTH_BLOCK, Service, Stream, Usage};

fn service(vertex_arena: u32) -> (Service, CallLog) {
    let (driver, log) = RecordingDriver::new();
    let config = Config::default().with_arena_size(Usage::Vertex, vertex_arena);
    let mut service = Service::new(driver, config).expect("service");
    service.initialize().expect("initialize");
    log.take();
    (service, log)
}

#[test]
fn uniform_blocks_are_256_apart() {
    let (mut service, _log) = service(256);
    let streams: Vec<Stream> = (0..3)
        .map(|_| service.allocate::<[f32; 4]>(Usage::Uniform, 1).stream)
        .collect();
    let offsets: Vec<u32> = streams.iter().map(|s| s.offset).collect();
    assert_eq!(offsets, vec![0, 256, 512]);
    for stream in &streams {
        assert_eq!(stream.stride, 256);
        assert_eq!(stream.length, 256);
        assert_eq!(stream.buffer, service.arena(Usage::Uniform).gpu());
    }
}

#[test]
fn overflow_grows_the_arena() {
    let (mut service, log) = service(256);
    let arena = service.arena(Usage::Vertex);
    let (gpu, staging) = (arena.gpu(), arena.staging());
    assert_eq!(arena.committed(), 256);

    let head = service.allocate_data(Usage::Vertex, &[7u8; 200]);
    let tail = service.allocate_data(Usage::Vertex, &[9u8; 100]);
    assert_eq!(head.offset, 0);
    assert_eq!(tail.offset, 256);
    service.finish(false);
    service.finish(false);

    let calls = log.take();
    let resizes: Vec<(frame_relay::Handle, u32)> = calls
        .iter()
        .filter_map(|c| match c {
            Call::ResizeBuffer { handle, size } => Some((*handle, *size)),
            _ => None,
        })
        .collect();
    assert_eq!(resizes.len(), 2);
    assert_eq!(resizes[0].0, gpu);
    assert_eq!(resizes[1].0, staging);
    let grown = resizes[0].1;
    assert_eq!(resizes[1].1, grown);
    assert!(grown >= 256 + 100);
    assert_eq!(grown % GROWTH_BLOCK, 0);

    assert!(calls.contains(&Call::UpdateBuffer {
        handle: gpu,
        offset: 256,
        data: vec![9; 100],
    }));
    assert!(calls.contains(&Call::MapBuffer { handle: staging }));
    assert!(calls.contains(&Call::CopyBuffer {
        dst: gpu,
        dst_offset: 0,
        src: staging,
        src_offset: 0,
        size: 200,
    }));

    //two swaps later the grown slot is back with the producer
    let arena = service.arena(Usage::Vertex);
    assert_eq!(arena.gpu(), gpu);
    assert_eq!(arena.committed(), grown);
    assert!(arena.cpu_len() >= grown as usize);
    let refill = service.allocate_data(Usage::Vertex, &[1u8; 300]);
    assert!(refill.offset + refill.length <= grown);
}

#[test]
fn growth_covers_every_overflowing_frame() {
    let (mut service, _log) = service(1024);
    for frame in 1..=6u32 {
        let before = service.arena(Usage::Vertex).committed();
        for _ in 0..frame {
            service.allocate::<u32>(Usage::Vertex, 175);
        }
        let overflow = service.arena(Usage::Vertex).scratch_len();
        service.finish(false);
        service.finish(false);
        //two swaps later the same slot is back with the producer
        let after = service.arena(Usage::Vertex).committed();
        assert!(after >= before + overflow);
        assert!(after >= frame * 700);
    }
}

#[test]
fn arenas_never_shrink() {
    let (mut service, _log) = service(256);
    service.allocate::<u8>(Usage::Vertex, 4000);
    service.finish(false);
    service.finish(false);
    let grown = service.arena(Usage::Vertex).committed();
    assert!(grown >= 4000);
    for _ in 0..4 {
        service.allocate::<u8>(Usage::Vertex, 10);
        service.finish(false);
        service.finish(false);
        assert_eq!(service.arena(Usage::Vertex).committed(), grown);
    }
}
