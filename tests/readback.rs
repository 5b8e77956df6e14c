// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Readback futures resolve once the worker has run the read.

use frame_relay::imp::SoftwareDriver;
use frame_relay::{
    BufferDesc, BufferUsage, Config, Service, TextureDesc, TextureFormat, TextureRegion,
    TextureUsage,
};
use test_executors::spin_on;

fn service() -> Service {
    let mut service = Service::new(SoftwareDriver::new(), Config::default()).expect("service");
    service.initialize().expect("initialize");
    service
}

#[test]
fn buffer_readback_sees_earlier_commands() {
    let mut service = service();
    let data: Vec<u8> = (0..16).collect();
    let buffer = service.create_buffer(&BufferDesc::new(16, BufferUsage::UNIFORM, "u"), &data);
    service.update_buffer(buffer, 0, &[0xff; 2]);
    let read = service.read_buffer(buffer, 0, 6);
    service.finish(false);
    //the worker resolves it while the producer is free to keep going
    assert_eq!(spin_on(read), Some(vec![0xff, 0xff, 2, 3, 4, 5]));
}

#[test]
fn several_readbacks_in_one_frame() {
    let mut service = service();
    let buffer = service.create_buffer(
        &BufferDesc::new(8, BufferUsage::VERTEX, "v"),
        &[1, 2, 3, 4, 5, 6, 7, 8],
    );
    let head = service.read_buffer(buffer, 0, 2);
    service.update_buffer(buffer, 6, &[9, 9]);
    let tail = service.read_buffer(buffer, 6, 2);
    service.finish(false);
    service.finish(false);
    assert_eq!(spin_on(tail), Some(vec![9, 9]));
    assert_eq!(spin_on(head), Some(vec![1, 2]));
}

#[test]
fn texture_readback() {
    let mut service = service();
    let desc = TextureDesc::new_2d(2, 2, TextureFormat::Rgba8, TextureUsage::READBACK, "t");
    let texels: Vec<u8> = (0..16).collect();
    let texture = service.create_texture(&desc, &texels);
    service.update_texture(texture, &TextureRegion::new_2d(1, 1, 1, 1), &[0xaa; 4]);
    let read = service.read_texture(texture, &desc.full_region());
    service.finish(false);
    let mut expected = texels.clone();
    expected[12..16].copy_from_slice(&[0xaa; 4]);
    assert_eq!(spin_on(read), Some(expected));
}

#[test]
fn aborted_readback_resolves_to_none() {
    let mut service = service();
    let buffer = service.create_buffer(&BufferDesc::new(4, BufferUsage::UNIFORM, ""), &[1; 4]);
    service.finish(false);
    let read = service.read_buffer(buffer, 0, 4);
    service.finish(true);
    assert_eq!(spin_on(read), None);
}

#[test]
fn readback_outstanding_at_teardown_resolves() {
    let mut service = service();
    let buffer = service.create_buffer(&BufferDesc::new(4, BufferUsage::UNIFORM, ""), &[3; 4]);
    let finished = service.read_buffer(buffer, 0, 4);
    service.finish(false);
    let unfinished = service.read_buffer(buffer, 0, 4);
    drop(service);
    assert_eq!(spin_on(finished), Some(vec![3; 4]));
    assert_eq!(spin_on(unfinished), None);
}
