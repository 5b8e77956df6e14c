// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! A driver that fails to initialize turns the service into a permanent no-op.

use frame_relay::imp::{Call, RecordingDriver};
use frame_relay::service::Error;
use frame_relay::{BufferDesc, BufferUsage, Config, Encoder, Service, State, Usage};
use test_executors::spin_on;

#[test]
fn failed_initialize_disables_everything() {
    let (driver, log) = RecordingDriver::failing("no adapter");
    let mut service = Service::new(driver, Config::default()).expect("service");
    assert_eq!(
        service.initialize(),
        Err(Error::DriverInitialization(String::from(
            "backend error: no adapter"
        )))
    );
    assert_eq!(service.state(), State::Disabled);
    assert!(service.capabilities().is_none());
    assert_eq!(service.initialize(), Err(Error::Disabled));

    //producer-side bookkeeping keeps working
    let buffer = service.create_buffer(&BufferDesc::new(4, BufferUsage::VERTEX, ""), &[1; 4]);
    assert!(buffer.is_valid());
    let stream = service.allocate_data(Usage::Vertex, &[1.0f32, 2.0, 3.0]);
    assert_eq!(stream.length, 12);
    let mut encoder = Encoder::new();
    encoder.set_vertices(0, stream);
    encoder.draw(3, 0, 0);
    service.submit(&encoder);
    service.commit();
    let read = service.read_buffer(buffer, 0, 4);
    service.finish(false);
    service.finish(false);

    assert_eq!(spin_on(read), None);
    //only the failed initialize ever reached the backend
    assert_eq!(log.take(), vec![Call::Initialize]);
}

#[test]
fn commands_before_initialize_are_dropped() {
    let (driver, log) = RecordingDriver::new();
    let mut service = Service::new(driver, Config::default()).expect("service");
    service.commit();
    service.finish(false);
    service.finish(false);
    assert!(log.is_empty());
    assert_eq!(service.state(), State::Uninitialized);

    service.initialize().expect("initialize");
    assert_eq!(service.state(), State::Initialized);
    assert_eq!(log.snapshot()[0], Call::Initialize);
}
