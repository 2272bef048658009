mod common;

use common::{return_frames, FakeTarget};
use ferrstack_core::buffer::FrameBuffer;
use ferrstack_core::collector::{Collection, FrameCollector};
use ferrstack_core::error::StackError;
use ferrstack_core::types::ThreadId;

#[test]
fn test_complete_stream()
{
    let mut target = FakeTarget::new(7).thread(7, return_frames(&[0x10, 0x20, 0x30]));
    let mut buffer = FrameBuffer::new(0).unwrap();

    let collection = FrameCollector::new().collect(&mut target, ThreadId(7), &mut buffer).unwrap();
    assert!(matches!(collection, Collection::Complete));
    assert_eq!(buffer.len(), 3);
}

#[test]
fn test_ceiling_stops_pulling()
{
    let mut target = FakeTarget::new(7).thread(7, return_frames(&[0x10, 0x20, 0x30, 0x40, 0x50]));
    let mut buffer = FrameBuffer::new(2).unwrap();

    let collection = FrameCollector::new().collect(&mut target, ThreadId(7), &mut buffer).unwrap();
    assert!(matches!(collection, Collection::CeilingReached));
    assert_eq!(buffer.len(), 2);
    // Frames past the ceiling are never produced.
    assert_eq!(target.pulled.get(), 2);
}

#[test]
fn test_failure_keeps_frames_already_captured()
{
    let mut target = FakeTarget::new(7).failing_thread(7, return_frames(&[0x10, 0x20]), "no unwind info");
    let mut buffer = FrameBuffer::new(0).unwrap();

    let collection = FrameCollector::new().collect(&mut target, ThreadId(7), &mut buffer).unwrap();
    match collection {
        Collection::Failed(StackError::Unwind(reason)) => assert_eq!(reason, "no unwind info"),
        other => panic!("unexpected collection: {other:?}"),
    }
    assert_eq!(buffer.len(), 2);
}

#[test]
fn test_failure_to_start_is_not_fatal()
{
    let mut target = FakeTarget::new(7).unstartable_thread(7);
    let mut buffer = FrameBuffer::new(0).unwrap();

    let collection = FrameCollector::new().collect(&mut target, ThreadId(7), &mut buffer).unwrap();
    assert!(matches!(collection, Collection::Failed(StackError::AttachFailed(_))));
    assert!(buffer.is_empty());
}

#[test]
fn test_buffer_is_reset_between_threads()
{
    let mut target = FakeTarget::new(7)
        .thread(7, return_frames(&[0x10, 0x20, 0x30]))
        .thread(8, return_frames(&[0x40]));
    let mut buffer = FrameBuffer::new(0).unwrap();
    let collector = FrameCollector::new();

    collector.collect(&mut target, ThreadId(7), &mut buffer).unwrap();
    collector.collect(&mut target, ThreadId(8), &mut buffer).unwrap();
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.frames()[0].pc.value(), 0x40);
}
