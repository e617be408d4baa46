//! Console byte stream: chunking, flow control, reads and drop policy

mod common;

use std::thread;
use std::time::Duration;

use common::*;
use embassy_futures::block_on;
use embassy_futures::join::join;
use nrf52_ble_console::ble::stack::{ConnHandle, StackError};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_fifty_bytes_at_default_mtu() {
    let console = connected_console(1);
    let data = pattern(50);

    block_on(console.write_bytes(&data)).unwrap();
    for _ in 0..4 {
        console.flush().unwrap();
    }

    let chunks = console.stack().notify_attempts();
    let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![20, 20, 10]);
    assert_eq!(chunks.concat(), data);

    for call in console.stack().calls() {
        assert!(matches!(call, Call::Notify(ConnHandle(1), TX_VALUE_HANDLE, _)));
    }

    let stats = console.stats();
    assert_eq!(stats.notifications, 3);
    assert_eq!(stats.tx_bytes, 50);
}

#[test]
fn test_flush_with_nothing_buffered() {
    let console = connected_console(1);

    console.flush().unwrap();

    assert!(console.stack().calls().is_empty());
}

#[test]
fn test_flush_without_connection_discards_chunk() {
    let console = advertising_console();
    console.stack().clear_calls();

    block_on(console.write_bytes(&pattern(30))).unwrap();
    console.flush().unwrap();

    assert!(console.stack().notify_attempts().is_empty());
    assert_eq!(console.pending_output(), 10);
    assert_eq!(console.stats().tx_discarded, 20);
}

#[test]
fn test_disconnect_mid_write_turns_flush_into_noop() {
    let console = connected_console(1);
    block_on(console.write_bytes(&pattern(50))).unwrap();
    console.flush().unwrap();

    pump(&console, ScriptedEvents::new().disconnect(1));
    console.flush().unwrap();
    console.flush().unwrap();

    assert_eq!(console.stack().notify_attempts().len(), 1);
    assert_eq!(console.pending_output(), 0);
    assert_eq!(console.stats().tx_discarded, 30);
}

#[test]
fn test_resource_exhaustion_is_retried() {
    let console = connected_console(1);
    console
        .stack()
        .queue_notify_results(&[Err(StackError::Resources), Err(StackError::Resources), Ok(())]);

    block_on(console.write_bytes(b"hello")).unwrap();
    console.flush().unwrap();

    let attempts = console.stack().notify_attempts();
    assert_eq!(attempts.len(), 3);
    assert!(attempts.iter().all(|chunk| chunk == b"hello"));
    assert_eq!(console.stats().notifications, 1);
}

#[test]
fn test_link_errors_count_as_sent() {
    let console = connected_console(1);
    console
        .stack()
        .queue_notify_results(&[Err(StackError::InvalidState), Err(StackError::InvalidConnHandle)]);

    block_on(console.write_bytes(&pattern(40))).unwrap();
    assert_eq!(console.flush(), Ok(()));
    assert_eq!(console.flush(), Ok(()));

    assert_eq!(console.stack().notify_attempts().len(), 2);
    assert_eq!(console.pending_output(), 0);
    assert_eq!(console.stats().notifications, 0);
}

#[test]
fn test_other_notify_error_is_fatal() {
    let console = connected_console(1);
    console.stack().queue_notify_results(&[Err(StackError::Other(0x3001))]);

    block_on(console.write_bytes(b"x")).unwrap();

    assert_eq!(console.flush(), Err(StackError::Other(0x3001)));
}

#[test]
fn test_write_flushes_while_buffer_full() {
    let console = connected_console(1);

    // 1068 bytes fit; 32 more need two flushes of 20
    block_on(console.write_bytes(&pattern(1100))).unwrap();

    assert_eq!(console.stack().notify_attempts().len(), 2);
    assert_eq!(console.pending_output(), 1060);
}

#[test]
fn test_events_handled_during_long_write() {
    let console = connected_console(1);
    let data = pattern(1100);

    // One executor: the event side only runs when the writer yields
    let (written, handled) = block_on(join(console.write_bytes(&data), async {
        pump(
            &console,
            ScriptedEvents::new().mtu_request(1, 128).write(1, RX_VALUE_HANDLE, b"ok"),
        )
    }));

    assert_eq!(written, Ok(()));
    assert_eq!(handled, 2);
    assert!(console.has_pending_input());

    // First chunk went out before the exchange, the second after it
    let sizes: Vec<usize> = console.stack().notify_attempts().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![20, 125]);
    assert_eq!(console.pending_output(), 1100 - 145);
}

#[test]
fn test_disconnect_during_long_write_discards_rest() {
    let console = connected_console(1);

    let (written, _) = block_on(join(console.write_bytes(&pattern(1200)), async {
        pump(&console, ScriptedEvents::new().disconnect(1))
    }));

    assert_eq!(written, Ok(()));
    assert_eq!(console.stack().notify_attempts().len(), 1);
    // Six chunks of the reset 20-byte payload dropped to make room
    assert_eq!(console.pending_output(), 1060);
    assert_eq!(console.stats().tx_discarded, 120);
}

#[test]
fn test_write_while_disconnected_never_blocks() {
    let console = advertising_console();

    block_on(console.write_bytes(&pattern(1100))).unwrap();

    assert!(console.stack().notify_attempts().is_empty());
    assert_eq!(console.pending_output(), 1060);
    assert_eq!(console.stats().tx_discarded, 40);
}

#[test]
fn test_fatal_error_surfaces_from_write() {
    let console = connected_console(1);
    console.stack().queue_notify_results(&[Err(StackError::Other(1))]);

    assert_eq!(block_on(console.write_bytes(&pattern(1100))), Err(StackError::Other(1)));
}

#[test]
fn test_read_returns_queued_input_in_order() {
    let console = connected_console(1);
    pump(&console, ScriptedEvents::new().write(1, RX_VALUE_HANDLE, b"hi"));

    assert!(console.has_pending_input());
    assert_eq!(block_on(console.read_byte()), Ok(b'h'));
    assert_eq!(block_on(console.read_byte()), Ok(b'i'));
    assert!(!console.has_pending_input());
    assert_eq!(console.stats().rx_bytes, 2);
}

#[test]
fn test_writes_to_other_attributes_ignored() {
    let console = connected_console(1);

    pump(
        &console,
        ScriptedEvents::new()
            .write(1, TX_CCCD_HANDLE, &[0x01, 0x00])
            .write(1, TX_VALUE_HANDLE, b"nope"),
    );

    assert!(!console.has_pending_input());
    assert_eq!(console.stats().rx_bytes, 0);
}

#[test]
fn test_read_waits_for_event_handler() {
    let console = connected_console(1);

    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(50));
            pump(&console, ScriptedEvents::new().write(1, RX_VALUE_HANDLE, b"z"));
        });

        assert_eq!(block_on(console.read_byte()), Ok(b'z'));
    });
}

#[test]
fn test_read_drains_output_while_waiting() {
    let console = connected_console(1);
    block_on(console.write_bytes(&pattern(45))).unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            // Input only arrives once the reader has pushed everything out
            for _ in 0..1000 {
                if console.pending_output() == 0 {
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
            pump(&console, ScriptedEvents::new().write(1, RX_VALUE_HANDLE, b"!"));
        });

        assert_eq!(block_on(console.read_byte()), Ok(b'!'));
    });

    let sizes: Vec<usize> = console.stack().notify_attempts().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![20, 20, 5]);
}

#[test]
fn test_read_surfaces_fatal_flush_error() {
    let console = connected_console(1);
    console.stack().queue_notify_results(&[Err(StackError::Other(9))]);
    block_on(console.write_bytes(b"out")).unwrap();

    assert_eq!(block_on(console.read_byte()), Err(StackError::Other(9)));
}

#[test]
fn test_inbound_overflow_drops_excess_bytes() {
    // Known data loss: input beyond the buffer is discarded without telling
    // the peer or the application; only the counter records it.
    let console = connected_console(1);
    let data = pattern(1100);

    let mut events = ScriptedEvents::new();
    for chunk in data.chunks(125) {
        events = events.write(1, RX_VALUE_HANDLE, chunk);
    }
    pump(&console, events);

    let stats = console.stats();
    assert_eq!(stats.rx_bytes, 1068);
    assert_eq!(stats.rx_dropped, 32);

    let mut received = Vec::new();
    while console.has_pending_input() {
        received.push(block_on(console.read_byte()).unwrap());
    }
    assert_eq!(received, data[..1068]);
}
