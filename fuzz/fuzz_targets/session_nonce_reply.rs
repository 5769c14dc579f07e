#![no_main]

use libfuzzer_sys::fuzz_target;
use rndc_client::{Event, Session};

const KEY: &str = "c3RvcCBoYW1tZXJ0aW1l";

// Feeds arbitrary bytes to a freshly-opened session in place of the server's
// nonce reply. Packet::parse must reject malformed input without panicking.
fuzz_target!(|data: &[u8]| {
    let mut session = Session::new_client(KEY, "status");
    match session.start() {
        Event::Write(_) => {}
        _ => return,
    }
    match session.next(None) {
        Event::Read => {}
        _ => return,
    }

    match session.next(Some(data)) {
        Event::Write(_) | Event::Error(_) => {}
        other => panic!("unexpected event from malformed nonce reply: {other:?}"),
    }
});
