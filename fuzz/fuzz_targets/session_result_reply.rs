#![no_main]

use libfuzzer_sys::fuzz_target;
use rndc_client::{Event, Packet, Session};

const KEY: &str = "c3RvcCBoYW1tZXJ0aW1l";

// Drives a session past the nonce exchange with a well-formed reply, then
// feeds arbitrary bytes in place of the server's result packet.
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

    let nonce_reply = Packet::new(KEY, None, Some(7)).to_bytes().expect("sign");
    match session.next(Some(&nonce_reply)) {
        Event::Write(_) => {}
        _ => return,
    }
    match session.next(None) {
        Event::Read => {}
        _ => return,
    }

    match session.next(Some(data)) {
        Event::Finish(_) | Event::Error(_) => {}
        other => panic!("unexpected event from malformed result reply: {other:?}"),
    }
});
