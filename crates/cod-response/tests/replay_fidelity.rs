//! Replay Fidelity Tests
//!
//! Replaying a captured descriptor must leave a sink in the same observable
//! state as running the same calls against it directly.

use cod_response::{
    Body, ExecutionId, OutputInterceptor, Redirect, ReplayError, ResponseDescriptor, ResponseSink,
    replay,
};
use cod_test_utils::{Output, RecordingSink};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Write {
    Status(u16),
    Header(&'static str, String),
}

#[derive(Debug, Clone)]
enum Finish {
    Send(String),
    Json(i64),
    Redirect(Option<u16>, String),
    End(Vec<u8>),
}

fn write_strategy() -> impl Strategy<Value = Write> {
    prop_oneof![
        (100u16..600).prop_map(Write::Status),
        (
            prop::sample::select(vec!["Content-Type", "Cache-Control", "X-Request", "Set-Cookie"]),
            "[a-z0-9=;/ ]{0,16}"
        )
            .prop_map(|(name, value)| Write::Header(name, value)),
    ]
}

fn finish_strategy() -> impl Strategy<Value = Finish> {
    prop_oneof![
        ".{0,32}".prop_map(Finish::Send),
        any::<i64>().prop_map(Finish::Json),
        (prop::option::of(prop::sample::select(vec![301u16, 302, 303, 307, 308])), "/[a-z]{0,8}")
            .prop_map(|(status, location)| Finish::Redirect(status, location)),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Finish::End),
    ]
}

fn apply<S: ResponseSink>(sink: &mut S, writes: &[Write], finish: &Finish) {
    for write in writes {
        match write {
            Write::Status(code) => sink.set_status(*code).unwrap(),
            Write::Header(name, value) => sink.set_header(name, value).unwrap(),
        }
    }
    match finish {
        Finish::Send(text) => sink.send(Body::from(text.as_str())).unwrap(),
        Finish::Json(n) => sink.send(Body::from(serde_json::json!({ "n": n }))).unwrap(),
        Finish::Redirect(Some(status), location) => {
            sink.redirect(Redirect::with_status(*status, location.as_str())).unwrap();
        }
        Finish::Redirect(None, location) => sink.redirect(Redirect::to(location.as_str())).unwrap(),
        Finish::End(bytes) => sink.end(bytes.clone()).unwrap(),
    }
}

fn capture(writes: &[Write], finish: &Finish) -> ResponseDescriptor {
    let (mut out, mut completion) = OutputInterceptor::new(ExecutionId::new());
    apply(&mut out, writes, finish);
    completion.try_recv().unwrap()
}

fn observable(sink: &RecordingSink) -> (Option<u16>, Vec<(String, String)>, Option<Output>) {
    let headers = sink
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    (sink.status, headers, sink.output.clone())
}

proptest! {
    #[test]
    fn replay_matches_direct_execution(
        writes in prop::collection::vec(write_strategy(), 0..8),
        finish in finish_strategy(),
    ) {
        let mut direct = RecordingSink::new();
        apply(&mut direct, &writes, &finish);

        let descriptor = capture(&writes, &finish);
        let mut replayed = RecordingSink::new();
        replay(&descriptor, &mut replayed).unwrap();

        prop_assert_eq!(observable(&replayed), observable(&direct));
    }

    #[test]
    fn every_replay_of_one_descriptor_is_identical(
        writes in prop::collection::vec(write_strategy(), 0..8),
        finish in finish_strategy(),
        sinks in 2usize..6,
    ) {
        let descriptor = capture(&writes, &finish);
        let mut first = RecordingSink::new();
        replay(&descriptor, &mut first).unwrap();

        for _ in 1..sinks {
            let mut next = RecordingSink::new();
            replay(&descriptor, &mut next).unwrap();
            prop_assert_eq!(&next, &first);
        }
    }
}

#[test]
fn decoded_descriptor_replays_the_same() {
    let writes = vec![
        Write::Status(201),
        Write::Header("Content-Type", "application/json".to_string()),
    ];
    let finish = Finish::Json(7);
    let descriptor = capture(&writes, &finish);

    let decoded = ResponseDescriptor::from_json(&descriptor.to_json().unwrap()).unwrap();
    let mut original = RecordingSink::new();
    let mut restored = RecordingSink::new();
    replay(&descriptor, &mut original).unwrap();
    replay(&decoded, &mut restored).unwrap();

    assert_eq!(restored, original);
}

#[test]
fn unterminated_capture_leaves_sink_untouched() {
    let (mut out, mut completion) = OutputInterceptor::new(ExecutionId::new());
    out.set_status(500).unwrap();
    out.set_header("X-Partial", "yes").unwrap();
    drop(out);

    let descriptor = completion.try_recv().unwrap();
    assert!(!descriptor.is_terminated());

    let mut sink = RecordingSink::with_status(200);
    assert_eq!(replay(&descriptor, &mut sink), Err(ReplayError::MissingTerminal));
    assert_eq!(sink, RecordingSink::with_status(200));
}

#[test]
fn seeded_interceptor_keeps_transport_status() {
    let live = RecordingSink::with_status(203);
    let (mut out, mut completion) = OutputInterceptor::seeded(ExecutionId::new(), &live);
    out.send(Body::from("ok")).unwrap();

    let mut replayed = RecordingSink::new();
    replay(&completion.try_recv().unwrap(), &mut replayed).unwrap();
    assert_eq!(replayed.status, Some(203));
    assert_eq!(live, RecordingSink::with_status(203));
}
