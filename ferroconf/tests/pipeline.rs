//! End-to-end request pipeline: build, exchange, decode, render.

mod common;

use std::io::Write;
use std::time::Duration;

use common::{MockSession, init_logging};
use ferroconf::exchange::{self, ExchangeConfig};
use ferroconf::render::{self, Sink};
use ferroconf::rpc::{Datastore, Operation};
use ferroconf::{
    BindingSet, DecodedReply, ErrorKind, ReplyStatus, Request, RequestBuilder, RpcInput, Session,
    XmlDocument, run_session,
};
use tokio_util::sync::CancellationToken;

const BASE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

fn command(name: &str) -> RequestBuilder {
    RequestBuilder::new(RpcInput::Command(name.to_string()))
}

fn config() -> ExchangeConfig {
    ExchangeConfig {
        reply_timeout: Duration::from_secs(100),
    }
}

#[tokio::test(start_paused = true)]
async fn test_bare_get_config_renders_envelope_only() {
    init_logging();
    let request = command("get-config").build().unwrap();
    assert_eq!(
        request,
        Request::Typed(Operation::GetConfig {
            source: Datastore::Running,
            filter: None,
        })
    );

    let mut session = MockSession::new().reply(&format!(
        r#"<rpc-reply xmlns="{}" message-id="{{id}}"><ok/></rpc-reply>"#,
        BASE
    ));
    let reply = exchange::execute(&mut session, request, &config(), CancellationToken::new())
        .await
        .unwrap();

    assert!(session.sent[0].contains("<get-config><source><running/></source></get-config>"));

    let DecodedReply::Typed { envelope, payload } = &reply else {
        panic!("expected typed reply");
    };
    assert!(payload.is_none());
    assert_eq!(envelope.status, ReplyStatus::Ok);

    let text = render::render_reply_to_string(&reply, None, &BindingSet::new()).unwrap();
    assert_eq!(text, envelope.document.to_pretty_string().unwrap());
    assert!(text.starts_with("<rpc-reply"));
}

#[tokio::test(start_paused = true)]
async fn test_xpath_over_raw_reply() {
    init_logging();
    let request = command("get-system-information").build().unwrap();
    let mut session = MockSession::new().reply(&format!(
        r#"<rpc-reply xmlns="{}" message-id="{{id}}"><system-information><host-name>r1</host-name></system-information></rpc-reply>"#,
        BASE
    ));

    let reply = exchange::execute(&mut session, request, &config(), CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(reply, DecodedReply::Raw(_)));

    let bindings = BindingSet::parse(&format!("nc={}", BASE)).unwrap();
    let text = render::render_reply_to_string(&reply, Some("//nc:rpc-reply"), &bindings).unwrap();
    assert_eq!(
        text,
        format!("Result (1 nodes):\n= element node \"{}:rpc-reply\"\n", BASE)
    );
}

#[tokio::test(start_paused = true)]
async fn test_get_with_filter_prints_payload_then_envelope() {
    init_logging();
    let bindings = BindingSet::parse("if=urn:ietf:params:xml:ns:yang:ietf-interfaces").unwrap();
    let request = command("get")
        .arg("/if:interfaces")
        .namespaces(bindings.clone())
        .build()
        .unwrap();

    let mut session = MockSession::new().reply(&format!(
        r#"<rpc-reply xmlns="{}" message-id="{{id}}"><data><interfaces xmlns="urn:ietf:params:xml:ns:yang:ietf-interfaces"><interface><name>eth0</name></interface></interfaces></data></rpc-reply>"#,
        BASE
    ));
    let reply = exchange::execute(&mut session, request, &config(), CancellationToken::new())
        .await
        .unwrap();

    let sent = &session.sent[0];
    assert!(sent.contains("select=\"/if:interfaces\""));
    assert!(sent.contains("xmlns:if=\"urn:ietf:params:xml:ns:yang:ietf-interfaces\""));

    let text = render::render_reply_to_string(&reply, None, &BindingSet::new()).unwrap();
    let data = text.find("<data").unwrap();
    let envelope = text.find("<rpc-reply").unwrap();
    assert!(data < envelope);
    assert!(text.contains("<name>eth0</name>"));

    let text = render::render_reply_to_string(&reply, Some("//if:name"), &bindings).unwrap();
    assert_eq!(
        text,
        "Result (1 nodes):\n= element node \"urn:ietf:params:xml:ns:yang:ietf-interfaces:name\"\n"
    );
}

#[tokio::test(start_paused = true)]
async fn test_uncorrelated_replies_time_out() {
    init_logging();
    let request = command("get-software-information").build().unwrap();
    let mut session = MockSession::new()
        .reply(r#"<rpc-reply message-id="999"><ok/></rpc-reply>"#)
        .reply_after(Duration::from_secs(60), r#"<rpc-reply message-id="1000"><ok/></rpc-reply>"#);

    let started = tokio::time::Instant::now();
    let err = exchange::execute(&mut session, request, &config(), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ReplyTimeout);
    assert!(started.elapsed() >= Duration::from_secs(100));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_exchange_closes_session() {
    init_logging();
    let request = command("get-software-information").build().unwrap();
    let mut session = MockSession::new();
    let token = CancellationToken::new();
    token.cancel();

    let err = run_session(&mut session, request, &config(), token)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(session.closed);
    assert!(!session.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_exchange_closes_session() {
    init_logging();
    let request = command("get-software-information").build().unwrap();
    let mut session = MockSession::new();

    let err = run_session(&mut session, request, &config(), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReplyTimeout);
    assert!(session.closed);
}

#[tokio::test(start_paused = true)]
async fn test_reply_survives_close_failure() {
    init_logging();
    let request = command("get-config").build().unwrap();
    let mut session = MockSession::new().reply(&format!(
        r#"<rpc-reply xmlns="{}" message-id="{{id}}"><data><system xmlns="urn:example:sys"/></data></rpc-reply>"#,
        BASE
    ));
    session.fail_close = true;

    let reply = run_session(&mut session, request, &config(), CancellationToken::new())
        .await
        .unwrap();
    assert!(session.closed);
    assert!(matches!(reply, DecodedReply::Typed { payload: Some(_), .. }));
}

#[test]
fn test_missing_request_file_sends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("request.xml");

    let err = RequestBuilder::new(RpcInput::File(missing))
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_request_file_and_output_file() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let request_path = dir.path().join("request.xml");
    let output_path = dir.path().join("reply.xml");

    let mut file = std::fs::File::create(&request_path).unwrap();
    write!(
        file,
        r#"<?xml version="1.0"?><rpc><get-interface-information><terse/></get-interface-information></rpc>"#
    )
    .unwrap();

    let request = RequestBuilder::new(RpcInput::File(request_path))
        .build()
        .unwrap();
    let reply_xml = r#"<rpc-reply message-id="{id}"><interface-information><physical-interface><name>ge-0/0/0</name></physical-interface></interface-information></rpc-reply>"#;
    let mut session = MockSession::new().reply(reply_xml);

    let reply = exchange::execute(&mut session, request, &config(), CancellationToken::new())
        .await
        .unwrap();
    assert!(session.sent[0].contains("<get-interface-information><terse/></get-interface-information>"));

    render::write_document(reply.document(), &output_path).unwrap();
    assert_eq!(
        std::fs::read_to_string(&output_path).unwrap(),
        reply_xml.replace(common::ID, "1")
    );

    // A failed query leaves the sink untouched
    let err = render::render_reply_to_string(&reply, Some("//junos:name"), &BindingSet::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Query);
}

#[test]
fn test_pretty_print_is_idempotent() {
    let doc = XmlDocument::parse(
        r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="1"><data><a x="1">text &amp; more</a><b/><!-- note --></data></rpc-reply>"#,
    )
    .unwrap();

    let once = doc.to_pretty_string().unwrap();
    let twice = XmlDocument::parse(once.clone())
        .unwrap()
        .to_pretty_string()
        .unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_bindings_preserve_count_and_order() {
    let input = "a=urn:a b=urn:b?x=1 c=http://example.com/c";
    let bindings = BindingSet::parse(input).unwrap();
    let pairs: Vec<_> = bindings.iter().collect();
    assert_eq!(
        pairs,
        vec![("a", "urn:a"), ("b", "urn:b?x=1"), ("c", "http://example.com/c")]
    );

    let err = BindingSet::parse("a=urn:a broken c=urn:c").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_invalid_datastores() {
    for store in ["", "Running", "candidate ", "operational", "intended"] {
        let result = command("get-config").arg(store).build();
        // An empty argument counts as a name, not as absent
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{:?}", store);
    }
}

#[test]
fn test_stdout_sink_default() {
    assert_eq!(Sink::from_path(None), Sink::Stdout);
}
