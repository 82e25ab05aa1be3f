use nrk_subtitle_translator::diag::{DiagnosticEvent, DiagnosticSink};

#[test]
fn events_serialize_with_type_tag_and_snake_case() {
    let event = DiagnosticEvent::complete("Hei", "Hello");
    let json: serde_json::Value = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "translation_complete");
    assert_eq!(json["original"], "Hei");
    assert_eq!(json["translated"], "Hello");
    assert!(json["timestamp"].as_str().unwrap().contains('T'), "RFC 3339");

    let error = DiagnosticEvent::error("Hei", "backend down");
    let json: serde_json::Value = serde_json::to_value(&error).unwrap();
    assert_eq!(json["type"], "translation_error");
    assert_eq!(json["error"], "backend down");
}

#[test]
fn file_sink_appends_one_json_line_per_event() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diagnostics.jsonl");
    let sink = DiagnosticSink::disabled().log_to_file(&path);

    sink.emit(DiagnosticEvent::detected("Hei"));
    sink.emit(DiagnosticEvent::complete("Hei", "Hello"));

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["type"], "subtitle_detected");
    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["type"], "translation_complete");
}

#[test]
fn channel_sink_delivers_in_order() {
    let (sink, mut rx) = DiagnosticSink::channel();
    sink.emit(DiagnosticEvent::detected("Hei"));
    sink.emit(DiagnosticEvent::error("Hei", "boom"));

    assert_eq!(rx.try_recv().unwrap().original(), "Hei");
    assert!(matches!(
        rx.try_recv().unwrap(),
        DiagnosticEvent::TranslationError { .. }
    ));
    assert!(rx.try_recv().is_err());
}

#[test]
fn emit_is_a_no_op_without_listeners() {
    let sink = DiagnosticSink::disabled();
    sink.emit(DiagnosticEvent::detected("Hei"));

    // Receiver dropped: delivery failure must be swallowed.
    let (sink, rx) = DiagnosticSink::channel();
    drop(rx);
    sink.emit(DiagnosticEvent::detected("Hei"));
}
