mod common;

use common::{Scripted, ScriptedTransport};
use regex::bytes::Regex;
use std::sync::Arc;
use std::time::Duration;
use tube::{Context, Deadline, Direction, Tube};

fn tube(reads: Vec<Scripted>) -> Tube<ScriptedTransport> {
    Tube::new(ScriptedTransport::new(reads), Arc::new(Context::default()))
}

#[test]
fn delimiter_match_returns_prefix_and_delimiter() {
    let mut t = tube(vec![Scripted::Data(b"user: root\n")]);
    let line = t
        .recv_until(&[b"\n".to_vec()], false, Deadline::Forever)
        .unwrap();
    assert_eq!(&*line, b"user: root\n");
}

#[test]
fn drop_delimiter_match_excludes_it() {
    let mut t = tube(vec![Scripted::Data(b"user: root\n")]);
    let line = t
        .recv_until(&[b"\n".to_vec()], true, Deadline::Forever)
        .unwrap();
    assert_eq!(&*line, b"user: root");
}

#[test]
fn multi_line_reconfigured_newline_is_honored() {
    let mut t = tube(vec![Scripted::Data(b"first\r\nsecond\r\nthird\r\n")]);
    t.set_newline(b"\r\n".to_vec());
    let lines = t.recv_lines(3, true, Deadline::Forever).unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(&*lines[0], b"first");
    assert_eq!(&*lines[1], b"second");
    assert_eq!(&*lines[2], b"third");
}

#[test]
fn recv_pred_stops_the_instant_condition_holds() {
    let mut t = tube(vec![Scripted::Data(b"AAAABBBB")]);
    let got = t
        .recv_pred(|acc| acc.iter().filter(|&&b| b == b'A').count() == 4, Deadline::Forever)
        .unwrap();
    assert_eq!(&*got, b"AAAA");
}

#[test]
fn recv_regex_with_capture_exposes_groups() {
    let mut t = tube(vec![Scripted::Data(b"status=200 done")]);
    let re = Regex::new(r"status=(\d+)").unwrap();
    let captured = t
        .recv_regex_captures(&re, false, Deadline::Forever)
        .unwrap();
    assert_eq!(&*captured.bytes, b"status=200");
    assert_eq!(captured.groups.len(), 1);
    assert_eq!(captured.groups[0].as_deref(), Some(&b"200"[..]));
}

#[test]
fn recv_all_drains_to_end_of_stream() {
    let mut t = tube(vec![
        Scripted::Data(b"part one "),
        Scripted::Data(b"part two"),
        Scripted::Eof,
    ]);
    let all = t.recv_all(Deadline::Forever).unwrap();
    assert_eq!(&*all, b"part one part two");
    assert!(!t.connected(Direction::Any));
}

#[test]
fn recv_n_timeout_keeps_buffer_untouched() {
    let mut t = tube(vec![Scripted::Data(b"ab"), Scripted::Timeout]);
    let got = t.recv_n(10, Deadline::Finite(Duration::from_millis(5))).unwrap();
    assert!(got.is_empty());
    let leftover = t.recv(None, Deadline::Finite(Duration::ZERO)).unwrap();
    assert_eq!(&*leftover, b"ab");
}
