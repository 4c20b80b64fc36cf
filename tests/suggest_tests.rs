use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread;

use dailyfocus::commands::cmd_suggest;
use dailyfocus::suggest::{GeminiSuggester, NoSuggestions, SubtaskSuggester};
use pretty_assertions::assert_eq;

/// Serves one canned HTTP response and hands back the request line and body.
fn serve_once(status: &'static str, body: String) -> (String, thread::JoinHandle<(String, String)>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}/models", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        let mut content_length = 0;
        loop {
            let mut header = String::new();
            reader.read_line(&mut header).unwrap();
            if header.trim().is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }
        let mut request_body = vec![0; content_length];
        reader.read_exact(&mut request_body).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        (request_line, String::from_utf8(request_body).unwrap())
    });
    (base, handle)
}

#[test]
fn test_gemini_suggestions_are_parsed() {
    let text = serde_json::to_string(&vec![" Book flights ", "", "Reserve hotel"]).unwrap();
    let body = serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    })
    .to_string();
    let (base, server) = serve_once("200 OK", body);

    let suggester = GeminiSuggester::new("secret".into())
        .with_model("test-model")
        .with_base_url(base);
    let steps = suggester.suggest("Plan trip");
    let (request_line, request_body) = server.join().unwrap();

    assert_eq!(steps, vec!["Book flights".to_string(), "Reserve hotel".to_string()]);
    assert!(request_line.starts_with("POST /models/test-model:generateContent?key=secret"));
    assert!(request_body.contains("Plan trip"));
    assert!(request_body.contains("responseSchema"));
}

#[test]
fn test_gemini_error_yields_nothing() {
    let (base, server) = serve_once("500 Internal Server Error", "{}".into());

    let suggester = GeminiSuggester::new("secret".into()).with_base_url(base);
    assert!(suggester.suggest("Plan trip").is_empty());
    server.join().unwrap();
}

#[test]
fn test_unexpected_payload_yields_nothing() {
    let (base, server) = serve_once("200 OK", r#"{"candidates": []}"#.into());

    let suggester = GeminiSuggester::new("secret".into()).with_base_url(base);
    assert!(suggester.suggest("Plan trip").is_empty());
    server.join().unwrap();
}

#[test]
fn test_unreachable_service_yields_nothing() {
    // Bind and drop to get a port nothing listens on.
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let suggester = GeminiSuggester::new("secret".into()).with_base_url(format!("http://127.0.0.1:{port}"));
    assert!(suggester.suggest("Plan trip").is_empty());
}

#[test]
fn test_blank_title_skips_request() {
    let suggester = GeminiSuggester::new("secret".into()).with_base_url("http://127.0.0.1:1");
    assert!(suggester.suggest("   ").is_empty());
    assert!(cmd_suggest(&NoSuggestions, "Anything").is_empty());
}
