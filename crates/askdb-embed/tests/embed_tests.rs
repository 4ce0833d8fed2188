use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread;

use askdb_core::config::{EmbeddingBackend, EmbeddingSettings};
use askdb_core::traits::Embedder;
use askdb_embed::{build_embedder, HashEmbedder, OllamaEmbedder};

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[test]
fn hash_embedder_shapes_and_determinism() {
    let embedder = HashEmbedder::new(64);
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");

    assert_eq!(embs[0].len(), 64);
    assert!((norm(&embs[0]) - 1.0).abs() <= 1e-3, "vector is L2-normalized");
    assert_eq!(embs[0], embs[1]);
}

#[test]
fn hash_embedder_relates_shared_tokens() {
    let embedder = HashEmbedder::new(256);
    let a = embedder.embed("solar panel wiring").unwrap();
    let b = embedder.embed("wiring a solar panel").unwrap();
    let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
    assert!(dot > 0.99, "same tokens in a different order embed alike");
}

#[test]
fn text_without_tokens_is_the_zero_vector() {
    let v = HashEmbedder::new(16).embed("a ? !").unwrap();
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn factory_honours_hash_backend() {
    let settings = EmbeddingSettings { backend: EmbeddingBackend::Hash, dim: 32, ..EmbeddingSettings::default() };
    let embedder = build_embedder(&settings).expect("embedder");
    assert_eq!(embedder.dim(), 32);
}

/// Serves one canned HTTP response and hands back the request body.
fn one_shot_server(body: &'static str) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
            if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = v.trim().parse().unwrap();
            }
        }
        let mut request = vec![0u8; content_length];
        reader.read_exact(&mut request).unwrap();
        write!(
            stream,
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        )
        .unwrap();
        String::from_utf8(request).unwrap()
    });
    (format!("http://{addr}"), handle)
}

#[test]
fn ollama_embedder_posts_inputs_and_normalizes() {
    let (url, server) = one_shot_server(r#"{"model":"m","embeddings":[[3.0,4.0],[0.0,2.0]]}"#);
    let settings = EmbeddingSettings {
        backend: EmbeddingBackend::Ollama,
        model: "nomic-embed-text".into(),
        dim: 2,
        url,
        timeout_secs: 5,
    };
    let embedder = OllamaEmbedder::new(&settings).unwrap();
    let out = embedder.embed_batch(&["first".to_string(), "second".to_string()]).unwrap();

    assert_eq!(out, vec![vec![0.6, 0.8], vec![0.0, 1.0]]);
    let request = server.join().unwrap();
    assert!(request.contains("\"model\":\"nomic-embed-text\""));
    assert!(request.contains("\"input\":[\"first\",\"second\"]"));
}

#[test]
fn ollama_embedder_rejects_wrong_width() {
    let (url, server) = one_shot_server(r#"{"embeddings":[[1.0,0.0,0.0]]}"#);
    let settings = EmbeddingSettings { backend: EmbeddingBackend::Ollama, dim: 2, url, timeout_secs: 5, ..EmbeddingSettings::default() };
    let embedder = OllamaEmbedder::new(&settings).unwrap();
    assert!(embedder.embed("x").is_err());
    server.join().unwrap();
}
