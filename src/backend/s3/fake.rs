//! In-process S3 stand-in for tests
//!
//! Serves plain HTTP/1.1 on a loopback port: object PUT/GET/HEAD/DELETE and
//! ListObjectsV2 over an in-memory map, one request per connection.
//! Signatures are not checked. `fail_with` makes every later request answer
//! with a fixed status instead.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;

const BUCKET: &str = "/shared";

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Vec<u8>>,
    fail_with: Option<u16>,
    requests: usize,
}

struct Request {
    method: String,
    path: String,
    query: String,
    body: Vec<u8>,
}

pub struct FakeS3 {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
}

impl FakeS3 {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State::default()));

        let shared = state.clone();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let _ = serve(stream, &shared);
            }
        });

        FakeS3 { addr, state }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn fail_with(&self, status: u16) {
        let mut state = self.state.lock();
        state.fail_with = Some(status);
        state.requests = 0;
    }

    /// Requests seen since the last `fail_with`
    pub fn requests(&self) -> usize {
        self.state.lock().requests
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().objects.contains_key(path)
    }
}

fn serve(stream: TcpStream, state: &Mutex<State>) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let request = read_request(&mut reader)?;
    let (status, body) = respond(&request, &mut state.lock());

    let mut stream = stream;
    let head = format!(
        "HTTP/1.1 {} Fake\r\n\
         Content-Length: {}\r\n\
         ETag: \"0\"\r\n\
         Last-Modified: Mon, 01 Jan 2024 00:00:00 GMT\r\n\
         Connection: close\r\n\r\n",
        status,
        body.len()
    );
    stream.write_all(head.as_bytes())?;
    if request.method != "HEAD" {
        stream.write_all(&body)?;
    }
    stream.flush()
}

fn read_request(reader: &mut impl BufRead) -> std::io::Result<Request> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default();
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let (path, query) = (path.to_string(), query.to_string());

    let mut content_length = 0;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header)?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    Ok(Request {
        method,
        path,
        query,
        body,
    })
}

fn respond(request: &Request, state: &mut State) -> (u16, Vec<u8>) {
    state.requests += 1;
    if let Some(status) = state.fail_with {
        return (status, error_body("Injected"));
    }

    if request.path == BUCKET && request.query.contains("list-type=2") {
        return (200, listing(request, state));
    }

    match request.method.as_str() {
        "PUT" => {
            state
                .objects
                .insert(request.path.clone(), request.body.clone());
            (200, Vec::new())
        }
        "GET" | "HEAD" => match state.objects.get(&request.path) {
            Some(data) => (200, data.clone()),
            None => (404, error_body("NoSuchKey")),
        },
        "DELETE" => {
            state.objects.remove(&request.path);
            (204, Vec::new())
        }
        _ => (405, error_body("MethodNotAllowed")),
    }
}

fn listing(request: &Request, state: &State) -> Vec<u8> {
    let prefix = request
        .query
        .split('&')
        .find_map(|pair| pair.strip_prefix("prefix="))
        .unwrap_or("")
        .replace("%2F", "/");

    let mut xml = String::from("<ListBucketResult><IsTruncated>false</IsTruncated>");
    for (path, data) in &state.objects {
        let Some(key) = path.strip_prefix(BUCKET).and_then(|p| p.strip_prefix('/')) else {
            continue;
        };
        if key.starts_with(&prefix) {
            xml.push_str(&format!(
                "<Contents><Key>{}</Key><Size>{}</Size>\
                 <LastModified>2024-01-01T00:00:00.000Z</LastModified>\
                 <ETag>\"0\"</ETag></Contents>",
                key,
                data.len()
            ));
        }
    }
    xml.push_str("</ListBucketResult>");
    xml.into_bytes()
}

fn error_body(code: &str) -> Vec<u8> {
    format!("<Error><Code>{}</Code><Message>{}</Message></Error>", code, code).into_bytes()
}
