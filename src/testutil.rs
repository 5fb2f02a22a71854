//! Test doubles: a canned HTTP responder for the inference server and fake executables.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub(crate) struct Captured {
    pub method: String,
    pub path: String,
    pub body: String,
}

pub(crate) type Handler = fn(&Captured) -> (u16, String);

/// Answers like a healthy Ollama: 200 on `/`, `{"response":"4"}` on generate.
pub(crate) fn ollama_like(req: &Captured) -> (u16, String) {
    match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/") => (200, "Ollama is running".into()),
        ("POST", "/api/generate") => (200, r#"{"model":"x","response":" 4 ","done":true}"#.into()),
        _ => (404, r#"{"error":"not found"}"#.into()),
    }
}

pub(crate) struct Responder {
    pub base_url: String,
    captured: Arc<Mutex<Vec<Captured>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Responder {
    pub fn captured(&self) -> Vec<Captured> {
        self.captured.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) async fn bind() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.unwrap()
}

pub(crate) fn url_of(listener: &TcpListener) -> String {
    format!("http://{}", listener.local_addr().unwrap())
}

/// URL of a local port nobody listens on.
pub(crate) async fn closed_port_url() -> String {
    let listener = bind().await;
    let url = url_of(&listener);
    drop(listener);
    url
}

pub(crate) fn serve(listener: TcpListener, handler: Handler) -> Responder {
    let base_url = url_of(&listener);
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();
    let task = tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            let sink = sink.clone();
            tokio::spawn(async move {
                let Some(req) = read_request(&mut sock).await else {
                    return;
                };
                let (code, body) = handler(&req);
                if let Ok(mut c) = sink.lock() {
                    c.push(req);
                }
                let reason = if code < 400 { "OK" } else { "Error" };
                let resp = format!(
                    "HTTP/1.1 {code} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = sock.write_all(resp.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });
    Responder {
        base_url,
        captured,
        task,
    }
}

async fn read_request(sock: &mut TcpStream) -> Option<Captured> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = sock.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = sock.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(Captured {
        method,
        path,
        body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
    })
}

/// Executable shell script in a temp dir, standing in for `ollama` or `ngrok`.
#[cfg(unix)]
pub(crate) struct FakeBinary {
    dir: tempfile::TempDir,
}

#[cfg(unix)]
impl FakeBinary {
    /// Ollama stand-in: `serve` sleeps, `stop <model>` records the model and exits with
    /// `stop_exit_code`.
    pub fn new(stop_exit_code: i32) -> Self {
        let fake = Self::empty();
        let log = fake.dir.path().join("unloaded.log");
        fake.write(&format!(
            r#"case "$1" in
  serve) exec sleep 30 ;;
  stop) echo "$2" >> "{}"; exit {stop_exit_code} ;;
esac
exit 2"#,
            log.display()
        ));
        fake
    }

    pub fn from_script(body: &str) -> Self {
        let fake = Self::empty();
        fake.write(body);
        fake
    }

    fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn write(&self, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = self.dir.path().join("fake-bin");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    pub fn path(&self) -> String {
        self.dir.path().join("fake-bin").display().to_string()
    }

    /// Models passed to `stop`, in call order.
    pub fn unloaded(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("unloaded.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
