#![allow(dead_code)]

use std::{
    io::{BufRead, BufReader, Write},
    net::TcpListener,
    thread::{self, JoinHandle},
};

pub const GREETING: &str = "ANSELUS server 0.9";
pub const WID: &str = "b5a9367e-680d-46c0-bb2c-73932a6d4007";
pub const DEVID: &str = "14ba1b6e-d4a5-4b1f-a0fa-8e4fbfa8e3a2";
pub const PASSWORD: &str = "MyS3cretPassw*rd";

/// A loopback server that serves a fixed number of connections in turn and
/// answers each request line with whatever `responder` returns.
pub struct FakeServer {
    pub port: u16,
    handle: JoinHandle<Vec<String>>,
}

impl FakeServer {
    pub fn start<F>(connections: usize, greeting: &str, mut responder: F) -> Self
    where
        F: FnMut(&str) -> Option<String> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        let port = listener.local_addr().expect("local addr").port();
        let greeting = greeting.to_string();

        let handle = thread::spawn(move || {
            let mut received = Vec::new();
            for _ in 0..connections {
                let (stream, _) = match listener.accept() {
                    Ok(pair) => pair,
                    Err(_) => break,
                };
                let mut writer = stream.try_clone().expect("clone stream");
                let mut reader = BufReader::new(stream);
                if writer
                    .write_all(format!("{greeting}\r\n").as_bytes())
                    .is_err()
                {
                    continue;
                }

                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    let request = line.trim_end().to_string();
                    received.push(request.clone());
                    if request == "QUIT" {
                        break;
                    }
                    match responder(&request) {
                        Some(reply) => {
                            if writer.write_all(format!("{reply}\r\n").as_bytes()).is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
            received
        });

        Self { port, handle }
    }

    pub fn server(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Waits for the server thread and returns every request line it saw.
    pub fn finish(self) -> Vec<String> {
        self.handle.join().expect("fake server thread panicked")
    }
}

/// Replies a well-behaved server would give to a login sequence.
pub fn login_responder(request: &str) -> Option<String> {
    let verb = request.split_whitespace().next().unwrap_or_default();
    let reply = match verb {
        "LOGIN" | "PASSWORD" => "100 CONTINUE",
        "DEVICE" => "200 OK",
        "REGISTER" => return Some(format!("201 REGISTERED {DEVID}")),
        "UNREGISTER" => "202 UNREGISTER PENDING",
        _ => "400 BAD REQUEST",
    };
    Some(reply.to_string())
}
