mod auth;
mod calc;
mod config;
mod db;
mod identity;
mod ipc;
mod live;
mod model;
mod portal;
mod rank;
mod registry;
mod store;

use std::io::{self, BufRead, Write};

fn write_line(stdout: &mut impl Write, value: &serde_json::Value) {
    let _ = writeln!(
        stdout,
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    );
}

fn main() {
    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("gradecalcd: {e:#}");
            std::process::exit(2);
        }
    };
    config::init_tracing(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gradecalcd starting");

    let mut state = ipc::AppState::new();
    if let Some(path) = config.workspace.as_ref() {
        if let Err(e) = ipc::select_workspace(&mut state, path) {
            tracing::error!(workspace = %path.display(), error = ?e, "could not open configured workspace");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "malformed request line");
                write_line(
                    &mut stdout,
                    &serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() },
                    }),
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        write_line(&mut stdout, &resp);
        for event in ipc::drain_events(&mut state) {
            write_line(&mut stdout, &event);
        }
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed, shutting down");
}
