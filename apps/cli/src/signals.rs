//! Cancellation sources: OS termination signals and the `q` quit key.
//!
//! A signal arriving while a pause is already pending exits immediately.

use std::io::BufRead;

use rapidup_upload::InterruptCoordinator;
use tracing::{debug, warn};

/// Exit status after a forced quit, as for a shell-reported SIGINT.
const FORCED_EXIT_CODE: i32 = 130;

/// What a termination signal does.
#[derive(Debug, PartialEq, Eq)]
enum SignalAction {
    /// Pause at the next part boundary.
    Pause,
    /// A pause was already pending; leave now.
    ForceQuit,
}

/// Starts both listeners. The first signal or quit key requests
/// cancellation; a signal after that exits the process.
pub fn spawn_listeners(interrupt: InterruptCoordinator) {
    let on_signal = interrupt.clone();
    tokio::spawn(async move {
        loop {
            wait_for_signal().await;
            if on_signal_received(&on_signal) == SignalAction::ForceQuit {
                warn!("second interrupt, exiting without waiting for the current part");
                std::process::exit(FORCED_EXIT_CODE);
            }
        }
    });

    // Stdin reads block, so the quit key gets its own thread.
    let spawned = std::thread::Builder::new()
        .name("quit-key".into())
        .spawn(move || watch_stdin(&interrupt));
    if let Err(e) = spawned {
        warn!(error = %e, "quit-key listener unavailable");
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (Ok(mut term), Ok(mut quit)) = (
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) else {
        warn!("failed to install SIGTERM/SIGQUIT handlers, listening for Ctrl+C only");
        let _ = tokio::signal::ctrl_c().await;
        return;
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => debug!("received SIGINT"),
        _ = term.recv() => debug!("received SIGTERM"),
        _ = quit.recv() => debug!("received SIGQUIT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn watch_stdin(interrupt: &InterruptCoordinator) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) if is_quit(&line) => {
                interrupt.request_cancellation();
                return;
            }
            Ok(_) => {}
            Err(_) => return,
        }
    }
}

fn on_signal_received(interrupt: &InterruptCoordinator) -> SignalAction {
    if interrupt.cancellation_requested() {
        return SignalAction::ForceQuit;
    }
    interrupt.request_cancellation();
    SignalAction::Pause
}

fn is_quit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("q")
}
