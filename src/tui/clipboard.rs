use anyhow::{anyhow, Result};
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

/// How long each clipboard instance is kept alive after a copy. On X11/Wayland the
/// contents vanish with the owning instance, so managers need time to read them.
const HOLD_FOR: Duration = Duration::from_secs(2);

static CLIPBOARD: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

fn clipboard_worker() -> &'static std_mpsc::Sender<String> {
    CLIPBOARD.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();
        std::thread::spawn(move || {
            for text in rx {
                match arboard::Clipboard::new() {
                    Ok(mut clipboard) => {
                        if clipboard.set_text(text).is_ok() {
                            std::thread::sleep(HOLD_FOR);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "clipboard unavailable"),
                }
            }
        });
        tx
    })
}

/// Queue `text` for the clipboard without blocking the UI thread.
pub fn copy(text: &str) -> Result<()> {
    clipboard_worker()
        .send(text.to_string())
        .map_err(|_| anyhow!("clipboard worker stopped"))
}
