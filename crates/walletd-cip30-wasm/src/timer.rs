//! `setTimeout`-backed timer for the browser event loop.

use std::time::Duration;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use js_sys::Promise;
use wasm_bindgen_futures::JsFuture;
use walletd_cip30::Timer;
use web_sys::Window;

#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserTimer;

/// Clears the scheduled callback when the sleep goes away, so a call that
/// beats its deadline leaves no timer behind.
struct PendingTimeout {
    window: Window,
    handle: i32,
}

impl Drop for PendingTimeout {
    fn drop(&mut self) {
        self.window.clear_timeout_with_handle(self.handle);
    }
}

impl Timer for BrowserTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let millis = duration.as_millis().min(i32::MAX as u128) as i32;
        let mut pending = None;
        let promise = Promise::new(&mut |resolve, _reject| match web_sys::window() {
            Some(window) => {
                match window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis) {
                    Ok(handle) => pending = Some(PendingTimeout { window, handle }),
                    Err(_) => {
                        tracing::warn!("setTimeout failed; wallet call runs without a deadline")
                    }
                }
            }
            None => tracing::warn!("no window; wallet call runs without a deadline"),
        });
        async move {
            let _pending = pending;
            let _ = JsFuture::from(promise).await;
        }
        .boxed_local()
    }
}
