use cfg_if::cfg_if;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,wgpu_core=warn,wgpu_hal=warn,naga=warn"))
}

cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        /// Log to the browser console
        pub fn init() {
            let wasm_layer = tracing_wasm::WASMLayer::new(tracing_wasm::WASMLayerConfig::default());
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(wasm_layer)
                .try_init();

            #[cfg(feature = "console_error_panic_hook")]
            console_error_panic_hook::set_once();
        }
    } else {
        use once_cell::sync::OnceCell;
        use std::io;
        use std::path::Path;
        use tracing_appender::non_blocking::WorkerGuard;
        use tracing_subscriber::fmt;

        const DEFAULT_LOG_FILE: &str = "logs/doorway.log";

        static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

        /// stderr plus a daily rolling file (`RUST_LOG_FILE`, default `logs/doorway.log`)
        pub fn init() {
            let console_layer = fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_line_number(true)
                .compact();

            let log_path = std::env::var("RUST_LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
            let log_path = Path::new(&log_path);
            let dir = log_path.parent().unwrap_or(Path::new("."));
            let file_name = log_path.file_name().unwrap_or(std::ffi::OsStr::new("doorway.log"));
            let (nb_writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name));
            let _ = FILE_GUARD.set(guard);

            let file_layer = fmt::layer()
                .with_writer(nb_writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .compact();

            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(console_layer)
                .with(file_layer)
                .try_init();

            std::panic::set_hook(Box::new(|info| {
                let location = info
                    .location()
                    .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
                    .unwrap_or_default();
                let payload = info
                    .payload()
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| info.payload().downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "<non-string panic>".to_string());
                let bt = std::backtrace::Backtrace::force_capture();
                tracing::error!("panic at {location}: {payload}\nBacktrace:\n{bt:?}");
            }));
        }
    }
}
