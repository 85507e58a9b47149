//! Logging shims: `tracing` with the `telemetry` feature, stderr otherwise.

macro_rules! warn_event {
    ($($arg:tt)+) => {{
        #[cfg(feature = "telemetry")]
        {
            tracing::warn!($($arg)+);
        }
        #[cfg(not(feature = "telemetry"))]
        {
            eprintln!($($arg)+);
        }
    }};
}

macro_rules! info_event {
    ($($arg:tt)+) => {{
        #[cfg(feature = "telemetry")]
        {
            tracing::info!($($arg)+);
        }
        #[cfg(not(feature = "telemetry"))]
        {
            let _ = format_args!($($arg)+);
        }
    }};
}
