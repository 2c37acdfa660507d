use crate::Error;

/// Receives errors from the poller thread and from remote decide calls.
///
/// The poller never stops on these errors; they are reported here so the application can surface
/// them.
pub trait ErrorSink {
    fn report(&self, context: &str, error: &Error);
}

/// Default sink, forwards errors to the `log` crate.
pub(crate) struct LogErrorSink;
impl ErrorSink for LogErrorSink {
    fn report(&self, context: &str, error: &Error) {
        log::error!(target: "featureflags", "{context}: {error}");
    }
}

impl<T: Fn(&str, &Error)> ErrorSink for T {
    fn report(&self, context: &str, error: &Error) {
        self(context, error);
    }
}
