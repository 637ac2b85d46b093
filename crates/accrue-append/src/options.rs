use serde_json::Value;

/// Per-call options for [`Appender::append`](crate::Appender::append).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppendOptions {
    /// Positional arguments substituted into a text template.
    pub format_args: Vec<Value>,
    /// Flush right after this append's mutation is applied.
    pub auto_flush: bool,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that only request an immediate flush.
    pub fn flush() -> Self {
        Self {
            auto_flush: true,
            ..Self::default()
        }
    }

    pub fn with_args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.format_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }
}
