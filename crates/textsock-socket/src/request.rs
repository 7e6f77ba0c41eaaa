use textsock_codec::ReceiveKind;

/// Text waiting to be written, with its completion.
pub(crate) struct OutgoingRequest {
    pub(crate) text: String,
    on_complete: Box<dyn FnOnce(bool) + Send>,
}

impl OutgoingRequest {
    pub(crate) fn new(text: String, on_complete: impl FnOnce(bool) + Send + 'static) -> Self {
        Self {
            text,
            on_complete: Box::new(on_complete),
        }
    }

    /// Run the completion with the outcome. Consumes the request, so it
    /// can only ever fire once.
    pub(crate) fn complete(self, sent: bool) {
        (self.on_complete)(sent)
    }
}

/// A pending line or byte-count receive, with its completion.
pub(crate) struct IncomingRequest {
    pub(crate) kind: ReceiveKind,
    on_complete: Box<dyn FnOnce(Option<String>) + Send>,
}

impl IncomingRequest {
    pub(crate) fn new(
        kind: ReceiveKind,
        on_complete: impl FnOnce(Option<String>) + Send + 'static,
    ) -> Self {
        Self {
            kind,
            on_complete: Box::new(on_complete),
        }
    }

    pub(crate) fn complete(self, text: Option<String>) {
        (self.on_complete)(text)
    }
}
