/// Cooperative cancellation signal for an instance run.
///
/// The mapping pipeline checks it between elements: once triggered, the
/// current element commits nothing further and remaining elements are not
/// attempted. Elements already committed stand — there is no rollback.
#[derive(Clone, Default)]
pub struct CancelSignal {
    token: tokio_util::sync::CancellationToken,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
