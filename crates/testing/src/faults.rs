use stakeidx_core::Error;

/// Failures the fakes can be told to inject.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestFault {
    /// Every gateway request fails at the transport level.
    GatewayDown,

    /// The cluster never reports a writable state.
    StoreUnhealthy,

    /// The nth multi-get request (zero based) fails.
    MultiGetBatch(usize),

    /// Setting the write block on an index fails.
    SetReadOnlyFails,

    /// The clone request fails.
    CloneFails,

    /// The clone request returns without acknowledgement.
    CloneNotAcknowledged,

    /// Lifting the write block on an index fails.
    UnsetReadOnlyFails,

    MappingFails,

    /// The nth bulk request (zero based) fails as a whole.
    BulkRequest(usize),

    /// The nth scroll request (zero based) fails.
    ScrollPage(usize),
}

impl TestFault {
    pub(crate) fn error(&self) -> Error {
        match self {
            TestFault::GatewayDown => Error::transport("fault injection: gateway down"),
            other => Error::store(format!("fault injection: {other:?}")),
        }
    }
}
