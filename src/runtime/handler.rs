use crate::{
    httpipe::BoundaryError,
    model::{RequestDescriptor, ResultRecord},
};

/// A trait that determines how each request is executed.
pub trait Execute: Send + Sync {
    /// Executes one request to completion.
    ///
    /// Failures are part of the returned record, never a separate error path.
    fn execute(&self, request: RequestDescriptor) -> impl Future<Output = ResultRecord> + Send;
}

/// A trait that determines where result records go.
pub trait ResultSink: Send {
    /// Hands one record to the output.
    ///
    /// # Errors
    /// Throws a `BoundaryError` if the output cannot be written. The pipeline stops on the first
    /// such error.
    fn accept(&mut self, record: ResultRecord) -> impl Future<Output = Result<(), BoundaryError>> + Send;
}

impl ResultSink for Vec<ResultRecord> {
    async fn accept(&mut self, record: ResultRecord) -> Result<(), BoundaryError> {
        self.push(record);
        Ok(())
    }
}
