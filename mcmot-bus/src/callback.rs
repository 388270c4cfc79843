use crate::envelope::FrameEnvelope;
use crate::error::Result;

/// Invoked once per frame the consumer loop decides should reach this
/// pipeline stage. Implementations typically forward to the next bus topic
/// or run CV inference; neither is this crate's concern.
pub trait StageCallback: Send + Sync {
    fn handle(&self, envelope: FrameEnvelope) -> Result<()>;
}

impl<F> StageCallback for F
where
    F: Fn(FrameEnvelope) -> Result<()> + Send + Sync,
{
    fn handle(&self, envelope: FrameEnvelope) -> Result<()> {
        self(envelope)
    }
}
