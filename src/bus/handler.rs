/// A handler for events of type `E`.
///
/// Closures of the shape `Fn(&E) -> anyhow::Result<()>` are handlers too.
pub trait Handles<E: ?Sized>: Send + Sync + 'static {
    fn handle(&self, event: &E) -> anyhow::Result<()>;
}

impl<E, F> Handles<E> for F
where
    E: ?Sized,
    F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn handle(&self, event: &E) -> anyhow::Result<()> {
        self(event)
    }
}
